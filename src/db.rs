//! Model structs corresponding to database tables and documents. Must be kept in sync with
//! migrations.

use std::time::SystemTime;

use serde_with::serde_as;

/// Custom claims attached to an authenticated identity, e.g. `{ "role": "superadmin" }`.
pub type CustomClaims = serde_json::Map<String, serde_json::Value>;

/// Document path of [`crate::availability::MaintenanceSettings`].
pub const MAINTENANCE_SETTINGS_PATH: &str = "settings/maintenance";
/// Document path of [`UpiConfiguration`].
pub const UPI_CONFIGURATION_PATH: &str = "upiConfiguration/active";
/// Document path of [`ReferralConfiguration`].
pub const REFERRAL_CONFIGURATION_PATH: &str = "referralConfiguration/settings";

/// A Ludo League account.
#[serde_as]
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    /// PK ID, assigned by the identity provider.
    pub uid: String,
    /// Sign-in email, if any.
    pub email: Option<String>,
    /// TEXT field containing a JSON object.
    #[serde_as(as = "serde_with::DefaultOnNull<serde_with::json::JsonString>")]
    #[serde(default)]
    pub custom_claims: CustomClaims,
}

/// Lifecycle of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Waiting for an opponent.
    Open,
    /// Being played.
    InProgress,
    /// Result recorded.
    Completed,
    /// Cancelled before completion.
    Cancelled,
}

/// A paid Ludo match.
#[serde_as]
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Match {
    /// PK ID.
    pub id: String,
    /// FK [`User::uid`] of the creator.
    pub creator_uid: String,
    /// FK [`User::uid`] of the opponent, once joined.
    pub opponent_uid: Option<String>,
    /// Entry fee per player, in whole rupees.
    pub entry_fee: i64,
    /// Current state.
    pub status: MatchStatus,
    /// Creation time (unix epoch milliseconds).
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
}

/// What a wallet transaction represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// UPI deposit, verified by a deposit admin.
    Deposit,
    /// Older name for [`Self::Deposit`].
    AddMoney,
    /// Payout to the user's UPI account.
    Withdrawal,
    /// Match entry fee.
    EntryFee,
    /// Match winnings.
    Win,
    /// Tournament prize. Older records use [`Self::Win`].
    Prize,
    /// Commission earned from a referred user's activity.
    ReferralCommission,
    /// Entry fee returned for a cancelled match.
    Refund,
}

/// Approval state of a wallet transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting admin review.
    Pending,
    /// Counted towards the balance.
    Completed,
    /// Never counted.
    Rejected,
}

/// A wallet transaction.
#[serde_as]
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    /// PK ID.
    pub id: String,
    /// FK [`User::uid`].
    pub uid: String,
    /// Kind, determines the sign.
    pub kind: TransactionKind,
    /// Unsigned amount, in whole rupees.
    pub amount: i64,
    /// Approval state.
    pub status: TransactionStatus,
    /// Creation time (unix epoch milliseconds).
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
}

/// The `upiConfiguration/active` document.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpiConfiguration {
    /// UPI ID users should pay deposits to.
    pub active_upi_id: Option<String>,
}

/// The `referralConfiguration/settings` document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralConfiguration {
    /// Percentage of a referred user's deposits credited to the referrer.
    pub commission_percentage: Option<f64>,
}

/// Collections the retention job deletes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// [`Match`] records.
    Matches,
    /// [`Transaction`] records.
    Transactions,
}
impl Collection {
    /// Table name.
    pub fn table(self) -> &'static str {
        match self {
            Collection::Matches => "matches",
            Collection::Transactions => "transactions",
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_user_claims_from_text_column() {
        let user: User = serde_json::from_value(serde_json::json!({
            "uid": "abc",
            "email": "a@example.com",
            "custom_claims": "{\"role\":\"match_admin\"}",
        }))
        .unwrap();
        assert_eq!(Some("match_admin"), user.custom_claims["role"].as_str());

        let user: User = serde_json::from_value(serde_json::json!({
            "uid": "abc",
            "email": null,
            "custom_claims": null,
        }))
        .unwrap();
        assert!(user.custom_claims.is_empty());
    }

    #[test]
    fn test_transaction_row() {
        let txn: Transaction = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "uid": "abc",
            "kind": "add_money",
            "amount": 250,
            "status": "completed",
            "created_at": 1_700_000_000_000_i64,
        }))
        .unwrap();
        assert_eq!(TransactionKind::AddMoney, txn.kind);
        assert_eq!(
            SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_000),
            txn.created_at
        );
    }
}
