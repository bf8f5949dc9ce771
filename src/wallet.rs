//! Wallet balance, derived from transactions.

use crate::db::{Transaction, TransactionKind, TransactionStatus};

impl TransactionKind {
    /// `1` if this kind credits the wallet, `-1` if it debits it.
    pub fn sign(self) -> i64 {
        match self {
            TransactionKind::Deposit
            | TransactionKind::AddMoney
            | TransactionKind::Win
            | TransactionKind::Prize
            | TransactionKind::ReferralCommission
            | TransactionKind::Refund => 1,
            TransactionKind::Withdrawal | TransactionKind::EntryFee => -1,
        }
    }
}

/// Balance from a user's transactions. Only completed transactions count. Saturates at the `i64`
/// bounds rather than overflowing on corrupt amounts.
pub fn derive_balance<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> i64 {
    transactions
        .into_iter()
        .filter(|txn| txn.status == TransactionStatus::Completed)
        .map(|txn| {
            let amount = i64::try_from(txn.amount.unsigned_abs()).unwrap_or(i64::MAX);
            txn.kind.sign() * amount
        })
        .fold(0, i64::saturating_add)
}

/// Referrer's commission on `amount`, rounded down to whole rupees.
pub fn referral_commission(amount: i64, percentage: f64) -> i64 {
    if !percentage.is_finite() || percentage <= 0.0 {
        return 0;
    }
    (amount as f64 * percentage / 100.0).floor() as i64
}
