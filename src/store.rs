//! Storage seam over the managed database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::availability::MaintenanceSettings;
use crate::db::{
    Collection, CustomClaims, Match, MatchStatus, ReferralConfiguration, Transaction,
    UpiConfiguration, User, MAINTENANCE_SETTINGS_PATH, REFERRAL_CONFIGURATION_PATH,
    UPI_CONFIGURATION_PATH,
};
use crate::subscription::Subscriptions;

/// Failure reported by the backing store.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);
impl From<String> for StoreError {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl From<&str> for StoreError {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Everything the backend reads and writes.
///
/// Futures need not be [`Send`]; the worker's database client is single-threaded.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Read the JSON document at `path`.
    async fn document(&self, path: &str) -> Result<Option<Value>, StoreError>;
    /// Overwrite the JSON document at `path`.
    async fn put_document(&self, path: &str, value: &Value) -> Result<(), StoreError>;

    /// Look up a user.
    async fn user(&self, uid: &str) -> Result<Option<User>, StoreError>;
    /// Replace the user's custom claims. Returns `false` if there is no such user.
    async fn set_custom_claims(&self, uid: &str, claims: &CustomClaims)
        -> Result<bool, StoreError>;

    /// All of a user's transactions.
    async fn transactions_for_user(&self, uid: &str) -> Result<Vec<Transaction>, StoreError>;
    /// IDs of [`MatchStatus::Completed`] matches created strictly before `cutoff`.
    async fn completed_matches_before(&self, cutoff: SystemTime)
        -> Result<Vec<String>, StoreError>;
    /// IDs of transactions created strictly before `cutoff`.
    async fn transactions_before(&self, cutoff: SystemTime) -> Result<Vec<String>, StoreError>;
    /// Atomically delete `ids` from `collection`. At most [`crate::retention::BATCH_SIZE`] IDs.
    async fn commit_delete_batch(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<(), StoreError>;

    /// The `settings/maintenance` document, defaulting to everything open.
    async fn maintenance_settings(&self) -> Result<MaintenanceSettings, StoreError> {
        Ok(typed_document(self, MAINTENANCE_SETTINGS_PATH)
            .await?
            .unwrap_or_default())
    }
    /// Overwrite the `settings/maintenance` document.
    async fn put_maintenance_settings(
        &self,
        settings: &MaintenanceSettings,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(settings)
            .map_err(|e| format!("Failed to serialize maintenance settings: {}", e))?;
        self.put_document(MAINTENANCE_SETTINGS_PATH, &value).await
    }
    /// The `upiConfiguration/active` document.
    async fn upi_configuration(&self) -> Result<Option<UpiConfiguration>, StoreError> {
        typed_document(self, UPI_CONFIGURATION_PATH).await
    }
    /// The `referralConfiguration/settings` document.
    async fn referral_configuration(&self) -> Result<Option<ReferralConfiguration>, StoreError> {
        typed_document(self, REFERRAL_CONFIGURATION_PATH).await
    }
}

async fn typed_document<S, T>(store: &S, path: &str) -> Result<Option<T>, StoreError>
where
    S: Store + ?Sized,
    T: DeserializeOwned,
{
    let Some(value) = store.document(path).await? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| StoreError(format!("Malformed document `{}`: {}", path, e)))
}

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<String, Value>,
    users: BTreeMap<String, User>,
    matches: BTreeMap<String, Match>,
    transactions: BTreeMap<String, Transaction>,
    batches: Vec<(Collection, usize)>,
    fail_on_batch: Option<(usize, String)>,
}

/// In-memory [`Store`], for tests and local runs. Publishes document and claim writes to its
/// [`Subscriptions`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    subscriptions: Subscriptions,
}
impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscriptions hub notified on writes. Users are published at `users/{uid}`.
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Insert or replace a user.
    pub fn insert_user(&self, user: User) {
        self.state().users.insert(user.uid.clone(), user);
    }
    /// Insert or replace a match.
    pub fn insert_match(&self, m: Match) {
        self.state().matches.insert(m.id.clone(), m);
    }
    /// Insert or replace a transaction.
    pub fn insert_transaction(&self, txn: Transaction) {
        self.state().transactions.insert(txn.id.clone(), txn);
    }

    /// Current IDs in `collection`.
    pub fn ids(&self, collection: Collection) -> Vec<String> {
        let state = self.state();
        match collection {
            Collection::Matches => state.matches.keys().cloned().collect(),
            Collection::Transactions => state.transactions.keys().cloned().collect(),
        }
    }

    /// Sizes of every committed delete batch, in commit order.
    pub fn committed_batches(&self) -> Vec<(Collection, usize)> {
        self.state().batches.clone()
    }

    /// Make the `n`th (zero-based) delete batch from now on fail with `message`.
    pub fn fail_on_batch(&self, n: usize, message: &str) {
        let mut state = self.state();
        let n = state.batches.len() + n;
        state.fail_on_batch = Some((n, message.to_owned()));
    }
}

impl Store for MemoryStore {
    async fn document(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.state().documents.get(path).cloned())
    }

    async fn put_document(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.state()
            .documents
            .insert(path.to_owned(), value.clone());
        self.subscriptions.publish(path, value);
        Ok(())
    }

    async fn user(&self, uid: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state().users.get(uid).cloned())
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> Result<bool, StoreError> {
        let snapshot = {
            let mut state = self.state();
            let Some(user) = state.users.get_mut(uid) else {
                return Ok(false);
            };
            user.custom_claims = claims.clone();
            serde_json::to_value(&*user).map_err(|e| e.to_string())?
        };
        self.subscriptions
            .publish(&format!("users/{}", uid), &snapshot);
        Ok(true)
    }

    async fn transactions_for_user(&self, uid: &str) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .state()
            .transactions
            .values()
            .filter(|txn| txn.uid == uid)
            .cloned()
            .collect())
    }

    async fn completed_matches_before(
        &self,
        cutoff: SystemTime,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state()
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Completed && m.created_at < cutoff)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn transactions_before(&self, cutoff: SystemTime) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state()
            .transactions
            .values()
            .filter(|txn| txn.created_at < cutoff)
            .map(|txn| txn.id.clone())
            .collect())
    }

    async fn commit_delete_batch(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some((n, message)) = &state.fail_on_batch {
            if *n == state.batches.len() {
                return Err(StoreError(message.clone()));
            }
        }
        for id in ids {
            match collection {
                Collection::Matches => {
                    state.matches.remove(id);
                }
                Collection::Transactions => {
                    state.transactions.remove(id);
                }
            }
        }
        state.batches.push((collection, ids.len()));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing_documents() {
        let store = MemoryStore::new();
        block_on(async {
            assert_eq!(
                MaintenanceSettings::default(),
                store.maintenance_settings().await.unwrap()
            );
            assert_eq!(None, store.upi_configuration().await.unwrap());
            assert_eq!(None, store.referral_configuration().await.unwrap());
        });
    }

    #[test]
    fn test_malformed_document() {
        let store = MemoryStore::new();
        block_on(async {
            store
                .put_document(UPI_CONFIGURATION_PATH, &json!({ "activeUpiId": 42 }))
                .await
                .unwrap();
            let err = store.upi_configuration().await.unwrap_err();
            assert!(err.0.contains(UPI_CONFIGURATION_PATH), "{}", err);
        });
    }

    #[test]
    fn test_settings_write_is_published() {
        let store = MemoryStore::new();
        let mut sub = store.subscriptions().subscribe(MAINTENANCE_SETTINGS_PATH);
        let settings = MaintenanceSettings {
            is_app_disabled: true,
            app_disabled_message: Some("Back at 10".into()),
            ..Default::default()
        };
        block_on(async {
            store.put_maintenance_settings(&settings).await.unwrap();
            let snapshot = sub.next().await.unwrap();
            assert_eq!(json!(true), snapshot["isAppDisabled"]);
            assert_eq!(settings, store.maintenance_settings().await.unwrap());
        });
    }

    #[test]
    fn test_set_claims_unknown_user() {
        let store = MemoryStore::new();
        let claims = CustomClaims::new();
        assert!(!block_on(store.set_custom_claims("nobody", &claims)).unwrap());
    }

    #[test]
    fn test_fail_on_batch() {
        let store = MemoryStore::new();
        store.fail_on_batch(1, "quota exceeded");
        block_on(async {
            store
                .commit_delete_batch(Collection::Matches, &[])
                .await
                .unwrap();
            let err = store
                .commit_delete_batch(Collection::Matches, &[])
                .await
                .unwrap_err();
            assert_eq!(StoreError("quota exceeded".into()), err);
        });
        assert_eq!(vec![(Collection::Matches, 0)], store.committed_batches());
    }
}
