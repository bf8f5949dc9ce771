//! Retention cleanup: delete old completed matches and old transactions.

use std::time::SystemTime;

use chrono::{DateTime, Months, Utc};

use crate::db::Collection;
use crate::store::{Store, StoreError};

/// Maximum number of deletes committed together.
pub const BATCH_SIZE: usize = 500;

/// Counts of deleted records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Completed matches deleted.
    pub deleted_matches: usize,
    /// Transactions deleted.
    pub deleted_transactions: usize,
}

/// Retention failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RetentionError {
    /// Zero months, or so many the cutoff is out of range.
    #[error("`months` must be a positive number of months, got {0}.")]
    InvalidMonths(u32),
    /// Store failure. Batches committed before it stay deleted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `now` minus `months` calendar months, clamping the day to the end of the target month.
pub fn cutoff(now: SystemTime, months: u32) -> Result<SystemTime, RetentionError> {
    if months == 0 {
        return Err(RetentionError::InvalidMonths(months));
    }
    DateTime::<Utc>::from(now)
        .checked_sub_months(Months::new(months))
        .map(SystemTime::from)
        .ok_or(RetentionError::InvalidMonths(months))
}

/// Delete completed matches, then transactions, created before `months` ago.
///
/// Matches and transactions are not deleted together: if deleting transactions fails, the
/// matches already deleted stay deleted.
pub async fn run<S: Store>(
    store: &S,
    now: SystemTime,
    months: u32,
) -> Result<CleanupReport, RetentionError> {
    let cutoff = cutoff(now, months)?;
    log::info!(
        "Retention cleanup: deleting records older than {} months ({}).",
        months,
        DateTime::<Utc>::from(cutoff).to_rfc3339()
    );

    let matches = store.completed_matches_before(cutoff).await?;
    let deleted_matches = delete_in_batches(store, Collection::Matches, &matches).await?;

    let transactions = store.transactions_before(cutoff).await?;
    let deleted_transactions =
        delete_in_batches(store, Collection::Transactions, &transactions).await?;

    let report = CleanupReport {
        deleted_matches,
        deleted_transactions,
    };
    log::info!("Retention cleanup complete: {:?}", report);
    Ok(report)
}

async fn delete_in_batches<S: Store>(
    store: &S,
    collection: Collection,
    ids: &[String],
) -> Result<usize, StoreError> {
    let mut deleted = 0;
    for batch in ids.chunks(BATCH_SIZE) {
        store.commit_delete_batch(collection, batch).await?;
        deleted += batch.len();
        log::debug!(
            "Deleted {}/{} from `{}`.",
            deleted,
            ids.len(),
            collection.table()
        );
    }
    Ok(deleted)
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use futures::executor::block_on;

    use super::*;
    use crate::db::{Match, MatchStatus, Transaction, TransactionKind, TransactionStatus};
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> SystemTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .into()
    }

    fn now() -> SystemTime {
        date(2026, 10, 19)
    }

    fn game(id: &str, status: MatchStatus, created_at: SystemTime) -> Match {
        Match {
            id: id.into(),
            creator_uid: "a".into(),
            opponent_uid: Some("b".into()),
            entry_fee: 50,
            status,
            created_at,
        }
    }

    fn txn(id: &str, created_at: SystemTime) -> Transaction {
        Transaction {
            id: id.into(),
            uid: "a".into(),
            kind: TransactionKind::EntryFee,
            amount: 50,
            status: TransactionStatus::Completed,
            created_at,
        }
    }

    #[test]
    fn test_cutoff() {
        assert_eq!(Ok(date(2024, 10, 19)), cutoff(now(), 24));
        // Clamped to the end of February.
        assert_eq!(Ok(date(2026, 2, 28)), cutoff(date(2026, 3, 31), 1));
        assert_eq!(Err(RetentionError::InvalidMonths(0)), cutoff(now(), 0));
    }

    #[test]
    fn test_deletes_only_before_cutoff() {
        let store = MemoryStore::new();
        store.insert_match(game("old-done", MatchStatus::Completed, date(2023, 5, 1)));
        store.insert_match(game("old-done-2", MatchStatus::Completed, date(2024, 10, 18)));
        store.insert_match(game("old-cancelled", MatchStatus::Cancelled, date(2023, 5, 1)));
        store.insert_match(game("new-done", MatchStatus::Completed, date(2025, 1, 1)));
        store.insert_transaction(txn("old", date(2022, 1, 1)));
        store.insert_transaction(txn("new", date(2026, 1, 1)));

        let report = block_on(run(&store, now(), 24)).unwrap();
        assert_eq!(
            CleanupReport {
                deleted_matches: 2,
                deleted_transactions: 1,
            },
            report
        );
        assert_eq!(
            vec!["new-done".to_owned(), "old-cancelled".to_owned()],
            store.ids(Collection::Matches)
        );
        assert_eq!(vec!["new".to_owned()], store.ids(Collection::Transactions));
    }

    #[test]
    fn test_batches_of_500() {
        let store = MemoryStore::new();
        for i in 0..1201 {
            store.insert_transaction(txn(&format!("t{:04}", i), date(2020, 1, 1)));
        }
        let report = block_on(run(&store, now(), 12)).unwrap();
        assert_eq!(1201, report.deleted_transactions);
        assert_eq!(
            vec![
                (Collection::Transactions, 500),
                (Collection::Transactions, 500),
                (Collection::Transactions, 201),
            ],
            store.committed_batches()
        );
        assert!(store.ids(Collection::Transactions).is_empty());
    }

    #[test]
    fn test_failed_batch_aborts() {
        let store = MemoryStore::new();
        for i in 0..600 {
            store.insert_match(game(&format!("m{:04}", i), MatchStatus::Completed, date(2020, 1, 1)));
        }
        store.insert_transaction(txn("orphan", date(2020, 1, 1)));
        store.fail_on_batch(1, "batch commit failed");

        let err = block_on(run(&store, now(), 6)).unwrap_err();
        assert_eq!("batch commit failed", err.to_string());
        // First batch stays deleted, transactions are never reached.
        assert_eq!(100, store.ids(Collection::Matches).len());
        assert_eq!(vec!["orphan".to_owned()], store.ids(Collection::Transactions));
    }

    #[test]
    fn test_zero_months() {
        let store = MemoryStore::new();
        store.insert_transaction(txn("t", date(2020, 1, 1)));
        assert_eq!(
            Err(RetentionError::InvalidMonths(0)),
            block_on(run(&store, now(), 0))
        );
        assert!(store.committed_batches().is_empty());
    }
}
