//! [`Store`] over Cloudflare D1. Row structs must be kept in sync with `migrations/`.

use std::time::SystemTime;

use ludo_league::db::{Collection, CustomClaims, Transaction, User};
use ludo_league::store::{Store, StoreError};
use serde_json::Value;
use serde_with::serde_as;
use worker::{query, D1Database};

/// Row of the `documents` table.
#[serde_as]
#[derive(Debug, serde::Deserialize)]
struct DocumentRow {
    /// TEXT field containing the JSON document.
    #[serde_as(as = "serde_with::json::JsonString")]
    body: Value,
}

/// Single `id`/`uid` column.
#[derive(Debug, serde::Deserialize)]
struct IdRow {
    id: String,
}

fn db_err(context: &str) -> impl FnOnce(worker::Error) -> StoreError + '_ {
    move |e| StoreError(format!("{}: {}", context, e))
}

fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

/// D1-backed store.
pub struct D1Store(pub D1Database);

impl Store for D1Store {
    async fn document(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let query = query!(&self.0, "SELECT body FROM documents WHERE path = ?1", path)
            .map_err(db_err("Failed to bind document query"))?;
        let row: Option<DocumentRow> = query
            .first(None)
            .await
            .map_err(db_err("Failed to read document"))?;
        Ok(row.map(|row| row.body))
    }

    async fn put_document(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let query = query!(
            &self.0,
            "INSERT INTO documents(path, body) VALUES (?1, ?2)
            ON CONFLICT(path) DO UPDATE SET body = excluded.body",
            path,
            value.to_string()
        )
        .map_err(db_err("Failed to bind document write"))?;
        query.run().await.map_err(db_err("Failed to write document"))?;
        log::info!("Wrote document `{}`.", path);
        Ok(())
    }

    async fn user(&self, uid: &str) -> Result<Option<User>, StoreError> {
        let query = query!(
            &self.0,
            "SELECT uid, email, custom_claims FROM users WHERE uid = ?1",
            uid
        )
        .map_err(db_err("Failed to bind user query"))?;
        query.first(None).await.map_err(db_err("Failed to read user"))
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> Result<bool, StoreError> {
        let claims = serde_json::to_string(claims)
            .map_err(|e| StoreError(format!("Failed to serialize claims: {}", e)))?;
        let query = query!(
            &self.0,
            "UPDATE users SET custom_claims = ?2 WHERE uid = ?1 RETURNING uid AS id",
            uid,
            claims
        )
        .map_err(db_err("Failed to bind claims update"))?;
        let updated: Option<IdRow> = query
            .first(None)
            .await
            .map_err(db_err("Failed to update claims"))?;
        Ok(updated.is_some())
    }

    async fn transactions_for_user(&self, uid: &str) -> Result<Vec<Transaction>, StoreError> {
        let query = query!(
            &self.0,
            "SELECT id, uid, kind, amount, status, created_at FROM transactions WHERE uid = ?1",
            uid
        )
        .map_err(db_err("Failed to bind transactions query"))?;
        query
            .all()
            .await
            .and_then(|result| result.results())
            .map_err(db_err("Failed to read transactions"))
    }

    async fn completed_matches_before(
        &self,
        cutoff: SystemTime,
    ) -> Result<Vec<String>, StoreError> {
        let query = query!(
            &self.0,
            "SELECT id FROM matches WHERE status = 'completed' AND created_at < ?1",
            unix_millis(cutoff)
        )
        .map_err(db_err("Failed to bind matches query"))?;
        let rows: Vec<IdRow> = query
            .all()
            .await
            .and_then(|result| result.results())
            .map_err(db_err("Failed to query old matches"))?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn transactions_before(&self, cutoff: SystemTime) -> Result<Vec<String>, StoreError> {
        let query = query!(
            &self.0,
            "SELECT id FROM transactions WHERE created_at < ?1",
            unix_millis(cutoff)
        )
        .map_err(db_err("Failed to bind transactions query"))?;
        let rows: Vec<IdRow> = query
            .all()
            .await
            .and_then(|result| result.results())
            .map_err(db_err("Failed to query old transactions"))?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn commit_delete_batch(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
        let statements = ids
            .iter()
            .map(|id| query!(&self.0, &sql, id))
            .collect::<worker::Result<Vec<_>>>()
            .map_err(db_err("Failed to bind delete batch"))?;
        self.0
            .batch(statements)
            .await
            .map_err(db_err("Failed to commit delete batch"))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_unix_millis() {
        assert_eq!(0, unix_millis(SystemTime::UNIX_EPOCH));
        assert_eq!(
            1_700_000_000_123,
            unix_millis(SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_123))
        );
    }

    #[test]
    fn test_document_row() {
        let row: DocumentRow = serde_json::from_value(serde_json::json!({
            "body": "{\"activeUpiId\":\"ludo@upi\"}",
        }))
        .unwrap();
        assert_eq!(serde_json::json!({ "activeUpiId": "ludo@upi" }), row.body);
    }
}
