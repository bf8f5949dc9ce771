//! Background "webjob" task handling.

use ludo_league::retention::{self, CleanupReport};
use ludo_league::store::Store;
use worker::{Error, Message, Result};

/// Enum of the possible background tasks.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Task {
    /// Delete completed matches and transactions older than the given number of months.
    RetentionCleanup {
        /// Age threshold.
        months: u32,
    },
}

/// Webjob configuration.
#[derive(Debug)]
pub struct WebjobConfig {
    /// Age threshold of the cron-triggered [`Task::RetentionCleanup`].
    pub retention_months: u32,
}

/// Handle a `Task`.
pub async fn handle<S: Store>(store: &S, msg: Message<Task>) -> Result<Message<Task>> {
    match msg.body() {
        &Task::RetentionCleanup { months } => {
            let report = retention_cleanup(store, months).await?;
            log::info!("Retention webjob complete: {:?}", report);
            Ok(msg)
        }
    }
}

/// Handle [`Task::RetentionCleanup`].
pub async fn retention_cleanup<S: Store>(store: &S, months: u32) -> Result<CleanupReport> {
    retention::run(store, crate::util::now(), months)
        .await
        .map_err(|e| Error::RustError(format!("Retention cleanup ({} months) failed: {}", months, e)))
}
