//! Ledger write retries when SQLite reports lock contention.

use std::future::Future;
use std::time::Duration;

use rand::random;
use tracing::debug;

use crate::{Error, Result};

/// SQLITE_BUSY and SQLITE_LOCKED primary result codes.
const BUSY_CODES: [&str; 2] = ["5", "6"];

/// Backoff schedule for writes that hit a locked database.
#[derive(Debug, Clone, Copy)]
pub struct BusyRetry {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BusyRetry {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BusyRetry {
    /// Delay before retry number `retry` (zero-based), with up to 25% jitter.
    fn delay_for(&self, retry: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        let jitter_ms = random::<u64>() % (doubled.as_millis() as u64 / 4 + 1);
        (doubled + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }

    /// Run `op`, retrying while the ledger is locked by another writer.
    pub async fn run<T, F, Fut>(&self, op_name: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if retry >= self.max_retries || !is_locked(&err) {
                return Err(err);
            }

            let delay = self.delay_for(retry);
            debug!(op = op_name, ?delay, retry = retry + 1, "ledger locked, retrying");
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

/// Shorthand for [`BusyRetry::run`] with the default schedule.
pub async fn retry_on_sqlite_busy<T, F, Fut>(op_name: &'static str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    BusyRetry::default().run(op_name, op).await
}

fn is_locked(err: &Error) -> bool {
    let Error::DatabaseSqlx(sqlx_err) = err else {
        return false;
    };

    if let sqlx::Error::Database(db_err) = sqlx_err
        && db_err.code().is_some_and(|c| BUSY_CODES.contains(&c.as_ref()))
    {
        return true;
    }

    let msg = sqlx_err.to_string().to_ascii_lowercase();
    msg.contains("database is locked") || msg.contains("database is busy")
}
