//! Release ledger database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::ms_to_datetime;

/// A (mod, version) pair that has been announced.
///
/// Rows are append-only: inserted after the first successful delivery and
/// never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReleaseDbModel {
    pub mod_id: String,
    pub version: String,
    /// Unix epoch milliseconds (UTC).
    pub released_at: i64,
}

impl ReleaseDbModel {
    pub fn released_at_datetime(&self) -> DateTime<Utc> {
        ms_to_datetime(self.released_at)
    }
}
