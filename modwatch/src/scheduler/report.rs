//! Scan cycle outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::ModId;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    /// The periodic interval.
    Scheduled,
    /// An operator forcing a check.
    Manual,
}

/// Result of processing one mod within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModOutcome {
    /// A new version was delivered and recorded.
    Announced { version: String },
    /// The newest version is already in the ledger.
    AlreadyReleased,
    /// The mod has no published files.
    NoFiles,
    /// Delivery failed; the version stays unrecorded and is retried next cycle.
    DispatchFailed { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncedRelease {
    pub mod_id: ModId,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModFailure {
    pub mod_id: ModId,
    pub error: String,
}

/// Summary of one scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub trigger: CycleTrigger,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Mods processed (attempted) in this cycle.
    pub checked: usize,
    pub announced: Vec<AnnouncedRelease>,
    pub already_released: usize,
    pub no_files: usize,
    pub dispatch_failed: Vec<AnnouncedRelease>,
    pub failed: Vec<ModFailure>,
    /// Shutdown was requested before every mod was processed.
    pub interrupted: bool,
    /// Another cycle was running, so this one did nothing.
    pub skipped: bool,
}

impl CycleReport {
    pub fn new(trigger: CycleTrigger) -> Self {
        Self {
            trigger,
            started_at: Utc::now(),
            duration_ms: 0,
            checked: 0,
            announced: Vec::new(),
            already_released: 0,
            no_files: 0,
            dispatch_failed: Vec::new(),
            failed: Vec::new(),
            interrupted: false,
            skipped: false,
        }
    }

    pub fn skipped(trigger: CycleTrigger) -> Self {
        Self {
            skipped: true,
            ..Self::new(trigger)
        }
    }

    pub fn record(&mut self, mod_id: ModId, outcome: ModOutcome) {
        match outcome {
            ModOutcome::Announced { version } => {
                self.announced.push(AnnouncedRelease { mod_id, version })
            }
            ModOutcome::AlreadyReleased => self.already_released += 1,
            ModOutcome::NoFiles => self.no_files += 1,
            ModOutcome::DispatchFailed { version } => {
                self.dispatch_failed.push(AnnouncedRelease { mod_id, version })
            }
        }
    }

    pub fn record_failure(&mut self, mod_id: ModId, error: impl ToString) {
        self.failed.push(ModFailure {
            mod_id,
            error: error.to_string(),
        });
    }

    /// Whether any mod failed to be checked or announced.
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty() || !self.dispatch_failed.is_empty()
    }
}
