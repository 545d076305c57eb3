//! Release scan scheduling.
//!
//! The [`UpdateScanner`] runs one scan cycle per interval: for each
//! configured mod it compares the newest remote file with the release ledger
//! and announces versions that have not been announced yet.

pub mod report;
pub mod service;

pub use report::{AnnouncedRelease, CycleReport, CycleTrigger, ModFailure, ModOutcome};
pub use service::{ScannerConfig, UpdateScanner};
