//! Update scanner service.
//!
//! One scan cycle walks the configured mods in order. For each mod the
//! newest file is compared against the release ledger; a version that is not
//! recorded yet is delivered and recorded only after delivery succeeded, so a
//! failed delivery is retried on the next cycle. A failure on one mod never
//! stops the cycle for the others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::report::{CycleReport, CycleTrigger, ModOutcome};
use crate::catalog::{ModCatalog, ModId};
use crate::database::repositories::ReleaseRepository;
use crate::notification::{ChannelRouter, NotificationDispatcher, ReleaseNotification};
use crate::{Error, Result};

/// Default time between scheduled cycles (5 minutes).
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Default pause between two mods of the same cycle.
const DEFAULT_PACING_DELAY: Duration = Duration::from_secs(2);

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Mods to watch, in routing order.
    pub mod_ids: Vec<ModId>,
    /// Time between the starts of two scheduled cycles.
    pub check_interval: Duration,
    /// Pause after each mod.
    pub pacing_delay: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mod_ids: Vec::new(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            pacing_delay: DEFAULT_PACING_DELAY,
        }
    }
}

/// Periodically checks the catalog for new releases and announces them.
pub struct UpdateScanner {
    catalog: Arc<dyn ModCatalog>,
    ledger: Arc<dyn ReleaseRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    router: ChannelRouter,
    config: ScannerConfig,
    /// Held for the duration of a cycle; at most one cycle runs at a time.
    cycle_lock: Mutex<()>,
}

impl UpdateScanner {
    pub fn new(
        catalog: Arc<dyn ModCatalog>,
        ledger: Arc<dyn ReleaseRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        router: ChannelRouter,
        config: ScannerConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            dispatcher,
            router,
            config,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn ReleaseRepository> {
        &self.ledger
    }

    /// Run scheduled cycles until `cancel` fires.
    ///
    /// Waits for the dispatcher to become ready first. The first cycle starts
    /// right after that, later ones every `check_interval`.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        info!(
            mods = self.config.mod_ids.len(),
            interval_secs = self.config.check_interval.as_secs(),
            dispatcher = self.dispatcher.channel_type(),
            "Waiting for dispatcher before starting update checks"
        );
        self.dispatcher.wait_until_ready(&cancel).await?;
        if cancel.is_cancelled() {
            info!("Update scanner cancelled before the first cycle");
            return Ok(());
        }

        // tokio panics on a zero period
        let period = self.config.check_interval.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Update scanner received cancellation signal");
                    break;
                }
                _ = interval.tick() => {
                    self.run_cycle(CycleTrigger::Scheduled, &cancel).await;
                }
            }
        }

        info!("Update scanner stopped");
        Ok(())
    }

    /// Run one cycle over all configured mods.
    ///
    /// A scheduled cycle is skipped when another cycle is in progress; a
    /// manual one waits for it to finish and then runs.
    pub async fn run_cycle(&self, trigger: CycleTrigger, cancel: &CancellationToken) -> CycleReport {
        let _guard = match trigger {
            CycleTrigger::Scheduled => match self.cycle_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    info!("Previous update check still running, skipping scheduled cycle");
                    return CycleReport::skipped(trigger);
                }
            },
            CycleTrigger::Manual => self.cycle_lock.lock().await,
        };

        let started = Instant::now();
        info!(%trigger, mods = self.config.mod_ids.len(), "Checking for mod updates");

        let mut report = CycleReport::new(trigger);
        let total = self.config.mod_ids.len();

        for (index, &mod_id) in self.config.mod_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            report.checked += 1;
            match self.check_mod(mod_id).await {
                Ok(outcome) => report.record(mod_id, outcome),
                Err(e) if e.is_transient() => {
                    warn!(mod_id, error = %e, "Catalog unavailable, will retry next cycle");
                    report.record_failure(mod_id, e);
                }
                Err(e) => {
                    error!(mod_id, error = %e, "Error checking mod");
                    report.record_failure(mod_id, e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    report.interrupted = index + 1 < total;
                    break;
                }
                _ = tokio::time::sleep(self.config.pacing_delay) => {}
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.interrupted {
            warn!(
                checked = report.checked,
                total, "Update check interrupted by shutdown"
            );
        }
        info!(
            %trigger,
            checked = report.checked,
            announced = report.announced.len(),
            already_released = report.already_released,
            no_files = report.no_files,
            dispatch_failed = report.dispatch_failed.len(),
            failed = report.failed.len(),
            duration_ms = report.duration_ms,
            "Update check complete"
        );

        report
    }

    async fn check_mod(&self, mod_id: ModId) -> Result<ModOutcome> {
        let Some(latest) = self.catalog.get_latest_file(mod_id).await? else {
            return Ok(ModOutcome::NoFiles);
        };

        let ledger_key = mod_id.to_string();
        if self.ledger.is_released(&ledger_key, &latest.version).await? {
            debug!(mod_id, version = %latest.version, "Version already announced");
            return Ok(ModOutcome::AlreadyReleased);
        }

        let info = self.catalog.get_mod_info(mod_id).await?;
        let Some(channel_id) = self.router.resolve(mod_id) else {
            return Ok(ModOutcome::DispatchFailed {
                version: latest.version,
            });
        };

        info!(
            mod_id,
            mod_name = %info.name,
            version = %latest.version,
            channel_id,
            "New release detected"
        );
        let notification = ReleaseNotification::new(&info, &latest, channel_id);

        if let Err(e) = self.dispatcher.deliver(&notification).await {
            warn!(
                mod_id,
                version = %latest.version,
                error = %e,
                "Failed to announce release, will retry next cycle"
            );
            return Ok(ModOutcome::DispatchFailed {
                version: latest.version,
            });
        }

        // A failure here means the release is announced again next cycle.
        self.ledger
            .mark_released(&ledger_key, &latest.version)
            .await
            .inspect_err(|e| {
                error!(
                    mod_id,
                    version = %latest.version,
                    error = %e,
                    "Release announced but could not be recorded"
                )
            })?;

        Ok(ModOutcome::Announced {
            version: latest.version,
        })
    }

    /// Announce the first configured mod's newest release without recording it.
    ///
    /// Goes to `channel_id` when given, otherwise to the mod's routed channel.
    pub async fn send_test_release(&self, channel_id: Option<u64>) -> Result<ReleaseNotification> {
        let mod_id = *self
            .config
            .mod_ids
            .first()
            .ok_or_else(|| Error::config("No mod IDs configured"))?;

        let latest = self
            .catalog
            .get_latest_file(mod_id)
            .await?
            .ok_or_else(|| Error::not_found("File", format!("latest file of mod {}", mod_id)))?;
        let info = self.catalog.get_mod_info(mod_id).await?;

        let channel_id = channel_id
            .or_else(|| self.router.resolve(mod_id))
            .ok_or_else(|| Error::dispatch(format!("No channel to send test release of mod {}", mod_id)))?;

        let notification = ReleaseNotification::new(&info, &latest, channel_id);
        self.dispatcher.deliver(&notification).await?;

        info!(
            mod_id,
            version = %notification.version,
            channel_id,
            "Test release sent"
        );
        Ok(notification)
    }
}
