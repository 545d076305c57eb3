//! Request pacing for the catalog API.
//!
//! All catalog calls share one remote quota, so a single pacer per client
//! enforces a minimum gap between the *completion* of one call and the start
//! of the next.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum interval between consecutive requests.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    /// Completion time of the previous request.
    last_completed: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_completed: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next request slot.
    ///
    /// The returned permit serializes requests: nobody else can start until
    /// it is dropped, and dropping it records the completion time.
    ///
    /// # Cancel Safety
    ///
    /// Dropping the future while it sleeps releases the lock without touching
    /// the recorded completion time.
    pub async fn acquire(&self) -> PacerPermit<'_> {
        let guard = self.last_completed.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                trace!(wait = ?waited, "pacing catalog request");
                tokio::time::sleep(waited).await;
            }
        }

        PacerPermit { guard, waited }
    }
}

/// Exclusive right to issue one request. Records completion on drop.
pub struct PacerPermit<'a> {
    guard: MutexGuard<'a, Option<Instant>>,
    waited: Duration,
}

impl PacerPermit<'_> {
    /// How long `acquire` slept before granting this permit.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for PacerPermit<'_> {
    fn drop(&mut self) {
        *self.guard = Some(Instant::now());
    }
}
