//! Notification delivery channels.

mod discord;

pub use discord::{DiscordConfig, DiscordDispatcher};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::events::ReleaseNotification;
use crate::Result;

/// Delivers rendered release announcements.
///
/// `deliver` returning `Ok` is the only signal the scanner trusts before
/// recording a release; any error leaves the release to be retried.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Block until the underlying connection can deliver messages.
    ///
    /// Returns early without error when `cancel` fires.
    async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<()>;

    /// Render and send one notification to `notification.channel_id`.
    async fn deliver(&self, notification: &ReleaseNotification) -> Result<()>;
}
