//! Release notification module.
//!
//! Turns a newly detected release into a rendered announcement and delivers it
//! to the chat channel the release is routed to.
//!
//! # Example
//!
//! ```ignore
//! use modwatch::notification::{DiscordConfig, DiscordDispatcher, NotificationDispatcher};
//!
//! let dispatcher = DiscordDispatcher::new(DiscordConfig {
//!     bot_token: "...".to_string(),
//!     ..Default::default()
//! })?;
//! dispatcher.deliver(&notification).await?;
//! ```

pub mod channels;
pub mod events;
pub mod routing;

pub use channels::{DiscordConfig, DiscordDispatcher, NotificationDispatcher};
pub use events::{MessageTemplates, ReleaseNotification, truncate_changelog};
pub use routing::ChannelRouter;
