//! Mod to channel routing.

use tracing::{error, warn};

use crate::catalog::ModId;

/// Picks the channel a mod's releases are announced in.
///
/// Channels pair with mods by position in the configuration. Mods without a
/// channel of their own fall back to the first one. In debug mode every
/// release goes to the debug channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelRouter {
    mod_ids: Vec<ModId>,
    channel_ids: Vec<u64>,
    debug_channel_id: Option<u64>,
}

impl ChannelRouter {
    pub fn new(mod_ids: Vec<ModId>, channel_ids: Vec<u64>, debug_channel_id: Option<u64>) -> Self {
        Self {
            mod_ids,
            channel_ids,
            debug_channel_id,
        }
    }

    pub fn resolve(&self, mod_id: ModId) -> Option<u64> {
        if let Some(debug_channel) = self.debug_channel_id {
            return Some(debug_channel);
        }

        let Some(index) = self.mod_ids.iter().position(|id| *id == mod_id) else {
            error!(mod_id, "Mod is not configured, no channel to route to");
            return None;
        };

        if let Some(channel) = self.channel_ids.get(index) {
            return Some(*channel);
        }

        let fallback = self.channel_ids.first().copied();
        match fallback {
            Some(channel_id) => warn!(
                mod_id,
                index, channel_id, "No dedicated channel for mod, using fallback channel"
            ),
            None => error!(mod_id, "No release channels configured"),
        }
        fallback
    }
}
