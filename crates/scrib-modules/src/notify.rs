//! Outbound announcement seam.
//!
//! Feature modules announce through this trait instead of talking to a chat
//! transport directly, which keeps them testable and transport-agnostic.
//! `channel` carries the guild's configured announcement channel when one is
//! set; the transport falls back to its own default otherwise.

use scrib_core::{ChannelId, GuildId};
use tracing::info;

pub trait Notifier: Send + Sync {
    fn notify(&self, guild: GuildId, channel: Option<ChannelId>, message: &str);
}

/// Writes announcements to the log. Used when no chat transport is wired up
/// and as the fallback during development.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, guild: GuildId, channel: Option<ChannelId>, message: &str) {
        match channel {
            Some(channel) => info!(%guild, %channel, "{message}"),
            None => info!(%guild, "{message}"),
        }
    }
}
