//! `scrib-modules` — the guild-facing feature modules.
//!
//! Each module wraps the guild store and the job scheduler behind the
//! commands a member actually sees, converting storage and validation
//! failures into user-facing messages at this boundary. Timer-driven
//! modules expose a `rebuild` that converges the scheduler to the guild's
//! persisted options; [`Modules::rebuild_all_guilds`] runs that pass over
//! every known guild at startup.

pub mod currency;
pub mod error;
pub mod notify;
pub mod progress;
pub mod quotes;
pub mod tracker;

use std::sync::Arc;

use scrib_core::GuildId;
use scrib_scheduler::Scheduler;
use scrib_store::StoreManager;
use tracing::{info, warn};

pub use error::{ModuleError, Result};
pub use notify::{LogNotifier, Notifier};

/// All feature modules, wired to one store manager and one scheduler.
pub struct Modules {
    pub progress: Arc<progress::ProgressModule>,
    pub tracker: Arc<tracker::TrackerModule>,
    pub quotes: Arc<quotes::QuoteModule>,
    pub currency: Arc<currency::CurrencyModule>,
    stores: Arc<StoreManager>,
}

impl Modules {
    pub fn new(
        stores: Arc<StoreManager>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            progress: progress::ProgressModule::new(
                Arc::clone(&stores),
                Arc::clone(&scheduler),
                Arc::clone(&notifier),
            ),
            tracker: tracker::TrackerModule::new(
                Arc::clone(&stores),
                Arc::clone(&scheduler),
                notifier,
            ),
            quotes: quotes::QuoteModule::new(Arc::clone(&stores)),
            currency: currency::CurrencyModule::new(Arc::clone(&stores)),
            stores,
        }
    }

    /// Re-arm every guild's jobs from its persisted options. A failure in
    /// one guild is logged and does not stop the pass for the others.
    pub fn rebuild_all_guilds(&self) -> scrib_store::Result<()> {
        let guilds = self.stores.known_guilds()?;
        info!(count = guilds.len(), "rebuilding jobs for known guilds");
        for guild in guilds {
            self.rebuild_guild(guild);
        }
        Ok(())
    }

    pub fn rebuild_guild(&self, guild: GuildId) {
        if let Err(e) = self.progress.rebuild(guild) {
            warn!(%guild, "progress report job rebuild failed: {e}");
        }
        if let Err(e) = self.tracker.rebuild(guild) {
            warn!(%guild, "word tracker job rebuild failed: {e}");
        }
    }
}
