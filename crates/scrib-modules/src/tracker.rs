//! Word tracker module.
//!
//! Members subscribe with a daily word goal and log progress against it.
//! A refresh job fires at midnight UTC, posts the day's results, and zeroes
//! every subscriber's progress. The refresh schedule is fixed and rebuilt
//! from scratch on every startup rather than persisted.

use std::sync::Arc;

use scrib_core::{ChannelId, GuildId, UserId};
use scrib_scheduler::{Job, JobKey, RunCallback, Scheduler};
use scrib_store::{options, tracker, StoreManager};
use tracing::error;

use crate::error::{ModuleError, Result};
use crate::notify::Notifier;

pub const OPT_ENABLED: &str = "word_tracker_module_enabled";
pub const OPT_ANNOUNCE_CHANNEL: &str = "word_tracker_announce_channel";
pub const OPT_REPORT_CHANNEL: &str = "word_tracker_report_channel";

pub const JOB_REFRESH: &str = "word_tracker_refresh";

/// Daily at midnight UTC. Not configurable and not persisted; the rebuild
/// pass re-creates the job with this expression every time.
const REFRESH_CRON: &str = "0 0 * * *";

pub struct TrackerModule {
    stores: Arc<StoreManager>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
}

impl TrackerModule {
    pub fn new(
        stores: Arc<StoreManager>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            stores,
            scheduler,
            notifier,
        })
    }

    pub fn enable(self: &Arc<Self>, guild: GuildId) -> Result<String> {
        self.stores
            .with_guild(guild, |conn| options::set(conn, OPT_ENABLED, "true"))?;
        self.rebuild(guild)?;
        Ok("Word tracker module enabled".to_string())
    }

    pub fn disable(self: &Arc<Self>, guild: GuildId) -> Result<String> {
        self.stores
            .with_guild(guild, |conn| options::set(conn, OPT_ENABLED, "false"))?;
        self.rebuild(guild)?;
        Ok("Word tracker module disabled".to_string())
    }

    pub fn set_announce_channel(
        self: &Arc<Self>,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<String> {
        self.stores.with_guild(guild, |conn| {
            options::set(conn, OPT_ANNOUNCE_CHANNEL, &channel.to_string())
        })?;
        Ok(format!("Word tracker announcements will go to channel {channel}"))
    }

    /// Converge the scheduler to the guild's current options: an armed
    /// refresh job when enabled, none otherwise.
    pub fn rebuild(self: &Arc<Self>, guild: GuildId) -> Result<()> {
        let enabled = self
            .stores
            .with_guild(guild, |conn| options::get_flag(conn, OPT_ENABLED))?;

        if !enabled {
            self.scheduler.remove_job(&JobKey::new(guild, JOB_REFRESH));
            return Ok(());
        }

        let module = Arc::clone(self);
        let refresh_cb: RunCallback = Arc::new(move || {
            if let Err(e) = module.refresh(guild) {
                error!(%guild, "word tracker refresh failed: {e}");
            }
        });
        // The refresh schedule is a constant, so the job is rebuilt from the
        // enabled flag alone instead of being persisted in the jobs table.
        let job = Job::recurring(guild, JOB_REFRESH, REFRESH_CRON, refresh_cb)?;
        self.scheduler.add_job(job, true)?;
        Ok(())
    }

    pub fn subscribe(self: &Arc<Self>, guild: GuildId, user: UserId, goal: i64) -> Result<String> {
        if goal <= 0 {
            return Err(ModuleError::Rejected(format!(
                "Daily goal must be a positive word count (got {goal})"
            )));
        }
        let sub = self
            .stores
            .with_guild(guild, |conn| tracker::subscribe(conn, user, goal))?;
        Ok(format!("Subscribed with a daily goal of {} words", sub.goal))
    }

    pub fn unsubscribe(self: &Arc<Self>, guild: GuildId, user: UserId) -> Result<String> {
        let removed = self
            .stores
            .with_guild(guild, |conn| tracker::unsubscribe(conn, user))?;
        if removed {
            Ok("Unsubscribed from the word tracker".to_string())
        } else {
            Ok("You were not subscribed to the word tracker".to_string())
        }
    }

    pub fn add_progress(
        self: &Arc<Self>,
        guild: GuildId,
        user: UserId,
        words: i64,
    ) -> Result<String> {
        let sub = self
            .stores
            .with_guild(guild, |conn| tracker::add_progress(conn, user, words))?;
        Ok(progress_line(sub))
    }

    /// Overwrite today's count outright (the "edit" command).
    pub fn set_progress(
        self: &Arc<Self>,
        guild: GuildId,
        user: UserId,
        words: i64,
    ) -> Result<String> {
        let sub = self
            .stores
            .with_guild(guild, |conn| tracker::set_progress(conn, user, words))?;
        Ok(progress_line(sub))
    }

    pub fn list(self: &Arc<Self>, guild: GuildId) -> Result<Vec<tracker::Subscriber>> {
        Ok(self.stores.with_guild(guild, tracker::list)?)
    }

    /// Post the day's results and zero every subscriber's progress.
    pub fn refresh(self: &Arc<Self>, guild: GuildId) -> Result<()> {
        let subscribers = self.stores.with_guild(guild, tracker::list)?;
        if subscribers.is_empty() {
            return Ok(());
        }
        let met = subscribers
            .iter()
            .filter(|s| s.progress >= s.goal)
            .count();
        let channel = self
            .stores
            .with_guild(guild, |conn| options::get(conn, OPT_ANNOUNCE_CHANNEL))?
            .and_then(|v| v.parse().ok());
        self.notifier.notify(
            guild,
            channel,
            &format!(
                "A new day begins! {met} of {} subscribers met their word goal yesterday. Counts are reset.",
                subscribers.len()
            ),
        );
        self.stores.with_guild(guild, tracker::reset_all)?;
        Ok(())
    }
}

fn progress_line(sub: tracker::Subscriber) -> String {
    if sub.progress >= sub.goal {
        format!(
            "{} / {} words today. Goal met!",
            sub.progress, sub.goal
        )
    } else {
        format!("{} / {} words today", sub.progress, sub.goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;

    fn setup() -> (
        tempfile::TempDir,
        Arc<TrackerModule>,
        Arc<Scheduler>,
        Arc<RecordingNotifier>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let stores = Arc::new(StoreManager::new(dir.path()).unwrap());
        let scheduler = Arc::new(Scheduler::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let module = TrackerModule::new(
            stores,
            Arc::clone(&scheduler),
            notifier.clone() as Arc<dyn Notifier>,
        );
        (dir, module, scheduler, notifier)
    }

    const GUILD: GuildId = GuildId(200);

    #[tokio::test(start_paused = true)]
    async fn enable_arms_the_daily_refresh() {
        let (_dir, module, scheduler, _notifier) = setup();
        module.enable(GUILD).unwrap();

        let job = scheduler.get_job(&JobKey::new(GUILD, JOB_REFRESH)).unwrap();
        assert!(job.is_armed());
        assert_eq!(job.cron_expr(), Some(REFRESH_CRON));

        module.disable(GUILD).unwrap();
        assert!(scheduler.get_job(&JobKey::new(GUILD, JOB_REFRESH)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rebuild_is_idempotent() {
        let (_dir, module, scheduler, _notifier) = setup();
        module.enable(GUILD).unwrap();
        module.rebuild(GUILD).unwrap();
        module.rebuild(GUILD).unwrap();
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_reports_against_goal() {
        let (_dir, module, _scheduler, _notifier) = setup();
        module.subscribe(GUILD, UserId(1), 500).unwrap();

        let partial = module.add_progress(GUILD, UserId(1), 300).unwrap();
        assert_eq!(partial, "300 / 500 words today");

        let done = module.add_progress(GUILD, UserId(1), 250).unwrap();
        assert!(done.contains("Goal met"));

        let edited = module.set_progress(GUILD, UserId(1), 100).unwrap();
        assert_eq!(edited, "100 / 500 words today");
    }

    #[tokio::test(start_paused = true)]
    async fn progress_without_subscription_is_an_error() {
        let (_dir, module, _scheduler, _notifier) = setup();
        let err = module.add_progress(GUILD, UserId(5), 100).unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Store(scrib_store::StoreError::NotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_announces_and_resets() {
        let (_dir, module, _scheduler, notifier) = setup();
        module.subscribe(GUILD, UserId(1), 500).unwrap();
        module.subscribe(GUILD, UserId(2), 500).unwrap();
        module.add_progress(GUILD, UserId(1), 600).unwrap();
        module.add_progress(GUILD, UserId(2), 100).unwrap();

        module.refresh(GUILD).unwrap();
        assert!(notifier.contains("1 of 2 subscribers met their word goal"));

        let after = module.add_progress(GUILD, UserId(1), 50).unwrap();
        assert_eq!(after, "50 / 500 words today", "progress was reset");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_with_no_subscribers_stays_quiet() {
        let (_dir, module, _scheduler, notifier) = setup();
        module.refresh(GUILD).unwrap();
        assert!(notifier.messages().is_empty());
    }
}
