//! Progress report module.
//!
//! A recurring cron job opens a submission window; a one-shot timer closes
//! it when its duration elapses. Members submit word counts while a window
//! is open, and accumulated totals earn rank roles at configured thresholds.
//!
//! Job lifecycle: [`ProgressModule::rebuild`] is the single authority. It
//! reads the guild's options and converges the scheduler to match — armed
//! open/close jobs when the module is enabled and scheduled, no jobs
//! otherwise. Enable, disable, and every option change funnel through it,
//! and the startup pass calls it for every known guild.

use std::sync::Arc;

use chrono::Utc;
use scrib_core::{ChannelId, GuildId, RoleId, UserId};
use scrib_scheduler::{schedule, Job, JobKey, RunCallback, Scheduler};
use scrib_store::windows::Window;
use scrib_store::{options, ranks, reports, windows, StoreManager};
use tracing::{error, warn};

use crate::error::{ModuleError, Result};
use crate::notify::Notifier;

pub const OPT_ENABLED: &str = "progress_report_module_enabled";
pub const OPT_WINDOW_OPEN: &str = "progress_report_window_open";
pub const OPT_WINDOW_DURATION: &str = "progress_report_window_duration";
pub const OPT_ANNOUNCEMENT_CHANNEL: &str = "progress_report_announcement_channel";
pub const OPT_REMINDER_ROLE: &str = "progress_report_reminder_role";

pub const JOB_WINDOW_OPEN: &str = "progress_report_announce_window_opened";
pub const JOB_WINDOW_CLOSE: &str = "progress_report_announce_window_closed";

const DEFAULT_WINDOW_HOURS: i64 = 24;

pub struct ProgressModule {
    stores: Arc<StoreManager>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
}

impl ProgressModule {
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
        Ok("Progress report module enabled".to_string())
    }

    pub fn disable(self: &Arc<Self>, guild: GuildId) -> Result<String> {
        self.stores
            .with_guild(guild, |conn| options::set(conn, OPT_ENABLED, "false"))?;
        self.rebuild(guild)?;
        Ok("Progress report module disabled".to_string())
    }

    /// Set the window-open cron and duration together. The cron expression
    /// is validated before either option is written.
    pub fn set_window(
        self: &Arc<Self>,
        guild: GuildId,
        open_cron: &str,
        duration_hours: i64,
    ) -> Result<String> {
        schedule::validate(open_cron)?;
        if duration_hours <= 0 {
            return Err(ModuleError::Rejected(format!(
                "Window duration must be a positive number of hours (got {duration_hours})"
            )));
        }
        self.stores.with_guild(guild, |conn| {
            options::set(conn, OPT_WINDOW_OPEN, open_cron)?;
            options::set(conn, OPT_WINDOW_DURATION, &duration_hours.to_string())?;
            Ok::<_, ModuleError>(())
        })?;
        self.rebuild(guild)?;
        Ok(format!(
            "Submission windows will open on schedule \"{open_cron}\" and stay open for {duration_hours} hours"
        ))
    }

    pub fn set_announcement_channel(
        self: &Arc<Self>,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<String> {
        self.stores.with_guild(guild, |conn| {
            options::set(conn, OPT_ANNOUNCEMENT_CHANNEL, &channel.to_string())
        })?;
        Ok(format!("Progress report announcements will go to channel {channel}"))
    }

    pub fn set_reminder_role(self: &Arc<Self>, guild: GuildId, role: RoleId) -> Result<String> {
        self.stores.with_guild(guild, |conn| {
            options::set(conn, OPT_REMINDER_ROLE, &role.to_string())
        })?;
        Ok(format!("Window announcements will mention role {role}"))
    }

    /// Converge the scheduler to the guild's current options.
    pub fn rebuild(self: &Arc<Self>, guild: GuildId) -> Result<()> {
        let opts = self.stores.with_guild(guild, options::all)?;
        let enabled = opts.get(OPT_ENABLED).is_some_and(|v| v == "true");

        if !enabled {
            self.scheduler
                .remove_job(&JobKey::new(guild, JOB_WINDOW_OPEN));
            self.scheduler
                .remove_job(&JobKey::new(guild, JOB_WINDOW_CLOSE));
            return Ok(());
        }

        let Some(open_cron) = opts.get(OPT_WINDOW_OPEN) else {
            warn!(%guild, "progress reports enabled but no window schedule set");
            return Ok(());
        };

        let module = Arc::clone(self);
        let open_cb: RunCallback = Arc::new(move || {
            if let Err(e) = module.open_window(guild) {
                error!(%guild, "failed to open progress report window: {e}");
            }
        });
        self.stores.with_guild(guild, |conn| {
            self.scheduler
                .add_recurring_job(conn, guild, JOB_WINDOW_OPEN, open_cron, open_cb, true)
        })?;

        // A restart inside an open window must not lose the close timer.
        let now = Utc::now();
        if let Some(window) = self.stores.with_guild(guild, |conn| windows::current(conn, now))? {
            self.arm_close(guild, &window)?;
        }
        Ok(())
    }

    /// Open a submission window right now, announce it, and arm the close
    /// timer for when it elapses.
    pub fn open_window(self: &Arc<Self>, guild: GuildId) -> Result<Window> {
        let duration = self
            .stores
            .with_guild(guild, |conn| options::get(conn, OPT_WINDOW_DURATION))?
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WINDOW_HOURS);

        let window = self.stores.with_guild(guild, |conn| {
            windows::insert(conn, Utc::now(), duration)
        })?;

        let reminder = self
            .stores
            .with_guild(guild, |conn| options::get(conn, OPT_REMINDER_ROLE))?;
        let mention = reminder
            .map(|r| format!("<@&{r}> "))
            .unwrap_or_default();
        self.announce(
            guild,
            &format!("{mention}The progress report window is now open for {duration} hours!"),
        )?;

        self.arm_close(guild, &window)?;
        Ok(window)
    }

    /// Record a member's submission for the currently open window.
    pub fn submit(
        self: &Arc<Self>,
        guild: GuildId,
        user: UserId,
        word_count: i64,
        note: &str,
    ) -> Result<String> {
        if word_count < 0 {
            return Err(ModuleError::Rejected(
                "Word count cannot be negative".to_string(),
            ));
        }
        let (old_total, new_total) = self.stores.with_guild(guild, |conn| {
            let window = windows::current(conn, Utc::now())?.ok_or_else(|| {
                ModuleError::Rejected(
                    "There is no open progress report window right now".to_string(),
                )
            })?;
            let old_total = reports::total_for_user(conn, user)?;
            reports::submit(conn, user, window.id, word_count, note)?;
            let new_total = reports::total_for_user(conn, user)?;
            Ok::<_, ModuleError>((old_total, new_total))
        })?;

        let mut message = format!("Progress report recorded: {word_count} words");
        let promoted = self.stores.with_guild(guild, |conn| {
            let before = ranks::rank_for(conn, old_total)?;
            let after = ranks::rank_for(conn, new_total)?;
            Ok::<_, ModuleError>(match (before, after) {
                (None, Some(r)) => Some(r),
                (Some(b), Some(a)) if a.threshold > b.threshold => Some(a),
                _ => None,
            })
        })?;
        if let Some(rank) = promoted {
            message.push_str(&format!(
                ". You reached {} total words and earned role {}!",
                rank.threshold, rank.role
            ));
        }
        Ok(message)
    }

    pub fn add_rank(self: &Arc<Self>, guild: GuildId, role: RoleId, threshold: i64) -> Result<String> {
        self.stores
            .with_guild(guild, |conn| ranks::add(conn, role, threshold))?;
        Ok(format!("Role {role} will be granted at {threshold} total words"))
    }

    pub fn remove_rank(self: &Arc<Self>, guild: GuildId, role: RoleId) -> Result<String> {
        let removed = self
            .stores
            .with_guild(guild, |conn| ranks::remove(conn, role))?;
        if removed {
            Ok(format!("Rank for role {role} removed"))
        } else {
            Ok(format!("Role {role} had no rank to remove"))
        }
    }

    pub fn list_ranks(self: &Arc<Self>, guild: GuildId) -> Result<Vec<ranks::Rank>> {
        Ok(self.stores.with_guild(guild, ranks::list)?)
    }

    fn arm_close(self: &Arc<Self>, guild: GuildId, window: &Window) -> Result<()> {
        let module = Arc::clone(self);
        let close_cb: RunCallback = Arc::new(move || {
            if let Err(e) = module.announce(guild, "The progress report window has closed.") {
                error!(%guild, "failed to announce window close: {e}");
            }
        });
        // Registered and armed in one step under the registry lock; a window
        // that already elapsed (e.g. rebuild after a long outage) arms
        // nothing and displaces any stale close job.
        self.scheduler.add_one_shot_at(
            Job::one_shot(guild, JOB_WINDOW_CLOSE, close_cb),
            window.ends_at(),
            None,
        );
        Ok(())
    }

    fn announce(&self, guild: GuildId, message: &str) -> Result<()> {
        let channel = self
            .stores
            .with_guild(guild, |conn| options::get(conn, OPT_ANNOUNCEMENT_CHANNEL))?
            .and_then(|v| v.parse().ok());
        self.notifier.notify(guild, channel, message);
        Ok(())
    }
}
