//! A single schedulable unit of work.
//!
//! A job is either unarmed (no timer running) or armed (a Tokio task is
//! sleeping until the next fire). Recurring jobs recompute the delay to the
//! next occurrence after every fire, so drift never accumulates. Jobs move
//! between the two states any number of times via `start`/`start_at`/`stop`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use scrib_core::GuildId;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, SchedulerError};
use crate::schedule;

/// Registry identity. Two jobs with the same key are the same job for
/// replace-on-add purposes, regardless of instance identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub guild: GuildId,
    pub name: String,
}

impl JobKey {
    pub fn new(guild: GuildId, name: impl Into<String>) -> Self {
        Self {
            guild,
            name: name.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild, self.name)
    }
}

/// Invoked on every fire. Attached once at construction.
pub type RunCallback = Arc<dyn Fn() + Send + Sync>;

pub struct Job {
    key: JobKey,
    schedule: Option<(String, cron::Schedule)>,
    run: RunCallback,
    timer: Mutex<Option<JoinHandle<()>>>,
    // Set when the registry replaces or drops this instance. A detached job
    // refuses to arm, so a caller holding a stale handle cannot bring a
    // second timer to life for a key someone else now owns.
    detached: AtomicBool,
}

impl Job {
    /// A job driven by a cron expression. The expression is validated here,
    /// before anything is persisted or armed.
    pub fn recurring(
        guild: GuildId,
        name: impl Into<String>,
        cron_expr: &str,
        run: RunCallback,
    ) -> Result<Self> {
        let parsed = schedule::parse(cron_expr)?;
        Ok(Self {
            key: JobKey::new(guild, name),
            schedule: Some((cron_expr.to_string(), parsed)),
            run,
            timer: Mutex::new(None),
            detached: AtomicBool::new(false),
        })
    }

    /// A job with no cron schedule; it can only be armed via [`Job::start_at`].
    pub fn one_shot(guild: GuildId, name: impl Into<String>, run: RunCallback) -> Self {
        Self {
            key: JobKey::new(guild, name),
            schedule: None,
            run,
            timer: Mutex::new(None),
            detached: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// The cron expression this job was built with, when recurring.
    pub fn cron_expr(&self) -> Option<&str> {
        self.schedule.as_ref().map(|(expr, _)| expr.as_str())
    }

    pub fn is_recurring(&self) -> bool {
        self.schedule.is_some()
    }

    /// Arm the recurring timer. Any previously armed timer for this job is
    /// disarmed first, so a job never fires twice per occurrence. An
    /// instance the registry has replaced or removed refuses to arm.
    pub fn start(&self) -> Result<()> {
        let (_, parsed) = self
            .schedule
            .as_ref()
            .ok_or_else(|| SchedulerError::NotArmable {
                name: self.key.name.clone(),
            })?;

        let key = self.key.clone();
        let parsed = parsed.clone();
        let run = Arc::clone(&self.run);
        // The detached check and the handle install share one critical
        // section, so a concurrent detach either sees the handle (and aborts
        // it) or is seen here (and blocks the arm). Either way a displaced
        // instance ends up silent.
        let mut timer = self.timer_guard();
        if self.detached.load(Ordering::SeqCst) {
            return Err(SchedulerError::Displaced {
                name: self.key.name.clone(),
            });
        }
        let handle = tokio::spawn(async move {
            let mut from = Utc::now();
            loop {
                let Some(next) = schedule::next_after(&parsed, from) else {
                    warn!(job = %key, "schedule exhausted, disarming");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                debug!(job = %key, fired_at = %next, "job fired");
                run();
                // Advance past the occurrence just fired so a fast callback
                // and a coarse clock cannot double-fire it; skip occurrences
                // missed while the callback ran.
                from = next.max(Utc::now());
            }
        });
        if let Some(prev) = timer.take() {
            prev.abort();
        }
        *timer = Some(handle);
        Ok(())
    }

    /// Arm a timer for an explicit absolute instant, optionally repeating at
    /// a fixed interval afterwards. Returns `false` without arming when the
    /// requested time has already passed, or when the registry no longer
    /// holds this instance.
    pub fn start_at(&self, at: DateTime<Utc>, repeat: Option<Duration>) -> bool {
        let now = Utc::now();
        let Ok(wait) = (at - now).to_std() else {
            debug!(job = %self.key, at = %at, "requested start time already passed, not arming");
            return false;
        };

        let key = self.key.clone();
        let run = Arc::clone(&self.run);
        let mut timer = self.timer_guard();
        if self.detached.load(Ordering::SeqCst) {
            debug!(job = %self.key, "instance no longer registered, not arming");
            return false;
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            debug!(job = %key, fired_at = %at, "job fired");
            run();
            if let Some(every) = repeat {
                let mut interval = tokio::time::interval(every);
                interval.tick().await; // first tick completes immediately
                loop {
                    interval.tick().await;
                    debug!(job = %key, "job fired");
                    run();
                }
            }
        });
        if let Some(prev) = timer.take() {
            prev.abort();
        }
        *timer = Some(handle);
        true
    }

    /// Disarm the timer. Calling this on an unarmed job is a no-op. A
    /// stopped job may be started again; only detaching is permanent.
    pub fn stop(&self) {
        let mut timer = self.timer_guard();
        if let Some(prev) = timer.take() {
            prev.abort();
        }
    }

    /// Registry hook: bar this instance from ever arming again, then disarm
    /// it. Called when the registry replaces or drops the instance, so a
    /// caller still holding its handle cannot resurrect its timer.
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        self.stop();
    }

    pub fn is_armed(&self) -> bool {
        self.timer_guard()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    // Timer lock poisoning would need a panic inside one of the short
    // critical sections above; the slot stays consistent, so recover.
    fn timer_guard(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.key)
            .field("cron", &self.cron_expr())
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (RunCallback, Arc<AtomicUsize>) {
        let fires = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&fires);
        let cb: RunCallback = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (cb, fires)
    }

    #[test]
    fn recurring_rejects_bad_expression() {
        let (cb, _) = counter();
        let err = Job::recurring(GuildId(1), "bad", "every other tuesday", cb).unwrap_err();
        assert!(matches!(err, SchedulerError::ScheduleInvalid { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_job_fires_and_rearms() {
        let (cb, fires) = counter();
        let job = Job::recurring(GuildId(1), "tick", "*/2 * * * * *", cb).unwrap();
        job.start().unwrap();
        assert!(job.is_armed());

        tokio::time::sleep(Duration::from_secs(7)).await;
        let seen = fires.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected repeated fires, saw {seen}");

        job.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fires.load(Ordering::SeqCst), seen, "no fires after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn start_at_in_the_past_never_arms() {
        let (cb, fires) = counter();
        let job = Job::one_shot(GuildId(1), "late", cb);

        let armed = job.start_at(Utc::now() - chrono::Duration::minutes(5), None);
        assert!(!armed);
        assert!(!job.is_armed());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_at_fires_once_without_repeat() {
        let (cb, fires) = counter();
        let job = Job::one_shot(GuildId(1), "once", cb);

        assert!(job.start_at(Utc::now() + chrono::Duration::seconds(30), None));
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_schedule_is_rejected() {
        let (cb, _) = counter();
        let job = Job::one_shot(GuildId(1), "adhoc", cb);
        assert!(matches!(
            job.start().unwrap_err(),
            SchedulerError::NotArmable { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (cb, _) = counter();
        let job = Job::recurring(GuildId(1), "tick", "* * * * *", cb).unwrap();
        job.stop();
        job.start().unwrap();
        job.stop();
        job.stop();
        assert!(!job.is_armed());
    }
}
