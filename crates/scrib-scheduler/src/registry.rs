//! The authoritative set of armed jobs.
//!
//! One `Scheduler` instance is shared by every feature module. All add,
//! replace, remove, and lookup traffic goes through the registry mutex, so
//! no (guild, name) key can ever hold two armed timers at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use scrib_core::GuildId;
use tracing::{debug, info};

use crate::error::Result;
use crate::job::{Job, JobKey, RunCallback};

#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<JobKey, Arc<Job>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under its key, replacing any previous holder.
    ///
    /// The displaced job is stopped before the new one starts, so exactly
    /// one timer exists for the key at every point in the exchange. With
    /// `auto_start` the job must carry a recurring schedule; the check runs
    /// before the registry is touched, so a rejected add leaves the prior
    /// job armed.
    pub fn add_job(&self, job: Job, auto_start: bool) -> Result<Arc<Job>> {
        if auto_start && !job.is_recurring() {
            return Err(crate::error::SchedulerError::NotArmable {
                name: job.key().name.clone(),
            });
        }

        let job = Arc::new(job);
        let mut jobs = lock(&self.jobs);
        if let Some(prev) = jobs.remove(job.key()) {
            debug!(job = %prev.key(), "replacing existing job");
            prev.detach();
        }
        if auto_start {
            job.start()?;
        }
        info!(job = %job.key(), armed = auto_start, "job registered");
        jobs.insert(job.key().clone(), Arc::clone(&job));
        Ok(job)
    }

    /// Register a one-shot job and arm it for an absolute instant, all under
    /// the registry lock. Any previous holder of the key is displaced either
    /// way; when `at` has already passed the new job is not registered and
    /// `false` is returned, leaving the key empty.
    pub fn add_one_shot_at(
        &self,
        job: Job,
        at: DateTime<Utc>,
        repeat: Option<Duration>,
    ) -> bool {
        let job = Arc::new(job);
        let mut jobs = lock(&self.jobs);
        if let Some(prev) = jobs.remove(job.key()) {
            debug!(job = %prev.key(), "replacing existing job");
            prev.detach();
        }
        if !job.start_at(at, repeat) {
            debug!(job = %job.key(), "one-shot instant already passed, key left empty");
            return false;
        }
        info!(job = %job.key(), at = %at, "one-shot job registered");
        jobs.insert(job.key().clone(), Arc::clone(&job));
        true
    }

    /// Validate, persist, and arm a recurring job in one step.
    ///
    /// The cron expression is checked first; on failure nothing is persisted
    /// and nothing is armed. The job's definition is then written to the
    /// guild store so it can be re-armed after a restart.
    pub fn add_recurring_job(
        &self,
        conn: &Connection,
        guild: GuildId,
        name: &str,
        cron_expr: &str,
        run: RunCallback,
        auto_start: bool,
    ) -> Result<Arc<Job>> {
        let job = Job::recurring(guild, name, cron_expr, run)?;
        scrib_store::jobs::upsert(conn, guild, name, cron_expr)?;
        self.add_job(job, auto_start)
    }

    /// Stop and drop the job for `key`. Removing a key that holds no job is
    /// a successful no-op; returns whether a job was actually removed.
    pub fn remove_job(&self, key: &JobKey) -> bool {
        let removed = lock(&self.jobs).remove(key);
        match removed {
            Some(job) => {
                job.detach();
                info!(job = %key, "job removed");
                true
            }
            None => false,
        }
    }

    /// Remove by instance. Unlike [`Scheduler::remove_job`] this only acts
    /// when the registry still holds this exact instance; a key that has
    /// since been taken over by a replacement is left alone.
    pub fn remove(&self, job: &Arc<Job>) -> bool {
        let mut jobs = lock(&self.jobs);
        let held = jobs
            .get(job.key())
            .is_some_and(|current| Arc::ptr_eq(current, job));
        if held {
            if let Some(removed) = jobs.remove(job.key()) {
                removed.detach();
                info!(job = %removed.key(), "job removed");
            }
        }
        held
    }

    pub fn get_job(&self, key: &JobKey) -> Option<Arc<Job>> {
        lock(&self.jobs).get(key).cloned()
    }

    /// Every registered job for one guild, in no particular order.
    pub fn jobs_for_guild(&self, guild: GuildId) -> Vec<Arc<Job>> {
        lock(&self.jobs)
            .values()
            .filter(|j| j.key().guild == guild)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.jobs).is_empty()
    }

    /// Stop every job and empty the registry. Used at shutdown.
    pub fn clear(&self) {
        let drained: Vec<_> = lock(&self.jobs).drain().collect();
        for (_, job) in &drained {
            job.detach();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "scheduler cleared");
        }
    }
}

// Registry lock poisoning only happens if a panic fired while holding the
// guard; the map itself stays consistent, so recover the guard and continue.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter() -> (RunCallback, Arc<AtomicUsize>) {
        let fires = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&fires);
        let cb: RunCallback = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (cb, fires)
    }

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        scrib_store::schema::init_db(&conn).unwrap();
        conn
    }

    #[tokio::test(start_paused = true)]
    async fn add_replaces_and_silences_the_previous_job() {
        let scheduler = Scheduler::new();
        let key = JobKey::new(GuildId(1), "refresh");
        let (first_cb, first_fires) = counter();
        let (second_cb, second_fires) = counter();

        let first = Job::recurring(GuildId(1), "refresh", "*/2 * * * * *", first_cb).unwrap();
        scheduler.add_job(first, true).unwrap();
        let second = Job::recurring(GuildId(1), "refresh", "*/2 * * * * *", second_cb).unwrap();
        scheduler.add_job(second, true).unwrap();

        assert_eq!(scheduler.len(), 1, "one registry entry per key");
        assert!(scheduler.get_job(&key).unwrap().is_armed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            first_fires.load(Ordering::SeqCst),
            0,
            "displaced job must never fire"
        );
        assert!(second_fires.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_silences_and_forgets() {
        let scheduler = Scheduler::new();
        let key = JobKey::new(GuildId(1), "announce");
        let (cb, fires) = counter();

        let job = Job::recurring(GuildId(1), "announce", "*/2 * * * * *", cb).unwrap();
        scheduler.add_job(job, true).unwrap();

        assert!(scheduler.remove_job(&key));
        assert!(scheduler.get_job(&key).is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_of_absent_key_is_a_no_op() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.remove_job(&JobKey::new(GuildId(9), "ghost")));
    }

    #[tokio::test(start_paused = true)]
    async fn unstarted_jobs_stay_registered_but_unarmed() {
        let scheduler = Scheduler::new();
        let (cb, _) = counter();
        let job = Job::recurring(GuildId(1), "idle", "0 0 * * *", cb).unwrap();
        scheduler.add_job(job, false).unwrap();

        let held = scheduler.get_job(&JobKey::new(GuildId(1), "idle")).unwrap();
        assert!(!held.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_add_persists_then_replaces_schedule() {
        let scheduler = Scheduler::new();
        let conn = conn();
        let guild = GuildId(7);
        let (cb, _) = counter();

        scheduler
            .add_recurring_job(&conn, guild, "refresh", "0 0 * * *", Arc::clone(&cb), true)
            .unwrap();
        let record = scrib_store::jobs::find(&conn, "refresh").unwrap().unwrap();
        assert_eq!(record.cron, "0 0 * * *");
        assert!(scheduler
            .get_job(&JobKey::new(guild, "refresh"))
            .unwrap()
            .is_armed());

        // Re-adding with a new expression updates the stored row in place
        // and swaps the armed timer.
        scheduler
            .add_recurring_job(&conn, guild, "refresh", "30 6 * * *", cb, true)
            .unwrap();
        let record = scrib_store::jobs::find(&conn, "refresh").unwrap().unwrap();
        assert_eq!(record.cron, "30 6 * * *");
        assert_eq!(scheduler.len(), 1);

        let held = scheduler.get_job(&JobKey::new(guild, "refresh")).unwrap();
        assert_eq!(held.cron_expr(), Some("30 6 * * *"));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_expression_neither_persists_nor_arms() {
        let scheduler = Scheduler::new();
        let conn = conn();
        let (cb, _) = counter();

        let err = scheduler
            .add_recurring_job(&conn, GuildId(7), "refresh", "not a cron", cb, true)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::SchedulerError::ScheduleInvalid { .. }
        ));
        assert!(scrib_store::jobs::find(&conn, "refresh").unwrap().is_none());
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_adds_for_one_key_leave_one_job() {
        let scheduler = Arc::new(Scheduler::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = Arc::clone(&scheduler);
            handles.push(tokio::spawn(async move {
                let (cb, _) = counter();
                let job = Job::recurring(GuildId(1), "refresh", "0 0 * * *", cb).unwrap();
                scheduler.add_job(job, true).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(scheduler.len(), 1);
        let survivor = scheduler
            .get_job(&JobKey::new(GuildId(1), "refresh"))
            .unwrap();
        assert!(survivor.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn displaced_instance_refuses_to_arm() {
        let scheduler = Scheduler::new();
        let (old_cb, old_fires) = counter();
        let (new_cb, new_fires) = counter();

        let displaced = scheduler
            .add_job(Job::one_shot(GuildId(1), "close", old_cb), false)
            .unwrap();
        let replacement =
            Job::recurring(GuildId(1), "close", "*/2 * * * * *", new_cb).unwrap();
        scheduler.add_job(replacement, true).unwrap();

        // The stale handle can no longer bring a second timer to life for
        // the key; only the replacement's timer exists.
        assert!(!displaced.start_at(Utc::now() + chrono::Duration::seconds(2), None));
        assert!(!displaced.is_armed());
        assert!(matches!(
            displaced.start().unwrap_err(),
            crate::error::SchedulerError::NotArmable { .. }
        ));
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(old_fires.load(Ordering::SeqCst), 0, "displaced job must never fire");
        assert!(new_fires.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_instance_refuses_to_restart() {
        let scheduler = Scheduler::new();
        let (cb, fires) = counter();
        let job = Job::recurring(GuildId(1), "refresh", "*/2 * * * * *", cb).unwrap();
        let held = scheduler.add_job(job, true).unwrap();

        assert!(scheduler.remove_job(held.key()));
        assert!(matches!(
            held.start().unwrap_err(),
            crate::error::SchedulerError::Displaced { .. }
        ));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_add_arms_under_the_registry_lock() {
        let scheduler = Scheduler::new();
        let key = JobKey::new(GuildId(1), "close");
        let (cb, fires) = counter();

        let registered = scheduler.add_one_shot_at(
            Job::one_shot(GuildId(1), "close", cb),
            Utc::now() + chrono::Duration::minutes(1),
            None,
        );
        assert!(registered);
        assert!(scheduler.get_job(&key).unwrap().is_armed());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_add_in_the_past_displaces_without_registering() {
        let scheduler = Scheduler::new();
        let key = JobKey::new(GuildId(1), "close");
        let (stale_cb, stale_fires) = counter();
        let (late_cb, late_fires) = counter();

        scheduler.add_one_shot_at(
            Job::one_shot(GuildId(1), "close", stale_cb),
            Utc::now() + chrono::Duration::hours(1),
            None,
        );
        let registered = scheduler.add_one_shot_at(
            Job::one_shot(GuildId(1), "close", late_cb),
            Utc::now() - chrono::Duration::minutes(5),
            None,
        );
        assert!(!registered);
        assert!(scheduler.get_job(&key).is_none(), "stale holder displaced, key empty");

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(stale_fires.load(Ordering::SeqCst), 0);
        assert_eq!(late_fires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_by_instance_spares_a_replacement() {
        let scheduler = Scheduler::new();
        let key = JobKey::new(GuildId(1), "refresh");
        let (cb_a, _) = counter();
        let (cb_b, _) = counter();

        let stale = scheduler
            .add_job(
                Job::recurring(GuildId(1), "refresh", "0 0 * * *", cb_a).unwrap(),
                false,
            )
            .unwrap();
        scheduler
            .add_job(
                Job::recurring(GuildId(1), "refresh", "0 0 * * *", cb_b).unwrap(),
                true,
            )
            .unwrap();

        assert!(!scheduler.remove(&stale), "stale instance no longer held");
        assert!(scheduler.get_job(&key).unwrap().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_stops_everything() {
        let scheduler = Scheduler::new();
        let (cb_a, fires_a) = counter();
        let (cb_b, fires_b) = counter();
        let a = Job::recurring(GuildId(1), "a", "*/2 * * * * *", cb_a).unwrap();
        let b = Job::recurring(GuildId(2), "b", "*/2 * * * * *", cb_b).unwrap();
        scheduler.add_job(a, true).unwrap();
        scheduler.add_job(b, true).unwrap();

        scheduler.clear();
        assert!(scheduler.is_empty());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fires_a.load(Ordering::SeqCst), 0);
        assert_eq!(fires_b.load(Ordering::SeqCst), 0);
    }
}
