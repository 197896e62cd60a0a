//! `scrib-scheduler` — Tokio-based timer registry for guild jobs.
//!
//! # Overview
//!
//! A [`Job`] owns one Tokio timer task and recomputes its delay from the cron
//! schedule after every fire. The shared [`Scheduler`] registry maps
//! (guild, name) keys to jobs; adding a job under an occupied key stops and
//! replaces the previous holder, so a key never drives two timers.
//!
//! Recurring definitions are persisted to the guild store through
//! [`Scheduler::add_recurring_job`] so feature modules can re-arm them after
//! a restart. One-shot timers armed with [`Job::start_at`] are deliberately
//! not persisted.

pub mod error;
pub mod job;
pub mod registry;
pub mod schedule;

pub use error::{Result, SchedulerError};
pub use job::{Job, JobKey, RunCallback};
pub use registry::Scheduler;
