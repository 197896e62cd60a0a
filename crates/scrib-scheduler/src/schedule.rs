//! Cron expression handling.
//!
//! Guild-facing commands use the common five-field cron form
//! (`minute hour day-of-month month day-of-week`). The parser also accepts
//! six- and seven-field forms with explicit seconds and years.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Normalise a five-field expression by pinning seconds to zero. Six- and
/// seven-field expressions pass through untouched.
fn normalize(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {}", expr.trim())
    } else {
        expr.trim().to_string()
    }
}

/// Parse a cron expression, surfacing the parser's own diagnostic on failure.
pub fn parse(expr: &str) -> Result<Schedule> {
    Schedule::from_str(&normalize(expr)).map_err(|e| SchedulerError::ScheduleInvalid {
        expr: expr.to_string(),
        detail: e.to_string(),
    })
}

/// Check an expression without keeping the parsed schedule. Returns the
/// reason it was rejected, suitable for echoing back to the command issuer.
pub fn validate(expr: &str) -> Result<()> {
    parse(expr).map(drop)
}

/// The next fire strictly after `from`. `None` when the schedule has no
/// remaining occurrences.
pub fn next_after(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&from).next()
}
