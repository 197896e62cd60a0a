//! Progress-report windows: time-bounded periods during which submissions
//! are accepted.
//!
//! Windows are half-open `[starts_at, ends_at)` intervals. No two persisted
//! windows may overlap; two windows touching at a shared boundary instant do
//! not overlap.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub id: i64,
    pub starts_at: DateTime<Utc>,
    pub duration_hours: i64,
}

impl Window {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::hours(self.duration_hours)
    }

    /// True when `at` falls inside the half-open `[starts_at, ends_at)` span.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at()
    }

    /// Half-open interval overlap: strict comparison on both boundary pairs,
    /// so touching windows are not overlapping.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.starts_at < other.ends_at() && other.starts_at < self.ends_at()
    }
}

fn row_to_window(row: &Row<'_>) -> rusqlite::Result<Window> {
    let starts_at: String = row.get(1)?;
    Ok(Window {
        id: row.get(0)?,
        starts_at: crate::row::timestamp(1, &starts_at)?,
        duration_hours: row.get(2)?,
    })
}

const SELECT: &str = "SELECT id, starts_at, duration_hours FROM progress_report_windows";

/// Persist a new window, rejecting any overlap with an existing one.
/// On rejection the prior state is left unchanged.
pub fn insert(conn: &Connection, starts_at: DateTime<Utc>, duration_hours: i64) -> Result<Window> {
    if duration_hours <= 0 {
        return Err(StoreError::Constraint(format!(
            "window duration must be positive (got {duration_hours})"
        )));
    }
    let candidate = Window {
        id: 0,
        starts_at,
        duration_hours,
    };
    for existing in all(conn)? {
        if candidate.overlaps(&existing) {
            return Err(StoreError::Constraint(format!(
                "overlapping progress report window exists (id {})",
                existing.id
            )));
        }
    }
    conn.execute(
        "INSERT INTO progress_report_windows (starts_at, duration_hours) VALUES (?1, ?2)",
        rusqlite::params![starts_at.to_rfc3339(), duration_hours],
    )?;
    Ok(Window {
        id: conn.last_insert_rowid(),
        ..candidate
    })
}

/// Look up a window by id.
pub fn find(conn: &Connection, id: i64) -> Result<Option<Window>> {
    let window = conn
        .query_row(&format!("{SELECT} WHERE id = ?1"), [id], row_to_window)
        .optional()?;
    Ok(window)
}

/// The window containing `at`, if any. At most one can exist because
/// persisted windows never overlap.
pub fn current(conn: &Connection, at: DateTime<Utc>) -> Result<Option<Window>> {
    Ok(all(conn)?.into_iter().find(|w| w.contains(at)))
}

/// The most recently started window, open or not.
pub fn latest(conn: &Connection) -> Result<Option<Window>> {
    Ok(all(conn)?.into_iter().max_by_key(|w| w.starts_at))
}

pub fn all(conn: &Connection) -> Result<Vec<Window>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY starts_at"))?;
    let rows = stmt.query_map([], row_to_window)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
