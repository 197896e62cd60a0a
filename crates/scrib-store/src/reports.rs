//! Progress-report submissions: one row per user per window.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use scrib_core::UserId;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: i64,
    pub user: UserId,
    pub window_id: i64,
    pub word_count: i64,
    pub note: String,
    pub submitted_at: DateTime<Utc>,
}

fn row_to_report(row: &Row<'_>) -> rusqlite::Result<Report> {
    let user: String = row.get(1)?;
    let submitted_at: String = row.get(5)?;
    Ok(Report {
        id: row.get(0)?,
        user: crate::row::id(1, &user)?,
        window_id: row.get(2)?,
        word_count: row.get(3)?,
        note: row.get(4)?,
        submitted_at: crate::row::timestamp(5, &submitted_at)?,
    })
}

const SELECT: &str =
    "SELECT id, user_id, window_id, word_count, note, submitted_at FROM progress_reports";

/// Record a submission for (user, window). Resubmitting within the same
/// window updates the existing row in place.
pub fn submit(
    conn: &Connection,
    user: UserId,
    window_id: i64,
    word_count: i64,
    note: &str,
) -> Result<Report> {
    let now = Utc::now();
    let updated = conn.execute(
        "UPDATE progress_reports
         SET word_count = ?3, note = ?4, submitted_at = ?5
         WHERE user_id = ?1 AND window_id = ?2",
        rusqlite::params![
            user.to_string(),
            window_id,
            word_count,
            note,
            now.to_rfc3339()
        ],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO progress_reports (user_id, window_id, word_count, note, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                user.to_string(),
                window_id,
                word_count,
                note,
                now.to_rfc3339()
            ],
        )?;
    }
    let report = conn.query_row(
        &format!("{SELECT} WHERE user_id = ?1 AND window_id = ?2"),
        rusqlite::params![user.to_string(), window_id],
        row_to_report,
    )?;
    Ok(report)
}

/// The user's submission for a given window, if any.
pub fn for_user_in_window(
    conn: &Connection,
    user: UserId,
    window_id: i64,
) -> Result<Option<Report>> {
    let report = conn
        .query_row(
            &format!("{SELECT} WHERE user_id = ?1 AND window_id = ?2"),
            rusqlite::params![user.to_string(), window_id],
            row_to_report,
        )
        .optional()?;
    Ok(report)
}

/// All submissions recorded for one window.
pub fn for_window(conn: &Connection, window_id: i64) -> Result<Vec<Report>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE window_id = ?1 ORDER BY submitted_at"
    ))?;
    let rows = stmt.query_map([window_id], row_to_report)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// A user's running word-count total across every window; drives rank
/// threshold checks.
pub fn total_for_user(conn: &Connection, user: UserId) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(word_count), 0) FROM progress_reports WHERE user_id = ?1",
        [user.to_string()],
        |row| row.get(0),
    )?;
    Ok(total)
}
