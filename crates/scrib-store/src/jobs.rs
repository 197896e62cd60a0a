//! Persisted recurring-job definitions.
//!
//! Each guild store holds its own job rows, so `name` alone is unique here;
//! the (guild, name) pairing the scheduler keys on comes from which store the
//! row lives in. The cron expression must already be validated by the caller
//! (the scheduler validates before persisting or arming anything).

use rusqlite::{Connection, OptionalExtension, Row};
use scrib_core::GuildId;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: i64,
    pub guild: GuildId,
    pub name: String,
    pub cron: String,
    pub active: bool,
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let guild: String = row.get(1)?;
    Ok(JobRecord {
        id: row.get(0)?,
        guild: crate::row::id(1, &guild)?,
        name: row.get(2)?,
        cron: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
    })
}

const SELECT: &str = "SELECT id, guild_id, name, cron, active FROM jobs";

/// Persist-or-update a job definition by name and mark it active.
pub fn upsert(conn: &Connection, guild: GuildId, name: &str, cron: &str) -> Result<JobRecord> {
    let existing = find(conn, name)?;
    match existing {
        Some(mut job) => {
            conn.execute(
                "UPDATE jobs SET cron = ?2, active = 1, guild_id = ?3 WHERE name = ?1",
                rusqlite::params![name, cron, guild.to_string()],
            )?;
            job.cron = cron.to_string();
            job.guild = guild;
            job.active = true;
            Ok(job)
        }
        None => {
            conn.execute(
                "INSERT INTO jobs (guild_id, name, cron, active) VALUES (?1, ?2, ?3, 1)",
                rusqlite::params![guild.to_string(), name, cron],
            )?;
            Ok(JobRecord {
                id: conn.last_insert_rowid(),
                guild,
                name: name.to_string(),
                cron: cron.to_string(),
                active: true,
            })
        }
    }
}

/// Look up a job definition by name.
pub fn find(conn: &Connection, name: &str) -> Result<Option<JobRecord>> {
    let job = conn
        .query_row(&format!("{SELECT} WHERE name = ?1"), [name], row_to_job)
        .optional()?;
    Ok(job)
}

/// All definitions still marked active, for rebuild passes.
pub fn all_active(conn: &Connection) -> Result<Vec<JobRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT} WHERE active = 1 ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_job)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Flip a definition's active flag. No-op (returns `false`) when the name is
/// unknown — dormant records are left for the next rebuild to pick up or
/// ignore.
pub fn set_active(conn: &Connection, name: &str, active: bool) -> Result<bool> {
    let n = conn.execute(
        "UPDATE jobs SET active = ?2 WHERE name = ?1",
        rusqlite::params![name, active as i64],
    )?;
    Ok(n > 0)
}
