//! Word-count rank rewards: a guild role granted at a threshold.
//! Both the role and the threshold are unique within a guild.

use rusqlite::{Connection, OptionalExtension, Row};
use scrib_core::RoleId;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub id: i64,
    pub role: RoleId,
    pub threshold: i64,
}

fn row_to_rank(row: &Row<'_>) -> rusqlite::Result<Rank> {
    let role: String = row.get(1)?;
    Ok(Rank {
        id: row.get(0)?,
        role: crate::row::id(1, &role)?,
        threshold: row.get(2)?,
    })
}

const SELECT: &str = "SELECT id, role_id, threshold FROM ranks";

/// Add a rank. Duplicate roles and duplicate thresholds are both rejected
/// with a descriptive reason, leaving the table unchanged.
pub fn add(conn: &Connection, role: RoleId, threshold: i64) -> Result<Rank> {
    if threshold < 0 {
        return Err(StoreError::Constraint(format!(
            "rank threshold cannot be negative (got {threshold})"
        )));
    }
    for existing in list(conn)? {
        if existing.role == role {
            return Err(StoreError::Constraint(format!(
                "role {role} already has a rank (threshold {})",
                existing.threshold
            )));
        }
        if existing.threshold == threshold {
            return Err(StoreError::Constraint(format!(
                "a rank with threshold {threshold} already exists (role {})",
                existing.role
            )));
        }
    }
    conn.execute(
        "INSERT INTO ranks (role_id, threshold) VALUES (?1, ?2)",
        rusqlite::params![role.to_string(), threshold],
    )?;
    Ok(Rank {
        id: conn.last_insert_rowid(),
        role,
        threshold,
    })
}

/// Remove the rank attached to `role`. Returns `false` when none existed.
pub fn remove(conn: &Connection, role: RoleId) -> Result<bool> {
    let n = conn.execute("DELETE FROM ranks WHERE role_id = ?1", [role.to_string()])?;
    Ok(n > 0)
}

/// All ranks, ascending by threshold.
pub fn list(conn: &Connection) -> Result<Vec<Rank>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY threshold"))?;
    let rows = stmt.query_map([], row_to_rank)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// The highest rank whose threshold is at or below `word_count`.
pub fn rank_for(conn: &Connection, word_count: i64) -> Result<Option<Rank>> {
    let rank = conn
        .query_row(
            &format!("{SELECT} WHERE threshold <= ?1 ORDER BY threshold DESC LIMIT 1"),
            [word_count],
            row_to_rank,
        )
        .optional()?;
    Ok(rank)
}
