//! Word-tracker subscribers: per-user daily goal and running progress,
//! reset by the daily refresh job.

use rusqlite::{Connection, OptionalExtension, Row};
use scrib_core::UserId;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscriber {
    pub id: i64,
    pub user: UserId,
    pub goal: i64,
    pub progress: i64,
}

fn row_to_subscriber(row: &Row<'_>) -> rusqlite::Result<Subscriber> {
    let user: String = row.get(1)?;
    Ok(Subscriber {
        id: row.get(0)?,
        user: crate::row::id(1, &user)?,
        goal: row.get(2)?,
        progress: row.get(3)?,
    })
}

const SELECT: &str = "SELECT id, user_id, goal, progress FROM wt_subscribers";

/// Subscribe a user with a daily goal, or update the goal if already
/// subscribed (progress is kept).
pub fn subscribe(conn: &Connection, user: UserId, goal: i64) -> Result<Subscriber> {
    let updated = conn.execute(
        "UPDATE wt_subscribers SET goal = ?2 WHERE user_id = ?1",
        rusqlite::params![user.to_string(), goal],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO wt_subscribers (user_id, goal, progress) VALUES (?1, ?2, 0)",
            rusqlite::params![user.to_string(), goal],
        )?;
    }
    find(conn, user)?.ok_or(StoreError::NotFound {
        entity: "word tracker subscriber",
        id: user.to_string(),
    })
}

/// Unsubscribe. Returns `false` when the user was not subscribed.
pub fn unsubscribe(conn: &Connection, user: UserId) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM wt_subscribers WHERE user_id = ?1",
        [user.to_string()],
    )?;
    Ok(n > 0)
}

pub fn find(conn: &Connection, user: UserId) -> Result<Option<Subscriber>> {
    let sub = conn
        .query_row(
            &format!("{SELECT} WHERE user_id = ?1"),
            [user.to_string()],
            row_to_subscriber,
        )
        .optional()?;
    Ok(sub)
}

/// Add words to today's progress. Errors with `NotFound` for users who never
/// subscribed — that case is reported back to the user, not treated as empty.
pub fn add_progress(conn: &Connection, user: UserId, words: i64) -> Result<Subscriber> {
    let n = conn.execute(
        "UPDATE wt_subscribers SET progress = progress + ?2 WHERE user_id = ?1",
        rusqlite::params![user.to_string(), words],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound {
            entity: "word tracker subscriber",
            id: user.to_string(),
        });
    }
    find(conn, user)?.ok_or(StoreError::NotFound {
        entity: "word tracker subscriber",
        id: user.to_string(),
    })
}

/// Overwrite today's progress (the "edit" command).
pub fn set_progress(conn: &Connection, user: UserId, words: i64) -> Result<Subscriber> {
    let n = conn.execute(
        "UPDATE wt_subscribers SET progress = ?2 WHERE user_id = ?1",
        rusqlite::params![user.to_string(), words],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound {
            entity: "word tracker subscriber",
            id: user.to_string(),
        });
    }
    find(conn, user)?.ok_or(StoreError::NotFound {
        entity: "word tracker subscriber",
        id: user.to_string(),
    })
}

/// All subscribers, stable order for announcements.
pub fn list(conn: &Connection) -> Result<Vec<Subscriber>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_subscriber)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Zero every subscriber's progress — the daily refresh.
pub fn reset_all(conn: &Connection) -> Result<usize> {
    let n = conn.execute("UPDATE wt_subscribers SET progress = 0", [])?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn subscribe_sets_goal_and_keeps_progress_on_update() {
        let conn = conn();
        subscribe(&conn, UserId(1), 500).unwrap();
        add_progress(&conn, UserId(1), 200).unwrap();

        let updated = subscribe(&conn, UserId(1), 800).unwrap();
        assert_eq!(updated.goal, 800);
        assert_eq!(updated.progress, 200, "goal change keeps progress");
        assert_eq!(list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn add_progress_accumulates_and_edit_overwrites() {
        let conn = conn();
        subscribe(&conn, UserId(2), 1000).unwrap();

        assert_eq!(add_progress(&conn, UserId(2), 300).unwrap().progress, 300);
        assert_eq!(add_progress(&conn, UserId(2), 150).unwrap().progress, 450);
        assert_eq!(set_progress(&conn, UserId(2), 100).unwrap().progress, 100);
    }

    #[test]
    fn progress_for_unsubscribed_user_is_not_found() {
        let conn = conn();
        let err = add_progress(&conn, UserId(3), 100).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn reset_all_zeroes_everyone() {
        let conn = conn();
        subscribe(&conn, UserId(1), 500).unwrap();
        subscribe(&conn, UserId(2), 700).unwrap();
        add_progress(&conn, UserId(1), 400).unwrap();
        add_progress(&conn, UserId(2), 900).unwrap();

        assert_eq!(reset_all(&conn).unwrap(), 2);
        assert!(list(&conn).unwrap().iter().all(|s| s.progress == 0));
    }

    #[test]
    fn unsubscribe_reports_absence() {
        let conn = conn();
        subscribe(&conn, UserId(9), 100).unwrap();
        assert!(unsubscribe(&conn, UserId(9)).unwrap());
        assert!(!unsubscribe(&conn, UserId(9)).unwrap());
    }
}
