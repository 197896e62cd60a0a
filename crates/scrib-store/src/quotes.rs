//! Recorded member quotes.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use scrib_core::UserId;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub id: i64,
    pub content: String,
    pub author: UserId,
    pub recorder: UserId,
    /// When the quoted message was originally said.
    pub quoted_at: DateTime<Utc>,
    /// When the quote was recorded by the bot.
    pub recorded_at: DateTime<Utc>,
}

fn row_to_quote(row: &Row<'_>) -> rusqlite::Result<Quote> {
    let author: String = row.get(2)?;
    let recorder: String = row.get(3)?;
    let quoted_at: String = row.get(4)?;
    let recorded_at: String = row.get(5)?;
    Ok(Quote {
        id: row.get(0)?,
        content: row.get(1)?,
        author: crate::row::id(2, &author)?,
        recorder: crate::row::id(3, &recorder)?,
        quoted_at: crate::row::timestamp(4, &quoted_at)?,
        recorded_at: crate::row::timestamp(5, &recorded_at)?,
    })
}

const SELECT: &str =
    "SELECT id, content, author_id, recorder_id, quoted_at, recorded_at FROM quotes";

/// Record a new quote. `quoted_at` is the original message's timestamp when
/// the quote was taken from a message reference, otherwise "now".
pub fn add(
    conn: &Connection,
    author: UserId,
    content: &str,
    recorder: UserId,
    quoted_at: DateTime<Utc>,
) -> Result<Quote> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO quotes (content, author_id, recorder_id, quoted_at, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            content,
            author.to_string(),
            recorder.to_string(),
            quoted_at.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;
    Ok(Quote {
        id: conn.last_insert_rowid(),
        content: content.to_string(),
        author,
        recorder,
        quoted_at,
        recorded_at: now,
    })
}

/// Look up a quote by id. Callers decide whether a miss is an error.
pub fn find(conn: &Connection, id: i64) -> Result<Option<Quote>> {
    let quote = conn
        .query_row(&format!("{SELECT} WHERE id = ?1"), [id], row_to_quote)
        .optional()?;
    Ok(quote)
}

/// All quotes attributed to `author`, oldest first.
pub fn by_author(conn: &Connection, author: UserId) -> Result<Vec<Quote>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE author_id = ?1 ORDER BY quoted_at"
    ))?;
    let rows = stmt.query_map([author.to_string()], row_to_quote)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// A uniformly random quote, optionally restricted to one author.
pub fn random(conn: &Connection, author: Option<UserId>) -> Result<Option<Quote>> {
    let quote = match author {
        Some(author) => conn
            .query_row(
                &format!("{SELECT} WHERE author_id = ?1 ORDER BY RANDOM() LIMIT 1"),
                [author.to_string()],
                row_to_quote,
            )
            .optional()?,
        None => conn
            .query_row(
                &format!("{SELECT} ORDER BY RANDOM() LIMIT 1"),
                [],
                row_to_quote,
            )
            .optional()?,
    };
    Ok(quote)
}

/// Delete a quote by id. Returns `false` when no such quote existed.
pub fn remove(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute("DELETE FROM quotes WHERE id = ?1", [id])?;
    Ok(n > 0)
}
