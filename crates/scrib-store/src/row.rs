//! Conversions from TEXT columns back to domain types.
//!
//! Ids and timestamps are stored as TEXT. A value that no longer parses is
//! corrupt data, and reads surface it as a row conversion error rather than
//! substituting a default.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Parse an RFC 3339 timestamp column.
pub(crate) fn timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a numeric id column (guild, user, role, channel ids).
pub(crate) fn id<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    s.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
