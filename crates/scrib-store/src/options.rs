//! Per-guild feature configuration: named string values, unique by name.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Read a single option value, `None` when it was never set.
pub fn get(conn: &Connection, name: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM options WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Set an option, creating it on first write (find-or-create upsert).
///
/// The read-then-write pair is not atomic against concurrent writers to the
/// same guild store; last write wins.
pub fn set(conn: &Connection, name: &str, value: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE options SET value = ?2 WHERE name = ?1",
        [name, value],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO options (name, value) VALUES (?1, ?2)",
            [name, value],
        )?;
    }
    Ok(())
}

/// Remove an option. Returns `false` when it did not exist.
pub fn unset(conn: &Connection, name: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM options WHERE name = ?1", [name])?;
    Ok(n > 0)
}

/// All options as a name → value map, for rebuild passes that consult
/// several options at once.
pub fn all(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT name, value FROM options")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut map = HashMap::new();
    for row in rows {
        let (name, value): (String, String) = row?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Convenience: read an option and interpret it as a boolean flag.
/// Anything other than a literal `"true"` is treated as disabled.
pub fn get_flag(conn: &Connection, name: &str) -> Result<bool> {
    Ok(get(conn, name)?.as_deref() == Some("true"))
}
