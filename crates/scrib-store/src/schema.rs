use rusqlite::{Connection, Result};

/// Initialise all guild-store tables. Safe to call before every operation
/// (idempotent), which is what guarantees a store is schema-correct before
/// any read or write touches it.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_options_table(conn)?;
    create_quotes_table(conn)?;
    create_jobs_table(conn)?;
    create_progress_tables(conn)?;
    create_tracker_table(conn)?;
    create_currency_tables(conn)?;
    Ok(())
}

fn create_options_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS options (
            id     INTEGER PRIMARY KEY AUTOINCREMENT,
            name   TEXT NOT NULL UNIQUE,
            value  TEXT NOT NULL
        );",
    )
}

fn create_quotes_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS quotes (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            content      TEXT NOT NULL,
            author_id    TEXT NOT NULL,
            recorder_id  TEXT NOT NULL,
            quoted_at    TEXT NOT NULL,
            recorded_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_quotes_author
            ON quotes(author_id);",
    )
}

/// Persisted recurring job definitions. One-shot jobs (e.g. a window-close
/// timer) are never written here; they are rebuilt from the window records.
fn create_jobs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS jobs (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id  TEXT NOT NULL,
            name      TEXT NOT NULL UNIQUE,
            cron      TEXT NOT NULL,
            active    INTEGER NOT NULL DEFAULT 1
        );",
    )
}

fn create_progress_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS progress_report_windows (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            starts_at       TEXT NOT NULL,
            duration_hours  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS progress_reports (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       TEXT NOT NULL,
            window_id     INTEGER NOT NULL,
            word_count    INTEGER NOT NULL,
            note          TEXT NOT NULL DEFAULT '',
            submitted_at  TEXT NOT NULL,
            UNIQUE(user_id, window_id)
        );
        CREATE INDEX IF NOT EXISTS idx_reports_window
            ON progress_reports(window_id);

        CREATE TABLE IF NOT EXISTS ranks (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            role_id    TEXT NOT NULL UNIQUE,
            threshold  INTEGER NOT NULL UNIQUE
        );",
    )
}

fn create_tracker_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS wt_subscribers (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id   TEXT NOT NULL UNIQUE,
            goal      INTEGER NOT NULL DEFAULT 0,
            progress  INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn create_currency_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS currencies (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL UNIQUE,
            description  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS balances (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL,
            currency_id  INTEGER NOT NULL,
            amount       INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, currency_id)
        );

        CREATE TABLE IF NOT EXISTS redemptions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL UNIQUE,
            description  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS prices (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            redemption_id  INTEGER NOT NULL,
            currency_id    INTEGER NOT NULL,
            amount         INTEGER NOT NULL,
            UNIQUE(redemption_id, currency_id)
        );",
    )
}
