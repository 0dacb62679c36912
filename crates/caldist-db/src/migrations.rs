//! Schema version management using `PRAGMA user_version`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version.
pub(crate) const CURRENT_VERSION: u32 = 2;

/// Runs database migrations up to `CURRENT_VERSION`.
///
/// # Errors
///
/// Returns an error if any SQL statement fails.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    if version < 1 {
        migrate_v1(conn).context("migration to v1 failed")?;
    }
    if version < 2 {
        migrate_v2(conn).context("migration to v2 failed")?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)
        .context("failed to update user_version")?;

    Ok(())
}

/// Migration to v1: create the `sensor_states` table.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sensor_states (
            name          TEXT PRIMARY KEY,
            unique_id     TEXT NOT NULL,
            native_value  REAL,
            unit          TEXT NOT NULL,
            icon          TEXT NOT NULL,
            attributes    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );",
    )
    .context("failed to create sensor_states table")?;

    Ok(())
}

/// Migration to v2: create the `run_history` table.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS run_history (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            name      TEXT NOT NULL,
            ran_at    TEXT NOT NULL,
            distance  REAL,
            error     TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_run_history_name_ran_at ON run_history(name, ran_at);",
    )
    .context("failed to create run_history table")?;

    Ok(())
}
