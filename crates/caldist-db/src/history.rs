//! Append-only log of finished runs.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// One finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Row id, assigned on insert.
    pub id: i64,
    /// Sensor name.
    pub name: String,
    /// RFC 3339 timestamp of the run.
    pub ran_at: String,
    /// Published distance, `None` on failure.
    pub distance: Option<f64>,
    /// Failure message, `None` on success.
    pub error: Option<String>,
}

/// Appends a run to the history and returns its row id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn record_run(
    conn: &Connection,
    name: &str,
    ran_at: &str,
    distance: Option<f64>,
    error: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO run_history (name, ran_at, distance, error) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![name, ran_at, distance, error],
    )
    .with_context(|| format!("failed to record run of sensor {name}"))?;

    Ok(conn.last_insert_rowid())
}

/// Loads the newest `limit` runs of one sensor, newest first.
///
/// Runs are ordered by insertion, since `ran_at` carries local offsets that
/// do not sort chronologically across a DST change.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_history(conn: &Connection, name: &str, limit: u32) -> Result<Vec<RunRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, ran_at, distance, error FROM run_history
             WHERE name = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .context("failed to prepare run_history query")?;

    let rows = stmt
        .query_map(rusqlite::params![name, limit], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                ran_at: row.get(2)?,
                distance: row.get(3)?,
                error: row.get(4)?,
            })
        })
        .context("failed to query run_history")?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read run_history rows")
}
