//! Publishing a finished run.

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::history::record_run;
use crate::states::{StoredState, save_state};

/// Replaces the sensor state and appends the run to the history, atomically.
///
/// `state.updated_at` doubles as the run timestamp. Returns the history row id.
///
/// # Errors
///
/// Returns an error if either write fails; nothing is stored in that case.
pub fn publish_run(
    conn: &Connection,
    state: &StoredState,
    distance: Option<f64>,
    error: Option<&str>,
) -> Result<i64> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;
    save_state(&tx, state)?;
    let id = record_run(&tx, &state.name, &state.updated_at, distance, error)?;
    tx.commit()
        .with_context(|| format!("failed to commit run of sensor {}", state.name))?;
    Ok(id)
}
