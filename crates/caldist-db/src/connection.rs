//! Opening the state store.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::migrations::run_migrations;

/// Database file name inside the data directory.
const DB_FILE: &str = "caldist.db";

/// How long a writer waits for a lock held by another `caldist` process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the state store and brings its schema up to date.
///
/// - If `dir` is `Some`, uses `{dir}/caldist.db`.
/// - Otherwise uses `$XDG_DATA_HOME/caldist/caldist.db`, falling back to
///   `~/.local/share/caldist/caldist.db`.
///
/// The store runs in WAL mode so `state` and `history` can read while a
/// `watch` process is writing.
///
/// # Errors
///
/// Returns an error if no data directory can be determined, the database
/// cannot be opened, or migrations fail.
pub fn open_db(dir: Option<&Path>) -> Result<Connection> {
    let data_dir = match dir {
        Some(d) => d.to_path_buf(),
        None => default_data_dir(
            std::env::var_os("XDG_DATA_HOME"),
            std::env::var_os("HOME"),
        )?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create directory {}", data_dir.display()))?;

    let db_path = data_dir.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("failed to enable WAL journal")?;

    run_migrations(&conn).context("database migration failed")?;

    tracing::debug!(path = %db_path.display(), journal_mode = %mode, "Opened state store");
    Ok(conn)
}

/// Per-user data directory of caldist.
///
/// A relative `XDG_DATA_HOME` is ignored, as the XDG base directory rules
/// require.
fn default_data_dir(xdg_data_home: Option<OsString>, home: Option<OsString>) -> Result<PathBuf> {
    if let Some(xdg) = xdg_data_home.map(PathBuf::from).filter(|p| p.is_absolute()) {
        return Ok(xdg.join("caldist"));
    }
    let home = home.context("neither XDG_DATA_HOME nor HOME is set")?;
    Ok(PathBuf::from(home).join(".local").join("share").join("caldist"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::migrations::CURRENT_VERSION;
    use crate::states::{StoredState, load_state, save_state};

    #[test]
    fn test_open_db_creates_missing_directory_in_wal_mode() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("caldist");

        // Act
        let conn = open_db(Some(&nested)).unwrap();

        // Assert
        assert!(nested.join(DB_FILE).exists());
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_keeps_stored_state() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let state = StoredState {
            name: String::from("Pendeln"),
            unique_id: String::from("calendar_distance_Pendeln"),
            native_value: Some(42.5),
            unit: String::from("km"),
            icon: String::from("mdi:car"),
            attributes: String::from("{}"),
            updated_at: String::from("2024-06-21T07:00:00+00:00"),
        };
        save_state(&open_db(Some(dir.path())).unwrap(), &state).unwrap();

        // Act
        let conn = open_db(Some(dir.path())).unwrap();

        // Assert
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
        assert_eq!(load_state(&conn, "Pendeln").unwrap(), Some(state));
    }

    #[test]
    fn test_default_data_dir_prefers_xdg_data_home() {
        // Arrange & Act
        let path = default_data_dir(
            Some(OsString::from("/srv/data")),
            Some(OsString::from("/home/pendler")),
        )
        .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/srv/data/caldist"));
    }

    #[test]
    fn test_default_data_dir_ignores_relative_xdg_data_home() {
        // Arrange & Act
        let path = default_data_dir(
            Some(OsString::from("data")),
            Some(OsString::from("/home/pendler")),
        )
        .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/home/pendler/.local/share/caldist"));
    }

    #[test]
    fn test_default_data_dir_without_home_fails() {
        // Arrange & Act
        let result = default_data_dir(None, None);

        // Assert
        assert!(result.unwrap_err().to_string().contains("HOME"));
    }
}
