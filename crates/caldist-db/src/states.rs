//! Last published state per sensor.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

/// A published sensor state as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredState {
    /// Sensor name, primary key.
    pub name: String,
    /// Derived unique id of the sensor.
    pub unique_id: String,
    /// Distance in km, `None` when the last run failed.
    pub native_value: Option<f64>,
    /// Unit of `native_value`.
    pub unit: String,
    /// Icon identifier.
    pub icon: String,
    /// Attributes as a JSON object.
    pub attributes: String,
    /// RFC 3339 timestamp of the run.
    pub updated_at: String,
}

const SELECT_COLUMNS: &str =
    "SELECT name, unique_id, native_value, unit, icon, attributes, updated_at FROM sensor_states";

fn from_row(row: &Row<'_>) -> rusqlite::Result<StoredState> {
    Ok(StoredState {
        name: row.get(0)?,
        unique_id: row.get(1)?,
        native_value: row.get(2)?,
        unit: row.get(3)?,
        icon: row.get(4)?,
        attributes: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Replaces the stored state of `state.name` as a whole.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn save_state(conn: &Connection, state: &StoredState) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sensor_states
            (name, unique_id, native_value, unit, icon, attributes, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            state.name,
            state.unique_id,
            state.native_value,
            state.unit,
            state.icon,
            state.attributes,
            state.updated_at
        ],
    )
    .with_context(|| format!("failed to save state of sensor {}", state.name))?;

    debug!(sensor = %state.name, "state saved");
    Ok(())
}

/// Loads the stored state of one sensor.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_state(conn: &Connection, name: &str) -> Result<Option<StoredState>> {
    conn.query_row(&format!("{SELECT_COLUMNS} WHERE name = ?1"), [name], from_row)
        .optional()
        .with_context(|| format!("failed to load state of sensor {name}"))
}

/// Loads all stored states, ordered by name.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_states(conn: &Connection) -> Result<Vec<StoredState>> {
    let mut stmt = conn
        .prepare(&format!("{SELECT_COLUMNS} ORDER BY name"))
        .context("failed to prepare sensor_states query")?;

    let rows = stmt
        .query_map([], from_row)
        .context("failed to query sensor_states")?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read sensor_states rows")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::connection::open_db;

    fn setup_db() -> (Connection, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(Some(dir.path())).unwrap();
        (conn, dir)
    }

    fn state(name: &str, value: Option<f64>, attributes: &str) -> StoredState {
        StoredState {
            name: name.to_owned(),
            unique_id: format!("calendar_distance_{name}"),
            native_value: value,
            unit: String::from("km"),
            icon: String::from("mdi:calendar-expand-horizontal"),
            attributes: attributes.to_owned(),
            updated_at: String::from("2024-06-21T09:00:00+02:00"),
        }
    }

    #[test]
    fn test_save_and_load_state() {
        // Arrange
        let (conn, _dir) = setup_db();
        let saved = state("Arbeitsweg", Some(1000.0), r#"{"Ziele":{"Munich":1000.0}}"#);

        // Act
        save_state(&conn, &saved).unwrap();
        let loaded = load_state(&conn, "Arbeitsweg").unwrap();

        // Assert
        assert_eq!(loaded, Some(saved));
    }

    #[test]
    fn test_save_replaces_previous_state() {
        // Arrange
        let (conn, _dir) = setup_db();
        save_state(&conn, &state("Arbeitsweg", Some(1000.0), r#"{"Ziele":{}}"#)).unwrap();

        // Act
        save_state(&conn, &state("Arbeitsweg", None, r#"{"Fehler":"GET ICAL: x"}"#)).unwrap();
        let all = load_states(&conn).unwrap();

        // Assert
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].native_value, None);
        assert_eq!(all[0].attributes, r#"{"Fehler":"GET ICAL: x"}"#);
    }

    #[test]
    fn test_load_unknown_state() {
        // Arrange
        let (conn, _dir) = setup_db();

        // Act
        let loaded = load_state(&conn, "missing").unwrap();

        // Assert
        assert_eq!(loaded, None);
    }

    #[test]
    fn test_load_states_ordered_by_name() {
        // Arrange
        let (conn, _dir) = setup_db();
        save_state(&conn, &state("b", Some(10.0), "{}")).unwrap();
        save_state(&conn, &state("a", Some(20.0), "{}")).unwrap();

        // Act
        let all = load_states(&conn).unwrap();

        // Assert
        let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
