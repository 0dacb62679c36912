//! State store for published sensor states and run history.
//!
//! Uses `rusqlite` (bundled `SQLite`). Each sensor keeps exactly one
//! state row, replaced after every run, plus an append-only run log.

mod connection;
/// Append-only run history.
pub mod history;
mod migrations;
mod publish;
/// Last published state per sensor.
pub mod states;

#[allow(clippy::module_name_repetitions)]
pub use connection::open_db;
pub use rusqlite::Connection;
pub use history::{RunRecord, load_history, record_run};
pub use publish::publish_run;
pub use states::{StoredState, load_state, load_states, save_state};
