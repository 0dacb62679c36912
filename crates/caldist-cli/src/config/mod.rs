//! Application configuration module.
//!
//! Manages the TOML config file listing the distance sensors and
//! optional API endpoint overrides.

#[allow(clippy::module_inception)]
mod config;

#[allow(clippy::module_name_repetitions)]
pub use config::{API_KEY_ENV, AppConfig, EndpointsConfig, SensorConfig};
