//! `AppConfig` struct and TOML read/write.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use caldist_core::{Adjustments, PipelineSettings};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when a sensor has no `api_key`.
pub const API_KEY_ENV: &str = "GEOAPIFY_API_KEY";

/// Config file name inside the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Configured distance sensors.
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    /// API endpoint overrides.
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

/// Base URLs of the external services. `None` uses the public endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EndpointsConfig {
    /// Geoapify geocoding and routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoapify: Option<String>,
    /// sunrise-sunset.org.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<String>,
}

/// One calendar distance sensor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorConfig {
    /// Display name, unique within the file.
    pub name: String,
    /// Free-text home location.
    pub home: String,
    /// Geoapify API key; falls back to `GEOAPIFY_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// iCalendar feed URL.
    pub url: String,
    /// IANA timezone name.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// `Sunset` or `FixedTime`.
    #[serde(default = "default_day_switch")]
    pub day_switch: String,
    /// Day-switch time for `FixedTime`, `H:MM[:SS]`.
    #[serde(default = "default_fix_time")]
    pub fix_time: String,
    /// Kilometers added to every total.
    #[serde(default)]
    pub offset: f64,
    /// Multiplier for the routed total.
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Lower bound of the published distance.
    #[serde(default = "default_minimum")]
    pub minimum: f64,
    /// Icon identifier stored with the state.
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Polling interval of `watch`.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
}

fn default_time_zone() -> String {
    String::from("Europe/Berlin")
}

fn default_day_switch() -> String {
    String::from("Sunset")
}

fn default_fix_time() -> String {
    String::from("22:00:00")
}

const fn default_factor() -> f64 {
    1.0
}

const fn default_minimum() -> f64 {
    10.0
}

fn default_icon() -> String {
    String::from("mdi:calendar-expand-horizontal")
}

const fn default_scan_interval() -> u64 {
    900
}

impl AppConfig {
    /// Resolves the config file path.
    ///
    /// - If `dir` is `Some`, returns `{dir}/config.toml`.
    /// - Otherwise returns `$XDG_CONFIG_HOME/caldist/config.toml`, falling
    ///   back to `~/.config/caldist/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is `None` and neither variable is set.
    pub fn path(dir: Option<&Path>) -> Result<PathBuf> {
        let config_dir = match dir {
            Some(d) => d.to_path_buf(),
            None => default_config_dir(
                std::env::var_os("XDG_CONFIG_HOME"),
                std::env::var_os("HOME"),
            )?,
        };
        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Looks up a sensor by name.
    #[must_use]
    pub fn sensor(&self, name: &str) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.name == name)
    }

    /// Selects one named sensor, or all sensors when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if no sensor is configured or `name` is unknown.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&SensorConfig>> {
        if self.sensors.is_empty() {
            bail!("no sensors configured; add a [[sensors]] table to config.toml");
        }
        match name {
            Some(n) => self
                .sensor(n)
                .map(|s| vec![s])
                .with_context(|| format!("unknown sensor: {n}")),
            None => Ok(self.sensors.iter().collect()),
        }
    }
}

/// Per-user config directory of caldist. A relative `XDG_CONFIG_HOME` is
/// ignored.
fn default_config_dir(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Result<PathBuf> {
    if let Some(xdg) = xdg_config_home.map(PathBuf::from).filter(|p| p.is_absolute()) {
        return Ok(xdg.join("caldist"));
    }
    let home = home.context("neither XDG_CONFIG_HOME nor HOME is set")?;
    Ok(PathBuf::from(home).join(".config").join("caldist"))
}

impl SensorConfig {
    /// Creates a sensor with default settings.
    #[must_use]
    pub fn new(name: &str, home: &str, url: &str) -> Self {
        Self {
            name: String::from(name),
            home: String::from(home),
            api_key: None,
            url: String::from(url),
            time_zone: default_time_zone(),
            day_switch: default_day_switch(),
            fix_time: default_fix_time(),
            offset: 0.0,
            factor: default_factor(),
            minimum: default_minimum(),
            icon: default_icon(),
            scan_interval_secs: default_scan_interval(),
        }
    }

    /// Sets the API key; `None` defers to `GEOAPIFY_API_KEY`.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the IANA timezone name.
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: &str) -> Self {
        self.time_zone = String::from(time_zone);
        self
    }

    /// Checks the fields that can be rejected before any run.
    ///
    /// The day-switch mode and fixed-time literal are checked per run.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.trim().is_empty(), "sensor name must not be empty");
        let name = &self.name;
        ensure!(!self.home.trim().is_empty(), "sensor {name}: home must not be empty");
        ensure!(!self.url.trim().is_empty(), "sensor {name}: url must not be empty");
        for (field, value) in [
            ("offset", self.offset),
            ("factor", self.factor),
            ("minimum", self.minimum),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "sensor {name}: {field} must be a non-negative number, got {value}"
            );
        }
        ensure!(
            self.scan_interval_secs > 0,
            "sensor {name}: scan_interval_secs must be positive"
        );
        self.tz()?;
        Ok(())
    }

    /// Parsed timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if `time_zone` is not a known IANA name.
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("sensor {}: invalid time_zone: {e}", self.name))
    }

    /// API key from the config or the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if neither is set.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(API_KEY_ENV).with_context(|| {
            format!(
                "sensor {}: no api_key configured and {API_KEY_ENV} is not set",
                self.name
            )
        })
    }

    /// Run inputs for the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone is invalid.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            home: self.home.clone(),
            url: self.url.clone(),
            time_zone: self.tz()?,
            day_switch: self.day_switch.clone(),
            fix_time: self.fix_time.clone(),
            adjustments: Adjustments {
                factor: self.factor,
                offset: self.offset,
                minimum: self.minimum,
            },
        })
    }

    /// Polling interval of `watch`.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}
