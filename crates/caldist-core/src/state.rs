//! Published sensor state.
//!
//! The state is rebuilt from a [`RunResult`] after every run, so no
//! attribute from an earlier run survives.

use serde::Serialize;
use tracing::{info, warn};

use crate::breakdown::DistanceBreakdown;
use crate::day_switch::DaySwitchMode;
use crate::pipeline::RunResult;

/// Fixed attribution attribute.
pub const ATTRIBUTION: &str = "Integration powered by Boerner";

/// Unit of the published distance.
pub const UNIT_KM: &str = "km";

/// State text published when the run failed.
pub const STATE_UNKNOWN: &str = "unknown";

/// Attributes published next to the distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAttributes {
    /// Always [`ATTRIBUTION`].
    pub attribution: &'static str,
    /// Failure message.
    #[serde(rename = "Fehler", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Warnings, only when at least one was raised.
    #[serde(rename = "Warnungen", skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Distance breakdown.
    #[serde(rename = "Ziele", skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<DistanceBreakdown>,
    /// Day-switch mode.
    #[serde(rename = "Tageswechsel-Art", skip_serializing_if = "Option::is_none")]
    pub day_switch: Option<DaySwitchMode>,
    /// Day-switch time of day, `HH:MM:SS`.
    #[serde(rename = "Tageswechsel-Zeit", skip_serializing_if = "Option::is_none")]
    pub day_switch_time: Option<String>,
}

/// Snapshot of a sensor after one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    /// Distance in km, `None` when the run failed.
    pub native_value: Option<f64>,
    /// Always [`UNIT_KM`].
    pub unit_of_measurement: &'static str,
    /// Published attributes.
    pub attributes: SensorAttributes,
}

impl SensorState {
    /// State text: the distance with one decimal, or `unknown`.
    #[must_use]
    pub fn state_text(&self) -> String {
        self.native_value
            .map_or_else(|| STATE_UNKNOWN.to_owned(), |km| format!("{km:.1}"))
    }

    /// Logs the outcome of a run for `sensor`.
    pub fn log(&self, sensor: &str) {
        match &self.attributes.error {
            Some(error) => warn!(sensor, %error, "distance unknown"),
            None => info!(
                sensor,
                distance = %self.state_text(),
                unit = self.unit_of_measurement,
                "distance updated"
            ),
        }
    }
}

impl From<&RunResult> for SensorState {
    fn from(result: &RunResult) -> Self {
        match result {
            RunResult::Done(report) => Self {
                native_value: Some(report.distance),
                unit_of_measurement: UNIT_KM,
                attributes: SensorAttributes {
                    attribution: ATTRIBUTION,
                    error: None,
                    warnings: (!report.warnings.is_empty()).then(|| report.warnings.clone()),
                    breakdown: Some(report.breakdown.clone()),
                    day_switch: Some(report.day_switch),
                    day_switch_time: Some(report.day_switch_at.format("%H:%M:%S").to_string()),
                },
            },
            RunResult::Failed { error } => Self {
                native_value: None,
                unit_of_measurement: UNIT_KM,
                attributes: SensorAttributes {
                    attribution: ATTRIBUTION,
                    error: Some(error.clone()),
                    warnings: None,
                    breakdown: None,
                    day_switch: None,
                    day_switch_time: None,
                },
            },
        }
    }
}

/// Stable identifier of a configured sensor.
#[must_use]
pub fn unique_id(name: &str, api_key: &str, url: &str) -> String {
    format!("calendar_distance_{name}{api_key}{url}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;
    use chrono_tz::Tz;
    use serde_json::json;
    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;
    use crate::pipeline::RunReport;

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    fn report(warnings: Vec<String>) -> RunResult {
        let mut breakdown = DistanceBreakdown::new();
        breakdown.insert("Munich", 1000.0);
        RunResult::Done(RunReport {
            distance: 1000.0,
            warnings,
            breakdown,
            day_switch: DaySwitchMode::Sunset,
            day_switch_at: BERLIN.with_ymd_and_hms(2024, 6, 21, 21, 33, 21).unwrap(),
        })
    }

    #[test]
    fn test_success_attributes() {
        // Arrange
        let result = report(Vec::new());

        // Act
        let state = SensorState::from(&result);

        // Assert
        assert_eq!(state.state_text(), "1000.0");
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({
                "native_value": 1000.0,
                "unit_of_measurement": "km",
                "attributes": {
                    "attribution": "Integration powered by Boerner",
                    "Ziele": {"Munich": 1000.0},
                    "Tageswechsel-Art": "Sunset",
                    "Tageswechsel-Zeit": "21:33:21"
                }
            })
        );
    }

    #[test]
    fn test_warnings_are_published_on_success() {
        // Arrange
        let warning = "Für den Termin \"Standup\" konnte kein Ort gefunden werden!".to_owned();
        let result = report(vec![warning.clone()]);

        // Act
        let state = SensorState::from(&result);

        // Assert
        assert_eq!(state.attributes.warnings, Some(vec![warning]));
        assert_eq!(state.attributes.error, None);
    }

    #[test]
    fn test_failure_carries_only_error() {
        // Arrange
        let result = RunResult::Failed {
            error: "GET ICAL: failed to fetch calendar feed".to_owned(),
        };

        // Act
        let state = SensorState::from(&result);

        // Assert
        assert_eq!(state.state_text(), "unknown");
        assert_eq!(
            serde_json::to_value(&state.attributes).unwrap(),
            json!({
                "attribution": "Integration powered by Boerner",
                "Fehler": "GET ICAL: failed to fetch calendar feed"
            })
        );
    }

    #[test]
    fn test_state_text_keeps_one_decimal() {
        // Arrange
        let mut state = SensorState::from(&report(Vec::new()));
        state.native_value = Some(71.0);

        // Act & Assert
        assert_eq!(state.state_text(), "71.0");
    }

    #[test]
    fn test_unique_id() {
        // Arrange & Act
        let id = unique_id("Arbeitsweg", "key", "https://calendar.example/feed.ics");

        // Assert
        assert_eq!(
            id,
            "calendar_distance_Arbeitswegkeyhttps://calendar.example/feed.ics"
        );
    }

    #[test]
    fn test_log_success_at_info() {
        // Arrange
        let state = SensorState::from(&report(Vec::new()));
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::INFO))
            .only()
            .run_with_handle();

        // Act
        with_default(subscriber, || state.log("Arbeitsweg"));

        // Assert
        handle.assert_finished();
    }

    #[test]
    fn test_log_failure_at_warn() {
        // Arrange
        let state = SensorState::from(&RunResult::Failed {
            error: "GET ICAL: boom".to_owned(),
        });
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::WARN))
            .only()
            .run_with_handle();

        // Act
        with_default(subscriber, || state.log("Arbeitsweg"));

        // Assert
        handle.assert_finished();
    }
}
