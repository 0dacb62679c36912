//! Sensor runs: client wiring, pipeline execution and persistence.

use anyhow::{Context, Result};
use caldist_api::geoapify::GeoapifyClient;
use caldist_api::ical::IcalClient;
use caldist_api::sunset::SunsetClient;
use caldist_core::{DistancePipeline, PipelineSettings, RunResult, SensorState, unique_id};
use caldist_db::{Connection, StoredState, publish_run};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, instrument, warn};
use url::Url;

use crate::config::{EndpointsConfig, SensorConfig};

/// User agent sent to every external service.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Builds a Geoapify client for `api_key`, honoring the endpoint override.
///
/// # Errors
///
/// Returns an error if the override is not a URL or the client fails to build.
pub fn build_geoapify_client(api_key: &str, endpoints: &EndpointsConfig) -> Result<GeoapifyClient> {
    let mut builder = GeoapifyClient::builder()
        .api_key(api_key)
        .user_agent(USER_AGENT);
    if let Some(base) = &endpoints.geoapify {
        builder = builder.base_url(parse_endpoint(base)?);
    }
    builder.build().context("failed to build Geoapify client")
}

/// Builds a sunrise-sunset client, honoring the endpoint override.
///
/// # Errors
///
/// Returns an error if the override is not a URL or the client fails to build.
pub fn build_sunset_client(endpoints: &EndpointsConfig) -> Result<SunsetClient> {
    let mut builder = SunsetClient::builder().user_agent(USER_AGENT);
    if let Some(base) = &endpoints.sunset {
        builder = builder.base_url(parse_endpoint(base)?);
    }
    builder.build().context("failed to build sunrise-sunset client")
}

/// Builds the calendar feed client.
///
/// # Errors
///
/// Returns an error if the client fails to build.
pub fn build_ical_client() -> Result<IcalClient> {
    IcalClient::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build calendar client")
}

fn parse_endpoint(base: &str) -> Result<Url> {
    Url::parse(base).with_context(|| format!("invalid endpoint URL: {base}"))
}

/// A configured sensor with its clients.
#[derive(Debug)]
pub struct Sensor<'a> {
    config: &'a SensorConfig,
    settings: PipelineSettings,
    unique_id: String,
    geoapify: GeoapifyClient,
    sunset: SunsetClient,
    ical: IcalClient,
}

impl<'a> Sensor<'a> {
    /// Validates `config` and builds the clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the API key is missing,
    /// or a client fails to build.
    pub fn new(config: &'a SensorConfig, endpoints: &EndpointsConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.resolve_api_key()?;
        Ok(Self {
            config,
            settings: config.pipeline_settings()?,
            unique_id: unique_id(&config.name, &api_key, &config.url),
            geoapify: build_geoapify_client(&api_key, endpoints)?,
            sunset: build_sunset_client(endpoints)?,
            ical: build_ical_client()?,
        })
    }

    /// Sensor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configured timezone.
    #[must_use]
    pub const fn time_zone(&self) -> Tz {
        self.settings.time_zone
    }

    /// Runs the pipeline once at `now` and stores the resulting state.
    ///
    /// A failed run is a regular result; only storage errors are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be stored.
    #[instrument(skip_all, fields(sensor = %self.config.name))]
    pub async fn update(&self, conn: &Connection, now: DateTime<Tz>) -> Result<SensorState> {
        let pipeline = DistancePipeline::new(&self.geoapify, &self.geoapify, &self.sunset, &self.ical);
        let result = pipeline.run(&self.settings, now).await;
        let state = SensorState::from(&result);
        state.log(&self.config.name);
        self.store(conn, &state, &result, &now)?;
        Ok(state)
    }

    fn store(
        &self,
        conn: &Connection,
        state: &SensorState,
        result: &RunResult,
        now: &DateTime<Tz>,
    ) -> Result<()> {
        let attributes =
            serde_json::to_string(&state.attributes).context("failed to serialize attributes")?;
        let stored = StoredState {
            name: self.config.name.clone(),
            unique_id: self.unique_id.clone(),
            native_value: state.native_value,
            unit: state.unit_of_measurement.to_owned(),
            icon: self.config.icon.clone(),
            attributes,
            updated_at: now.to_rfc3339(),
        };
        publish_run(conn, &stored, result.distance(), result.error())?;
        Ok(())
    }

    /// Updates now and then every `scan_interval_secs`, forever.
    ///
    /// Runs never overlap; ticks missed while a run is in flight are
    /// skipped. Storage errors are logged and polling continues.
    pub async fn watch(&self, conn: &Connection) {
        let period = self.config.scan_interval();
        info!(sensor = %self.config.name, secs = period.as_secs(), "polling");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = Utc::now().with_timezone(&self.settings.time_zone);
            if let Err(e) = self.update(conn, now).await {
                warn!(sensor = %self.config.name, error = %format!("{e:#}"), "update failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]

    use caldist_db::{load_history, load_state, open_db};
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    fn sensor_config(feed_url: String) -> SensorConfig {
        toml::from_str(&format!(
            r#"
            name = "Arbeitsweg"
            home = "Berlin"
            api_key = "test-key"
            url = "{feed_url}"
            "#
        ))
        .unwrap()
    }

    fn endpoints(server: &MockServer) -> EndpointsConfig {
        EndpointsConfig {
            geoapify: Some(server.uri()),
            sunset: Some(server.uri()),
        }
    }

    async fn mount_services(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/geocode/search"))
            .and(query_param("apiKey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../fixtures/geoapify/geocode_munich.json"
            )))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/routing"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../fixtures/geoapify/routing_berlin_munich.json"
            )))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../fixtures/sunset/berlin_2024_06_21.json"
            )))
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        // Arrange & Act
        let result = parse_endpoint("not a url");

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid endpoint URL: not a url")
        );
    }

    #[test]
    fn test_sensor_new_validates_config() {
        // Arrange
        let mut config = sensor_config(String::from("https://calendar.example/feed.ics"));
        config.minimum = -5.0;

        // Act
        let result = Sensor::new(&config, &EndpointsConfig::default());

        // Assert
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_stores_success_state_and_history() {
        // Arrange
        let server = MockServer::start().await;
        mount_services(&server).await;
        Mock::given(method("GET"))
            .and(path("/feed.ics"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../../fixtures/ical/sample.ics")),
            )
            .mount(&server)
            .await;
        let config = sensor_config(format!("{}/feed.ics", server.uri()));
        let sensor = Sensor::new(&config, &endpoints(&server)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(Some(dir.path())).unwrap();
        let now = BERLIN.with_ymd_and_hms(2024, 6, 21, 9, 0, 0).unwrap();

        // Act
        let state = sensor.update(&conn, now).await.unwrap();

        // Assert
        assert_eq!(state.native_value, Some(2000.0));
        let stored = load_state(&conn, "Arbeitsweg").unwrap().unwrap();
        assert_eq!(stored.native_value, Some(2000.0));
        assert_eq!(stored.unit, "km");
        assert_eq!(stored.icon, "mdi:calendar-expand-horizontal");
        assert!(stored.unique_id.starts_with("calendar_distance_Arbeitswegtest-key"));
        let attributes: serde_json::Value = serde_json::from_str(&stored.attributes).unwrap();
        assert_eq!(
            attributes["Ziele"],
            serde_json::json!({"Munich": 1000.0, "Potsdam": 1000.0})
        );
        assert_eq!(attributes["Tageswechsel-Zeit"], "21:33:21");
        assert!(attributes.get("Fehler").is_none());
        let history = load_history(&conn, "Arbeitsweg", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].distance, Some(2000.0));
    }

    #[tokio::test]
    async fn test_update_stores_failure_state() {
        // Arrange
        let server = MockServer::start().await;
        mount_services(&server).await;
        Mock::given(method("GET"))
            .and(path("/feed.ics"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let config = sensor_config(format!("{}/feed.ics", server.uri()));
        let sensor = Sensor::new(&config, &endpoints(&server)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(Some(dir.path())).unwrap();
        let now = BERLIN.with_ymd_and_hms(2024, 6, 21, 9, 0, 0).unwrap();

        // Act
        let state = sensor.update(&conn, now).await.unwrap();

        // Assert
        assert_eq!(state.state_text(), "unknown");
        let stored = load_state(&conn, "Arbeitsweg").unwrap().unwrap();
        assert_eq!(stored.native_value, None);
        let attributes: serde_json::Value = serde_json::from_str(&stored.attributes).unwrap();
        assert!(
            attributes["Fehler"]
                .as_str()
                .unwrap()
                .starts_with("GET ICAL: ")
        );
        assert!(attributes.get("Ziele").is_none());
        let history = load_history(&conn, "Arbeitsweg", 10).unwrap();
        assert!(history[0].error.as_deref().unwrap().starts_with("GET ICAL: "));
    }
}
