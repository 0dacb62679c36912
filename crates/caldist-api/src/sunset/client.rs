//! `SunsetClient` - sunrise-sunset.org API client implementation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::LocalSunsetApi;
use super::types::{SunsetEnvelope, SunsetResults};
use crate::coordinate::Coordinate;
use crate::http;

/// Default base URL for the sunrise-sunset.org API.
const DEFAULT_BASE_URL: &str = "https://api.sunrise-sunset.org/";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// sunrise-sunset.org API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SunsetClient {
    /// HTTP client.
    http_client: Client,
    /// Base URL for API requests.
    base_url: Url,
}

/// Builder for `SunsetClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SunsetClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl SunsetClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            timeout: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the request timeout (default: 30s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<SunsetClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .context("failed to build HTTP client")?;

        Ok(SunsetClient {
            http_client,
            base_url,
        })
    }
}

impl SunsetClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> SunsetClientBuilder {
        SunsetClientBuilder::new()
    }
}

impl LocalSunsetApi for SunsetClient {
    #[instrument(skip_all, fields(at = %at, date = %date))]
    async fn sunset(&self, at: Coordinate, date: NaiveDate) -> Result<DateTime<FixedOffset>> {
        let url = self
            .base_url
            .join("json")
            .context("failed to join URL path: json")?;

        let request = self
            .http_client
            .get(url)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lng", at.lon.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
                ("formatted", String::from("0")),
            ])
            .build()
            .context("failed to build request: json")?;

        let (status, body) = http::execute(&self.http_client, request).await?;
        if !status.is_success() {
            bail!("sunrise-sunset API error (HTTP {status}): {body}");
        }

        let envelope: SunsetEnvelope =
            serde_json::from_str(&body).context("failed to decode JSON response: json")?;
        if envelope.status != "OK" {
            bail!("sunrise-sunset API returned status {}", envelope.status);
        }
        let results: SunsetResults =
            serde_json::from_value(envelope.results).context("missing results in response")?;

        let sunset = DateTime::parse_from_rfc3339(&results.sunset)
            .with_context(|| format!("invalid sunset timestamp: {}", results.sunset))?;
        tracing::debug!(%sunset, "Sunset resolved");
        Ok(sunset)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client_for(mock_server: &wiremock::MockServer) -> SunsetClient {
        let base_url = format!("{}/", mock_server.uri());
        SunsetClient::builder()
            .base_url(base_url.parse().unwrap())
            .user_agent("test/0.0.0")
            .build()
            .unwrap()
    }

    fn june_21() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = SunsetClient::builder().build();

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[tokio::test]
    async fn test_sunset_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/sunset/berlin_2024_06_21.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/json"))
            .and(wiremock::matchers::query_param("lat", "52.52"))
            .and(wiremock::matchers::query_param("lng", "13.405"))
            .and(wiremock::matchers::query_param("date", "2024-06-21"))
            .and(wiremock::matchers::query_param("formatted", "0"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let sunset = client
            .sunset(Coordinate::new(52.52, 13.405), june_21())
            .await
            .unwrap();

        // Assert
        assert_eq!(sunset.to_rfc3339(), "2024-06-21T19:33:21+00:00");
    }

    #[tokio::test]
    async fn test_sunset_non_ok_status_is_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/sunset/invalid_request.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let result = client.sunset(Coordinate::new(0.0, 0.0), june_21()).await;

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("returned status INVALID_REQUEST")
        );
    }

    #[tokio::test]
    async fn test_sunset_invalid_timestamp_is_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let body = r#"{"results":{"sunrise":"x","sunset":"not-a-date"},"status":"OK"}"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let result = client.sunset(Coordinate::new(0.0, 0.0), june_21()).await;

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid sunset timestamp: not-a-date")
        );
    }

    #[tokio::test]
    async fn test_sunset_http_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let result = client.sunset(Coordinate::new(0.0, 0.0), june_21()).await;

        // Assert
        assert!(result.unwrap_err().to_string().contains("HTTP 500"));
    }
}
