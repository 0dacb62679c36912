//! `GeoapifyClient` - Geoapify geocoding and routing client implementation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::{LocalGeocodeApi, LocalRoutingApi};
use super::types::{GeoapifyErrorResponse, GeocodeResponse, RouteDistance, RoutingResponse};
use crate::coordinate::Coordinate;
use crate::http;

/// Default base URL for the Geoapify API.
const DEFAULT_BASE_URL: &str = "https://api.geoapify.com/";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default travel mode for routing.
const DEFAULT_MODE: &str = "drive";

/// Default language for routing instructions.
const DEFAULT_LANG: &str = "de";

/// Geoapify API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct GeoapifyClient {
    /// HTTP client.
    http_client: Client,
    /// Base URL for API requests.
    base_url: Url,
    /// API key sent as the `apiKey` query parameter.
    api_key: String,
    /// Routing travel mode.
    mode: String,
    /// Routing language.
    lang: String,
}

/// Builder for `GeoapifyClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct GeoapifyClientBuilder {
    base_url: Option<Url>,
    api_key: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    mode: Option<String>,
    lang: Option<String>,
}

impl GeoapifyClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            user_agent: None,
            timeout: None,
            mode: None,
            lang: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
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

    /// Sets the routing travel mode (default: `drive`).
    #[must_use]
    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Sets the routing language (default: `de`).
    #[must_use]
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `api_key` is not set or empty.
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<GeoapifyClient> {
        let api_key = self.api_key.context("api_key is required")?;
        if api_key.trim().is_empty() {
            bail!("api_key must not be empty");
        }
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
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(GeoapifyClient {
            http_client,
            base_url,
            api_key,
            mode: self.mode.unwrap_or_else(|| String::from(DEFAULT_MODE)),
            lang: self.lang.unwrap_or_else(|| String::from(DEFAULT_LANG)),
        })
    }
}

impl GeoapifyClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> GeoapifyClientBuilder {
        GeoapifyClientBuilder::new()
    }

    /// Sends a GET request with the API key appended and decodes the JSON body.
    ///
    /// Every call is attempted exactly once.
    #[instrument(skip_all)]
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("failed to join URL path: {path}"))?;

        let request = self
            .http_client
            .get(url)
            .query(query)
            .query(&[("apiKey", self.api_key.as_str())])
            .build()
            .with_context(|| format!("failed to build request: {path}"))?;

        let (status, body) = http::execute(&self.http_client, request).await?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<GeoapifyErrorResponse>(&body) {
                bail!(
                    "Geoapify API error (HTTP {}): {}",
                    status,
                    error_response.message,
                );
            }
            bail!("Geoapify API error (HTTP {status}): {body}");
        }

        let raw_result: std::result::Result<T, _> = serde_json::from_str(&body);
        let parsed =
            raw_result.with_context(|| format!("failed to decode JSON response: {path}"))?;
        Ok(parsed)
    }
}

impl LocalGeocodeApi for GeoapifyClient {
    #[instrument(skip_all, fields(text = %text))]
    async fn geocode(&self, text: &str) -> Result<Coordinate> {
        let query = [
            ("text", String::from(text)),
            ("limit", String::from("1")),
            ("format", String::from("json")),
        ];
        let response: GeocodeResponse = self.get_json("v1/geocode/search", &query).await?;

        let first = response
            .results
            .into_iter()
            .next()
            .context("geocoding returned no results")?;

        tracing::debug!(
            lat = first.lat,
            lon = first.lon,
            formatted = first.formatted.as_deref().unwrap_or("-"),
            "Geocoded location"
        );
        Ok(Coordinate::new(first.lat, first.lon))
    }
}

impl LocalRoutingApi for GeoapifyClient {
    #[instrument(skip_all, fields(from = %from, to = %to))]
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteDistance> {
        let query = [
            ("waypoints", format!("{from}|{to}")),
            ("mode", self.mode.clone()),
            ("lang", self.lang.clone()),
        ];
        let response: RoutingResponse = self.get_json("v1/routing", &query).await?;

        let feature = response
            .features
            .into_iter()
            .next()
            .context("routing returned no route")?;

        if let Some(units) = feature
            .properties
            .distance_units
            .as_deref()
            .filter(|units| *units != "meters")
        {
            bail!("routing returned distance in {units}, expected meters");
        }
        let distance = RouteDistance::from_meters(feature.properties.distance);
        tracing::debug!(
            meters = distance.meters,
            seconds = feature.properties.time,
            "Route calculated"
        );
        Ok(distance)
    }
}
