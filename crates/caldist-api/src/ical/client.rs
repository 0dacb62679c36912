//! `IcalClient` - plain HTTP calendar feed client.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::LocalCalendarFeed;
use super::parse::parse_calendar;
use super::types::CalendarEvent;
use crate::http;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// iCalendar feed client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct IcalClient {
    /// HTTP client.
    http_client: Client,
}

/// Builder for `IcalClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct IcalClientBuilder {
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl IcalClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            user_agent: None,
            timeout: None,
        }
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
    pub fn build(self) -> Result<IcalClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(IcalClient { http_client })
    }
}

impl IcalClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> IcalClientBuilder {
        IcalClientBuilder::new()
    }
}

impl LocalCalendarFeed for IcalClient {
    #[instrument(skip_all)]
    async fn fetch_events(&self, url: &str, default_tz: Tz) -> Result<Vec<CalendarEvent>> {
        let feed_url = Url::parse(url).context("invalid calendar URL")?;
        let request = self
            .http_client
            .get(feed_url)
            .build()
            .context("failed to build calendar request")?;

        let (status, body) = http::execute(&self.http_client, request)
            .await
            .context("failed to fetch calendar feed")?;
        if !status.is_success() {
            bail!("calendar feed returned HTTP {status}");
        }

        parse_calendar(&body, default_tz)
    }
}
