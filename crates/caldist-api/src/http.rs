//! Shared request execution for the API clients.

use anyhow::{Context, Result};
use reqwest::{Client, Request, StatusCode};
use url::Url;

/// Query parameters whose values are masked before a URL is logged.
const SECRET_PARAMS: &[&str] = &["apiKey"];

/// Returns `url` with secret query values replaced by `***`.
pub fn redact_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if SECRET_PARAMS.contains(&key.as_ref()) {
                String::from("***")
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// Executes a prepared request and returns the status with the full body.
///
/// Transport errors are stripped of their URL so that API keys never end up
/// in error messages.
///
/// # Errors
///
/// Returns an error if the request cannot be sent or the body cannot be read.
pub async fn execute(client: &Client, request: Request) -> Result<(StatusCode, String)> {
    let path = String::from(request.url().path());
    tracing::debug!(url = %redact_url(request.url()), "HTTP request");

    let result = client
        .execute(request)
        .await
        .map_err(reqwest::Error::without_url);
    let response = result.with_context(|| format!("request failed: {path}"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("failed to read response body: {path}"))?;

    tracing::debug!(%status, bytes = body.len(), "HTTP response");
    Ok((status, body))
}
