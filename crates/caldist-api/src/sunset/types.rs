//! sunrise-sunset.org response types.

use serde::Deserialize;

/// Top-level response.
///
/// `results` is an object on success but an empty string on errors, so it
/// is kept untyped until `status` has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct SunsetEnvelope {
    /// `OK`, `INVALID_REQUEST`, `INVALID_DATE`, `UNKNOWN_ERROR`, `INVALID_TZID`.
    pub status: String,
    /// Raw `results` value.
    #[serde(default)]
    pub results: serde_json::Value,
}

/// `results` object of a successful response with `formatted=0`.
#[derive(Debug, Clone, Deserialize)]
pub struct SunsetResults {
    /// Sunset as ISO 8601 with offset.
    pub sunset: String,
}
