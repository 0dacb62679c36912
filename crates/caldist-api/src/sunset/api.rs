//! `SunsetApi` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::coordinate::Coordinate;

/// Sunset lookup trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(SunsetApi: Send)]
pub trait LocalSunsetApi {
    /// Returns the sunset instant at `at` on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails, or if the
    /// API reports a non-`OK` status.
    async fn sunset(&self, at: Coordinate, date: NaiveDate) -> Result<DateTime<FixedOffset>>;
}
