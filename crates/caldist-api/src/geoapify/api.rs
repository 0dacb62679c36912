//! `GeocodeApi` and `RoutingApi` trait definitions.
#![allow(clippy::future_not_send)]

use anyhow::Result;

use super::types::RouteDistance;
use crate::coordinate::Coordinate;

/// Geocoding API trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(GeocodeApi: Send)]
pub trait LocalGeocodeApi {
    /// Resolves a free-text place to the coordinate of the best match.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails, or if the
    /// provider returns no result.
    async fn geocode(&self, text: &str) -> Result<Coordinate>;
}

/// Routing API trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(RoutingApi: Send)]
pub trait LocalRoutingApi {
    /// Computes the one-way driving distance from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON parsing fails, or if the
    /// provider returns no route.
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteDistance>;
}
