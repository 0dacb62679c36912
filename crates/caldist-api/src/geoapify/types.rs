//! Geoapify API response types.

use serde::Deserialize;

/// Response of `GET /v1/geocode/search?format=json`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    /// Matches ordered by relevance.
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

/// One geocoding match.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Human readable address.
    #[serde(default)]
    pub formatted: Option<String>,
}

/// Response of `GET /v1/routing` (a GeoJSON feature collection).
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingResponse {
    /// One feature per calculated route.
    #[serde(default)]
    pub features: Vec<RouteFeature>,
}

/// A single route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteFeature {
    /// Route summary.
    pub properties: RouteProperties,
}

/// Summary values of a route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteProperties {
    /// Total distance in `distance_units` (meters for metric requests).
    pub distance: f64,
    /// Unit of `distance`.
    #[serde(default)]
    pub distance_units: Option<String>,
    /// Travel time in seconds.
    #[serde(default)]
    pub time: Option<f64>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoapifyErrorResponse {
    /// Error description.
    pub message: String,
}

/// One-way driving distance between two waypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteDistance {
    /// Distance in meters as reported by the provider.
    pub meters: f64,
}

impl RouteDistance {
    /// Creates a distance from meters.
    #[must_use]
    pub const fn from_meters(meters: f64) -> Self {
        Self { meters }
    }

    /// One-way distance in kilometers, with meters truncated to a whole number.
    #[must_use]
    pub fn one_way_km(&self) -> f64 {
        self.meters.trunc() / 1000.0
    }

    /// Outbound plus return distance in kilometers.
    #[must_use]
    pub fn round_trip_km(&self) -> f64 {
        self.one_way_km() * 2.0
    }
}
