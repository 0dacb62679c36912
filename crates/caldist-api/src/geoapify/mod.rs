//! Geoapify API client module.
//!
//! Resolves free-text places to coordinates (`/v1/geocode/search`) and
//! computes driving distances between two coordinates (`/v1/routing`).

mod api;
mod client;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{GeocodeApi, LocalGeocodeApi, LocalRoutingApi, RoutingApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{GeoapifyClient, GeoapifyClientBuilder};
pub use types::RouteDistance;
