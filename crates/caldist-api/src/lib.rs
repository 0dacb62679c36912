//! API client library for caldist.
//!
//! Provides clients for the Geoapify geocoding and routing APIs, the
//! sunrise-sunset.org API, and plain iCalendar feeds.

/// Latitude/longitude pair shared by all clients.
pub mod coordinate;

/// Geoapify geocoding and routing client.
pub mod geoapify;

/// iCalendar feed client and parser.
pub mod ical;

/// sunrise-sunset.org API client.
pub mod sunset;

mod http;

pub use coordinate::Coordinate;
