//! sunrise-sunset.org API client module.
//!
//! Looks up the sunset instant for a coordinate and date.

mod api;
mod client;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalSunsetApi, SunsetApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{SunsetClient, SunsetClientBuilder};
