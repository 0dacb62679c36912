//! `CalendarFeed` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;
use chrono_tz::Tz;

use super::types::CalendarEvent;

/// Calendar feed trait.
///
/// Abstracts feed access for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(CalendarFeed: Send)]
pub trait LocalCalendarFeed {
    /// Fetches the feed at `url` and returns its events in document order.
    ///
    /// Floating date-times and unknown `TZID`s are interpreted in `default_tz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the document is not a
    /// valid iCalendar file.
    async fn fetch_events(&self, url: &str, default_tz: Tz) -> Result<Vec<CalendarEvent>>;
}
