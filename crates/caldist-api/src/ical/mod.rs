//! iCalendar feed module.
//!
//! Downloads a calendar feed over plain HTTP and parses its `VEVENT`
//! components into [`CalendarEvent`] values.

mod api;
mod client;
mod parse;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{CalendarFeed, LocalCalendarFeed};
#[allow(clippy::module_name_repetitions)]
pub use client::{IcalClient, IcalClientBuilder};
pub use parse::parse_calendar;
pub use types::{CalendarEvent, EventStart};
