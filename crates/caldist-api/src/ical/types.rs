//! Calendar event types.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

/// Start of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStart {
    /// All-day event (`DTSTART;VALUE=DATE`).
    Date(NaiveDate),
    /// Timed event, resolved to a concrete timezone.
    DateTime(DateTime<Tz>),
}

/// A `VEVENT` reduced to the fields used for distance calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    /// `SUMMARY`, empty when absent.
    pub summary: String,
    /// `DTSTART`, `None` when absent or unparseable.
    pub start: Option<EventStart>,
    /// `LOCATION`, empty when absent.
    pub location: String,
}
