//! iCalendar parsing.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event, EventLike,
};

use super::types::{CalendarEvent, EventStart};

/// Parses an iCalendar document and returns its events in document order.
///
/// Events without a usable `DTSTART` are kept with `start: None` so that the
/// caller can decide how to treat them.
///
/// # Errors
///
/// Returns an error if `ics` is not an iCalendar document.
pub fn parse_calendar(ics: &str, default_tz: Tz) -> Result<Vec<CalendarEvent>> {
    if !ics.trim_start().starts_with("BEGIN:VCALENDAR") {
        bail!("document is not an iCalendar file");
    }
    let calendar: Calendar = ics
        .parse()
        .map_err(|e| anyhow!("failed to parse iCalendar document: {e}"))?;

    let events: Vec<CalendarEvent> = calendar
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(convert_event(event, default_tz)),
            _ => None,
        })
        .collect();

    tracing::debug!(events = events.len(), "Parsed iCalendar document");
    Ok(events)
}

/// Reduces a `VEVENT` to a [`CalendarEvent`].
fn convert_event(event: &Event, default_tz: Tz) -> CalendarEvent {
    let summary = String::from(event.get_summary().unwrap_or_default());
    let location = String::from(event.get_location().unwrap_or_default());
    let start = event
        .get_start()
        .and_then(|start| convert_start(start, default_tz));

    if start.is_none() {
        tracing::debug!(summary = %summary, "Event has no usable DTSTART");
    }

    CalendarEvent {
        summary,
        start,
        location,
    }
}

/// Resolves a `DTSTART` value to an [`EventStart`].
///
/// Local times inside a DST gap are moved forward by one hour, which is the
/// instant the pre-gap offset describes.
fn convert_start(start: DatePerhapsTime, default_tz: Tz) -> Option<EventStart> {
    match start {
        DatePerhapsTime::Date(date) => Some(EventStart::Date(date)),
        DatePerhapsTime::DateTime(value) => {
            let resolved = match value {
                CalendarDateTime::Utc(utc) => utc.with_timezone(&Tz::UTC),
                CalendarDateTime::Floating(naive) => resolve_local(default_tz, &naive)?,
                CalendarDateTime::WithTimezone { date_time, tzid } => {
                    resolve_local(resolve_tzid(&tzid, default_tz), &date_time)?
                }
            };
            Some(EventStart::DateTime(resolved))
        }
    }
}

/// Resolves a wall-clock time in `tz`, taking the earlier instant when it is
/// ambiguous and skipping forward over a DST gap.
fn resolve_local(tz: Tz, naive: &NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(naive).earliest().or_else(|| {
        tracing::debug!(local = %naive, tz = %tz, "Local time falls in a DST gap");
        tz.from_local_datetime(&(*naive + TimeDelta::hours(1)))
            .earliest()
    })
}

/// Maps a `TZID` parameter to an IANA timezone, falling back to `default_tz`.
fn resolve_tzid(tzid: &str, default_tz: Tz) -> Tz {
    let name = tzid.trim_matches('"').trim_start_matches('/');
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::debug!(tzid = %tzid, fallback = %default_tz, "Unknown TZID, using fallback");
        default_tz
    })
}
