//! Calendar event selection.

use anyhow::{Result, bail};
use caldist_api::ical::{CalendarEvent, EventStart};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

/// Placeholder for an empty event summary in warnings.
const EMPTY_SUMMARY: &str = "<LEER>";

/// Destinations and warnings selected from one calendar feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Event locations in feed order, duplicates kept.
    pub destinations: Vec<String>,
    /// One warning per eligible event without a location.
    pub warnings: Vec<String>,
}

/// Selects the events relevant for `now`.
///
/// Before the day switch only today's events count; after it, timed
/// events of today and tomorrow and all-day events of tomorrow count.
/// Timed events must also start after `now`. Dates are taken in the
/// timezone of `now`.
///
/// # Errors
///
/// Returns an error naming the summary of the first event without a
/// usable start.
pub fn select_destinations(
    events: &[CalendarEvent],
    now: &DateTime<Tz>,
    day_switch: &DateTime<Tz>,
) -> Result<Selection> {
    let tz = now.timezone();
    let today = now.date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    let after_switch = now > day_switch;

    let mut selection = Selection::default();
    for event in events {
        let Some(start) = &event.start else {
            bail!("event \"{}\" has no usable start", event.summary);
        };

        let eligible = match start {
            EventStart::DateTime(at) => {
                let date = at.with_timezone(&tz).date_naive();
                at > now && timed_date_matches(date, today, tomorrow, after_switch)
            }
            EventStart::Date(date) => {
                *date == if after_switch { tomorrow } else { today }
            }
        };
        if !eligible {
            continue;
        }

        let location = event.location.trim();
        if location.is_empty() {
            let summary = if event.summary.is_empty() {
                EMPTY_SUMMARY
            } else {
                event.summary.as_str()
            };
            selection.warnings.push(format!(
                "Für den Termin \"{summary}\" konnte kein Ort gefunden werden!"
            ));
            continue;
        }

        debug!(summary = %event.summary, location, "selected event");
        selection.destinations.push(location.to_owned());
    }

    Ok(selection)
}

fn timed_date_matches(
    date: NaiveDate,
    today: NaiveDate,
    tomorrow: NaiveDate,
    after_switch: bool,
) -> bool {
    date == today || (after_switch && date == tomorrow)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        BERLIN.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn timed(summary: &str, start: DateTime<Tz>, location: &str) -> CalendarEvent {
        CalendarEvent {
            summary: summary.to_owned(),
            start: Some(EventStart::DateTime(start)),
            location: location.to_owned(),
        }
    }

    fn all_day(summary: &str, date: NaiveDate, location: &str) -> CalendarEvent {
        CalendarEvent {
            summary: summary.to_owned(),
            start: Some(EventStart::Date(date)),
            location: location.to_owned(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_before_switch_selects_only_today() {
        // Arrange
        let now = at(2024, 6, 21, 9, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let events = vec![
            timed("Heute", at(2024, 6, 21, 14, 0), "Munich"),
            timed("Morgen", at(2024, 6, 22, 10, 0), "Hamburg"),
            all_day("Ganztags heute", date(2024, 6, 21), "Potsdam"),
            all_day("Ganztags morgen", date(2024, 6, 22), "Leipzig"),
        ];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert_eq!(selection.destinations, vec!["Munich", "Potsdam"]);
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn test_after_switch_selects_tomorrow() {
        // Arrange
        let now = at(2024, 6, 21, 22, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let events = vec![
            timed("Spaet heute", at(2024, 6, 21, 23, 0), "Munich"),
            timed("Morgen", at(2024, 6, 22, 10, 0), "Hamburg"),
            all_day("Ganztags heute", date(2024, 6, 21), "Potsdam"),
            all_day("Ganztags morgen", date(2024, 6, 22), "Leipzig"),
        ];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert_eq!(
            selection.destinations,
            vec!["Munich", "Hamburg", "Leipzig"]
        );
    }

    #[test]
    fn test_now_equal_to_switch_counts_as_before() {
        // Arrange
        let now = at(2024, 6, 21, 21, 33);
        let events = vec![
            all_day("Ganztags heute", date(2024, 6, 21), "Potsdam"),
            all_day("Ganztags morgen", date(2024, 6, 22), "Leipzig"),
        ];

        // Act
        let selection = select_destinations(&events, &now, &now).unwrap();

        // Assert
        assert_eq!(selection.destinations, vec!["Potsdam"]);
    }

    #[test]
    fn test_timed_event_in_the_past_is_skipped() {
        // Arrange
        let now = at(2024, 6, 21, 15, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let events = vec![
            timed("Vorbei", at(2024, 6, 21, 14, 0), "Munich"),
            timed("Jetzt", now, "Dresden"),
        ];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert!(selection.destinations.is_empty());
    }

    #[test]
    fn test_timed_event_date_is_taken_in_local_timezone() {
        // Arrange: 23:30 UTC on the 21st is already the 22nd in Berlin
        let now = at(2024, 6, 21, 9, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let start = chrono_tz::UTC
            .with_ymd_and_hms(2024, 6, 21, 23, 30, 0)
            .unwrap();
        let events = vec![CalendarEvent {
            summary: "Nacht".to_owned(),
            start: Some(EventStart::DateTime(start)),
            location: "Munich".to_owned(),
        }];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert!(selection.destinations.is_empty());
    }

    #[test]
    fn test_missing_location_emits_warning() {
        // Arrange
        let now = at(2024, 6, 21, 9, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let events = vec![
            timed("Standup", at(2024, 6, 21, 10, 0), ""),
            timed("", at(2024, 6, 21, 11, 0), "   "),
            timed("Kundentermin", at(2024, 6, 21, 14, 0), "Munich"),
        ];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert_eq!(selection.destinations, vec!["Munich"]);
        assert_eq!(
            selection.warnings,
            vec![
                "Für den Termin \"Standup\" konnte kein Ort gefunden werden!",
                "Für den Termin \"<LEER>\" konnte kein Ort gefunden werden!",
            ]
        );
    }

    #[test]
    fn test_ineligible_event_without_location_is_silent() {
        // Arrange
        let now = at(2024, 6, 21, 9, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let events = vec![all_day("Urlaub", date(2024, 6, 25), "")];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert_eq!(selection, Selection::default());
    }

    #[test]
    fn test_duplicates_are_kept_in_feed_order() {
        // Arrange
        let now = at(2024, 6, 21, 9, 0);
        let switch = at(2024, 6, 21, 21, 33);
        let events = vec![
            timed("A", at(2024, 6, 21, 10, 0), "Munich"),
            timed("B", at(2024, 6, 21, 12, 0), "Potsdam"),
            timed("C", at(2024, 6, 21, 16, 0), "Munich"),
        ];

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert_eq!(selection.destinations, vec!["Munich", "Potsdam", "Munich"]);
    }

    #[test]
    fn test_past_event_from_dst_gap_does_not_block_today() {
        // Arrange
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:old@example.com\r\n\
                   SUMMARY:Alt\r\n\
                   DTSTART;TZID=Europe/Berlin:20240331T023000\r\n\
                   LOCATION:Leipzig\r\n\
                   END:VEVENT\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:today@example.com\r\n\
                   SUMMARY:Kundentermin\r\n\
                   DTSTART;TZID=Europe/Berlin:20240621T140000\r\n\
                   LOCATION:Munich\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = caldist_api::ical::parse_calendar(ics, BERLIN).unwrap();
        let now = at(2024, 6, 21, 9, 0);
        let switch = at(2024, 6, 21, 21, 33);

        // Act
        let selection = select_destinations(&events, &now, &switch).unwrap();

        // Assert
        assert_eq!(selection.destinations, vec!["Munich"]);
    }

    #[test]
    fn test_event_without_start_fails() {
        // Arrange
        let now = at(2024, 6, 21, 9, 0);
        let events = vec![CalendarEvent {
            summary: "Kaputt".to_owned(),
            start: None,
            location: "Munich".to_owned(),
        }];

        // Act
        let result = select_destinations(&events, &now, &now);

        // Assert
        assert_eq!(
            result.unwrap_err().to_string(),
            "event \"Kaputt\" has no usable start"
        );
    }
}
