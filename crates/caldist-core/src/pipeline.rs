//! Run orchestration.
//!
//! One run geocodes the home location, resolves the day switch, fetches
//! and filters the calendar, then geocodes and routes each destination in
//! feed order. The first failing stage ends the run; nothing is retried.
#![allow(clippy::future_not_send)]

use std::fmt;

use anyhow::{Context, Result};
use caldist_api::Coordinate;
use caldist_api::geoapify::{LocalGeocodeApi, LocalRoutingApi};
use caldist_api::ical::LocalCalendarFeed;
use caldist_api::sunset::LocalSunsetApi;
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{Adjustments, aggregate};
use crate::breakdown::DistanceBreakdown;
use crate::day_switch::{DaySwitchMode, DaySwitchPolicy};
use crate::selector::select_destinations;

/// Per-sensor inputs of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Free-text home location.
    pub home: String,
    /// iCalendar feed URL.
    pub url: String,
    /// Timezone for "today", the fixed day switch and floating times.
    pub time_zone: Tz,
    /// Day-switch mode string, parsed at the start of every run.
    pub day_switch: String,
    /// Fixed-time literal used by the `FixedTime` mode.
    pub fix_time: String,
    /// Factor, offset and minimum.
    pub adjustments: Adjustments,
}

/// Stage label prefixed to a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage<'a> {
    /// Geocoding the home location.
    HomeGeocode(&'a str),
    /// Parsing the configured day-switch mode.
    DaySwitchMode,
    /// Resolving the day-switch instant.
    DaySwitch(DaySwitchMode),
    /// Fetching and parsing the calendar feed.
    CalendarFetch,
    /// Geocoding one destination.
    DestinationGeocode(&'a str),
    /// Routing from home to one destination.
    Route {
        /// Home location text.
        from: &'a str,
        /// Destination text.
        to: &'a str,
    },
}

impl fmt::Display for RunStage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HomeGeocode(home) => write!(f, "GET FROM-LOCATION({home})"),
            Self::DaySwitchMode => f.write_str("DAY_SWITCH"),
            Self::DaySwitch(mode) => write!(f, "GET DAY_SWITCH({mode})"),
            Self::CalendarFetch => f.write_str("GET ICAL"),
            Self::DestinationGeocode(dest) => write!(f, "GET TO-LOCATION({dest})"),
            Self::Route { from, to } => write!(f, "GET ROUTE({from})-({to})"),
        }
    }
}

/// Successful run output.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Total distance in km, one decimal.
    pub distance: f64,
    /// Non-fatal warnings, in feed order.
    pub warnings: Vec<String>,
    /// Per-destination and adjustment entries.
    pub breakdown: DistanceBreakdown,
    /// Mode used for the day switch.
    pub day_switch: DaySwitchMode,
    /// Resolved day-switch instant.
    pub day_switch_at: DateTime<Tz>,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    /// All stages succeeded.
    Done(RunReport),
    /// A stage failed; no partial data is kept.
    Failed {
        /// Stage label and cause chain.
        error: String,
    },
}

impl RunResult {
    /// Published distance, `None` on failure.
    #[must_use]
    pub const fn distance(&self) -> Option<f64> {
        match self {
            Self::Done(report) => Some(report.distance),
            Self::Failed { .. } => None,
        }
    }

    /// Failure message, `None` on success.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Done(_) => None,
            Self::Failed { error } => Some(error),
        }
    }
}

/// Orchestrates one distance run over borrowed API clients.
#[derive(Debug)]
pub struct DistancePipeline<'a, G, R, S, C> {
    geocoder: &'a G,
    router: &'a R,
    sunset: &'a S,
    calendar: &'a C,
}

impl<'a, G, R, S, C> DistancePipeline<'a, G, R, S, C>
where
    G: LocalGeocodeApi + Sync,
    R: LocalRoutingApi + Sync,
    S: LocalSunsetApi + Sync,
    C: LocalCalendarFeed + Sync,
{
    /// Creates a pipeline over the given clients.
    #[must_use]
    pub const fn new(geocoder: &'a G, router: &'a R, sunset: &'a S, calendar: &'a C) -> Self {
        Self {
            geocoder,
            router,
            sunset,
            calendar,
        }
    }

    /// Executes one run at `now`.
    ///
    /// Never fails: a stage error becomes [`RunResult::Failed`] carrying
    /// the stage label and the full cause chain.
    #[instrument(skip_all, fields(home = %settings.home))]
    pub async fn run(&self, settings: &PipelineSettings, now: DateTime<Tz>) -> RunResult {
        let now = now.with_timezone(&settings.time_zone);
        match self.try_run(settings, &now).await {
            Ok(report) => {
                info!(
                    distance = report.distance,
                    entries = report.breakdown.len(),
                    warnings = report.warnings.len(),
                    "run finished"
                );
                RunResult::Done(report)
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%error, "run failed");
                RunResult::Failed { error }
            }
        }
    }

    async fn try_run(&self, settings: &PipelineSettings, now: &DateTime<Tz>) -> Result<RunReport> {
        let home = self
            .geocoder
            .geocode(&settings.home)
            .await
            .with_context(|| RunStage::HomeGeocode(&settings.home).to_string())?;
        debug!(%home, "home geocoded");

        let mode: DaySwitchMode = settings
            .day_switch
            .parse()
            .with_context(|| RunStage::DaySwitchMode.to_string())?;
        let day_switch_at = self
            .resolve_day_switch(mode, &settings.fix_time, home, now)
            .await
            .with_context(|| RunStage::DaySwitch(mode).to_string())?;
        debug!(%mode, %day_switch_at, "day switch resolved");

        let selection = self
            .calendar
            .fetch_events(&settings.url, settings.time_zone)
            .await
            .and_then(|events| select_destinations(&events, now, &day_switch_at))
            .with_context(|| RunStage::CalendarFetch.to_string())?;
        debug!(
            destinations = selection.destinations.len(),
            warnings = selection.warnings.len(),
            "calendar filtered"
        );

        let mut routed = DistanceBreakdown::new();
        let mut sum: Option<f64> = None;
        for dest in &selection.destinations {
            let to = self
                .geocoder
                .geocode(dest)
                .await
                .with_context(|| RunStage::DestinationGeocode(dest).to_string())?;
            let route = self.router.route(home, to).await.with_context(|| {
                RunStage::Route {
                    from: &settings.home,
                    to: dest,
                }
                .to_string()
            })?;
            let km = route.round_trip_km();
            debug!(destination = %dest, km, "destination routed");
            sum = Some(sum.unwrap_or(0.0) + km);
            routed.insert(dest.as_str(), km);
        }

        let (distance, breakdown) = aggregate(sum, routed, &settings.adjustments);
        Ok(RunReport {
            distance,
            warnings: selection.warnings,
            breakdown,
            day_switch: mode,
            day_switch_at,
        })
    }

    async fn resolve_day_switch(
        &self,
        mode: DaySwitchMode,
        fix_time: &str,
        home: Coordinate,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>> {
        let policy = match mode {
            DaySwitchMode::Sunset => DaySwitchPolicy::Sunset,
            DaySwitchMode::FixedTime => DaySwitchPolicy::fixed(fix_time)?,
        };
        policy.resolve(self.sunset, home, now).await
    }
}
