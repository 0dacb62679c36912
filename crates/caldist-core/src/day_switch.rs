//! Day-switch instant resolution.
//!
//! The day switch is the moment after which event selection looks at
//! tomorrow instead of today. It is either the sunset at the home location
//! or a fixed time of day.
#![allow(clippy::future_not_send)]

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use caldist_api::Coordinate;
use caldist_api::sunset::LocalSunsetApi;
use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;

/// Fixed-time literal: `H:MM` or `H:MM:SS`, hours unbounded like a duration.
#[allow(clippy::expect_used)]
static FIXED_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3}):([0-5]\d)(?::([0-5]\d))?$").expect("failed to compile fixed time regex")
});

/// Configured day-switch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DaySwitchMode {
    /// Sunset at the home coordinate.
    Sunset,
    /// Fixed time of day.
    FixedTime,
}

impl DaySwitchMode {
    /// Label published in the `Tageswechsel-Art` attribute.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sunset => "Sunset",
            Self::FixedTime => "FixedTime",
        }
    }
}

impl fmt::Display for DaySwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DaySwitchMode {
    type Err = anyhow::Error;

    /// Accepts `Sunset`, `FixedTime` and the legacy spelling `FixTime`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Sunset" => Ok(Self::Sunset),
            "FixedTime" | "FixTime" => Ok(Self::FixedTime),
            other => bail!("Parameter is not valid! ({other})"),
        }
    }
}

/// Day-switch policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySwitchPolicy {
    /// Sunset at the home coordinate on the current date.
    Sunset,
    /// Local midnight plus the given offset.
    FixedTime(TimeDelta),
}

impl DaySwitchPolicy {
    /// Builds a fixed-time policy from a `H:MM[:SS]` literal.
    ///
    /// # Errors
    ///
    /// Returns an error if the literal is malformed.
    pub fn fixed(literal: &str) -> Result<Self> {
        parse_fixed_time(literal).map(Self::FixedTime)
    }

    /// Mode of this policy.
    #[must_use]
    pub const fn mode(&self) -> DaySwitchMode {
        match self {
            Self::Sunset => DaySwitchMode::Sunset,
            Self::FixedTime(_) => DaySwitchMode::FixedTime,
        }
    }

    /// Resolves the day-switch instant for the date of `now`, in the
    /// timezone of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sunset lookup fails or the fixed time does
    /// not exist on that date.
    pub async fn resolve(
        &self,
        sunset_api: &(impl LocalSunsetApi + Sync),
        home: Coordinate,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>> {
        match self {
            Self::Sunset => {
                let sunset = sunset_api.sunset(home, now.date_naive()).await?;
                Ok(sunset.with_timezone(&now.timezone()))
            }
            Self::FixedTime(offset) => fixed_time_instant(now, *offset),
        }
    }
}

/// Parses a `H:MM` or `H:MM:SS` literal into an offset from midnight.
///
/// # Errors
///
/// Returns an error if the literal does not match either form.
pub fn parse_fixed_time(literal: &str) -> Result<TimeDelta> {
    let caps = FIXED_TIME_RE
        .captures(literal.trim())
        .with_context(|| format!("invalid fixed time literal: {literal}"))?;

    let field = |index: usize| -> Result<i64> {
        caps.get(index)
            .map_or(Ok(0), |m| m.as_str().parse::<i64>())
            .with_context(|| format!("invalid fixed time literal: {literal}"))
    };
    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;

    TimeDelta::try_hours(hours)
        .and_then(|h| h.checked_add(&TimeDelta::try_minutes(minutes)?))
        .and_then(|hm| hm.checked_add(&TimeDelta::try_seconds(seconds)?))
        .with_context(|| format!("fixed time out of range: {literal}"))
}

/// Local midnight of `now`'s date plus `offset`, as wall-clock time.
///
/// # Errors
///
/// Returns an error if the resulting local time does not exist (DST gap)
/// or overflows.
pub fn fixed_time_instant(now: &DateTime<Tz>, offset: TimeDelta) -> Result<DateTime<Tz>> {
    let tz = now.timezone();
    let local = now
        .date_naive()
        .and_time(NaiveTime::MIN)
        .checked_add_signed(offset)
        .context("fixed time overflows the calendar")?;
    tz.from_local_datetime(&local)
        .earliest()
        .with_context(|| format!("{local} does not exist in {tz}"))
}
