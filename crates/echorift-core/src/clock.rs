//! Wall-clock and simulation-tick time for the event.
//!
//! Two notions of time meet here:
//!
//! - **Simulation ticks** drive the scheduler. A tick is 1/20 of a second
//!   of game time; every interval in the configuration is given in seconds
//!   and converted with [`seconds_to_ticks`].
//! - **Wall-clock instants** bound lifetimes. Zone and event deadlines are
//!   UTC timestamps compared against a [`WallClock`], which tests replace
//!   with a [`ManualClock`].
//!
//! The auto-start window is computed in a configured [`EventTimeZone`].

use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;

/// Simulation ticks per second of game time.
pub const TICKS_PER_SECOND: u64 = 20;

/// Errors that can occur while interpreting time configuration.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The configured time zone is not `system`, a UTC offset or a zone name.
    #[error("invalid time zone {value}: {reason}")]
    InvalidTimeZone {
        /// The rejected value.
        value: String,
        /// Why the parser rejected it.
        reason: String,
    },

    /// A time-of-day string could not be parsed.
    #[error("invalid time of day: {value}")]
    InvalidTimeOfDay {
        /// The rejected value.
        value: String,
    },
}

/// Convert seconds of game time to simulation ticks (saturating).
pub const fn seconds_to_ticks(seconds: u64) -> u64 {
    seconds.saturating_mul(TICKS_PER_SECOND)
}

/// Parse a `HH:MM` or `HH:MM:SS` time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ClockError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_err| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_err| ClockError::InvalidTimeOfDay {
            value: value.to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Wall clocks
// ---------------------------------------------------------------------------

/// Source of the current UTC instant.
pub trait WallClock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.checked_add_signed(delta).unwrap_or(*guard);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = instant;
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Time zones
// ---------------------------------------------------------------------------

/// Time zone the daily auto-start window is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTimeZone {
    /// The host's local time zone.
    System,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
    /// A named zone from the tz database, following its DST rules.
    Iana(Tz),
}

impl EventTimeZone {
    /// Parse `system`, `UTC`, an offset such as `+03:00` / `UTC-05:30`,
    /// or a tz database name such as `Europe/Berlin`.
    pub fn parse(value: &str) -> Result<Self, ClockError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("system") {
            return Ok(Self::System);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::Fixed(Utc.fix()));
        }
        let offset = trimmed
            .strip_prefix("UTC")
            .or_else(|| trimmed.strip_prefix("utc"))
            .unwrap_or(trimmed);
        if offset.starts_with(['+', '-']) {
            return FixedOffset::from_str(offset)
                .map(Self::Fixed)
                .map_err(|e| ClockError::InvalidTimeZone {
                    value: value.to_owned(),
                    reason: e.to_string(),
                });
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Iana)
            .map_err(|e| ClockError::InvalidTimeZone {
                value: value.to_owned(),
                reason: e.to_string(),
            })
    }

    /// The calendar date at `now` in this zone.
    pub fn date_at(self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::System => now.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => now.with_timezone(&offset).date_naive(),
            Self::Iana(tz) => now.with_timezone(&tz).date_naive(),
        }
    }

    /// The UTC instant of `date` at `time` in this zone.
    ///
    /// Returns `None` for local times that do not exist (DST gaps).
    pub fn instant_at(self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        let naive = date.and_time(time);
        match self {
            Self::System => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Iana(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Today's `[start, end]` window around `now`.
    pub fn day_window(
        self,
        now: DateTime<Utc>,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = self.date_at(now);
        Some((self.instant_at(today, start)?, self.instant_at(today, end)?))
    }
}
