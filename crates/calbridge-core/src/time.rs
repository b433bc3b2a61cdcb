//! Time handling for CalDAV and iCalendar values.
//!
//! This module provides:
//! - [`format_caldav_utc`] for the basic UTC form (`YYYYMMDDTHHMMSSZ`) used in
//!   CalDAV filters and written iCalendar properties
//! - [`EventTime`] and [`parse_ical_datetime`] for decoding DTSTART/DTEND/UNTIL
//!   values, with or without a `TZID`
//! - [`parse_ical_duration`] for DURATION values
//! - [`TimeRange`] for `time-range` queries whose end may be open

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// The chrono format string for the CalDAV basic UTC form.
pub const CALDAV_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const ICAL_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const ICAL_DATE_FORMAT: &str = "%Y%m%d";

/// Errors raised while decoding iCalendar time values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The value is not a DATE or DATE-TIME.
    #[error("invalid date-time value: {0:?}")]
    InvalidDateTime(String),

    /// The value is not a DURATION.
    #[error("invalid duration value: {0:?}")]
    InvalidDuration(String),

    /// A time range whose end precedes its start.
    #[error("time range end {end} is before start {start}")]
    InvertedRange {
        /// Requested start.
        start: DateTime<Utc>,
        /// Requested end.
        end: DateTime<Utc>,
    },
}

/// Renders an instant in the CalDAV basic UTC form, e.g. `20240131T235959Z`.
pub fn format_caldav_utc(dt: &DateTime<Utc>) -> String {
    dt.format(CALDAV_UTC_FORMAT).to_string()
}

/// A decoded DTSTART/DTEND value.
///
/// iCalendar distinguishes DATE-TIME values from all-day DATE values; the
/// distinction matters when a missing DTEND has to be derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day date.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Returns `true` if this is an all-day date.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC instant. All-day dates map to midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

/// Decodes an iCalendar DATE or DATE-TIME value.
///
/// Handles:
/// - `20250205T100000Z` (UTC)
/// - `20250205T100000` with a `TZID` (resolved through the IANA database)
/// - `20250205T100000` without a `TZID` (floating, treated as UTC)
/// - `20250205` (all-day date)
///
/// Unknown time zone identifiers fall back to UTC.
pub fn parse_ical_datetime(value: &str, tzid: Option<&str>) -> Result<EventTime, TimeError> {
    let value = value.trim();
    let invalid = || TimeError::InvalidDateTime(value.to_string());

    if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(value, ICAL_DATE_FORMAT).map_err(|_| invalid())?;
        return Ok(EventTime::AllDay(date));
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, ICAL_LOCAL_FORMAT).map_err(|_| invalid())?;
        return Ok(EventTime::DateTime(Utc.from_utc_datetime(&naive)));
    }

    let naive = NaiveDateTime::parse_from_str(value, ICAL_LOCAL_FORMAT).map_err(|_| invalid())?;
    let dt = match tzid {
        Some(tzid) => resolve_local(&naive, tzid),
        None => Utc.from_utc_datetime(&naive),
    };
    Ok(EventTime::DateTime(dt))
}

/// Resolves a local wall-clock time in the named zone to UTC.
fn resolve_local(naive: &NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    let name = tzid.trim_matches('"').trim_start_matches('/');
    let Ok(tz) = name.parse::<Tz>() else {
        warn!(tzid = %tzid, "Unknown time zone, treating local time as UTC");
        return Utc.from_utc_datetime(naive);
    };

    // Times inside a DST gap do not exist; shift them past the gap.
    tz.from_local_datetime(naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(naive))
}

/// Decodes an iCalendar DURATION value such as `PT1H30M`, `P1D` or `-P2W`.
pub fn parse_ical_duration(value: &str) -> Result<Duration, TimeError> {
    let invalid = || TimeError::InvalidDuration(value.to_string());
    let mut rest = value.trim();

    let negative = match rest.as_bytes().first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let mut rest = rest.strip_prefix('P').ok_or_else(invalid)?;
    let mut total = Duration::zero();
    let mut in_time = false;
    let mut seen_component = false;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('T') {
            if in_time {
                return Err(invalid());
            }
            in_time = true;
            rest = after;
            continue;
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(invalid());
        }
        let amount: i64 = rest[..digits].parse().map_err(|_| invalid())?;
        let unit = rest[digits..].chars().next().ok_or_else(invalid)?;
        rest = &rest[digits + unit.len_utf8()..];

        let component = match (unit, in_time) {
            ('W', false) => Duration::try_weeks(amount),
            ('D', false) => Duration::try_days(amount),
            ('H', true) => Duration::try_hours(amount),
            ('M', true) => Duration::try_minutes(amount),
            ('S', true) => Duration::try_seconds(amount),
            _ => return Err(invalid()),
        };
        // Out-of-range amounts are rejected rather than saturated.
        total = component
            .and_then(|c| total.checked_add(&c))
            .ok_or_else(invalid)?;
        seen_component = true;
    }

    if !seen_component {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}

/// A CalDAV `time-range` for list queries.
///
/// The start is always present; an absent end leaves the range open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range.
    pub start: DateTime<Utc>,
    /// End of the range, if bounded.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Creates an open-ended range starting at `start`.
    pub fn starting(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Creates a bounded range.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::InvertedRange`] if `end` is before `start`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        Self::new(start, Some(end))
    }

    /// Creates a range with an optional end.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::InvertedRange`] if `end` is before `start`.
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self, TimeError> {
        if let Some(end) = end
            && end < start
        {
            return Err(TimeError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns `true` if the range has no end bound.
    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }
}
