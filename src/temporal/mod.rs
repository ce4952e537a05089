//! String to date/time conversion.
//!
//! Every function here is a pure function of its input and a
//! [`SettingsSnapshot`]. Failures are reported as `InvalidValue` errors
//! wrapping a [`TemporalParseError`].

mod scanner;

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use thiserror::Error;

use crate::config::{SettingsSnapshot, TemporalKind, Timezone};
use crate::error::{DomainError, ErrorKind, translate};
use scanner::{DateParts, TimeParts, scan_date, scan_time};

/// Years written with one or two digits below this are placed in the 2000s,
/// the rest in the 1900s.
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 69;

/// Low-level parse failure, wrapped into an `InvalidValue` [`DomainError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalParseError {
    #[error("invalid date: {0:?}")]
    Date(String),
    #[error("invalid time: {0:?}")]
    Time(String),
    #[error("invalid datetime: {0:?}")]
    DateTime(String),
    #[error("local time {0:?} does not exist in the local timezone")]
    NonexistentLocalTime(String),
}

/// Result of [`TemporalConverter::parse_datetime`], shaped by `datetime_class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeValue {
    /// Absolute time with the offset it was written in (or the typecast timezone's).
    Instant(DateTime<FixedOffset>),
    /// Wall-clock date and time as written; any offset in the input is dropped.
    Civil(NaiveDateTime),
}

impl DateTimeValue {
    #[must_use]
    pub fn kind(&self) -> TemporalKind {
        match self {
            DateTimeValue::Instant(_) => TemporalKind::Instant,
            DateTimeValue::Civil(_) => TemporalKind::CivilDateTime,
        }
    }

    /// Wall-clock reading of the value.
    #[must_use]
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            DateTimeValue::Instant(dt) => dt.naive_local(),
            DateTimeValue::Civil(naive) => *naive,
        }
    }

    #[must_use]
    pub fn as_instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            DateTimeValue::Instant(dt) => Some(*dt),
            DateTimeValue::Civil(_) => None,
        }
    }
}

/// Parses strings under the settings captured in a snapshot.
///
/// ```rust
/// use sql_bootstrap::config::SettingsSnapshot;
/// use sql_bootstrap::temporal::TemporalConverter;
/// use chrono::Datelike;
///
/// let mut settings = SettingsSnapshot::default();
/// let converter = TemporalConverter::new(settings);
/// assert_eq!(converter.parse_date("01/02/03")?.year(), 2003);
///
/// settings.convert_two_digit_years = false;
/// let converter = TemporalConverter::new(settings);
/// assert_eq!(converter.parse_date("01/02/03")?.year(), 3);
/// # Ok::<(), sql_bootstrap::error::DomainError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TemporalConverter {
    settings: SettingsSnapshot,
}

impl TemporalConverter {
    #[must_use]
    pub fn new(settings: SettingsSnapshot) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsSnapshot {
        &self.settings
    }

    /// Parse a calendar date, ignoring any time of day that follows it.
    ///
    /// # Errors
    ///
    /// `InvalidValue` if `input` is not a recognizable, valid date.
    pub fn parse_date(&self, input: &str) -> Result<NaiveDate, DomainError> {
        parse_date_with(input, self.settings.convert_two_digit_years).map_err(invalid_value)
    }

    /// Parse a date and time according to `datetime_class`.
    ///
    /// # Errors
    ///
    /// `InvalidValue` if `input` is not a recognizable, valid datetime.
    pub fn parse_datetime(&self, input: &str) -> Result<DateTimeValue, DomainError> {
        let parsed = match self.settings.datetime_class {
            TemporalKind::CivilDateTime => {
                parse_civil(input, self.settings.convert_two_digit_years).map(DateTimeValue::Civil)
            }
            TemporalKind::Instant => {
                parse_instant(input, self.settings.typecast_timezone).map(DateTimeValue::Instant)
            }
        };
        parsed.map_err(invalid_value)
    }

    /// Parse a time of day. A full datetime string yields its time part.
    ///
    /// # Errors
    ///
    /// `InvalidValue` if no valid time of day can be read from `input`.
    pub fn parse_time(&self, input: &str) -> Result<NaiveTime, DomainError> {
        parse_time_of_day(input).map_err(invalid_value)
    }
}

fn invalid_value(err: TemporalParseError) -> DomainError {
    translate(err, ErrorKind::InvalidValue)
}

/// Map a one- or two-digit year into 1969..=2068 when `convert` is set.
#[must_use]
pub fn window_year(year: i32, digits: usize, convert: bool) -> i32 {
    if !convert || digits > 2 {
        year
    } else if year < TWO_DIGIT_YEAR_PIVOT {
        2000 + year
    } else {
        1900 + year
    }
}

fn parse_date_with(input: &str, convert: bool) -> Result<NaiveDate, TemporalParseError> {
    scan_date(input)
        .and_then(|parts| to_date(&parts, convert))
        .ok_or_else(|| TemporalParseError::Date(input.to_string()))
}

fn parse_civil(input: &str, convert: bool) -> Result<NaiveDateTime, TemporalParseError> {
    let fail = || TemporalParseError::DateTime(input.to_string());
    let parts = scan_date(input).ok_or_else(fail)?;
    let date = to_date(&parts, convert).ok_or_else(fail)?;
    let time = match parts.rest {
        Some(rest) => scan_time(rest).and_then(to_time).ok_or_else(fail)?,
        None => NaiveTime::MIN,
    };
    Ok(date.and_time(time))
}

fn parse_instant(
    input: &str,
    zone: Option<Timezone>,
) -> Result<DateTime<FixedOffset>, TemporalParseError> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt);
    }

    let fail = || TemporalParseError::DateTime(input.to_string());
    let parts = scan_date(trimmed).ok_or_else(fail)?;
    let date = to_date(&parts, false).ok_or_else(fail)?;
    let (time, offset) = match parts.rest.map(scan_time) {
        Some(Some(t)) => (to_time(t).ok_or_else(fail)?, t.offset),
        Some(None) => return Err(fail()),
        None => (NaiveTime::MIN, None),
    };
    let naive = date.and_time(time);

    match offset {
        Some(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(fail),
        None => in_zone(&naive, zone)
            .ok_or_else(|| TemporalParseError::NonexistentLocalTime(input.to_string())),
    }
}

fn in_zone(naive: &NaiveDateTime, zone: Option<Timezone>) -> Option<DateTime<FixedOffset>> {
    match zone {
        Some(Timezone::Utc) => Some(Utc.from_utc_datetime(naive).fixed_offset()),
        Some(Timezone::Local) | None => Local
            .from_local_datetime(naive)
            .earliest()
            .map(|dt| dt.fixed_offset()),
    }
}

fn parse_time_of_day(input: &str) -> Result<NaiveTime, TemporalParseError> {
    let fail = || TemporalParseError::Time(input.to_string());
    let parts = match scan_time(input) {
        Some(parts) => parts,
        None => scan_date(input)
            .and_then(|date| date.rest)
            .and_then(scan_time)
            .ok_or_else(fail)?,
    };
    to_time(parts).ok_or_else(fail)
}

fn to_date(parts: &DateParts<'_>, convert: bool) -> Option<NaiveDate> {
    let year = window_year(parts.year, parts.year_digits, convert);
    NaiveDate::from_ymd_opt(year, parts.month, parts.day)
}

fn to_time(parts: TimeParts) -> Option<NaiveTime> {
    NaiveTime::from_hms_nano_opt(parts.hour, parts.minute, parts.second, parts.nanos)
}
