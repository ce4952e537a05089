use std::sync::LazyLock;

use chrono::FixedOffset;
use regex::{Captures, Regex};

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!(stringify!($name), " is valid")));
    };
}

// Trailing `rest` groups capture whatever follows the date (usually a time).
pattern!(ISO_DATE, r"^\s*(\d{1,4})-(\d{1,2})-(\d{1,2})(?:(?:T|\s+)(?P<rest>.*))?$");
pattern!(SLASH_DATE, r"^\s*(\d{1,4})/(\d{1,2})/(\d{1,4})(?:(?:T|\s+)(?P<rest>.*))?$");
pattern!(COMPACT_DATE, r"^\s*(\d{4})(\d{2})(\d{2})(?:(?:T|\s+)(?P<rest>.*))?$");
pattern!(
    DAY_MONTH_DATE,
    r"^\s*(?:[A-Za-z]{3,9},\s*)?(\d{1,2})[\s\-]+([A-Za-z]{3,9})\.?[\s\-]+(\d{1,4})(?:\s+(?P<rest>.*))?$"
);
pattern!(
    MONTH_DAY_DATE,
    r"^\s*([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{1,4})(?:\s+(?P<rest>.*))?$"
);
pattern!(
    TIME_OF_DAY,
    r"(?i)^\s*(\d{1,2}):(\d{2})(?::(\d{2})(?:[.,](\d{1,9}))?)?\s*(am|pm)?\s*(z|utc|gmt|[+\-]\d{2}(?::?\d{2})?)?\s*$"
);

/// Numeric pieces of a date as written, before any year windowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DateParts<'a> {
    pub year: i32,
    /// Digits used to write the year; one or two digits are eligible for windowing.
    pub year_digits: usize,
    pub month: u32,
    pub day: u32,
    pub rest: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TimeParts {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanos: u32,
    pub offset: Option<FixedOffset>,
}

pub(super) fn scan_date(input: &str) -> Option<DateParts<'_>> {
    if let Some(caps) = ISO_DATE.captures(input) {
        return date_parts(&caps, 1, 2, 3);
    }
    if let Some(caps) = SLASH_DATE.captures(input) {
        // A leading year is only recognized when written with 3+ digits;
        // otherwise the US month/day/year order applies.
        return if caps[1].len() >= 3 {
            date_parts(&caps, 1, 2, 3)
        } else {
            date_parts(&caps, 3, 1, 2)
        };
    }
    if let Some(caps) = COMPACT_DATE.captures(input) {
        return date_parts(&caps, 1, 2, 3);
    }
    if let Some(caps) = DAY_MONTH_DATE.captures(input) {
        return named_month_parts(&caps, 3, 2, 1);
    }
    if let Some(caps) = MONTH_DAY_DATE.captures(input) {
        return named_month_parts(&caps, 3, 1, 2);
    }
    None
}

pub(super) fn scan_time(input: &str) -> Option<TimeParts> {
    let caps = TIME_OF_DAY.captures(input)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let nanos = caps.get(4).map_or(Some(0), |m| fraction_nanos(m.as_str()))?;

    if let Some(meridiem) = caps.get(5) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    let offset = match caps.get(6) {
        Some(zone) => Some(parse_offset(zone.as_str())?),
        None => None,
    };

    Some(TimeParts {
        hour,
        minute,
        second,
        nanos,
        offset,
    })
}

pub(super) fn month_from_name(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lower = name.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(lower.as_str()))
        .and_then(|idx| u32::try_from(idx + 1).ok())
}

fn date_parts<'a>(caps: &Captures<'a>, y: usize, m: usize, d: usize) -> Option<DateParts<'a>> {
    let year = caps.get(y)?.as_str();
    Some(DateParts {
        year: year.parse().ok()?,
        year_digits: year.len(),
        month: caps.get(m)?.as_str().parse().ok()?,
        day: caps.get(d)?.as_str().parse().ok()?,
        rest: rest(caps),
    })
}

fn named_month_parts<'a>(caps: &Captures<'a>, y: usize, m: usize, d: usize) -> Option<DateParts<'a>> {
    let year = caps.get(y)?.as_str();
    Some(DateParts {
        year: year.parse().ok()?,
        year_digits: year.len(),
        month: month_from_name(caps.get(m)?.as_str())?,
        day: caps.get(d)?.as_str().parse().ok()?,
        rest: rest(caps),
    })
}

fn rest<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.name("rest")
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn fraction_nanos(digits: &str) -> Option<u32> {
    let padded = format!("{digits:0<9}");
    padded.get(..9)?.parse().ok()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    if ["z", "utc", "gmt"]
        .iter()
        .any(|utc| zone.eq_ignore_ascii_case(utc))
    {
        return FixedOffset::east_opt(0);
    }
    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let digits: String = digits.chars().filter(char::is_ascii_digit).collect();
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = match digits.get(2..) {
        Some("") | None => 0,
        Some(m) => m.parse().ok()?,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
