/// Temporal-point normalization.
///
/// Annotations are written by hand, by scripts and by the CLI, so the same
/// instant shows up as `"2012"`, `"2012-03"`, `"2012-03-01"`,
/// `"2012-03-01T00:00:00Z"` or as an already-typed chrono value. Everything
/// funnels through `normalize`, which returns a UTC `Instant`.
///
/// Naive inputs (strings without an offset, `NaiveDateTime`, `NaiveDate`) are
/// *assumed* to be UTC, never local time. Aware inputs are converted to UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use std::fmt;

use crate::model::{CurationError, Instant, Result};

// ---------------------------------------------------------------------------
// Accepted inputs
// ---------------------------------------------------------------------------

/// Any value `normalize` knows how to turn into an `Instant`.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    /// Year, year-month, full date, or date-time text, with or without offset.
    Text(String),
    /// A date-time without timezone; tagged as UTC.
    Naive(NaiveDateTime),
    /// A calendar date; midnight UTC.
    Date(NaiveDate),
    /// A timezone-aware value, already converted to UTC.
    Aware(Instant),
}

impl From<&str> for TimeInput {
    fn from(value: &str) -> Self {
        TimeInput::Text(value.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(value: String) -> Self {
        TimeInput::Text(value)
    }
}

impl From<&String> for TimeInput {
    fn from(value: &String) -> Self {
        TimeInput::Text(value.clone())
    }
}

impl From<NaiveDateTime> for TimeInput {
    fn from(value: NaiveDateTime) -> Self {
        TimeInput::Naive(value)
    }
}

impl From<NaiveDate> for TimeInput {
    fn from(value: NaiveDate) -> Self {
        TimeInput::Date(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TimeInput {
    fn from(value: DateTime<Tz>) -> Self {
        TimeInput::Aware(value.with_timezone(&Utc))
    }
}

impl fmt::Display for TimeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInput::Text(s) => write!(f, "{}", s),
            TimeInput::Naive(dt) => write!(f, "{}", dt),
            TimeInput::Date(d) => write!(f, "{}", d),
            TimeInput::Aware(dt) => write!(f, "{}", format_instant(dt)),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Date-time layouts that carry an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Date-time layouts without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Normalizes any supported temporal value to a UTC `Instant`.
///
/// Fails with `InvalidTimestamp` when the value matches none of the
/// recognized representations.
pub fn normalize(value: impl Into<TimeInput>) -> Result<Instant> {
    match value.into() {
        TimeInput::Text(text) => parse_text(&text),
        TimeInput::Naive(dt) => Ok(Utc.from_utc_datetime(&dt)),
        TimeInput::Date(d) => Ok(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
        TimeInput::Aware(dt) => Ok(dt),
    }
}

/// Normalizes every value of an iterator, stopping at the first failure.
pub fn normalize_all<I, T>(values: I) -> Result<Vec<Instant>>
where
    I: IntoIterator<Item = T>,
    T: Into<TimeInput>,
{
    values.into_iter().map(normalize).collect()
}

fn parse_text(raw: &str) -> Result<Instant> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(invalid(raw, "empty value"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    // A trailing `Z` after a space-separated date-time is not RFC 3339.
    let with_offset = match text.strip_suffix(['Z', 'z']) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => text.to_string(),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return normalize(d);
    }

    parse_partial_date(text)
        .map(normalize)
        .unwrap_or_else(|| Err(invalid(raw, "not a recognized date or date-time")))
}

/// Parses `YYYY` and `YYYY-MM`, anchored to the first day of the period.
fn parse_partial_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.split('-');
    let year = parts.next()?;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;

    let month = match parts.next() {
        None => 1,
        Some(m) if (1..=2).contains(&m.len()) && m.chars().all(|c| c.is_ascii_digit()) => {
            m.parse().ok()?
        }
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn invalid(value: &str, reason: &str) -> CurationError {
    CurationError::InvalidTimestamp {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Canonical textual form of an instant: RFC 3339, `Z` suffix, sub-second
/// digits only when present. `normalize(format_instant(t)) == t` for every `t`.
pub fn format_instant(instant: &Instant) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
