//! Lenient date and timestamp parsing for source records
//!
//! HR exports and event logs disagree on formats, so every date-bearing field
//! accepts any of:
//! - `YYYY-MM-DD`
//! - `YYYY-MM-DDTHH:MM:SS[.fraction]`
//! - `YYYY-MM-DD HH:MM:SS[.fraction]`
//! - RFC 3339 (offset is dropped, wall-clock time is kept)
//!
//! Years outside `0001..=9999` are rejected like any malformed value.

use crate::error::ComputeError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parse a timestamp in any of the accepted source formats.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ComputeError> {
    let trimmed = raw.trim();
    let parsed = parse_any(trimmed).ok_or_else(|| {
        ComputeError::DateParseError(format!("unrecognised timestamp '{trimmed}'"))
    })?;

    if !YEAR_RANGE.contains(&parsed.year()) {
        return Err(ComputeError::DateParseError(format!(
            "year {} out of range in '{trimmed}'",
            parsed.year()
        )));
    }
    Ok(parsed)
}

fn parse_any(trimmed: &str) -> Option<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_local());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Parse a calendar date; timestamps are truncated to their date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ComputeError> {
    parse_timestamp(raw).map(|ts| ts.date())
}

pub(crate) fn de_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn de_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

/// Null, missing and blank values all mean "no date".
pub(crate) fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(value) if !value.trim().is_empty() => parse_date(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
