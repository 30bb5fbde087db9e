//! Calendar-day parsing for history range queries.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::error::{Error, Result};

/// Parse a `YYYY-MM-DD` date as the first instant of that day, UTC.
pub fn parse_day_start(value: &str) -> Result<DateTime<Utc>> {
    let date = parse_day(value)?;
    // midnight always exists for a valid calendar date
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
}

/// Parse a `YYYY-MM-DD` date as the final instant of that day, UTC.
/// Range queries treat the end date inclusively, so "2024-03-01" means
/// everything up to 2024-03-01T23:59:59.999Z.
pub fn parse_day_end(value: &str) -> Result<DateTime<Utc>> {
    let date = parse_day(value)?;
    Ok(date.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc())
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("invalid date '{value}': {e}")))
}

/// Default reporting range start: January 1 of the current year.
pub fn year_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0).unwrap()
}

/// Default reporting range end: the final instant of today.
pub fn today_end(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap()
        .and_utc()
}

/// Resolve the reporting range start. A valid `YYYY-MM-DD` parses as that
/// day's first instant; an omitted or unparseable value falls back to
/// January 1 of the current year.
pub fn start_or_default(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    value
        .and_then(|v| parse_day_start(v).ok())
        .unwrap_or_else(|| year_start(now))
}

/// Resolve the reporting range end. A valid `YYYY-MM-DD` parses as that
/// day's final instant; an omitted or unparseable value falls back to the
/// final instant of today.
pub fn end_or_default(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    value
        .and_then(|v| parse_day_end(v).ok())
        .unwrap_or_else(|| today_end(now))
}

/// How long to sleep until the next UTC midnight, for the daily import.
pub fn until_next_midnight(now: DateTime<Utc>) -> std::time::Duration {
    let tomorrow = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    let next = tomorrow.and_hms_opt(0, 0, 0).unwrap().and_utc();
    (next - now).to_std().unwrap_or_default()
}
