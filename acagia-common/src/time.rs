//! Timestamp utilities
//!
//! Academies store a fixed UTC offset in minutes. "Today" for check-in,
//! dashboard and event lookups is always the academy-local date.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};

/// Smallest accepted UTC offset (UTC-12:00)
pub const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
/// Largest accepted UTC offset (UTC+14:00)
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build a [`FixedOffset`] from an academy's offset in minutes
pub fn offset(utc_offset_minutes: i32) -> Result<FixedOffset> {
    if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&utc_offset_minutes) {
        return Err(Error::InvalidInput(format!(
            "utc_offset_minutes must be between {} and {}",
            MIN_UTC_OFFSET_MINUTES, MAX_UTC_OFFSET_MINUTES
        )));
    }
    FixedOffset::east_opt(utc_offset_minutes * 60)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid UTC offset: {}", utc_offset_minutes)))
}

/// Current academy-local date and time (seconds precision)
pub fn local_now(utc_offset_minutes: i32) -> Result<(NaiveDate, NaiveTime)> {
    local_at(now(), utc_offset_minutes)
}

/// Academy-local date and time for a given instant
pub fn local_at(at: DateTime<Utc>, utc_offset_minutes: i32) -> Result<(NaiveDate, NaiveTime)> {
    let local = at.with_timezone(&offset(utc_offset_minutes)?).naive_local();
    let time = local.time().with_nanosecond(0).unwrap_or(local.time());
    Ok((local.date(), time))
}

/// Current academy-local date
pub fn local_today(utc_offset_minutes: i32) -> Result<NaiveDate> {
    Ok(local_now(utc_offset_minutes)?.0)
}

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next_first.map(|d| d - Duration::days(1)).unwrap_or(first)
}

/// First day of the previous month
pub fn previous_month(date: NaiveDate) -> NaiveDate {
    first_of_month(first_of_month(date) - Duration::days(1))
}

/// First day of the next month
pub fn next_month(date: NaiveDate) -> NaiveDate {
    last_of_month(date) + Duration::days(1)
}

/// Parse a `YYYY-MM` month string into the first day of that month
pub fn parse_month(s: &str) -> Result<NaiveDate> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| Error::InvalidInput(format!("Month must be YYYY-MM: {}", s)))?;
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid year in month: {}", s)))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid month in month: {}", s)))?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidInput(format!("Month out of range: {}", s)))
}

/// Format a date as `YYYY-MM`
pub fn format_month(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
