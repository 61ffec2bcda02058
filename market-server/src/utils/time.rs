//! Time helpers — business-timezone conversions
//!
//! All date → timestamp conversions happen at the manager layer;
//! store queries only receive `i64` Unix millis.

use chrono::NaiveDate;
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// Parse a date string (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// Date + hour/minute/second → Unix millis (business timezone)
///
/// DST gap fallback: when the local time does not exist (spring-forward),
/// fall back to UTC.
pub fn date_hms_to_millis(date: NaiveDate, hour: u32, min: u32, sec: u32, tz: Tz) -> i64 {
    let naive = date.and_hms_opt(hour, min, sec).unwrap();
    naive
        .and_local_timezone(tz)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// Start of day (00:00:00) → Unix millis (business timezone)
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    date_hms_to_millis(date, 0, 0, 0, tz)
}

/// End of day → next-day 00:00:00 Unix millis (business timezone)
///
/// Callers use `< end` (exclusive) semantics.
pub fn day_end_millis(date: NaiveDate, tz: Tz) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    date_hms_to_millis(next_day, 0, 0, 0, tz)
}

/// Calendar day of a Unix-millis timestamp in the business timezone
pub fn local_date(millis: i64, tz: Tz) -> NaiveDate {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&tz)
        .date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2026-03-15").is_ok());
        assert!(parse_date("15/03/2026").is_err());
        assert!(parse_date("garbage").is_err());
    }

    #[test]
    fn test_day_bounds_are_exclusive_window() {
        let tz = chrono_tz::UTC;
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let start = day_start_millis(date, tz);
        let end = day_end_millis(date, tz);
        assert_eq!(end - start, 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_local_date_roundtrip() {
        let tz = chrono_tz::UTC;
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let noon = date_hms_to_millis(date, 12, 0, 0, tz);
        assert_eq!(local_date(noon, tz), date);
    }

    #[test]
    fn test_local_date_respects_timezone() {
        // 2026-03-15 23:30 UTC is already 03-16 in Madrid (UTC+1)
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let late = date_hms_to_millis(date, 23, 30, 0, chrono_tz::UTC);
        assert_eq!(
            local_date(late, chrono_tz::Europe::Madrid),
            NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
        );
    }
}
