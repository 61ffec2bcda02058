//! Temporal scheduler — pure date arithmetic for recurring deliveries
//!
//! Computes the next delivery occurrence from an anchor timestamp and a
//! frequency, skipping blackout dates. No side effects; the caller writes
//! the result into the subscription's cursor.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use shared::ErrorCode;
use shared::models::Frequency;
use shared::{AppError, AppResult};

/// Iteration cap for the avoid-date loop. A set dense enough to block this
/// many consecutive days is a configuration error, not a schedule.
const MAX_AVOID_SKIPS: u32 = 3650;

/// Compute the next occurrence after `anchor` (Unix millis).
///
/// Offsets: weekly +7d, biweekly +14d, monthly +1 calendar month,
/// quarterly +3 calendar months, custom +N days. Calendar-month addition
/// clamps to the end of shorter months.
///
/// While the candidate's calendar day (in the business timezone) matches
/// an entry in `avoid_dates`, the candidate advances one day, up to
/// [`MAX_AVOID_SKIPS`] iterations.
pub fn next_occurrence(
    anchor: i64,
    frequency: Frequency,
    custom_days: Option<u32>,
    avoid_dates: &[NaiveDate],
    tz: Tz,
) -> AppResult<i64> {
    let anchor_dt = DateTime::<Utc>::from_timestamp_millis(anchor)
        .ok_or_else(|| AppError::validation(format!("invalid anchor timestamp: {}", anchor)))?;

    let mut next = match frequency {
        Frequency::Weekly => anchor_dt + Duration::days(7),
        Frequency::Biweekly => anchor_dt + Duration::days(14),
        Frequency::Monthly => anchor_dt
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::validation("anchor date out of range"))?,
        Frequency::Quarterly => anchor_dt
            .checked_add_months(Months::new(3))
            .ok_or_else(|| AppError::validation("anchor date out of range"))?,
        Frequency::Custom => {
            let days = custom_days.ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::CustomFrequencyMissing,
                    "custom frequency requires custom_frequency_days",
                )
            })?;
            anchor_dt + Duration::days(days as i64)
        }
    };

    let mut skips = 0u32;
    while is_avoided(next, avoid_dates, tz) {
        if skips >= MAX_AVOID_SKIPS {
            return Err(AppError::with_message(
                ErrorCode::ScheduleNotConvergent,
                format!(
                    "avoid-date set prevented convergence within {} days",
                    MAX_AVOID_SKIPS
                ),
            ));
        }
        next += Duration::days(1);
        skips += 1;
    }

    Ok(next.timestamp_millis())
}

fn is_avoided(candidate: DateTime<Utc>, avoid_dates: &[NaiveDate], tz: Tz) -> bool {
    let day = candidate.with_timezone(&tz).date_naive();
    avoid_dates.contains(&day)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn millis(year: i32, month: u32, day: u32) -> i64 {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_weekly_is_exactly_seven_days() {
        let anchor = millis(2026, 3, 2);
        let next =
            next_occurrence(anchor, Frequency::Weekly, None, &[], chrono_tz::UTC).unwrap();
        assert_eq!(next, anchor + 7 * DAY_MS);
    }

    #[test]
    fn test_biweekly_is_fourteen_days() {
        let anchor = millis(2026, 3, 2);
        let next =
            next_occurrence(anchor, Frequency::Biweekly, None, &[], chrono_tz::UTC).unwrap();
        assert_eq!(next, anchor + 14 * DAY_MS);
    }

    #[test]
    fn test_monthly_adds_calendar_month() {
        let anchor = millis(2026, 3, 15);
        let next =
            next_occurrence(anchor, Frequency::Monthly, None, &[], chrono_tz::UTC).unwrap();
        assert_eq!(next, millis(2026, 4, 15));
    }

    #[test]
    fn test_monthly_clamps_short_months() {
        // Jan 31 + 1 calendar month lands on Feb 28 (2026 is not a leap year)
        let anchor = millis(2026, 1, 31);
        let next =
            next_occurrence(anchor, Frequency::Monthly, None, &[], chrono_tz::UTC).unwrap();
        assert_eq!(next, millis(2026, 2, 28));
    }

    #[test]
    fn test_quarterly_adds_three_months() {
        let anchor = millis(2026, 2, 10);
        let next =
            next_occurrence(anchor, Frequency::Quarterly, None, &[], chrono_tz::UTC).unwrap();
        assert_eq!(next, millis(2026, 5, 10));
    }

    #[test]
    fn test_custom_uses_day_count() {
        let anchor = millis(2026, 3, 2);
        let next =
            next_occurrence(anchor, Frequency::Custom, Some(10), &[], chrono_tz::UTC).unwrap();
        assert_eq!(next, anchor + 10 * DAY_MS);
    }

    #[test]
    fn test_custom_without_day_count_is_configuration_error() {
        let anchor = millis(2026, 3, 2);
        let err =
            next_occurrence(anchor, Frequency::Custom, None, &[], chrono_tz::UTC).unwrap_err();
        assert_eq!(err.code, ErrorCode::CustomFrequencyMissing);
    }

    #[test]
    fn test_avoid_date_pushes_to_next_day() {
        // anchored at D, weekly, avoid {D+7} → lands on D+8
        let anchor = millis(2026, 3, 2);
        let avoid = vec![date(2026, 3, 9)];
        let next =
            next_occurrence(anchor, Frequency::Weekly, None, &avoid, chrono_tz::UTC).unwrap();
        assert_eq!(next, anchor + 8 * DAY_MS);
    }

    #[test]
    fn test_consecutive_avoid_dates_skip_through() {
        let anchor = millis(2026, 3, 2);
        let avoid = vec![date(2026, 3, 9), date(2026, 3, 10), date(2026, 3, 11)];
        let next =
            next_occurrence(anchor, Frequency::Weekly, None, &avoid, chrono_tz::UTC).unwrap();
        assert_eq!(next, anchor + 11 * DAY_MS);
    }

    #[test]
    fn test_dense_avoid_set_fails_instead_of_spinning() {
        let anchor = millis(2026, 3, 2);
        let first_candidate = date(2026, 3, 9);
        let avoid: Vec<NaiveDate> = (0..=(MAX_AVOID_SKIPS as u64))
            .map(|i| first_candidate + Duration::days(i as i64))
            .collect();
        let err =
            next_occurrence(anchor, Frequency::Weekly, None, &avoid, chrono_tz::UTC).unwrap_err();
        assert_eq!(err.code, ErrorCode::ScheduleNotConvergent);
    }

    #[test]
    fn test_avoid_dates_match_in_business_timezone() {
        // 2026-03-08 23:00 UTC anchor; +7d lands 03-15 23:00 UTC, which is
        // already 03-16 in Madrid. Avoiding 03-16 must push the candidate.
        let anchor = NaiveDate::from_ymd_opt(2026, 3, 8)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let avoid = vec![date(2026, 3, 16)];
        let next = next_occurrence(
            anchor,
            Frequency::Weekly,
            None,
            &avoid,
            chrono_tz::Europe::Madrid,
        )
        .unwrap();
        assert_eq!(next, anchor + 8 * DAY_MS);
    }
}
