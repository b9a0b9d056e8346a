//! Input validation and date helpers shared across services.

use chrono::{Datelike, Months, NaiveDate, NaiveTime};

use crate::error::CoreError;

/// Validate a string field is non-empty (after trim) and within byte bounds.
/// Returns the trimmed value.
pub fn validate_bounded_string(
    value: &str,
    field: &'static str,
    min: usize,
    max: usize,
) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.len() < min {
        return Err(CoreError::Validation {
            field,
            message: format!("must be at least {} characters", min),
        });
    }
    if trimmed.len() > max {
        return Err(CoreError::Validation {
            field,
            message: format!("must be at most {} characters", max),
        });
    }
    Ok(trimmed.to_string())
}

/// Validate a `HH:MM` 24-hour time string.
pub fn validate_hh_mm(value: &str, field: &'static str) -> Result<(), CoreError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| CoreError::Validation {
        field,
        message: format!("expected HH:MM, got '{}'", value),
    })?;
    Ok(())
}

/// Validate an integer field falls inside an inclusive range.
pub fn validate_range(
    value: i64,
    field: &'static str,
    min: i64,
    max: i64,
) -> Result<(), CoreError> {
    if value < min || value > max {
        return Err(CoreError::Validation {
            field,
            message: format!("must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Calendar-month billing period containing `date`: first day of the month
/// through the last day of the month. A record created mid-month still runs
/// to end-of-month; the next period starts on the 1st.
pub fn period_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let end = (start + Months::new(1)).pred_opt().unwrap_or(start);
    (start, end)
}

/// Whole days elapsed from `earlier` to `later`, never negative.
pub fn days_since(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days().max(0)
}

/// Usage accounting rounds partial minutes up; a 61-second recording bills
/// as 2 minutes.
pub fn minutes_rounded_up(seconds: i64) -> i64 {
    if seconds <= 0 {
        return 0;
    }
    (seconds + 59) / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_string_trims() {
        assert_eq!(
            validate_bounded_string("  hi  ", "title", 1, 10).unwrap(),
            "hi"
        );
    }

    #[test]
    fn test_bounded_string_rejects_empty() {
        assert!(validate_bounded_string("   ", "title", 1, 10).is_err());
    }

    #[test]
    fn test_hh_mm() {
        assert!(validate_hh_mm("09:00", "time").is_ok());
        assert!(validate_hh_mm("23:59", "time").is_ok());
        assert!(validate_hh_mm("9am", "time").is_err());
        assert!(validate_hh_mm("24:00", "time").is_err());
    }

    #[test]
    fn test_period_bounds_mid_month() {
        let (start, end) = period_bounds(NaiveDate::from_ymd_opt(2026, 8, 19).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 8, 31).unwrap());
    }

    #[test]
    fn test_period_bounds_february() {
        let (start, end) = period_bounds(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_period_bounds_december_rolls_year() {
        let (_, end) = period_bounds(NaiveDate::from_ymd_opt(2025, 12, 3).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_minutes_rounded_up() {
        assert_eq!(minutes_rounded_up(0), 0);
        assert_eq!(minutes_rounded_up(1), 1);
        assert_eq!(minutes_rounded_up(60), 1);
        assert_eq!(minutes_rounded_up(61), 2);
        assert_eq!(minutes_rounded_up(3600), 60);
    }

    #[test]
    fn test_days_since_clamps_negative() {
        let a = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(days_since(a, b), 0);
        assert_eq!(days_since(b, a), 6);
    }
}
