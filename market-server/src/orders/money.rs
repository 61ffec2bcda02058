//! Money calculation utilities using rust_decimal for precision
//!
//! All monetary arithmetic runs through `Decimal` internally and converts
//! back to `f64` (rounded to 2 decimal places) for storage/serialization.

use rust_decimal::prelude::*;
use shared::{AppError, AppResult};

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed monetary value per field
const MAX_AMOUNT: f64 = 1_000_000.0;

/// Convert an f64 to Decimal (zero on non-finite input)
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Convert a Decimal back to f64, rounded to 2 decimal places
pub fn to_f64(value: Decimal) -> f64 {
    value.round_dp(DECIMAL_PLACES).to_f64().unwrap_or(0.0)
}

/// Round an f64 amount to 2 decimal places
pub fn round2(value: f64) -> f64 {
    to_f64(to_decimal(value))
}

/// Line total: quantity × unit price
pub fn line_total(quantity: i32, unit_price: f64) -> f64 {
    to_f64(Decimal::from(quantity) * to_decimal(unit_price))
}

/// Percentage of an amount (percentage in 0-100)
pub fn percent_of(amount: Decimal, percentage: f64) -> Decimal {
    amount * to_decimal(percentage) / Decimal::from(100)
}

/// Validate that a monetary field is finite, non-negative, and bounded
pub fn validate_amount(value: f64, field: &str) -> AppResult<()> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{} must be a finite number, got {}",
            field, value
        )));
    }
    if value < 0.0 {
        return Err(AppError::validation(format!(
            "{} must be non-negative, got {}",
            field, value
        )));
    }
    if value > MAX_AMOUNT {
        return Err(AppError::validation(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field, MAX_AMOUNT, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total_precision() {
        // 3 × 0.1 must not accumulate float error
        assert_eq!(line_total(3, 0.1), 0.3);
        assert_eq!(line_total(7, 2.35), 16.45);
    }

    #[test]
    fn test_percent_of() {
        let amount = to_decimal(200.0);
        assert_eq!(to_f64(percent_of(amount, 15.0)), 30.0);
        assert_eq!(to_f64(percent_of(amount, 0.0)), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(2.994), 2.99);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(0.0, "fee").is_ok());
        assert!(validate_amount(10.5, "fee").is_ok());
        assert!(validate_amount(-0.01, "fee").is_err());
        assert!(validate_amount(f64::NAN, "fee").is_err());
        assert!(validate_amount(f64::INFINITY, "fee").is_err());
        assert!(validate_amount(2_000_000.0, "fee").is_err());
    }
}
