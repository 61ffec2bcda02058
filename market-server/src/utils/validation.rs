//! Input validation helpers
//!
//! Centralized text length constants and validation functions, plus the
//! bridge from `validator` derive output into [`AppError`].

use super::{AppError, AppResult};
use validator::Validate;

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: crop names, subscription titles, carriers, etc.
pub const MAX_NAME_LEN: usize = 200;

/// Notes, descriptions, reasons (cancel reason, tracking notes, feedback)
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: phone numbers, zip codes, time slots, plates
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Addresses
pub const MAX_ADDRESS_LEN: usize = 500;

/// Maximum line items per order
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum photos attached to a quality rating
pub const MAX_RATING_PHOTOS: usize = 10;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> AppResult<()> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate a quality/satisfaction rating value (1-5).
pub fn validate_rating(rating: u8) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(
            AppError::validation(format!("rating must be between 1 and 5, got {rating}"))
                .with_detail("rating", rating),
        );
    }
    Ok(())
}

/// Run `validator` derive checks and map failures into an [`AppError`]
/// with field-level details.
pub fn validate_input(input: &impl Validate) -> AppResult<()> {
    input.validate().map_err(|errors| {
        let mut err = AppError::validation("Validation failed");
        for (field, field_errors) in errors.field_errors() {
            if let Some(first) = field_errors.first() {
                let reason = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| first.code.to_string());
                err = err.with_detail(field.to_string(), reason);
            }
        }
        err
    })
}
