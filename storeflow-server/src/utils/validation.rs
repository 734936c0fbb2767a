//! Input validation helpers
//!
//! Centralized text length constants and field validators. Every write path
//! validates before it touches the document store.

use shared::error::{AppError, AppResult, ErrorCode};
use shared::util::normalize_phone;
use validator::ValidateEmail;

// ── Text length limits ──────────────────────────────────────────────

/// Names: store, customer, staff, payroll rule, position
pub const MAX_NAME_LEN: usize = 100;

/// Notes and reasons
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: username, receipt number
pub const MAX_SHORT_TEXT_LEN: usize = 50;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Logo URLs
pub const MAX_URL_LEN: usize = 2048;

/// Party size upper bound for a single reservation
pub const MAX_GUEST_COUNT: u32 = 100;

/// Largest single prepay amount (won)
pub const MAX_PREPAY_AMOUNT: i64 = 100_000_000;

// ── Text ────────────────────────────────────────────────────────────

pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::required(field));
    }
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.chars().count()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

pub fn validate_optional_text(value: &Option<String>, field: &str, max_len: usize) -> AppResult<()> {
    if let Some(v) = value
        && v.chars().count() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.chars().count()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

// ── Domain formats ──────────────────────────────────────────────────

/// Korean phone number, any punctuation. Returns the digits-only form.
///
/// Accepts 9 to 11 digits starting with `0` (`02-123-4567`, `010-1234-5678`).
pub fn validate_phone(phone: &str) -> AppResult<String> {
    let digits = normalize_phone(phone);
    if digits.is_empty() {
        return Err(AppError::required("phone"));
    }
    if !(9..=11).contains(&digits.len()) || !digits.starts_with('0') {
        return Err(AppError::with_message(
            ErrorCode::InvalidPhone,
            format!("Invalid phone number: {phone}"),
        )
        .with_detail("field", "phone"));
    }
    Ok(digits)
}

/// Business registration number, `NNN-NN-NNNNN`
pub fn validate_business_number(value: &str) -> AppResult<()> {
    let parts: Vec<&str> = value.trim().split('-').collect();
    let ok = parts.len() == 3
        && [3, 2, 5]
            .iter()
            .zip(&parts)
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_digit()));
    if ok {
        Ok(())
    } else {
        Err(AppError::with_message(
            ErrorCode::InvalidBusinessNumber,
            "Business number must look like 123-45-67890",
        )
        .with_detail("field", "businessNumber"))
    }
}

pub fn validate_email(email: &str) -> AppResult<()> {
    validate_required_text(email, "email", MAX_EMAIL_LEN)?;
    if !email.trim().validate_email() {
        return Err(AppError::validation(format!("Invalid email: {email}")).with_detail("field", "email"));
    }
    Ok(())
}

/// Strictly positive money amount
pub fn validate_amount(amount: i64) -> AppResult<()> {
    if amount <= 0 || amount > MAX_PREPAY_AMOUNT {
        return Err(AppError::with_message(
            ErrorCode::InvalidAmount,
            format!("Amount must be between 1 and {MAX_PREPAY_AMOUNT}"),
        )
        .with_detail("amount", amount));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display>(value: T, field: &str, min: T, max: T) -> AppResult<()> {
    if value < min || value > max {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!("{field} must be between {min} and {max} (got {value})"),
        )
        .with_detail("field", field));
    }
    Ok(())
}
