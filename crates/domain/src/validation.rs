//! Field checks shared by every service. They run before any store call.

use rust_decimal::Decimal;

use crate::{DomainError, Result};

/// A row id supplied by a client must be a positive integer.
pub fn positive_id(field: &'static str, raw: i64) -> Result<i64> {
    if raw > 0 {
        Ok(raw)
    } else {
        Err(DomainError::validation(field, "must be a positive integer"))
    }
}

pub fn positive_quantity(field: &'static str, quantity: i64) -> Result<i64> {
    if quantity > 0 {
        Ok(quantity)
    } else {
        Err(DomainError::validation(field, "must be greater than zero"))
    }
}

pub fn non_negative_amount(field: &'static str, amount: Decimal) -> Result<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        Err(DomainError::validation(field, "must not be negative"))
    } else {
        Ok(amount)
    }
}

/// Trims `value` and rejects it if nothing is left.
pub fn non_blank(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DomainError::validation(field, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trims optional free text, turning blank strings into `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
