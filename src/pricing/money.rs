//! Price and quantity normalization.
//!
//! The storefront sends prices the way they are displayed in the catalog:
//! plain JSON numbers, or strings such as `"12 000"` and `"1 499,90"`.
//! Everything is turned into an exact [`Decimal`] here. Rounding happens only
//! when a value is displayed.
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Number;

use crate::error::AppError;

/// A monetary value as received in a request body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(Number),
    Text(String),
}

impl From<i64> for RawAmount {
    fn from(value: i64) -> Self {
        RawAmount::Number(Number::from(value))
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// Parse a non-negative amount. `field` names the value in error messages.
pub fn parse_amount(raw: &RawAmount, field: &str) -> Result<Decimal, AppError> {
    let amount = match raw {
        RawAmount::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| AppError::invalid(format!("{} is not a valid number", field)))?
        }
        RawAmount::Text(s) => parse_amount_text(s, field)?,
    };

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AppError::invalid(format!("{} must not be negative", field)));
    }
    Ok(amount.normalize())
}

/// Optional amounts default to zero.
pub fn parse_optional_amount(raw: Option<&RawAmount>, field: &str) -> Result<Decimal, AppError> {
    raw.map_or(Ok(Decimal::ZERO), |r| parse_amount(r, field))
}

/// Percent values share the amount parser and are limited to 0..=100.
pub fn parse_percent(raw: Option<&RawAmount>, field: &str) -> Result<Decimal, AppError> {
    let percent = parse_optional_amount(raw, field)?;
    if percent > Decimal::ONE_HUNDRED {
        return Err(AppError::invalid(format!("{} must be between 0 and 100", field)));
    }
    Ok(percent)
}

fn parse_amount_text(text: &str, field: &str) -> Result<Decimal, AppError> {
    // Grouping spaces include NBSP and narrow NBSP from formatted prices.
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(AppError::invalid(format!("{} is empty", field)));
    }

    // "1,234.50" uses the comma for grouping, "1234,50" as the separator.
    let canonical = if compact.contains('.') {
        compact.replace(',', "")
    } else {
        compact.replace(',', ".")
    };

    let digits = canonical.strip_prefix('-').unwrap_or(&canonical);
    let well_formed = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(AppError::invalid(format!("{} '{}' is not a valid price", field, text)));
    }

    Decimal::from_str(&canonical).map_err(|_| AppError::invalid(format!("{} '{}' is not a valid price", field, text)))
}

/// Quantities must be positive integers that fit a `u32`.
pub fn parse_quantity(raw: Option<&Number>, position: usize) -> Result<u32, AppError> {
    let number = raw.ok_or_else(|| AppError::invalid(format!("Product #{} has no quantity", position)))?;
    number
        .as_u64()
        .filter(|q| *q > 0)
        .and_then(|q| u32::try_from(q).ok())
        .ok_or_else(|| AppError::invalid(format!("Product #{} quantity must be a positive integer, got {}", position, number)))
}

/// Round to two decimals, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format as `1 234 567.50`, the way offers show money.
pub fn format_money(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let mut scaled = rounded.abs();
    scaled.rescale(2);
    let plain = scaled.to_string();
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
