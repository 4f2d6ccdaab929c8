//! Exact conversion between human-readable decimal amounts and
//! smallest-unit integers.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;

use crate::error::AmountError;

/// Parses a decimal amount (`"0.05"`) into smallest units at `decimals`.
///
/// Rejects negative values and values with more fractional digits than the
/// network supports instead of rounding them.
pub fn to_smallest_unit(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative(trimmed.to_owned()));
    }
    if trimmed.is_empty() {
        return Err(AmountError::Invalid {
            amount: amount.to_owned(),
            reason: "empty amount".to_owned(),
        });
    }
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > usize::from(decimals) {
            return Err(AmountError::TooPrecise {
                amount: trimmed.to_owned(),
                decimals,
            });
        }
    }
    let parsed = parse_units(trimmed, decimals).map_err(|e| AmountError::Invalid {
        amount: trimmed.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(parsed.into())
}

/// Formats smallest units as a decimal string without trailing zeros.
pub fn from_smallest_unit(value: U256, decimals: u8) -> Result<String, AmountError> {
    let formatted = format_units(value, decimals).map_err(|e| AmountError::Invalid {
        amount: value.to_string(),
        reason: e.to_string(),
    })?;
    if !formatted.contains('.') {
        return Ok(formatted);
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    Ok(trimmed.to_owned())
}

/// Display form with at most `places` fractional digits (truncated).
pub fn format_display(value: U256, decimals: u8, places: usize) -> Result<String, AmountError> {
    let exact = from_smallest_unit(value, decimals)?;
    let (int, fraction) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut fraction: String = fraction.chars().take(places).collect();
    while fraction.len() < places {
        fraction.push('0');
    }
    if places == 0 {
        return Ok(int.to_owned());
    }
    Ok(format!("{int}.{fraction}"))
}
