//! Two-decimal money helpers.
//!
//! Amounts travel through the API as [`Decimal`] and are persisted as integer
//! cents. Rounding is half-up (away from zero at the midpoint).

use crate::errors::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Number of fractional digits kept for every amount
pub const SCALE: u32 = 2;

/// Converts stored cents to a two-decimal amount
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, SCALE)
}

/// Rounds to two decimals, half-up
#[must_use]
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts an amount to cents after half-up rounding.
///
/// # Errors
/// Returns [`Error::InvalidAmount`] when the value does not fit in `i64` cents.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    (round(amount) * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::InvalidAmount {
            amount: amount.to_string(),
        })
}

/// Checks that `amount` is strictly positive with at most two fractional digits.
///
/// Trailing zeros are ignored, so `10.500` is accepted as `10.50`.
///
/// # Errors
/// Returns [`Error::InvalidAmount`] otherwise.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    let normalized = amount.normalize();
    if normalized <= Decimal::ZERO || normalized.scale() > SCALE {
        return Err(Error::InvalidAmount {
            amount: amount.to_string(),
        });
    }
    // Reject anything that cannot be stored as cents
    to_cents(normalized)?;
    Ok(normalized)
}

/// Parses a user-supplied amount string and validates it.
///
/// # Errors
/// Returns [`Error::InvalidAmount`] for non-numeric input or any value
/// [`validate_amount`] rejects.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(raw.trim()).map_err(|_| Error::InvalidAmount {
        amount: raw.to_string(),
    })?;
    validate_amount(amount)
}
