//! Display amounts.
//!
//! Users type basket-token amounts as decimals ("1.5"); the ledger counts
//! integer units with six implied decimals (1_500_000). Parsing truncates
//! anything past the sixth decimal rather than rounding, so a user can
//! never mint or burn more than they typed.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::ValuationError;
use crate::config::{MAX_AMOUNT, TOKEN_DECIMALS, TOKEN_UNIT};

/// Converts a display amount to on-chain units.
///
/// # Errors
///
/// - [`ValuationError::InvalidAmount`] for non-numeric or negative input.
/// - [`ValuationError::AmountTooSmall`] if the amount truncates below one
///   unit (e.g. `"0.0000005"`).
/// - [`ValuationError::AmountOutOfRange`] above `i64::MAX` units.
pub fn parse_token_amount(display: &str) -> Result<u64, ValuationError> {
    let input = display.trim();
    let invalid = |reason: String| ValuationError::InvalidAmount {
        input: display.to_string(),
        reason,
    };

    let amount = Decimal::from_str(input).map_err(|e| invalid(e.to_string()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(invalid("amount is negative".into()));
    }

    let units = amount
        .checked_mul(Decimal::from(TOKEN_UNIT))
        .ok_or_else(|| ValuationError::AmountOutOfRange {
            amount: input.to_string(),
        })?
        .trunc();

    if units < Decimal::ONE {
        return Err(ValuationError::AmountTooSmall);
    }

    units
        .to_u64()
        .filter(|u| *u <= MAX_AMOUNT)
        .ok_or_else(|| ValuationError::AmountOutOfRange {
            amount: input.to_string(),
        })
}

/// Renders on-chain units as a display amount without trailing zeros.
pub fn format_token_amount(units: u64) -> String {
    // MAX_AMOUNT bounds every legal amount, so this only clamps garbage.
    let mantissa = i64::try_from(units).unwrap_or(i64::MAX);
    Decimal::new(mantissa, TOKEN_DECIMALS).normalize().to_string()
}
