//! Fixed-point token amounts.
//!
//! On-ledger amounts are integer units; `10^decimals` units make one whole token.
//! Conversions to and from human-readable values go through rust_decimal so no
//! floating-point drift enters the accounting.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Largest decimals value whose magnitude fits in a `u128`.
pub const MAX_DECIMALS: u8 = 38;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),
    #[error("Invalid amount: {0}")]
    Invalid(String),
    #[error("Amount {0} is negative")]
    Negative(String),
    #[error("Amount {0} is more precise than the token allows")]
    TooPrecise(String),
    #[error("Amount {0} does not fit in token units")]
    OutOfRange(String),
}

/// Number of units in one whole token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Magnitude(u128);

impl Magnitude {
    pub fn from_decimals(decimals: u8) -> Result<Self, AmountError> {
        if decimals > MAX_DECIMALS {
            return Err(AmountError::UnsupportedDecimals(decimals));
        }
        Ok(Magnitude(10u128.pow(u32::from(decimals))))
    }

    pub fn get(&self) -> u128 {
        self.0
    }
}

/// Convert a whole-token quantity like `"49.85"` into integer units.
///
/// # Errors
/// Fails on negative values, on more fractional digits than `decimals`, and on
/// results that do not fit in a `u128`.
pub fn to_units(value: &str, decimals: u8) -> Result<u128, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    let parsed =
        Decimal::from_str(value.trim()).map_err(|e| AmountError::Invalid(e.to_string()))?;
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(AmountError::Negative(value.to_string()));
    }
    let normalized = parsed.normalize();
    let scale = normalized.scale();
    if scale > u32::from(decimals) {
        return Err(AmountError::TooPrecise(value.to_string()));
    }
    // mantissa * 10^(decimals - scale)
    let mantissa = u128::try_from(normalized.mantissa())
        .map_err(|_| AmountError::OutOfRange(value.to_string()))?;
    10u128
        .checked_pow(u32::from(decimals) - scale)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| AmountError::OutOfRange(value.to_string()))
}

/// Render integer units as a whole-token decimal string without trailing zeros.
pub fn format_units(units: u128, decimals: u8) -> String {
    let digits = units.to_string();
    let decimals = usize::from(decimals);
    let (whole, frac) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole
    } else {
        format!("{}.{}", whole, frac)
    }
}
