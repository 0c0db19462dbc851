//! Multiply-then-divide with a 256-bit intermediate.

use ethnum::U256;

/// `x * y / denominator`, floored. The product is formed in 256 bits, so only
/// a quotient above `u128::MAX` (or a zero denominator) yields `None`.
pub fn mul_div(x: u128, y: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let quotient = U256::from(x) * U256::from(y) / U256::from(denominator);
    narrow(quotient)
}

fn narrow(value: U256) -> Option<u128> {
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.as_u128())
    }
}
