//! Fee arithmetic in parts per million.

/// Fee denominator: a fee of `6000` is 0.6%.
pub const FEE_PRECISION: u32 = 1_000_000;

/// Highest fee the hub accepts (10%).
pub const MAX_FEE: u32 = 100_000;

/// `amount * fee / FEE_PRECISION`, rounded down, without intermediate overflow.
pub fn calculate_fee(amount: u128, fee: u32) -> u128 {
    let precision = u128::from(FEE_PRECISION);
    let fee = u128::from(fee.min(FEE_PRECISION));
    // amount = q * P + r, so amount * fee / P = q * fee + r * fee / P exactly.
    let q = amount / precision;
    let r = amount % precision;
    q * fee + r * fee / precision
}

/// What is left of `amount` after the fee is taken.
pub fn apply_fee(amount: u128, fee: u32) -> u128 {
    amount - calculate_fee(amount, fee)
}

/// `amount * fee / FEE_PRECISION`, rounded up.
pub fn calculate_fee_rounded_up(amount: u128, fee: u32) -> u128 {
    let precision = u128::from(FEE_PRECISION);
    let fee = u128::from(fee.min(FEE_PRECISION));
    let q = amount / precision;
    let r = amount % precision;
    q * fee + (r * fee).div_ceil(precision)
}

/// Per-unit rate a seller keeps. The fee is rounded up, so summing
/// `units * rate` over positions never exceeds what the swap collected.
pub fn apply_fee_to_rate(rate: u128, fee: u32) -> u128 {
    rate - calculate_fee_rounded_up(rate, fee)
}

pub fn is_valid_fee(fee: u32) -> bool {
    fee <= MAX_FEE
}
