//! Netting of the two opposing flows of a pair into one external transfer.

use super::fees::{apply_fee, apply_fee_to_rate, calculate_fee};
use super::math;
use crate::error::{HubError, HubResult};
use serde::Serialize;

/// Which token of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSide {
    A,
    B,
}

/// Outcome of netting `total_a` against `total_b` at the oracle rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Settlement {
    /// Units of B one whole A buys, before fees.
    pub rate_per_unit_a_to_b: u128,
    /// Units of A one whole B buys, before fees.
    pub rate_per_unit_b_to_a: u128,
    pub platform_fee_a: u128,
    pub platform_fee_b: u128,
    /// Token the swapper must bring in, if the flows do not match.
    pub token_to_be_provided: Option<PairSide>,
    pub amount_to_be_provided: u128,
    /// Token the swapper is paid with, if the flows do not match.
    pub token_to_reward: Option<PairSide>,
    pub amount_to_reward: u128,
}

impl Settlement {
    /// Rate per unit registered for A-to-B sellers, net of fee.
    pub fn net_rate_a_to_b(&self, swap_fee: u32) -> u128 {
        apply_fee_to_rate(self.rate_per_unit_a_to_b, swap_fee)
    }

    /// Rate per unit registered for B-to-A sellers, net of fee.
    pub fn net_rate_b_to_a(&self, swap_fee: u32) -> u128 {
        apply_fee_to_rate(self.rate_per_unit_b_to_a, swap_fee)
    }

    pub fn reward_for(&self, side: PairSide) -> u128 {
        if self.token_to_reward == Some(side) {
            self.amount_to_reward
        } else {
            0
        }
    }

    pub fn provided_for(&self, side: PairSide) -> u128 {
        if self.token_to_be_provided == Some(side) {
            self.amount_to_be_provided
        } else {
            0
        }
    }

    pub fn platform_fee_for(&self, side: PairSide) -> u128 {
        match side {
            PairSide::A => self.platform_fee_a,
            PairSide::B => self.platform_fee_b,
        }
    }
}

/// Net `total_a` against `total_b`.
///
/// `rate_per_unit_b_to_a` is what one whole B (`magnitude_b` units) is worth in
/// A units. The side worth more after conversion rewards the swapper; the
/// shortfall on the other side is provided by the swapper, minus the fee.
pub fn compute_settlement(
    total_a: u128,
    total_b: u128,
    rate_per_unit_b_to_a: u128,
    magnitude_a: u128,
    magnitude_b: u128,
    swap_fee: u32,
) -> HubResult<Settlement> {
    if rate_per_unit_b_to_a == 0 || magnitude_a == 0 || magnitude_b == 0 {
        return Err(HubError::ArithmeticOverflow("settlement rate"));
    }
    let rate_per_unit_a_to_b = mul_div(magnitude_a, magnitude_b, rate_per_unit_b_to_a)?;
    let b_in_a = mul_div(total_b, rate_per_unit_b_to_a, magnitude_b)?;

    let mut settlement = Settlement {
        rate_per_unit_a_to_b,
        rate_per_unit_b_to_a,
        platform_fee_a: 0,
        platform_fee_b: 0,
        token_to_be_provided: None,
        amount_to_be_provided: 0,
        token_to_reward: None,
        amount_to_reward: 0,
    };

    if b_in_a == total_a {
        settlement.platform_fee_a = calculate_fee(total_a, swap_fee);
        settlement.platform_fee_b = calculate_fee(total_b, swap_fee);
    } else if b_in_a > total_a {
        // More B than A: the swapper brings A and is paid in B.
        let needed_a = b_in_a - total_a;
        let needed_in_b = mul_div(needed_a, rate_per_unit_a_to_b, magnitude_a)?;
        let matched_b = total_b
            .checked_sub(needed_in_b)
            .ok_or(HubError::ArithmeticOverflow("settlement amounts"))?;
        settlement.token_to_be_provided = Some(PairSide::A);
        settlement.amount_to_be_provided = apply_fee(needed_a, swap_fee);
        settlement.token_to_reward = Some(PairSide::B);
        settlement.amount_to_reward = needed_in_b;
        settlement.platform_fee_a = calculate_fee(total_a, swap_fee);
        settlement.platform_fee_b = calculate_fee(matched_b, swap_fee);
    } else {
        // More A than B: the swapper brings B and is paid in A.
        let a_in_b = mul_div(total_a, rate_per_unit_a_to_b, magnitude_a)?;
        let needed_b = a_in_b.saturating_sub(total_b);
        let needed_in_a = mul_div(needed_b, rate_per_unit_b_to_a, magnitude_b)?;
        let matched_a = total_a
            .checked_sub(needed_in_a)
            .ok_or(HubError::ArithmeticOverflow("settlement amounts"))?;
        settlement.token_to_be_provided = Some(PairSide::B);
        settlement.amount_to_be_provided = apply_fee(needed_b, swap_fee);
        settlement.token_to_reward = Some(PairSide::A);
        settlement.amount_to_reward = needed_in_a;
        settlement.platform_fee_a = calculate_fee(matched_a, swap_fee);
        settlement.platform_fee_b = calculate_fee(total_b, swap_fee);
    }
    Ok(settlement)
}

fn mul_div(x: u128, y: u128, denominator: u128) -> HubResult<u128> {
    math::mul_div(x, y, denominator).ok_or(HubError::ArithmeticOverflow("settlement amounts"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAG_A: u128 = 1_000_000_000_000; // 12 decimals
    const MAG_B: u128 = 10_000_000_000_000_000; // 16 decimals
    const FEE: u32 = 3000;

    #[test]
    fn test_only_a_to_b_volume() {
        // 1 B = 2 A; 100 A must be bought entirely by the swapper.
        let s = compute_settlement(100 * MAG_A, 0, 2 * MAG_A, MAG_A, MAG_B, FEE).unwrap();
        assert_eq!(s.rate_per_unit_a_to_b, MAG_B / 2);
        assert_eq!(s.token_to_be_provided, Some(PairSide::B));
        assert_eq!(s.amount_to_be_provided, 4985 * MAG_B / 100);
        assert_eq!(s.token_to_reward, Some(PairSide::A));
        assert_eq!(s.amount_to_reward, 100 * MAG_A);
        assert_eq!(s.platform_fee_a, 0);
        assert_eq!(s.platform_fee_b, 0);
        assert_eq!(s.net_rate_a_to_b(FEE), 4985 * MAG_B / 10_000);
    }

    #[test]
    fn test_more_b_than_a() {
        // 1 B = 1 A; 100 A against 200 B.
        let s = compute_settlement(100 * MAG_A, 200 * MAG_B, MAG_A, MAG_A, MAG_B, FEE).unwrap();
        assert_eq!(s.token_to_be_provided, Some(PairSide::A));
        assert_eq!(s.amount_to_be_provided, 997 * MAG_A / 10);
        assert_eq!(s.token_to_reward, Some(PairSide::B));
        assert_eq!(s.amount_to_reward, 100 * MAG_B);
        assert_eq!(s.platform_fee_a, 3 * MAG_A / 10);
        assert_eq!(s.platform_fee_b, 3 * MAG_B / 10);
        assert_eq!(s.reward_for(PairSide::B), 100 * MAG_B);
        assert_eq!(s.reward_for(PairSide::A), 0);
        assert_eq!(s.provided_for(PairSide::A), 997 * MAG_A / 10);
    }

    #[test]
    fn test_balanced_flows_need_no_swapper() {
        let s = compute_settlement(50 * MAG_A, 100 * MAG_B, MAG_A / 2, MAG_A, MAG_B, FEE).unwrap();
        assert_eq!(s.token_to_be_provided, None);
        assert_eq!(s.token_to_reward, None);
        assert_eq!(s.amount_to_be_provided, 0);
        assert_eq!(s.amount_to_reward, 0);
        assert_eq!(s.platform_fee_a, 15 * MAG_A / 100);
        assert_eq!(s.platform_fee_b, 3 * MAG_B / 10);
    }

    #[test]
    fn test_eighteen_decimal_tokens_at_3000() {
        const E18: u128 = 1_000_000_000_000_000_000;
        // 1 B = 3000 A; one whole B against no A.
        let s = compute_settlement(0, E18, 3_000 * E18, E18, E18, FEE).unwrap();
        assert_eq!(s.rate_per_unit_a_to_b, 333_333_333_333_333);
        assert_eq!(s.token_to_be_provided, Some(PairSide::A));
        assert_eq!(s.amount_to_be_provided, 2_991 * E18);
        assert_eq!(s.token_to_reward, Some(PairSide::B));
        assert_eq!(s.amount_to_reward, 999_999_999_999_999_000);
        assert_eq!(s.platform_fee_a, 0);
        assert_eq!(s.platform_fee_b, 3);
        // 0.997 of the floored rate, rounded down.
        assert_eq!(s.net_rate_a_to_b(FEE), 332_333_333_333_333);
        assert_eq!(s.net_rate_b_to_a(FEE), 2_991 * E18);

        // 1500 A against 1 B: the swapper brings half.
        let s = compute_settlement(1_500 * E18, E18, 3_000 * E18, E18, E18, FEE).unwrap();
        assert_eq!(s.amount_to_be_provided, 14_955 * E18 / 10);
        assert_eq!(s.amount_to_reward, 499_999_999_999_999_500);
        assert_eq!(s.platform_fee_a, 45 * E18 / 10);
        assert_eq!(s.platform_fee_b, 1_500_000_000_000_001);
    }

    #[test]
    fn test_six_and_eighteen_decimal_tokens() {
        const E6: u128 = 1_000_000;
        const E18: u128 = 1_000_000_000_000_000_000;
        // A has 6 decimals, B has 18, 1 B = 3000 A. 3000 A against nothing.
        let s = compute_settlement(3_000 * E6, 0, 3_000 * E6, E6, E18, FEE).unwrap();
        assert_eq!(s.rate_per_unit_a_to_b, 333_333_333_333_333);
        assert_eq!(s.token_to_be_provided, Some(PairSide::B));
        assert_eq!(s.amount_to_be_provided, 996_999_999_999_999_003);
        assert_eq!(s.token_to_reward, Some(PairSide::A));
        // Converting back through the floored A-to-B rate leaves one unit of A.
        assert_eq!(s.amount_to_reward, 2_999_999_999);
        assert_eq!(s.platform_fee_a, 0);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let result = compute_settlement(1, 1, 0, MAG_A, MAG_B, FEE);
        assert!(matches!(result, Err(HubError::ArithmeticOverflow(_))));
    }
}
