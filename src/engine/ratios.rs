//! Ratio accumulator ledger.
//!
//! For every performed swap the ledger stores the running sum of the
//! fee-adjusted rate received per whole unit sold. A position's proceeds over
//! any range of swaps are `units * (accum[to] - accum[from]) / magnitude`.
//! Sums wrap at `u128::MAX` and differences are taken with the same wrapping
//! arithmetic, so differences stay exact across one wrap.

use super::digest::StateDigest;
use super::math::mul_div;
use crate::domain::{Direction, SwapInterval, TokenPair};
use crate::error::{HubError, HubResult};
use std::collections::BTreeMap;

type RatioKey = (TokenPair, SwapInterval, Direction);

#[derive(Debug, Clone, Default)]
pub struct RatioAccumulatorLedger {
    accumulators: BTreeMap<RatioKey, BTreeMap<u32, u128>>,
}

impl RatioAccumulatorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `accum[swap_number] = accum[swap_number - 1] + rate_per_unit`, wrapping.
    pub fn register(
        &mut self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        swap_number: u32,
        rate_per_unit: u128,
    ) {
        let previous = match swap_number.checked_sub(1) {
            Some(prev) => self.accum_rate_per_unit(pair, interval, direction, prev),
            None => 0,
        };
        self.accumulators
            .entry((pair.clone(), interval, direction))
            .or_default()
            .insert(swap_number, previous.wrapping_add(rate_per_unit));
    }

    /// Accumulated rate per unit as of `swap_number`; zero before any swap.
    pub fn accum_rate_per_unit(
        &self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        swap_number: u32,
    ) -> u128 {
        self.accumulators
            .get(&(pair.clone(), interval, direction))
            .and_then(|by_swap| by_swap.get(&swap_number))
            .copied()
            .unwrap_or(0)
    }

    /// Output-token proceeds of holding `units_per_swap` of input over swaps
    /// `(from_swap, to_swap]`, scaled down by the input token's `magnitude`.
    ///
    /// The product is formed in 256 bits. Only when the exact quotient does not
    /// fit in `u128` does it fall back to `(diff / magnitude) * units`, and only
    /// if that still overflows does the call fail.
    #[allow(clippy::too_many_arguments)]
    pub fn proceeds_since(
        &self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        from_swap: u32,
        to_swap: u32,
        units_per_swap: u128,
        magnitude: u128,
    ) -> HubResult<u128> {
        if magnitude == 0 {
            return Err(HubError::ArithmeticOverflow("swapped amount"));
        }
        let diff = self
            .accum_rate_per_unit(pair, interval, direction, to_swap)
            .wrapping_sub(self.accum_rate_per_unit(pair, interval, direction, from_swap));
        match mul_div(diff, units_per_swap, magnitude) {
            Some(total) => Ok(total),
            None => (diff / magnitude)
                .checked_mul(units_per_swap)
                .ok_or(HubError::ArithmeticOverflow("swapped amount")),
        }
    }

    pub(crate) fn digest(&self, digest: &mut StateDigest) {
        digest.tag("ratios");
        for ((pair, interval, direction), by_swap) in &self.accumulators {
            digest
                .str(pair.token_a().as_str())
                .str(pair.token_b().as_str())
                .u32(interval.as_secs())
                .str(&direction.to_string());
            for (swap_number, accum) in by_swap {
                digest.u32(*swap_number).u128(*accum);
            }
        }
    }
}
