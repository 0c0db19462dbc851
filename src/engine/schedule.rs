//! Swap schedule ledger.
//!
//! Per (pair, interval) the ledger keeps a running amount-to-swap per direction,
//! valid as of the last performed swap, plus a sparse map of signed deltas keyed
//! by the swap number at which they take effect. A position with rate `r`
//! covering swaps `[s, e)` contributes `+r` at `s` and `-r` at `e`; the running
//! amount only ever folds in the delta of the swap being performed.

use super::digest::StateDigest;
use crate::domain::{Direction, SwapInterval, Timestamp, TokenPair};
use crate::error::{HubError, HubResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A value per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerDirection<T> {
    pub a_to_b: T,
    pub b_to_a: T,
}

impl<T: Copy> PerDirection<T> {
    pub fn get(&self, direction: Direction) -> T {
        match direction {
            Direction::AToB => self.a_to_b,
            Direction::BToA => self.b_to_a,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::AToB => &mut self.a_to_b,
            Direction::BToA => &mut self.b_to_a,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct IntervalSchedule {
    performed_swaps: u32,
    next_swap_available_at: Timestamp,
    amount_to_swap: PerDirection<u128>,
    deltas: BTreeMap<u32, PerDirection<i128>>,
}

/// An interval ready to be swapped, with what it contributes to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DueSwap {
    pub interval: SwapInterval,
    pub swap_number: u32,
    pub amount_to_swap_a: u128,
    pub amount_to_swap_b: u128,
}

/// Read-only view of one (pair, interval) schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapData {
    pub performed_swaps: u32,
    pub next_swap_available_at: Timestamp,
    pub amount_to_swap_a: u128,
    pub amount_to_swap_b: u128,
    pub is_active: bool,
}

/// Result of advancing an interval by one swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advanced {
    pub swap_number: u32,
    pub swapped: PerDirection<u128>,
    pub next_swap_available_at: Timestamp,
    pub deactivated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SwapScheduleLedger {
    allowed: BTreeSet<SwapInterval>,
    schedules: BTreeMap<(TokenPair, SwapInterval), IntervalSchedule>,
    active: BTreeMap<TokenPair, BTreeSet<SwapInterval>>,
}

impl SwapScheduleLedger {
    pub fn new(allowed: impl IntoIterator<Item = SwapInterval>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn allow_intervals(&mut self, intervals: impl IntoIterator<Item = SwapInterval>) {
        self.allowed.extend(intervals);
    }

    pub fn is_allowed(&self, interval: SwapInterval) -> bool {
        self.allowed.contains(&interval)
    }

    pub fn allowed_intervals(&self) -> impl Iterator<Item = SwapInterval> + '_ {
        self.allowed.iter().copied()
    }

    /// Add `amount` to the delta taking effect at `swap_number`.
    pub fn record_delta(
        &mut self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        swap_number: u32,
        amount: i128,
    ) -> HubResult<()> {
        if !self.is_allowed(interval) {
            return Err(HubError::InvalidInterval(interval));
        }
        let schedule = self
            .schedules
            .entry((pair.clone(), interval))
            .or_default();
        let delta = schedule.deltas.entry(swap_number).or_default();
        let slot = delta.get_mut(direction);
        *slot = slot
            .checked_add(amount)
            .ok_or(HubError::ArithmeticOverflow("swap amount delta"))?;
        if delta.a_to_b == 0 && delta.b_to_a == 0 {
            schedule.deltas.remove(&swap_number);
        }
        Ok(())
    }

    /// Amount that will be swapped at `swap_number`, folding every pending delta
    /// up to it. Swaps already performed have nothing due.
    pub fn amount_due_at(
        &self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        swap_number: u32,
    ) -> HubResult<u128> {
        let Some(schedule) = self.schedules.get(&(pair.clone(), interval)) else {
            return Ok(0);
        };
        if swap_number <= schedule.performed_swaps {
            return Ok(0);
        }
        let pending = schedule
            .deltas
            .range(schedule.performed_swaps + 1..=swap_number)
            .try_fold(0i128, |sum, (_, delta)| sum.checked_add(delta.get(direction)))
            .ok_or(HubError::ArithmeticOverflow("amount to swap"))?;
        schedule
            .amount_to_swap
            .get(direction)
            .checked_add_signed(pending)
            .ok_or(HubError::ArithmeticOverflow("amount to swap"))
    }

    /// Schedule `rate` for the next `swaps` swaps of the interval.
    pub fn add_window(
        &mut self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        rate: u128,
        swaps: u32,
    ) -> HubResult<()> {
        let performed = self.performed_swaps(pair, interval);
        let rate = signed(rate)?;
        let start = performed
            .checked_add(1)
            .ok_or(HubError::ArithmeticOverflow("swap number"))?;
        let end = start
            .checked_add(swaps)
            .ok_or(HubError::ArithmeticOverflow("swap number"))?;
        self.record_delta(pair, interval, direction, start, rate)?;
        self.record_delta(pair, interval, direction, end, -rate)
    }

    /// Cancel the unperformed part of a window that ends after `final_swap`.
    pub fn remove_window(
        &mut self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        rate: u128,
        final_swap: u32,
    ) -> HubResult<()> {
        let performed = self.performed_swaps(pair, interval);
        if rate == 0 || final_swap <= performed {
            return Ok(());
        }
        let rate = signed(rate)?;
        let end = final_swap
            .checked_add(1)
            .ok_or(HubError::ArithmeticOverflow("swap number"))?;
        self.record_delta(pair, interval, direction, performed + 1, -rate)?;
        self.record_delta(pair, interval, direction, end, rate)
    }

    pub fn activate(&mut self, pair: &TokenPair, interval: SwapInterval) {
        self.active.entry(pair.clone()).or_default().insert(interval);
    }

    pub fn is_active(&self, pair: &TokenPair, interval: SwapInterval) -> bool {
        self.active
            .get(pair)
            .is_some_and(|intervals| intervals.contains(&interval))
    }

    /// Active intervals of the pair, ascending.
    pub fn active_intervals(&self, pair: &TokenPair) -> Vec<SwapInterval> {
        self.active
            .get(pair)
            .map(|intervals| intervals.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn performed_swaps(&self, pair: &TokenPair, interval: SwapInterval) -> u32 {
        self.schedules
            .get(&(pair.clone(), interval))
            .map(|s| s.performed_swaps)
            .unwrap_or(0)
    }

    pub fn swap_amount_delta(
        &self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        swap_number: u32,
    ) -> i128 {
        self.schedules
            .get(&(pair.clone(), interval))
            .and_then(|s| s.deltas.get(&swap_number))
            .map(|delta| delta.get(direction))
            .unwrap_or(0)
    }

    pub fn swap_data(&self, pair: &TokenPair, interval: SwapInterval) -> SwapData {
        let schedule = self.schedules.get(&(pair.clone(), interval));
        SwapData {
            performed_swaps: schedule.map(|s| s.performed_swaps).unwrap_or(0),
            next_swap_available_at: schedule
                .map(|s| s.next_swap_available_at)
                .unwrap_or_default(),
            amount_to_swap_a: schedule.map(|s| s.amount_to_swap.a_to_b).unwrap_or(0),
            amount_to_swap_b: schedule.map(|s| s.amount_to_swap.b_to_a).unwrap_or(0),
            is_active: self.is_active(pair, interval),
        }
    }

    /// One row per active interval, ascending: `Some` when the interval is
    /// eligible at `now`, `None` otherwise.
    pub fn collect_due(
        &self,
        pair: &TokenPair,
        now: Timestamp,
    ) -> HubResult<Vec<Option<DueSwap>>> {
        self.active_intervals(pair)
            .into_iter()
            .map(|interval| -> HubResult<Option<DueSwap>> {
                let data = self.swap_data(pair, interval);
                if now < data.next_swap_available_at {
                    return Ok(None);
                }
                let swap_number = data
                    .performed_swaps
                    .checked_add(1)
                    .ok_or(HubError::ArithmeticOverflow("swap number"))?;
                Ok(Some(DueSwap {
                    interval,
                    swap_number,
                    amount_to_swap_a: self.amount_due_at(
                        pair,
                        interval,
                        Direction::AToB,
                        swap_number,
                    )?,
                    amount_to_swap_b: self.amount_due_at(
                        pair,
                        interval,
                        Direction::BToA,
                        swap_number,
                    )?,
                }))
            })
            .collect()
    }

    /// Perform the next swap of the interval: fold its delta into the running
    /// amounts, bump the cursor and schedule the next eligibility boundary.
    pub fn advance(
        &mut self,
        pair: &TokenPair,
        interval: SwapInterval,
        now: Timestamp,
    ) -> HubResult<Advanced> {
        let schedule = self
            .schedules
            .entry((pair.clone(), interval))
            .or_default();
        let swap_number = schedule
            .performed_swaps
            .checked_add(1)
            .ok_or(HubError::ArithmeticOverflow("swap number"))?;
        let delta = schedule.deltas.remove(&swap_number).unwrap_or_default();
        for direction in Direction::BOTH {
            let amount = schedule.amount_to_swap.get_mut(direction);
            *amount = amount
                .checked_add_signed(delta.get(direction))
                .ok_or(HubError::ArithmeticOverflow("amount to swap"))?;
        }
        schedule.performed_swaps = swap_number;
        schedule.next_swap_available_at = interval
            .next_boundary_after(now)
            .ok_or(HubError::ArithmeticOverflow("next swap timestamp"))?;

        let swapped = schedule.amount_to_swap;
        let next_swap_available_at = schedule.next_swap_available_at;
        let drained = swapped.a_to_b == 0 && swapped.b_to_a == 0 && schedule.deltas.is_empty();
        if drained {
            if let Some(intervals) = self.active.get_mut(pair) {
                intervals.remove(&interval);
                if intervals.is_empty() {
                    self.active.remove(pair);
                }
            }
        }
        tracing::debug!(
            pair = %pair,
            interval = %interval,
            swap_number,
            a_to_b = swapped.a_to_b,
            b_to_a = swapped.b_to_a,
            deactivated = drained,
            "advanced swap schedule"
        );
        Ok(Advanced {
            swap_number,
            swapped,
            next_swap_available_at,
            deactivated: drained,
        })
    }

    /// Seconds until any active interval of the pair becomes eligible;
    /// `None` when nothing is scheduled.
    pub fn seconds_until_next_swap(&self, pair: &TokenPair, now: Timestamp) -> Option<u64> {
        self.active_intervals(pair)
            .into_iter()
            .map(|interval| {
                self.swap_data(pair, interval)
                    .next_swap_available_at
                    .as_secs()
                    .saturating_sub(now.as_secs())
            })
            .min()
    }

    pub(crate) fn digest(&self, digest: &mut StateDigest) {
        digest.tag("allowed");
        for interval in &self.allowed {
            digest.u32(interval.as_secs());
        }
        digest.tag("schedules");
        for ((pair, interval), schedule) in &self.schedules {
            digest
                .str(pair.token_a().as_str())
                .str(pair.token_b().as_str())
                .u32(interval.as_secs())
                .u32(schedule.performed_swaps)
                .u64(schedule.next_swap_available_at.as_secs())
                .u128(schedule.amount_to_swap.a_to_b)
                .u128(schedule.amount_to_swap.b_to_a);
            for (swap_number, delta) in &schedule.deltas {
                digest
                    .u32(*swap_number)
                    .i128(delta.a_to_b)
                    .i128(delta.b_to_a);
            }
            digest.tag("end");
        }
        digest.tag("active");
        for (pair, intervals) in &self.active {
            digest.str(pair.token_a().as_str()).str(pair.token_b().as_str());
            for interval in intervals {
                digest.u32(interval.as_secs());
            }
        }
    }
}

fn signed(amount: u128) -> HubResult<i128> {
    i128::try_from(amount).map_err(|_| HubError::ArithmeticOverflow("swap amount delta"))
}
