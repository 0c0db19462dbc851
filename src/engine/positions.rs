//! Position records and the swapped / unswapped arithmetic over the ledgers.

use super::digest::StateDigest;
use super::ratios::RatioAccumulatorLedger;
use crate::domain::{Address, Direction, PositionId, SwapInterval, TokenPair};
use crate::error::{HubError, HubResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// A depositor's recurring order.
///
/// The position sells `rate` units of `from` on every swap in
/// `(last_updated_swap, final_swap]` of its interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub id: PositionId,
    pub owner: Address,
    pub from: Address,
    pub to: Address,
    pub pair: TokenPair,
    pub interval: SwapInterval,
    pub rate: u128,
    /// Magnitude of `from`, captured at deposit.
    pub from_magnitude: u128,
    pub last_updated_swap: u32,
    pub final_swap: u32,
    /// Proceeds accrued before the last increase / reduce and not yet withdrawn.
    pub swapped_before_modified: u128,
}

impl Position {
    pub fn direction(&self) -> Direction {
        self.pair.direction_from(&self.from)
    }

    /// Last swap whose proceeds belong to this position.
    fn newest_swap_to_consider(&self, performed_swaps: u32) -> u32 {
        performed_swaps.min(self.final_swap)
    }

    pub fn swaps_executed(&self, performed_swaps: u32) -> u32 {
        self.newest_swap_to_consider(performed_swaps)
            .saturating_sub(self.last_updated_swap)
    }

    pub fn swaps_left(&self, performed_swaps: u32) -> u32 {
        self.final_swap
            .saturating_sub(performed_swaps.max(self.last_updated_swap))
    }

    /// Unswapped funds still scheduled.
    pub fn remaining(&self, performed_swaps: u32) -> HubResult<u128> {
        self.rate
            .checked_mul(u128::from(self.swaps_left(performed_swaps)))
            .ok_or(HubError::ArithmeticOverflow("remaining amount"))
    }

    /// Proceeds owed to the position and not yet withdrawn.
    pub fn swapped(
        &self,
        performed_swaps: u32,
        ratios: &RatioAccumulatorLedger,
    ) -> HubResult<u128> {
        let newest = self.newest_swap_to_consider(performed_swaps);
        if self.last_updated_swap >= newest {
            return Ok(self.swapped_before_modified);
        }
        let since_update = ratios.proceeds_since(
            &self.pair,
            self.interval,
            self.direction(),
            self.last_updated_swap,
            newest,
            self.rate,
            self.from_magnitude,
        )?;
        since_update
            .checked_add(self.swapped_before_modified)
            .ok_or(HubError::ArithmeticOverflow("swapped amount"))
    }
}

/// Read-only view of a position. All fields are zero / null for ids that do
/// not exist or were terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPosition {
    pub from: Address,
    pub to: Address,
    pub swap_interval: SwapInterval,
    pub swaps_executed: u32,
    pub swapped: u128,
    pub swaps_left: u32,
    pub remaining: u128,
    pub rate: u128,
}

impl UserPosition {
    pub fn empty() -> Self {
        Self {
            from: Address::zero(),
            to: Address::zero(),
            swap_interval: SwapInterval(0),
            swaps_executed: 0,
            swapped: 0,
            swaps_left: 0,
            remaining: 0,
            rate: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::empty()
    }
}

/// Every live position, plus the id counter.
#[derive(Debug, Clone)]
pub struct PositionBook {
    next_id: u64,
    positions: BTreeMap<PositionId, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            positions: BTreeMap::new(),
        }
    }

    /// Reserve the next id. Ids are never reused.
    pub fn next_id(&mut self) -> PositionId {
        let id = PositionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.id, position);
    }

    pub fn get(&self, id: PositionId) -> HubResult<&Position> {
        self.positions.get(&id).ok_or(HubError::InvalidPosition(id))
    }

    pub fn get_mut(&mut self, id: PositionId) -> HubResult<&mut Position> {
        self.positions
            .get_mut(&id)
            .ok_or(HubError::InvalidPosition(id))
    }

    pub fn remove(&mut self, id: PositionId) -> HubResult<Position> {
        self.positions
            .remove(&id)
            .ok_or(HubError::InvalidPosition(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub(crate) fn digest(&self, digest: &mut StateDigest) {
        digest.tag("positions").u64(self.next_id);
        for position in self.positions.values() {
            digest
                .u64(position.id.0)
                .str(position.owner.as_str())
                .str(position.from.as_str())
                .str(position.to.as_str())
                .u32(position.interval.as_secs())
                .u128(position.rate)
                .u128(position.from_magnitude)
                .u32(position.last_updated_swap)
                .u32(position.final_swap)
                .u128(position.swapped_before_modified);
        }
    }
}

impl Default for PositionBook {
    fn default() -> Self {
        Self::new()
    }
}
