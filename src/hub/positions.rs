//! Position handler: deposit, increase, reduce, withdraw and terminate.

use super::DcaHub;
use crate::collaborators::TokenLedger;
use crate::domain::{Address, Permission, PermissionSet, PositionId, SwapInterval, TokenPair};
use crate::engine::Position;
use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};

/// A new recurring order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositParams {
    pub from: Address,
    pub to: Address,
    /// Total amount of `from`; the rate is `amount / swaps`.
    pub amount: u128,
    pub swaps: u32,
    pub interval: SwapInterval,
    pub owner: Address,
    pub permissions: Vec<PermissionSet>,
}

/// Positions to withdraw from, all swapping into `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSet {
    pub token: Address,
    pub position_ids: Vec<PositionId>,
}

#[derive(Debug, Clone, Copy)]
enum Adjustment {
    Increase(u128),
    Reduce(u128),
}

impl<L: TokenLedger + Clone> DcaHub<L> {
    /// Open a position, pulling `params.amount` of `from` from `depositor`.
    pub fn deposit(&mut self, depositor: &Address, params: DepositParams) -> HubResult<PositionId> {
        self.transact("deposit", |hub| hub.open_position(depositor, params))
    }

    fn open_position(&mut self, depositor: &Address, params: DepositParams) -> HubResult<PositionId> {
        let DepositParams {
            from,
            to,
            amount,
            swaps,
            interval,
            owner,
            permissions,
        } = params;
        if from.is_zero() || to.is_zero() || owner.is_zero() {
            return Err(HubError::ZeroAddress);
        }
        if !self.state.schedule.is_allowed(interval) {
            return Err(HubError::InvalidInterval(interval));
        }
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        if swaps == 0 {
            return Err(HubError::ZeroSwaps);
        }
        let pair = TokenPair::new(from.clone(), to.clone())
            .ok_or_else(|| HubError::InvalidToken(from.clone()))?;
        let rate = amount / u128::from(swaps);
        if rate == 0 {
            return Err(HubError::ZeroAmount);
        }
        let from_magnitude = self.magnitude(&from)?;
        self.magnitude(&to)?;

        self.tokens
            .transfer_from(&from, &self.address, depositor, &self.address, amount)?;
        // Truncated remainder of the rate division.
        self.credit_platform(&from, amount - rate * u128::from(swaps))?;

        let direction = pair.direction_from(&from);
        let performed = self.state.schedule.performed_swaps(&pair, interval);
        self.state
            .schedule
            .add_window(&pair, interval, direction, rate, swaps)?;
        self.state.schedule.activate(&pair, interval);

        let id = self.state.positions.next_id();
        self.state.positions.insert(Position {
            id,
            owner: owner.clone(),
            from: from.clone(),
            to: to.clone(),
            pair,
            interval,
            rate,
            from_magnitude,
            last_updated_swap: performed,
            final_swap: performed + swaps,
            swapped_before_modified: 0,
        });
        self.permissions.mint(id, &owner, &permissions);

        tracing::info!(
            position = %id,
            owner = %owner,
            from = %from,
            to = %to,
            interval = %interval,
            rate,
            swaps,
            "deposited"
        );
        Ok(id)
    }

    /// Pay out everything the position has swapped so far.
    pub fn withdraw_swapped(
        &mut self,
        caller: &Address,
        id: PositionId,
        recipient: &Address,
    ) -> HubResult<u128> {
        self.transact("withdraw_swapped", |hub| {
            if recipient.is_zero() {
                return Err(HubError::ZeroAddress);
            }
            let to = hub.state.positions.get(id)?.to.clone();
            hub.ensure_permission(id, caller, Permission::Withdraw)?;
            let swapped = hub.checkpoint_swapped(id)?;
            hub.tokens.transfer(&to, &hub.address, recipient, swapped)?;
            tracing::info!(position = %id, recipient = %recipient, swapped, "withdrew swapped");
            Ok(swapped)
        })
    }

    /// Withdraw from several positions at once, one transfer per output token.
    /// Returns the amount withdrawn for each group, in order.
    pub fn withdraw_swapped_many(
        &mut self,
        caller: &Address,
        groups: &[PositionSet],
        recipient: &Address,
    ) -> HubResult<Vec<u128>> {
        self.transact("withdraw_swapped_many", |hub| {
            if recipient.is_zero() {
                return Err(HubError::ZeroAddress);
            }
            let mut withdrawn = Vec::with_capacity(groups.len());
            for group in groups {
                let mut total: u128 = 0;
                for &id in &group.position_ids {
                    if hub.state.positions.get(id)?.to != group.token {
                        return Err(HubError::PositionDoesNotMatchToken {
                            position: id,
                            token: group.token.clone(),
                        });
                    }
                    hub.ensure_permission(id, caller, Permission::Withdraw)?;
                    let swapped = hub.checkpoint_swapped(id)?;
                    total = total
                        .checked_add(swapped)
                        .ok_or(HubError::ArithmeticOverflow("swapped amount"))?;
                }
                hub.tokens
                    .transfer(&group.token, &hub.address, recipient, total)?;
                tracing::info!(
                    token = %group.token,
                    positions = group.position_ids.len(),
                    recipient = %recipient,
                    swapped = total,
                    "withdrew swapped from many"
                );
                withdrawn.push(total);
            }
            Ok(withdrawn)
        })
    }

    /// Add `amount` to the position and spread what is left over `new_swaps`.
    pub fn increase_position(
        &mut self,
        caller: &Address,
        id: PositionId,
        amount: u128,
        new_swaps: u32,
    ) -> HubResult<()> {
        self.transact("increase_position", |hub| {
            let from = hub.state.positions.get(id)?.from.clone();
            hub.ensure_permission(id, caller, Permission::Increase)?;
            if new_swaps == 0 {
                return Err(HubError::ZeroSwaps);
            }
            hub.modify(id, Adjustment::Increase(amount), new_swaps)?;
            hub.tokens
                .transfer_from(&from, &hub.address, caller, &hub.address, amount)?;
            Ok(())
        })
    }

    /// Take `amount` out of the position and spread what is left over
    /// `new_swaps`. With `new_swaps == 0`, `amount` must be the whole remainder.
    pub fn reduce_position(
        &mut self,
        caller: &Address,
        id: PositionId,
        amount: u128,
        new_swaps: u32,
        recipient: &Address,
    ) -> HubResult<()> {
        self.transact("reduce_position", |hub| {
            if recipient.is_zero() {
                return Err(HubError::ZeroAddress);
            }
            let from = hub.state.positions.get(id)?.from.clone();
            hub.ensure_permission(id, caller, Permission::Reduce)?;
            hub.modify(id, Adjustment::Reduce(amount), new_swaps)?;
            hub.tokens.transfer(&from, &hub.address, recipient, amount)?;
            Ok(())
        })
    }

    /// Close the position, paying unswapped funds and swapped proceeds to
    /// their recipients. Returns `(unswapped, swapped)`.
    pub fn terminate(
        &mut self,
        caller: &Address,
        id: PositionId,
        recipient_unswapped: &Address,
        recipient_swapped: &Address,
    ) -> HubResult<(u128, u128)> {
        self.transact("terminate", |hub| {
            if recipient_unswapped.is_zero() || recipient_swapped.is_zero() {
                return Err(HubError::ZeroAddress);
            }
            let position = hub.state.positions.get(id)?.clone();
            hub.ensure_permission(id, caller, Permission::Terminate)?;

            let performed = hub.performed_swaps_of(&position);
            let swapped = position.swapped(performed, &hub.state.ratios)?;
            let unswapped = position.remaining(performed)?;
            hub.state.schedule.remove_window(
                &position.pair,
                position.interval,
                position.direction(),
                position.rate,
                position.final_swap,
            )?;
            hub.state.positions.remove(id)?;

            hub.tokens
                .transfer(&position.from, &hub.address, recipient_unswapped, unswapped)?;
            hub.tokens
                .transfer(&position.to, &hub.address, recipient_swapped, swapped)?;
            hub.permissions.burn(id);

            tracing::info!(position = %id, unswapped, swapped, "terminated");
            Ok((unswapped, swapped))
        })
    }

    /// Take the position's swapped amount and restart accrual from now.
    fn checkpoint_swapped(&mut self, id: PositionId) -> HubResult<u128> {
        let position = self.state.positions.get(id)?;
        let performed = self.performed_swaps_of(position);
        let swapped = position.swapped(performed, &self.state.ratios)?;
        let position = self.state.positions.get_mut(id)?;
        position.last_updated_swap = performed;
        position.swapped_before_modified = 0;
        Ok(swapped)
    }

    fn modify(&mut self, id: PositionId, adjustment: Adjustment, new_swaps: u32) -> HubResult<()> {
        let position = self.state.positions.get(id)?.clone();
        let performed = self.performed_swaps_of(&position);
        let swapped = position.swapped(performed, &self.state.ratios)?;
        let unswapped = position.remaining(performed)?;
        let total = match adjustment {
            Adjustment::Increase(amount) => unswapped.checked_add(amount),
            Adjustment::Reduce(amount) => unswapped.checked_sub(amount),
        }
        .ok_or(HubError::ArithmeticOverflow("position funds"))?;

        let new_swaps = match (total, new_swaps) {
            (0, _) => 0,
            (_, 0) => return Err(HubError::ZeroSwaps),
            (_, swaps) => swaps,
        };
        let new_rate = if new_swaps == 0 {
            0
        } else {
            total / u128::from(new_swaps)
        };
        if total > 0 && new_rate == 0 {
            return Err(HubError::ZeroAmount);
        }
        self.credit_platform(&position.from, total - new_rate * u128::from(new_swaps))?;

        let direction = position.direction();
        self.state.schedule.remove_window(
            &position.pair,
            position.interval,
            direction,
            position.rate,
            position.final_swap,
        )?;
        let final_swap = performed
            .checked_add(new_swaps)
            .ok_or(HubError::ArithmeticOverflow("swap number"))?;
        if new_rate > 0 {
            self.state.schedule.add_window(
                &position.pair,
                position.interval,
                direction,
                new_rate,
                new_swaps,
            )?;
            self.state.schedule.activate(&position.pair, position.interval);
        }

        let stored = self.state.positions.get_mut(id)?;
        stored.rate = new_rate;
        stored.last_updated_swap = performed;
        stored.final_swap = final_swap;
        stored.swapped_before_modified = swapped;

        tracing::info!(
            position = %id,
            ?adjustment,
            rate = new_rate,
            swaps = new_swaps,
            "modified position"
        );
        Ok(())
    }
}
