//! The DCA hub: the transactional surface over the accounting engine.
//!
//! Every mutating operation runs through [`DcaHub::transact`], which rejects
//! reentrant calls and restores the engine state and the token ledger when the
//! operation fails, so a failed call leaves no partial writes.

use crate::collaborators::{Clock, PermissionRegistry, PriceOracle, TokenLedger};
use crate::config::HubConfig;
use crate::domain::{Address, Direction, Magnitude, Permission, PositionId, SwapInterval, TokenPair};
use crate::engine::fees::is_valid_fee;
use crate::engine::{
    Position, PositionBook, RatioAccumulatorLedger, StateDigest, SwapData, SwapScheduleLedger,
    UserPosition,
};
use crate::error::{HubError, HubResult};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod callee;
pub mod positions;
pub mod swaps;

pub use callee::{Counterparty, LoanCall, LoanCallee, SwapCall, SwapCallee};
pub use positions::{DepositParams, PositionSet};
pub use swaps::NextSwapInfo;

/// Engine state restored as a whole when an operation fails.
#[derive(Debug, Clone)]
struct HubState {
    schedule: SwapScheduleLedger,
    ratios: RatioAccumulatorLedger,
    positions: PositionBook,
    platform_balance: BTreeMap<Address, u128>,
    swap_fee: u32,
    loan_fee: u32,
}

#[derive(Debug)]
pub struct DcaHub<L: TokenLedger + Clone> {
    address: Address,
    fee_recipient: Address,
    state: HubState,
    tokens: L,
    oracle: Arc<dyn PriceOracle>,
    permissions: Arc<dyn PermissionRegistry>,
    clock: Arc<dyn Clock>,
    locked: bool,
    /// Callee currently allowed to pay the hub through `pay_in`.
    payer: Option<Address>,
}

impl<L: TokenLedger + Clone> DcaHub<L> {
    pub fn new(
        config: HubConfig,
        tokens: L,
        oracle: Arc<dyn PriceOracle>,
        permissions: Arc<dyn PermissionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> HubResult<Self> {
        if config.hub_address.is_zero() || config.fee_recipient.is_zero() {
            return Err(HubError::ZeroAddress);
        }
        for fee in [config.swap_fee, config.loan_fee] {
            if !is_valid_fee(fee) {
                return Err(HubError::HighFee(fee));
            }
        }
        if let Some(zero) = config.allowed_intervals.iter().find(|i| i.as_secs() == 0) {
            return Err(HubError::InvalidInterval(*zero));
        }
        tracing::info!(
            hub = %config.hub_address,
            swap_fee = config.swap_fee,
            loan_fee = config.loan_fee,
            intervals = config.allowed_intervals.len(),
            "dca hub created"
        );
        Ok(Self {
            address: config.hub_address,
            fee_recipient: config.fee_recipient,
            state: HubState {
                schedule: SwapScheduleLedger::new(config.allowed_intervals),
                ratios: RatioAccumulatorLedger::new(),
                positions: PositionBook::new(),
                platform_balance: BTreeMap::new(),
                swap_fee: config.swap_fee,
                loan_fee: config.loan_fee,
            },
            tokens,
            oracle,
            permissions,
            clock,
            locked: false,
            payer: None,
        })
    }

    /// Run `operation` as one all-or-nothing transaction.
    fn transact<R>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> HubResult<R>,
    ) -> HubResult<R> {
        if self.locked {
            tracing::warn!(operation, "rejected reentrant call");
            return Err(HubError::ReentrantCall);
        }
        self.locked = true;
        let state = self.state.clone();
        let tokens = self.tokens.clone();
        let result = f(self);
        if let Err(err) = &result {
            self.state = state;
            self.tokens = tokens;
            tracing::debug!(operation, error = %err, "rolled back");
        }
        self.locked = false;
        result
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn fee_recipient(&self) -> &Address {
        &self.fee_recipient
    }

    /// True while a mutating operation is executing, i.e. inside a callback.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn tokens(&self) -> &L {
        &self.tokens
    }

    /// Pay `amount` of `token` to the hub from the account of the swap or loan
    /// callee currently being called back. Fails outside such a callback.
    pub fn pay_in(&mut self, token: &Address, amount: u128) -> HubResult<()> {
        let payer = self.payer.clone().ok_or(HubError::NoPaymentExpected)?;
        if amount == 0 {
            return Ok(());
        }
        self.tokens.transfer(token, &payer, &self.address, amount)?;
        tracing::debug!(token = %token, amount, payer = %payer, "paid in");
        Ok(())
    }

    /// Run a callee with `payer` allowed to `pay_in` for the duration.
    fn with_payer<R>(&mut self, payer: Address, f: impl FnOnce(&mut Self) -> R) -> R {
        self.payer = Some(payer);
        let result = f(self);
        self.payer = None;
        result
    }

    pub fn swap_fee(&self) -> u32 {
        self.state.swap_fee
    }

    pub fn loan_fee(&self) -> u32 {
        self.state.loan_fee
    }

    pub fn set_swap_fee(&mut self, fee: u32) -> HubResult<()> {
        self.transact("set_swap_fee", |hub| {
            if !is_valid_fee(fee) {
                return Err(HubError::HighFee(fee));
            }
            hub.state.swap_fee = fee;
            tracing::info!(fee, "swap fee set");
            Ok(())
        })
    }

    pub fn set_loan_fee(&mut self, fee: u32) -> HubResult<()> {
        self.transact("set_loan_fee", |hub| {
            if !is_valid_fee(fee) {
                return Err(HubError::HighFee(fee));
            }
            hub.state.loan_fee = fee;
            tracing::info!(fee, "loan fee set");
            Ok(())
        })
    }

    pub fn allow_swap_intervals(&mut self, intervals: &[SwapInterval]) -> HubResult<()> {
        self.transact("allow_swap_intervals", |hub| {
            if let Some(zero) = intervals.iter().find(|i| i.as_secs() == 0) {
                return Err(HubError::InvalidInterval(*zero));
            }
            hub.state.schedule.allow_intervals(intervals.iter().copied());
            Ok(())
        })
    }

    pub fn allowed_intervals(&self) -> Vec<SwapInterval> {
        self.state.schedule.allowed_intervals().collect()
    }

    pub fn platform_balance(&self, token: &Address) -> u128 {
        self.state
            .platform_balance
            .get(token)
            .copied()
            .unwrap_or(0)
    }

    /// Send accrued fees to `recipient`. Only the fee recipient may call this.
    pub fn withdraw_platform_balance(
        &mut self,
        caller: &Address,
        token: &Address,
        amount: u128,
        recipient: &Address,
    ) -> HubResult<()> {
        self.transact("withdraw_platform_balance", |hub| {
            if caller != &hub.fee_recipient {
                return Err(HubError::NotFeeRecipient(caller.clone()));
            }
            if recipient.is_zero() {
                return Err(HubError::ZeroAddress);
            }
            let available = hub.platform_balance(token);
            if amount > available {
                return Err(HubError::InsufficientPlatformBalance {
                    token: token.clone(),
                    requested: amount,
                    available,
                });
            }
            hub.state
                .platform_balance
                .insert(token.clone(), available - amount);
            hub.tokens.transfer(token, &hub.address, recipient, amount)?;
            tracing::info!(token = %token, amount, recipient = %recipient, "platform balance withdrawn");
            Ok(())
        })
    }

    pub fn schedule(&self) -> &SwapScheduleLedger {
        &self.state.schedule
    }

    pub fn ratios(&self) -> &RatioAccumulatorLedger {
        &self.state.ratios
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.state.positions.get(id).ok()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.state.positions.iter()
    }

    /// Read-only view of a position; all zero for unknown ids.
    pub fn user_position(&self, id: PositionId) -> HubResult<UserPosition> {
        let Ok(position) = self.state.positions.get(id) else {
            return Ok(UserPosition::empty());
        };
        let performed = self.performed_swaps_of(position);
        Ok(UserPosition {
            from: position.from.clone(),
            to: position.to.clone(),
            swap_interval: position.interval,
            swaps_executed: position.swaps_executed(performed),
            swapped: position.swapped(performed, &self.state.ratios)?,
            swaps_left: position.swaps_left(performed),
            remaining: position.remaining(performed)?,
            rate: position.rate,
        })
    }

    pub fn swap_data(&self, pair: &TokenPair, interval: SwapInterval) -> SwapData {
        self.state.schedule.swap_data(pair, interval)
    }

    pub fn swap_amount_delta(
        &self,
        pair: &TokenPair,
        interval: SwapInterval,
        direction: Direction,
        swap_number: u32,
    ) -> i128 {
        self.state
            .schedule
            .swap_amount_delta(pair, interval, direction, swap_number)
    }

    pub fn active_intervals(&self, pair: &TokenPair) -> Vec<SwapInterval> {
        self.state.schedule.active_intervals(pair)
    }

    pub fn seconds_until_next_swap(&self, pair: &TokenPair) -> Option<u64> {
        self.state
            .schedule
            .seconds_until_next_swap(pair, self.clock.now())
    }

    /// Hex SHA-256 over the whole engine state. Equal fingerprints mean equal
    /// ledgers, positions, platform balances and fees.
    pub fn state_fingerprint(&self) -> String {
        let mut digest = StateDigest::new();
        self.state.schedule.digest(&mut digest);
        self.state.ratios.digest(&mut digest);
        self.state.positions.digest(&mut digest);
        digest.tag("platform");
        for (token, balance) in &self.state.platform_balance {
            digest.str(token.as_str()).u128(*balance);
        }
        digest
            .tag("fees")
            .u32(self.state.swap_fee)
            .u32(self.state.loan_fee);
        digest.finish()
    }

    fn magnitude(&self, token: &Address) -> HubResult<u128> {
        let decimals = self.tokens.decimals(token)?;
        Ok(Magnitude::from_decimals(decimals)?.get())
    }

    fn performed_swaps_of(&self, position: &Position) -> u32 {
        self.state
            .schedule
            .performed_swaps(&position.pair, position.interval)
    }

    fn ensure_permission(
        &self,
        id: PositionId,
        caller: &Address,
        permission: Permission,
    ) -> HubResult<()> {
        if self.permissions.has_permission(id, caller, permission) {
            Ok(())
        } else {
            Err(HubError::UnauthorizedCaller {
                caller: caller.clone(),
                position: id,
            })
        }
    }

    fn credit_platform(&mut self, token: &Address, amount: u128) -> HubResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let balance = self
            .state
            .platform_balance
            .entry(token.clone())
            .or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(HubError::ArithmeticOverflow("platform balance"))?;
        Ok(())
    }
}
