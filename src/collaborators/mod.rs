//! Interfaces the hub consumes but does not implement: the fungible-token
//! ledger, the price oracle, the position permission registry and the clock.

use crate::domain::{Address, Permission, PermissionSet, PositionId, Timestamp, TokenPair};
use std::fmt;
use thiserror::Error;

pub mod mock;

pub use mock::{FixedRateOracle, InMemoryPermissionRegistry, InMemoryTokenLedger, ManualClock};

/// Fungible-token ledger with transfer / allowance semantics.
///
/// Transfers fail fast on insufficient balance or allowance and leave balances
/// untouched when they fail.
pub trait TokenLedger: fmt::Debug {
    /// Decimals of `token`, used to derive its magnitude.
    fn decimals(&self, token: &Address) -> Result<u8, TokenError>;

    fn balance_of(&self, token: &Address, account: &Address) -> u128;

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128;

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128);

    /// Move `amount` of `token` from `from` to `to`, authorized by `from` itself.
    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;

    /// Move `amount` of `token` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Unknown token: {0}")]
    UnknownToken(Address),
    #[error("Insufficient balance of {token} for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        token: Address,
        account: Address,
        needed: u128,
        available: u128,
    },
    #[error("Insufficient allowance of {token} from {owner} to {spender}: needed {needed}, available {available}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        needed: u128,
        available: u128,
    },
    #[error("Balance of {token} for {account} would overflow")]
    BalanceOverflow { token: Address, account: Address },
}

/// Price source consulted once per settlement.
pub trait PriceOracle: Send + Sync + fmt::Debug {
    /// How many units of the other token of `pair` `amount_in` units of `token_in` are worth.
    fn quote(
        &self,
        pair: &TokenPair,
        amount_in: u128,
        token_in: &Address,
    ) -> Result<u128, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("No price for pair {0}")]
    UnsupportedPair(String),
    #[error("Oracle quoted zero for pair {0}")]
    ZeroQuote(String),
    #[error("Quote overflowed for pair {0}")]
    Overflow(String),
}

/// Position ownership and operator capabilities.
///
/// Methods take `&self`: implementations own their synchronization so a
/// registry can be shared between the hub and whoever administers it.
pub trait PermissionRegistry: Send + Sync + fmt::Debug {
    fn has_permission(&self, id: PositionId, account: &Address, permission: Permission) -> bool;

    /// Record `owner` as owner of `id` and grant the operator sets.
    fn mint(&self, id: PositionId, owner: &Address, permissions: &[PermissionSet]);

    /// Forget everything about `id`.
    fn burn(&self, id: PositionId);
}

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = chrono::Utc::now().timestamp();
        Timestamp(u64::try_from(secs).unwrap_or(0))
    }
}
