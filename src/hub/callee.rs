//! Counterparties the hub calls back into in the middle of a swap or a loan.

use super::DcaHub;
use crate::collaborators::TokenLedger;
use crate::domain::{Address, TokenPair};
use crate::error::HubResult;
use serde::Serialize;

/// What a flash-swap callee is told before it must settle up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapCall {
    pub sender: Address,
    pub pair: TokenPair,
    pub borrowed_a: u128,
    pub borrowed_b: u128,
    pub reward_token: Option<Address>,
    pub reward_amount: u128,
    pub token_to_provide: Option<Address>,
    pub amount_to_provide: u128,
    pub data: Vec<u8>,
}

impl SwapCall {
    pub fn token_a(&self) -> &Address {
        self.pair.token_a()
    }

    pub fn token_b(&self) -> &Address {
        self.pair.token_b()
    }
}

/// What a loan callee is told before it must repay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanCall {
    pub sender: Address,
    pub pair: TokenPair,
    pub amount_a: u128,
    pub amount_b: u128,
    pub fee_a: u128,
    pub fee_b: u128,
    pub data: Vec<u8>,
}

/// Receives the reward and any borrowed tokens, and must have transferred
/// `amount_to_provide` plus the borrowed amounts back to the hub by the time
/// `on_swap` returns.
///
/// The callee gets the hub itself and pays it back with
/// [`DcaHub::pay_in`], which draws from the callee's own account. Every
/// mutating hub operation fails with `ReentrantCall` while the swap runs.
pub trait SwapCallee<L: TokenLedger + Clone> {
    fn address(&self) -> Address;

    fn on_swap(&mut self, hub: &mut DcaHub<L>, call: &SwapCall) -> HubResult<()>;
}

/// Receives the loaned tokens and must return them plus the fee, through
/// [`DcaHub::pay_in`], before `on_loan` returns.
pub trait LoanCallee<L: TokenLedger + Clone> {
    fn address(&self) -> Address;

    fn on_loan(&mut self, hub: &mut DcaHub<L>, call: &LoanCall) -> HubResult<()>;
}

/// Who settles the imbalance of a swap.
pub enum Counterparty<'c, L: TokenLedger + Clone> {
    /// The caller receives the reward and the hub pulls what it is owed from
    /// the caller's allowance.
    Direct,
    /// The callee receives the reward and borrowed tokens, then is called back.
    FlashSwap {
        callee: &'c mut dyn SwapCallee<L>,
        data: Vec<u8>,
    },
}
