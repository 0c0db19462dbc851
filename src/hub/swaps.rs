//! Swap handler: batch settlement of every due interval of a pair, and loans.

use super::callee::{Counterparty, LoanCall, LoanCallee, SwapCall};
use super::DcaHub;
use crate::collaborators::TokenLedger;
use crate::domain::{Address, Direction, Timestamp, TokenPair};
use crate::engine::fees::calculate_fee;
use crate::engine::{compute_settlement, DueSwap, PairSide, Settlement};
use crate::error::{HubError, HubResult};
use serde::Serialize;

/// Everything the next swap of a pair would do if executed now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextSwapInfo {
    pub pair: TokenPair,
    /// Intervals that are due, ascending.
    pub swaps_to_perform: Vec<DueSwap>,
    pub amount_to_swap_a: u128,
    pub amount_to_swap_b: u128,
    pub settlement: Settlement,
    pub available_to_borrow_a: u128,
    pub available_to_borrow_b: u128,
}

impl NextSwapInfo {
    pub fn token(&self, side: PairSide) -> &Address {
        match side {
            PairSide::A => self.pair.token_a(),
            PairSide::B => self.pair.token_b(),
        }
    }

    pub fn token_to_be_provided(&self) -> Option<&Address> {
        self.settlement
            .token_to_be_provided
            .map(|side| self.token(side))
    }

    pub fn token_to_reward(&self) -> Option<&Address> {
        self.settlement.token_to_reward.map(|side| self.token(side))
    }

    pub fn available_to_borrow(&self, side: PairSide) -> u128 {
        match side {
            PairSide::A => self.available_to_borrow_a,
            PairSide::B => self.available_to_borrow_b,
        }
    }
}

const SIDES: [PairSide; 2] = [PairSide::A, PairSide::B];

impl<L: TokenLedger + Clone> DcaHub<L> {
    pub fn get_next_swap_info(&self, pair: &TokenPair) -> HubResult<NextSwapInfo> {
        self.next_swap_info_at(pair, self.clock.now())
    }

    fn next_swap_info_at(&self, pair: &TokenPair, now: Timestamp) -> HubResult<NextSwapInfo> {
        let swaps_to_perform: Vec<DueSwap> = self
            .state
            .schedule
            .collect_due(pair, now)?
            .into_iter()
            .flatten()
            .collect();

        let mut amount_to_swap_a: u128 = 0;
        let mut amount_to_swap_b: u128 = 0;
        for due in &swaps_to_perform {
            amount_to_swap_a = amount_to_swap_a
                .checked_add(due.amount_to_swap_a)
                .ok_or(HubError::ArithmeticOverflow("amount to swap"))?;
            amount_to_swap_b = amount_to_swap_b
                .checked_add(due.amount_to_swap_b)
                .ok_or(HubError::ArithmeticOverflow("amount to swap"))?;
        }

        let settlement = if swaps_to_perform.is_empty() {
            Settlement::default()
        } else {
            let magnitude_a = self.magnitude(pair.token_a())?;
            let magnitude_b = self.magnitude(pair.token_b())?;
            let rate_per_unit_b_to_a = self.oracle.quote(pair, magnitude_b, pair.token_b())?;
            compute_settlement(
                amount_to_swap_a,
                amount_to_swap_b,
                rate_per_unit_b_to_a,
                magnitude_a,
                magnitude_b,
                self.state.swap_fee,
            )?
        };

        let available = |token: &Address, side: PairSide| {
            self.tokens
                .balance_of(token, &self.address)
                .saturating_sub(settlement.reward_for(side))
        };
        Ok(NextSwapInfo {
            pair: pair.clone(),
            available_to_borrow_a: available(pair.token_a(), PairSide::A),
            available_to_borrow_b: available(pair.token_b(), PairSide::B),
            swaps_to_perform,
            amount_to_swap_a,
            amount_to_swap_b,
            settlement,
        })
    }

    /// Settle every due interval of `pair` in one batch.
    ///
    /// The counterparty receives the reward (plus `borrow_a` / `borrow_b`) and
    /// must leave the hub holding at least what it held before, minus the
    /// reward, plus the amount to provide. Anything above that becomes
    /// platform balance.
    pub fn swap(
        &mut self,
        caller: &Address,
        pair: &TokenPair,
        borrow_a: u128,
        borrow_b: u128,
        counterparty: Counterparty<'_, L>,
    ) -> HubResult<NextSwapInfo> {
        self.transact("swap", |hub| {
            hub.execute_swap(caller, pair, [borrow_a, borrow_b], counterparty)
        })
    }

    fn execute_swap(
        &mut self,
        caller: &Address,
        pair: &TokenPair,
        borrow: [u128; 2],
        counterparty: Counterparty<'_, L>,
    ) -> HubResult<NextSwapInfo> {
        let now = self.clock.now();
        let info = self.next_swap_info_at(pair, now)?;
        if info.swaps_to_perform.is_empty() {
            return Err(HubError::NoSwapsToExecute);
        }
        let settlement = info.settlement;

        for (side, requested) in SIDES.into_iter().zip(borrow) {
            let available = info.available_to_borrow(side);
            if requested > available {
                return Err(HubError::InsufficientLiquidity {
                    token: info.token(side).clone(),
                    requested,
                    available,
                });
            }
        }

        let balance_before = SIDES.map(|side| self.tokens.balance_of(info.token(side), &self.address));
        let recipient = match &counterparty {
            Counterparty::Direct => caller.clone(),
            Counterparty::FlashSwap { callee, .. } => callee.address(),
        };
        for (side, borrowed) in SIDES.into_iter().zip(borrow) {
            let outgoing = settlement
                .reward_for(side)
                .checked_add(borrowed)
                .ok_or(HubError::ArithmeticOverflow("swap transfer"))?;
            if outgoing > 0 {
                self.tokens
                    .transfer(info.token(side), &self.address, &recipient, outgoing)?;
            }
        }

        match counterparty {
            Counterparty::FlashSwap { callee, data } => {
                let call = SwapCall {
                    sender: caller.clone(),
                    pair: pair.clone(),
                    borrowed_a: borrow[0],
                    borrowed_b: borrow[1],
                    reward_token: info.token_to_reward().cloned(),
                    reward_amount: settlement.amount_to_reward,
                    token_to_provide: info.token_to_be_provided().cloned(),
                    amount_to_provide: settlement.amount_to_be_provided,
                    data,
                };
                let payer = callee.address();
                self.with_payer(payer, |hub| callee.on_swap(hub, &call))?;
            }
            Counterparty::Direct => {
                for (side, borrowed) in SIDES.into_iter().zip(borrow) {
                    let owed = settlement.provided_for(side).saturating_add(borrowed);
                    if owed == 0 {
                        continue;
                    }
                    self.tokens.transfer_from(
                        info.token(side),
                        &self.address,
                        caller,
                        &self.address,
                        owed,
                    )?;
                }
            }
        }

        for (i, side) in SIDES.into_iter().enumerate() {
            let token = info.token(side);
            let expected = balance_before[i]
                .checked_sub(settlement.reward_for(side))
                .and_then(|b| b.checked_add(settlement.provided_for(side)))
                .ok_or(HubError::ArithmeticOverflow("swap balances"))?;
            let actual = self.tokens.balance_of(token, &self.address);
            if actual < expected {
                return Err(HubError::LiquidityNotReturned {
                    token: token.clone(),
                    expected,
                    actual,
                });
            }
            let fee = settlement
                .platform_fee_for(side)
                .checked_add(actual - expected)
                .ok_or(HubError::ArithmeticOverflow("platform balance"))?;
            self.credit_platform(token, fee)?;
        }

        let swap_fee = self.state.swap_fee;
        for due in &info.swaps_to_perform {
            self.state.ratios.register(
                pair,
                due.interval,
                Direction::AToB,
                due.swap_number,
                settlement.net_rate_a_to_b(swap_fee),
            );
            self.state.ratios.register(
                pair,
                due.interval,
                Direction::BToA,
                due.swap_number,
                settlement.net_rate_b_to_a(swap_fee),
            );
            self.state.schedule.advance(pair, due.interval, now)?;
        }

        tracing::info!(
            pair = %pair,
            sender = %caller,
            intervals = info.swaps_to_perform.len(),
            amount_to_swap_a = info.amount_to_swap_a,
            amount_to_swap_b = info.amount_to_swap_b,
            provided = settlement.amount_to_be_provided,
            reward = settlement.amount_to_reward,
            "swapped"
        );
        Ok(info)
    }

    /// Lend `amount_a` / `amount_b` of the hub's balance to `callee`, which
    /// must return them plus the loan fee before its callback returns.
    pub fn loan(
        &mut self,
        caller: &Address,
        pair: &TokenPair,
        amount_a: u128,
        amount_b: u128,
        callee: &mut dyn LoanCallee<L>,
        data: Vec<u8>,
    ) -> HubResult<()> {
        self.transact("loan", |hub| {
            hub.execute_loan(caller, pair, [amount_a, amount_b], callee, data)
        })
    }

    fn execute_loan(
        &mut self,
        caller: &Address,
        pair: &TokenPair,
        amounts: [u128; 2],
        callee: &mut dyn LoanCallee<L>,
        data: Vec<u8>,
    ) -> HubResult<()> {
        let tokens = [pair.token_a().clone(), pair.token_b().clone()];
        let balance_before = tokens
            .clone()
            .map(|token| self.tokens.balance_of(&token, &self.address));
        for i in 0..2 {
            if amounts[i] > balance_before[i] {
                return Err(HubError::InsufficientLiquidity {
                    token: tokens[i].clone(),
                    requested: amounts[i],
                    available: balance_before[i],
                });
            }
        }

        let borrower = callee.address();
        for i in 0..2 {
            if amounts[i] > 0 {
                self.tokens
                    .transfer(&tokens[i], &self.address, &borrower, amounts[i])?;
            }
        }
        let loan_fee = self.state.loan_fee;
        let fees = amounts.map(|amount| calculate_fee(amount, loan_fee));
        let call = LoanCall {
            sender: caller.clone(),
            pair: pair.clone(),
            amount_a: amounts[0],
            amount_b: amounts[1],
            fee_a: fees[0],
            fee_b: fees[1],
            data,
        };
        self.with_payer(borrower.clone(), |hub| callee.on_loan(hub, &call))?;

        for i in 0..2 {
            let expected = balance_before[i]
                .checked_add(fees[i])
                .ok_or(HubError::ArithmeticOverflow("loan balances"))?;
            let actual = self.tokens.balance_of(&tokens[i], &self.address);
            if actual < expected {
                return Err(HubError::LiquidityNotReturned {
                    token: tokens[i].clone(),
                    expected,
                    actual,
                });
            }
            self.credit_platform(&tokens[i], actual - balance_before[i])?;
        }

        tracing::info!(
            pair = %pair,
            sender = %caller,
            borrower = %borrower,
            amount_a = amounts[0],
            amount_b = amounts[1],
            fee_a = fees[0],
            fee_b = fees[1],
            "loaned"
        );
        Ok(())
    }
}
