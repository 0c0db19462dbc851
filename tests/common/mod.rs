#![allow(dead_code)]

use dca_hub::domain::to_units;
use dca_hub::{
    Address, DcaHub, DepositParams, FixedRateOracle, HubConfig, HubError, HubResult,
    InMemoryPermissionRegistry, InMemoryTokenLedger, LoanCall, LoanCallee, ManualClock,
    PositionId, SwapCall, SwapCallee, SwapInterval, Timestamp, TokenLedger, TokenPair,
};
use std::sync::Arc;

pub const DECIMALS_A: u8 = 12;
pub const DECIMALS_B: u8 = 16;

/// Aligned to a week boundary so every interval starts on a boundary.
pub const START: u64 = 2_822 * 604_800;

pub type Hub = DcaHub<InMemoryTokenLedger>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn addr(name: &str) -> Address {
    Address::new(format!("0x{name}"))
}

/// Base units for a human amount at `decimals`.
pub fn units(value: &str, decimals: u8) -> u128 {
    to_units(value, decimals).unwrap()
}

/// Units of token A for a human amount such as "49.85".
pub fn a(value: &str) -> u128 {
    units(value, DECIMALS_A)
}

/// Units of token B for a human amount.
pub fn b(value: &str) -> u128 {
    units(value, DECIMALS_B)
}

pub fn token_a() -> Address {
    addr("aaaa")
}

pub fn token_b() -> Address {
    addr("bbbb")
}

pub fn hub_address() -> Address {
    addr("hub")
}

/// Balances are set up on the ledger before it is handed to the hub; after
/// that only hub operations move tokens.
pub struct FixtureBuilder {
    decimals_a: u8,
    decimals_b: u8,
    configure: Box<dyn FnOnce(HubConfig) -> HubConfig>,
    balances: Vec<(Address, Address, u128, bool)>,
}

impl FixtureBuilder {
    pub fn config(mut self, configure: impl FnOnce(HubConfig) -> HubConfig + 'static) -> Self {
        self.configure = Box::new(configure);
        self
    }

    pub fn decimals(mut self, decimals_a: u8, decimals_b: u8) -> Self {
        self.decimals_a = decimals_a;
        self.decimals_b = decimals_b;
        self
    }

    /// Mint `amount` of `token` to `account` and let the hub pull it.
    pub fn fund(mut self, account: &Address, token: &Address, amount: u128) -> Self {
        self.balances
            .push((account.clone(), token.clone(), amount, true));
        self
    }

    /// Mint without approving the hub.
    pub fn mint(mut self, account: &Address, token: &Address, amount: u128) -> Self {
        self.balances
            .push((account.clone(), token.clone(), amount, false));
        self
    }

    pub fn build(self) -> Fixture {
        init_tracing();
        let token_a = token_a();
        let token_b = token_b();
        let mut tokens = InMemoryTokenLedger::new()
            .with_token(token_a.clone(), self.decimals_a)
            .with_token(token_b.clone(), self.decimals_b);
        for (account, token, amount, approve) in &self.balances {
            tokens.mint(token, account, *amount).unwrap();
            if *approve {
                tokens.approve(token, account, &hub_address(), u128::MAX);
            }
        }
        let oracle = FixedRateOracle::new();
        let permissions = Arc::new(InMemoryPermissionRegistry::new());
        let clock = ManualClock::new(Timestamp(START));
        let config = (self.configure)(HubConfig::new(hub_address(), addr("fee")));
        let hub = DcaHub::new(
            config,
            tokens,
            Arc::new(oracle.clone()),
            permissions.clone(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let pair = TokenPair::new(token_a.clone(), token_b.clone()).unwrap();
        let fixture = Fixture {
            hub,
            oracle,
            permissions,
            clock,
            token_a,
            token_b,
            pair,
            decimals_a: self.decimals_a,
            decimals_b: self.decimals_b,
        };
        fixture.set_price_of_b("1");
        fixture
    }
}

pub struct Fixture {
    pub hub: Hub,
    pub oracle: FixedRateOracle,
    pub permissions: Arc<InMemoryPermissionRegistry>,
    pub clock: ManualClock,
    pub token_a: Address,
    pub token_b: Address,
    pub pair: TokenPair,
    pub decimals_a: u8,
    pub decimals_b: u8,
}

impl Fixture {
    pub fn builder() -> FixtureBuilder {
        FixtureBuilder {
            decimals_a: DECIMALS_A,
            decimals_b: DECIMALS_B,
            configure: Box::new(|config| config),
            balances: Vec::new(),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// How many A one whole B is worth.
    pub fn set_price_of_b(&self, a_per_b: &str) {
        self.oracle.set_rate(
            &self.token_b,
            &self.token_a,
            units(a_per_b, self.decimals_a),
            10u128.pow(u32::from(self.decimals_b)),
        );
    }

    pub fn balance(&self, token: &Address, account: &Address) -> u128 {
        self.hub.tokens().balance_of(token, account)
    }

    pub fn hub_balances(&self) -> (u128, u128) {
        let hub = self.hub.address();
        (
            self.balance(&self.token_a, hub),
            self.balance(&self.token_b, hub),
        )
    }

    pub fn platform_balances(&self) -> (u128, u128) {
        (
            self.hub.platform_balance(&self.token_a),
            self.hub.platform_balance(&self.token_b),
        )
    }

    pub fn deposit(
        &mut self,
        owner: &Address,
        from: &Address,
        amount: u128,
        swaps: u32,
        interval: SwapInterval,
    ) -> HubResult<PositionId> {
        let to = if from == &self.token_a {
            self.token_b.clone()
        } else {
            self.token_a.clone()
        };
        self.hub.deposit(
            owner,
            DepositParams {
                from: from.clone(),
                to,
                amount,
                swaps,
                interval,
                owner: owner.clone(),
                permissions: vec![],
            },
        )
    }

    /// Deposit from an account funded by the builder.
    pub fn open_position(
        &mut self,
        owner: &Address,
        from: &Address,
        amount: u128,
        swaps: u32,
        interval: SwapInterval,
    ) -> PositionId {
        let from = from.clone();
        self.deposit(owner, &from, amount, swaps, interval).unwrap()
    }

    pub fn flash_swap(&mut self, swapper: &mut FlashSwapper) -> HubResult<()> {
        self.flash_swap_borrowing(swapper, 0, 0)
    }

    pub fn flash_swap_borrowing(
        &mut self,
        swapper: &mut FlashSwapper,
        borrow_a: u128,
        borrow_b: u128,
    ) -> HubResult<()> {
        let caller = swapper.address.clone();
        let pair = self.pair.clone();
        self.hub
            .swap(
                &caller,
                &pair,
                borrow_a,
                borrow_b,
                dca_hub::Counterparty::FlashSwap {
                    callee: swapper,
                    data: vec![],
                },
            )
            .map(|_| ())
    }

    /// What the hub holds beyond position obligations and platform balance,
    /// per token. Panics if it holds less.
    pub fn surplus(&self) -> (u128, u128) {
        let (owed_a, owed_b) = self.owed();
        let (platform_a, platform_b) = self.platform_balances();
        let (hub_a, hub_b) = self.hub_balances();
        (
            hub_a
                .checked_sub(owed_a + platform_a)
                .expect("hub cannot cover token A obligations"),
            hub_b
                .checked_sub(owed_b + platform_b)
                .expect("hub cannot cover token B obligations"),
        )
    }

    fn owed(&self) -> (u128, u128) {
        let mut owed_a: u128 = 0;
        let mut owed_b: u128 = 0;
        for position in self.hub.positions() {
            let view = self.hub.user_position(position.id).unwrap();
            if view.from == self.token_a {
                owed_a += view.remaining;
                owed_b += view.swapped;
            } else {
                owed_b += view.remaining;
                owed_a += view.swapped;
            }
        }
        (owed_a, owed_b)
    }

    /// Account-level conservation: the hub holds exactly what it owes
    /// positions plus the platform balance.
    pub fn assert_conservation(&self) {
        let (owed_a, owed_b) = self.owed();
        let (platform_a, platform_b) = self.platform_balances();
        let (hub_a, hub_b) = self.hub_balances();
        assert_eq!(hub_a, owed_a + platform_a, "token A is not conserved");
        assert_eq!(hub_b, owed_b + platform_b, "token B is not conserved");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapBehavior {
    /// Return exactly what the hub asks for.
    Settle,
    /// Return this many units less of the provided token.
    Shortchange(u128),
    /// Return this many units more of the provided token.
    Overpay(u128),
    /// Try to deposit from inside the callback.
    ReenterDeposit,
    /// Try to swap again from inside the callback.
    ReenterSwap,
}

/// Flash-swap counterparty that pays from its own balance.
#[derive(Debug)]
pub struct FlashSwapper {
    pub address: Address,
    pub behavior: SwapBehavior,
    pub calls: Vec<SwapCall>,
    pub reentry_error: Option<HubError>,
}

impl FlashSwapper {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            behavior: SwapBehavior::Settle,
            calls: Vec::new(),
            reentry_error: None,
        }
    }

    pub fn with_behavior(mut self, behavior: SwapBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

impl SwapCallee<InMemoryTokenLedger> for FlashSwapper {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn on_swap(&mut self, hub: &mut Hub, call: &SwapCall) -> HubResult<()> {
        self.calls.push(call.clone());
        match self.behavior {
            SwapBehavior::ReenterDeposit => {
                let params = DepositParams {
                    from: call.token_a().clone(),
                    to: call.token_b().clone(),
                    amount: 1_000,
                    swaps: 1,
                    interval: SwapInterval::FIFTEEN_MINUTES,
                    owner: self.address.clone(),
                    permissions: vec![],
                };
                let err = hub.deposit(&self.address, params).unwrap_err();
                self.reentry_error = Some(err.clone());
                return Err(err);
            }
            SwapBehavior::ReenterSwap => {
                let err = hub
                    .swap(
                        &self.address,
                        &call.pair,
                        0,
                        0,
                        dca_hub::Counterparty::Direct,
                    )
                    .unwrap_err();
                self.reentry_error = Some(err.clone());
                return Err(err);
            }
            _ => {}
        }

        let mut owed_a = call.borrowed_a;
        let mut owed_b = call.borrowed_b;
        if let Some(token) = &call.token_to_provide {
            let amount = match self.behavior {
                SwapBehavior::Shortchange(less) => call.amount_to_provide - less,
                SwapBehavior::Overpay(more) => call.amount_to_provide + more,
                _ => call.amount_to_provide,
            };
            if token == call.token_a() {
                owed_a += amount;
            } else {
                owed_b += amount;
            }
        }
        hub.pay_in(call.pair.token_a(), owed_a)?;
        hub.pay_in(call.pair.token_b(), owed_b)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanBehavior {
    Repay,
    /// Return the principal only.
    RepayWithoutFee,
    /// Try to withdraw from a position from inside the callback.
    ReenterWithdraw(PositionId),
}

#[derive(Debug)]
pub struct Borrower {
    pub address: Address,
    pub behavior: LoanBehavior,
    pub calls: Vec<LoanCall>,
    pub reentry_error: Option<HubError>,
}

impl Borrower {
    pub fn new(address: Address, behavior: LoanBehavior) -> Self {
        Self {
            address,
            behavior,
            calls: Vec::new(),
            reentry_error: None,
        }
    }
}

impl LoanCallee<InMemoryTokenLedger> for Borrower {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn on_loan(&mut self, hub: &mut Hub, call: &LoanCall) -> HubResult<()> {
        self.calls.push(call.clone());
        let (fee_a, fee_b) = match self.behavior {
            LoanBehavior::Repay => (call.fee_a, call.fee_b),
            LoanBehavior::RepayWithoutFee => (0, 0),
            LoanBehavior::ReenterWithdraw(id) => {
                let err = hub
                    .withdraw_swapped(&self.address, id, &self.address)
                    .unwrap_err();
                self.reentry_error = Some(err.clone());
                return Err(err);
            }
        };
        hub.pay_in(call.pair.token_a(), call.amount_a + fee_a)?;
        hub.pay_in(call.pair.token_b(), call.amount_b + fee_b)?;
        Ok(())
    }
}
