//! In-memory collaborators for tests and embedding without external systems.

use super::{Clock, OracleError, PermissionRegistry, PriceOracle, TokenError, TokenLedger};
use crate::domain::{Address, Permission, PermissionSet, PositionId, Timestamp, TokenPair};
use crate::engine::mul_div;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
struct TokenBook {
    decimals: u8,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<(Address, Address), u128>,
}

/// Token ledger kept entirely in memory. Cloning snapshots every balance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenLedger {
    tokens: BTreeMap<Address, TokenBook>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token with the given decimals.
    pub fn with_token(mut self, token: Address, decimals: u8) -> Self {
        self.register_token(token, decimals);
        self
    }

    pub fn register_token(&mut self, token: Address, decimals: u8) {
        self.tokens.entry(token).or_default().decimals = decimals;
    }

    /// Create `amount` new units of `token` for `account`.
    pub fn mint(
        &mut self,
        token: &Address,
        account: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let book = self.book_mut(token)?;
        let balance = book.balances.entry(account.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TokenError::BalanceOverflow {
                token: token.clone(),
                account: account.clone(),
            })?;
        Ok(())
    }

    fn book(&self, token: &Address) -> Result<&TokenBook, TokenError> {
        self.tokens
            .get(token)
            .ok_or_else(|| TokenError::UnknownToken(token.clone()))
    }

    fn book_mut(&mut self, token: &Address) -> Result<&mut TokenBook, TokenError> {
        self.tokens
            .get_mut(token)
            .ok_or_else(|| TokenError::UnknownToken(token.clone()))
    }

    fn move_balance(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let book = self.book_mut(token)?;
        let available = book.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                token: token.clone(),
                account: from.clone(),
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let receiving = book.balances.get(to).copied().unwrap_or(0);
        let received = receiving
            .checked_add(amount)
            .ok_or_else(|| TokenError::BalanceOverflow {
                token: token.clone(),
                account: to.clone(),
            })?;
        book.balances.insert(from.clone(), available - amount);
        book.balances.insert(to.clone(), received);
        Ok(())
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn decimals(&self, token: &Address) -> Result<u8, TokenError> {
        self.book(token).map(|book| book.decimals)
    }

    fn balance_of(&self, token: &Address, account: &Address) -> u128 {
        self.tokens
            .get(token)
            .and_then(|book| book.balances.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128 {
        self.tokens
            .get(token)
            .and_then(|book| book.allowances.get(&(owner.clone(), spender.clone())))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128) {
        if let Some(book) = self.tokens.get_mut(token) {
            book.allowances
                .insert((owner.clone(), spender.clone()), amount);
        }
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        self.move_balance(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(token, from, spender);
        if spender != from && allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                token: token.clone(),
                owner: from.clone(),
                spender: spender.clone(),
                needed: amount,
                available: allowed,
            });
        }
        self.move_balance(token, from, to, amount)?;
        if spender != from && allowed != u128::MAX {
            self.approve(token, from, spender, allowed - amount);
        }
        Ok(())
    }
}

/// Oracle quoting fixed rates, adjustable through any clone of the handle.
///
/// A rate is a fraction: `quote = amount_in * numerator / denominator`.
#[derive(Debug, Clone, Default)]
pub struct FixedRateOracle {
    rates: Arc<RwLock<BTreeMap<(Address, Address), (u128, u128)>>>,
}

impl FixedRateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote `token_in` into `token_out` at `numerator / denominator` units per unit.
    pub fn set_rate(
        &self,
        token_in: &Address,
        token_out: &Address,
        numerator: u128,
        denominator: u128,
    ) {
        self.rates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((token_in.clone(), token_out.clone()), (numerator, denominator));
    }
}

impl PriceOracle for FixedRateOracle {
    fn quote(
        &self,
        pair: &TokenPair,
        amount_in: u128,
        token_in: &Address,
    ) -> Result<u128, OracleError> {
        let token_out = if token_in == pair.token_a() {
            pair.token_b()
        } else {
            pair.token_a()
        };
        let rates = self.rates.read().unwrap_or_else(PoisonError::into_inner);
        let (numerator, denominator) = rates
            .get(&(token_in.clone(), token_out.clone()))
            .copied()
            .ok_or_else(|| OracleError::UnsupportedPair(pair.to_string()))?;
        if numerator == 0 || denominator == 0 {
            return Err(OracleError::ZeroQuote(pair.to_string()));
        }
        mul_div(amount_in, numerator, denominator)
            .ok_or_else(|| OracleError::Overflow(pair.to_string()))
    }
}

#[derive(Debug, Clone)]
struct Grant {
    owner: Address,
    operators: BTreeMap<Address, BTreeSet<Permission>>,
}

/// Permission registry where the owner holds every capability and operators
/// hold what they were granted at mint.
#[derive(Debug, Default)]
pub struct InMemoryPermissionRegistry {
    grants: RwLock<BTreeMap<PositionId, Grant>>,
}

impl InMemoryPermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|grant| grant.owner.clone())
    }

    /// Grant `permissions` on `id` to `operator`, on top of what they already hold.
    pub fn grant(&self, id: PositionId, operator: &Address, permissions: &[Permission]) -> bool {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        match grants.get_mut(&id) {
            Some(grant) => {
                grant
                    .operators
                    .entry(operator.clone())
                    .or_default()
                    .extend(permissions.iter().copied());
                true
            }
            None => false,
        }
    }

    /// Hand ownership of `id` to `new_owner`. Operator grants are cleared.
    pub fn transfer_ownership(&self, id: PositionId, new_owner: &Address) -> bool {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        match grants.get_mut(&id) {
            Some(grant) => {
                grant.owner = new_owner.clone();
                grant.operators.clear();
                true
            }
            None => false,
        }
    }
}

impl PermissionRegistry for InMemoryPermissionRegistry {
    fn has_permission(&self, id: PositionId, account: &Address, permission: Permission) -> bool {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        match grants.get(&id) {
            Some(grant) if &grant.owner == account => true,
            Some(grant) => grant
                .operators
                .get(account)
                .is_some_and(|held| held.contains(&permission)),
            None => false,
        }
    }

    fn mint(&self, id: PositionId, owner: &Address, permissions: &[PermissionSet]) {
        let mut operators: BTreeMap<Address, BTreeSet<Permission>> = BTreeMap::new();
        for set in permissions {
            operators
                .entry(set.operator.clone())
                .or_default()
                .extend(set.permissions.iter().copied());
        }
        self.grants.write().unwrap_or_else(PoisonError::into_inner).insert(
            id,
            Grant {
                owner: owner.clone(),
                operators,
            },
        );
    }

    fn burn(&self, id: PositionId) {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start.0)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now.0, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}
