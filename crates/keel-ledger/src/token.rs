// crates/keel-ledger/src/token.rs
//
// Plain fungible ledger.
//
// Used for the bond token (minted by the treasury when dollars are burned
// for bonds, burned on redemption) and for reward tokens that yield
// strategies pay into the bond pool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keel_core::{AccountId, Amount, KeelError, Role, RoleSet};

use crate::allowance::Allowances;

/// A fixed-unit fungible token with a minter role and ERC-20 style approvals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    symbol: String,
    balances: BTreeMap<AccountId, Amount>,
    total_supply: Amount,
    allowances: Allowances,
    roles: RoleSet,
}

impl Token {
    /// Create an empty token with no minters.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balances: BTreeMap::new(),
            total_supply: 0,
            allowances: Allowances::new(),
            roles: RoleSet::new(),
        }
    }

    /// Ticker used in log lines and registry lookups.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Grant `role` to `account`. Returns false if it was already held.
    pub fn grant_role(&mut self, role: Role, account: &AccountId) -> bool {
        self.roles.grant(role, account)
    }

    /// Revoke `role` from `account`. Returns false if it was not held.
    pub fn revoke_role(&mut self, role: Role, account: &AccountId) -> bool {
        self.roles.revoke(role, account)
    }

    /// Whether `account` currently holds `role`.
    pub fn has_role(&self, role: Role, account: &AccountId) -> bool {
        self.roles.has(role, account)
    }

    /// Balance of `account`, zero if it never held any.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Amount `spender` may still move or burn on behalf of `owner`.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances.allowance(owner, spender)
    }

    /// Set the allowance of `spender` over `owner`'s balance, replacing any previous value.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances.approve(owner, spender, amount);
    }

    /// Mint `amount` to `to`.
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` holds the minter role.
    pub fn mint(&mut self, caller: &AccountId, to: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.roles.require(Role::Minter, caller)?;
        self.credit_new(to, amount)
    }

    /// Mint without a role check. Reserved for crate-internal wrappers that
    /// enforce their own minting policy.
    pub(crate) fn credit_new(&mut self, to: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let supply = self.total_supply.checked_add(amount).ok_or_else(|| {
            KeelError::Overflow(format!("{} supply overflow minting {}", self.symbol, amount))
        })?;
        self.total_supply = supply;
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        tracing::debug!("{}: minted {} to {}", self.symbol, amount, to);
        Ok(())
    }

    /// Burn `amount` from the caller's own balance.
    pub fn burn(&mut self, owner: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.check_balance(owner, amount)?;
        self.debit(owner, amount);
        self.total_supply -= amount;
        tracing::debug!("{}: burned {} from {}", self.symbol, amount, owner);
        Ok(())
    }

    /// Burn `amount` from `owner` using the allowance granted to `spender`.
    pub fn burn_from(&mut self, spender: &AccountId, owner: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.allowances.check(owner, spender, amount)?;
        self.check_balance(owner, amount)?;
        self.allowances.spend(owner, spender, amount)?;
        self.debit(owner, amount);
        self.total_supply -= amount;
        tracing::debug!("{}: {} burned {} from {}", self.symbol, spender, amount, owner);
        Ok(())
    }

    /// Move `amount` between accounts. Self-transfers and zero amounts only check the balance.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` holds less than `amount`.
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.check_balance(from, amount)?;
        if from == to || amount == 0 {
            return Ok(());
        }
        self.debit(from, amount);
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }

    /// Transfer on behalf of `from` against the allowance granted to `spender`.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), KeelError> {
        self.allowances.check(from, spender, amount)?;
        self.check_balance(from, amount)?;
        self.allowances.spend(from, spender, amount)?;
        self.transfer(from, to, amount)
    }

    fn check_balance(&self, account: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(KeelError::InsufficientBalance(format!(
                "{} holds {} {} but {} requested",
                account, available, self.symbol, amount
            )));
        }
        Ok(())
    }

    // Caller has already checked the balance.
    fn debit(&mut self, account: &AccountId, amount: Amount) {
        if let Some(balance) = self.balances.get_mut(account) {
            *balance -= amount;
            if *balance == 0 {
                self.balances.remove(account);
            }
        }
    }
}

/// Reward token ledgers keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: BTreeMap<String, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token. Replaces nothing: a symbol already present is an error.
    pub fn insert(&mut self, token: Token) -> Result<(), KeelError> {
        if self.tokens.contains_key(token.symbol()) {
            return Err(KeelError::InvalidState(format!(
                "token {} already registered",
                token.symbol()
            )));
        }
        self.tokens.insert(token.symbol().to_string(), token);
        Ok(())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.tokens.contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Result<&Token, KeelError> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| KeelError::NotFound(format!("token {}", symbol)))
    }

    pub fn get_mut(&mut self, symbol: &str) -> Result<&mut Token, KeelError> {
        self.tokens
            .get_mut(symbol)
            .ok_or_else(|| KeelError::NotFound(format!("token {}", symbol)))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }
}
