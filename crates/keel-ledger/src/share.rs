// crates/keel-ledger/src/share.rs
//
// Governance share token with a hard supply cap and per-minter quotas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keel_core::{AccountId, Amount, KeelError};

use crate::token::Token;

/// Lifetime mint allowance of a single minter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterQuota {
    pub cap: Amount,
    pub minted: Amount,
}

impl MinterQuota {
    /// Amount still mintable under the cap, ignoring the max supply.
    pub fn remaining(&self) -> Amount {
        self.cap.saturating_sub(self.minted)
    }
}

/// Share token: a plain ledger whose supply can only grow through
/// registered minters, each bounded by its own cap and all bounded by
/// `max_supply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareToken {
    token: Token,
    max_supply: Amount,
    minters: BTreeMap<AccountId, MinterQuota>,
}

impl ShareToken {
    /// Create a share token with no minters and a hard `max_supply`.
    pub fn new(symbol: impl Into<String>, max_supply: Amount) -> Self {
        Self {
            token: Token::new(symbol),
            max_supply,
            minters: BTreeMap::new(),
        }
    }

    /// Ticker used in log lines and reports.
    pub fn symbol(&self) -> &str {
        self.token.symbol()
    }

    /// Supply ceiling shared by every minter.
    pub fn max_supply(&self) -> Amount {
        self.max_supply
    }

    /// Shares minted so far, net of burns.
    pub fn total_supply(&self) -> Amount {
        self.token.total_supply()
    }

    /// Share balance of `account`.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.token.balance_of(account)
    }

    /// Set the allowance of `spender` over `owner`'s shares.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.token.approve(owner, spender, amount);
    }

    /// Move shares between accounts.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` holds less than `amount`.
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.token.transfer(from, to, amount)
    }

    /// Burn from the caller's own balance. Burned shares do not restore any quota.
    pub fn burn(&mut self, owner: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.token.burn(owner, amount)
    }

    // ------------------------------------------------------------------
    // Minter administration
    // ------------------------------------------------------------------

    /// Register `minter` with a lifetime cap.
    ///
    /// # Errors
    /// `InvalidState` if the account is already a minter.
    pub fn register_minter(&mut self, minter: &AccountId, cap: Amount) -> Result<(), KeelError> {
        if self.minters.contains_key(minter) {
            return Err(KeelError::InvalidState(format!(
                "{} is already a {} minter",
                minter,
                self.symbol()
            )));
        }
        self.minters.insert(minter.clone(), MinterQuota { cap, minted: 0 });
        tracing::info!("{}: registered minter {} with cap {}", self.symbol(), minter, cap);
        Ok(())
    }

    /// Change a minter's cap. Already-minted amounts are kept; a cap below
    /// them simply leaves nothing mintable.
    pub fn update_minter(&mut self, minter: &AccountId, cap: Amount) -> Result<(), KeelError> {
        let quota = self
            .minters
            .get_mut(minter)
            .ok_or_else(|| KeelError::NotFound(format!("minter {}", minter)))?;
        quota.cap = cap;
        Ok(())
    }

    /// Deregister `minter`, returning its final quota.
    pub fn remove_minter(&mut self, minter: &AccountId) -> Result<MinterQuota, KeelError> {
        self.minters
            .remove(minter)
            .ok_or_else(|| KeelError::NotFound(format!("minter {}", minter)))
    }

    /// Cap and minted amount of `minter`, `None` if unregistered.
    pub fn quota(&self, minter: &AccountId) -> Option<MinterQuota> {
        self.minters.get(minter).copied()
    }

    /// Lifetime amount minted by `minter`.
    pub fn minted_amount(&self, minter: &AccountId) -> Amount {
        self.minters.get(minter).map_or(0, |q| q.minted)
    }

    /// What `minter` could mint right now. Zero for unregistered accounts.
    pub fn mintable(&self, minter: &AccountId) -> Amount {
        match self.minters.get(minter) {
            Some(quota) => quota
                .remaining()
                .min(self.max_supply.saturating_sub(self.total_supply())),
            None => 0,
        }
    }

    /// Mint against the caller's quota.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not a registered minter.
    /// - `InvalidState` if the amount exceeds the quota or the max supply.
    pub fn mint(&mut self, caller: &AccountId, to: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let available = self.mintable(caller);
        let quota = self.minters.get(caller).copied().ok_or_else(|| {
            KeelError::Unauthorized(format!("{} is not a {} minter", caller, self.symbol()))
        })?;
        if amount > available {
            return Err(KeelError::InvalidState(format!(
                "{} may mint {} {} but requested {}",
                caller,
                available,
                self.symbol(),
                amount
            )));
        }

        self.token.credit_new(to, amount)?;
        self.minters.insert(
            caller.clone(),
            MinterQuota {
                minted: quota.minted + amount,
                ..quota
            },
        );
        Ok(())
    }
}
