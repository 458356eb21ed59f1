// crates/keel-vault/src/strategy.rs
//
// Yield strategy seam.
//
// A strategy takes custody of part of the pool's bonds and periodically
// yields reward tokens. The pool only talks to strategies through this
// trait; real adapters (lending markets, farms) live outside the protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

use keel_core::{AccountId, Amount, KeelError, Role};
use keel_ledger::{Token, TokenRegistry};

/// External yield adapter driven by the bond pool.
pub trait YieldStrategy: fmt::Debug + Send + Sync {
    /// Human-readable identifier used in logs and listings.
    fn name(&self) -> &str;

    /// Take custody of `amount` bonds held by `from`.
    fn invest(&mut self, bond: &mut Token, from: &AccountId, amount: Amount) -> Result<(), KeelError>;

    /// Return up to `amount` bonds to `to`. Returns what was actually returned.
    fn divest(&mut self, bond: &mut Token, to: &AccountId, amount: Amount) -> Result<Amount, KeelError>;

    /// Pay accrued rewards to `recipient`, returning `(symbol, amount)` pairs.
    fn harvest(
        &mut self,
        rewards: &mut TokenRegistry,
        recipient: &AccountId,
    ) -> Result<Vec<(String, Amount)>, KeelError>;

    /// Bonds that could be returned right now.
    fn withdrawable(&self) -> Amount;
}

/// Snapshot of a registered strategy, as listed by `BondPool::strategies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub name: String,
    pub reward_tokens: Vec<String>,
    pub allocation_bps: u32,
    pub withdrawable: Amount,
}

/// Strategy that holds its principal idle and mints a fixed reward per harvest.
///
/// The strategy account must hold the minter role on the reward token.
#[derive(Debug, Clone)]
pub struct FixedRewardStrategy {
    name: String,
    account: AccountId,
    reward_symbol: String,
    reward_per_harvest: Amount,
    principal: Amount,
}

impl FixedRewardStrategy {
    pub fn new(
        name: impl Into<String>,
        account: AccountId,
        reward_symbol: impl Into<String>,
        reward_per_harvest: Amount,
    ) -> Self {
        Self {
            name: name.into(),
            account,
            reward_symbol: reward_symbol.into(),
            reward_per_harvest,
            principal: 0,
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn reward_symbol(&self) -> &str {
        &self.reward_symbol
    }

    /// Reward token ledger with this strategy registered as its minter.
    pub fn reward_token(&self) -> Token {
        let mut token = Token::new(self.reward_symbol.clone());
        token.grant_role(Role::Minter, &self.account);
        token
    }
}

impl YieldStrategy for FixedRewardStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn invest(&mut self, bond: &mut Token, from: &AccountId, amount: Amount) -> Result<(), KeelError> {
        if amount == 0 {
            return Ok(());
        }
        bond.transfer(from, &self.account, amount)?;
        self.principal += amount;
        Ok(())
    }

    fn divest(&mut self, bond: &mut Token, to: &AccountId, amount: Amount) -> Result<Amount, KeelError> {
        let returned = amount.min(self.principal);
        if returned == 0 {
            return Ok(0);
        }
        bond.transfer(&self.account, to, returned)?;
        self.principal -= returned;
        Ok(returned)
    }

    fn harvest(
        &mut self,
        rewards: &mut TokenRegistry,
        recipient: &AccountId,
    ) -> Result<Vec<(String, Amount)>, KeelError> {
        if self.reward_per_harvest == 0 {
            return Ok(Vec::new());
        }
        rewards
            .get_mut(&self.reward_symbol)?
            .mint(&self.account, recipient, self.reward_per_harvest)?;
        Ok(vec![(self.reward_symbol.clone(), self.reward_per_harvest)])
    }

    fn withdrawable(&self) -> Amount {
        self.principal
    }
}
