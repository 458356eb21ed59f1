// crates/keel-ledger/src/allowance.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keel_core::{AccountId, Amount, KeelError};

/// Owner -> spender approvals shared by every ledger type.
///
/// An allowance of `Amount::MAX` is treated as unlimited and never decremented.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Allowances {
    approvals: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
}

impl Allowances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the allowance `owner` grants `spender`, replacing any previous value.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        let per_owner = self.approvals.entry(owner.clone()).or_default();
        if amount == 0 {
            per_owner.remove(spender);
            if per_owner.is_empty() {
                self.approvals.remove(owner);
            }
        } else {
            per_owner.insert(spender.clone(), amount);
        }
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.approvals
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// # Errors
    /// `InsufficientAllowance` if `spender` may not move `amount` for `owner`.
    pub fn check(&self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let current = self.allowance(owner, spender);
        if current < amount {
            return Err(KeelError::InsufficientAllowance(format!(
                "{} approved {} for {} but {} requested",
                owner, spender, current, amount
            )));
        }
        Ok(())
    }

    /// Consume `amount` of the allowance. Call only after `check` succeeded.
    pub fn spend(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.check(owner, spender, amount)?;
        let current = self.allowance(owner, spender);
        if current != Amount::MAX {
            self.approve(owner, spender, current - amount);
        }
        Ok(())
    }
}
