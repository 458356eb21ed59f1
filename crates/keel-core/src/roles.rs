// crates/keel-core/src/roles.rs
//
// Capability roles checked by the ledgers, the bond pool and the treasury.
//
// Granting and revoking is performed by whoever owns the component (the
// protocol bootstrap or a governance process); the components themselves only
// check membership.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::error::KeelError;

/// A grantable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May mint on a ledger.
    Minter,
    /// May rebase the elastic-supply ledger.
    Rebaser,
    /// May grant and revoke rebase exclusions.
    Excluder,
    /// May deliver seigniorage payments into the bond pool.
    Allocator,
    /// May register yield strategies on the bond pool.
    Strategist,
    /// May change treasury policy parameters and boardroom weights.
    Governance,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Minter => write!(f, "minter"),
            Role::Rebaser => write!(f, "rebaser"),
            Role::Excluder => write!(f, "excluder"),
            Role::Allocator => write!(f, "allocator"),
            Role::Strategist => write!(f, "strategist"),
            Role::Governance => write!(f, "governance"),
        }
    }
}

/// Role membership table. Each role is independently grantable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleSet {
    members: BTreeMap<Role, BTreeSet<AccountId>>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `role` to `account`. Returns `false` if it was already held.
    pub fn grant(&mut self, role: Role, account: &AccountId) -> bool {
        self.members.entry(role).or_default().insert(account.clone())
    }

    /// Revoke `role` from `account`. Returns `false` if it was not held.
    pub fn revoke(&mut self, role: Role, account: &AccountId) -> bool {
        self.members
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false)
    }

    pub fn has(&self, role: Role, account: &AccountId) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// # Errors
    /// `Unauthorized` unless `account` holds `role`.
    pub fn require(&self, role: Role, account: &AccountId) -> Result<(), KeelError> {
        if self.has(role, account) {
            Ok(())
        } else {
            Err(KeelError::Unauthorized(format!(
                "{} does not hold the {} role",
                account, role
            )))
        }
    }
}
