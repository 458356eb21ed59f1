// crates/keel-core/src/account.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an account on any of the protocol ledgers.
///
/// Accounts are opaque names. The same `AccountId` addresses a holder on the
/// dollar ledger, the bond ledger, the share ledger and every reward token
/// ledger, so a component (the treasury, the bond pool, a boardroom) owns
/// exactly one identity across all of them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for AccountId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
