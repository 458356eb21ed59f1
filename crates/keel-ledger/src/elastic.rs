// crates/keel-ledger/src/elastic.rs
//
// Elastic-supply dollar ledger.
//
// Non-excluded holders own rebase-invariant *shares* of the rebasing supply:
//
//   balance(account) = shares(account) * rebase_supply / total_shares
//
// A rebase only moves `rebase_supply`, so every non-excluded balance scales
// by the same factor. Excluded accounts hold a pinned absolute amount that no
// rebase touches. The two domains are additive:
//
//   total_supply = rebase_supply + pinned_supply
//
// Exclusion converts an account between the two domains at the current
// scaling factor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keel_core::{mul_div, mul_div_up, AccountId, Amount, KeelError, Role, RoleSet, U256};

use crate::allowance::Allowances;

/// Shares minted per unit when the rebasing domain is empty. A large ratio
/// keeps the value of a single share far below one unit so conversions
/// round away less than one unit.
pub const SHARES_PER_UNIT: u128 = 1_000_000_000;

/// How an account's balance is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Holding {
    /// Rebase-invariant shares of the rebasing supply.
    Scaled(u128),
    /// Absolute balance of an excluded account, immune to rebases.
    Pinned(Amount),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
struct Supply {
    /// Sum of all `Holding::Scaled` shares.
    shares: u128,
    /// Value of all scaled holdings.
    rebasing: Amount,
    /// Sum of all `Holding::Pinned` amounts.
    pinned: Amount,
}

impl Supply {
    /// Value of `shares`, rounded to the nearest unit. Never exceeds `rebasing`.
    fn value_of(&self, shares: u128) -> Amount {
        if self.shares == 0 {
            return 0;
        }
        let total = U256::from(self.shares);
        let value = (U256::from(shares) * U256::from(self.rebasing) + total / 2) / total;
        value.low_u128()
    }

    /// Shares credited for `amount`, rounded down.
    fn shares_for_credit(&self, amount: Amount) -> Result<u128, KeelError> {
        if self.shares == 0 || self.rebasing == 0 {
            return amount.checked_mul(SHARES_PER_UNIT).ok_or_else(|| {
                KeelError::Overflow(format!("share conversion of {} overflows", amount))
            });
        }
        mul_div(amount, self.shares, self.rebasing)
    }

    /// Shares removed for `amount`, rounded up and capped at the holding.
    fn shares_for_debit(&self, held: u128, available: Amount, amount: Amount) -> Result<u128, KeelError> {
        if amount == available {
            return Ok(held);
        }
        Ok(mul_div_up(amount, self.shares, self.rebasing)?.min(held))
    }

    fn total(&self) -> Amount {
        self.rebasing + self.pinned
    }
}

/// The pegged dollar ledger with rebasing and a rebase-exclusion list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticLedger {
    symbol: String,
    holdings: BTreeMap<AccountId, Holding>,
    supply: Supply,
    /// Excluded accounts. Iteration order is not stable across revocations.
    excluded: Vec<AccountId>,
    allowances: Allowances,
    roles: RoleSet,
    last_rebase_epoch: Option<u64>,
}

impl ElasticLedger {
    /// Create an empty ledger with no roles granted.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            holdings: BTreeMap::new(),
            supply: Supply::default(),
            excluded: Vec::new(),
            allowances: Allowances::new(),
            roles: RoleSet::new(),
            last_rebase_epoch: None,
        }
    }

    /// Ticker used in log lines and reports.
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

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Effective balance: scaled holdings through the current scaling factor,
    /// pinned holdings as stored.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        match self.holdings.get(account) {
            Some(Holding::Scaled(shares)) => self.supply.value_of(*shares),
            Some(Holding::Pinned(amount)) => *amount,
            None => 0,
        }
    }

    /// Raw stored holding, `None` for accounts never credited.
    pub fn holding(&self, account: &AccountId) -> Option<Holding> {
        self.holdings.get(account).copied()
    }

    /// Rebasing plus pinned supply.
    pub fn total_supply(&self) -> Amount {
        self.supply.total()
    }

    /// Portion of the supply held by non-excluded accounts.
    pub fn rebase_supply(&self) -> Amount {
        self.supply.rebasing
    }

    /// Portion of the supply pinned in excluded accounts.
    pub fn pinned_supply(&self) -> Amount {
        self.supply.pinned
    }

    /// Total shares held by non-excluded accounts.
    pub fn total_shares(&self) -> u128 {
        self.supply.shares
    }

    /// Whether `account` is pinned outside the rebasing domain.
    pub fn is_excluded(&self, account: &AccountId) -> bool {
        matches!(self.holdings.get(account), Some(Holding::Pinned(_)))
    }

    /// Number of excluded accounts.
    pub fn num_excluded(&self) -> usize {
        self.excluded.len()
    }

    /// Excluded account at `index`, or `None` past the end.
    pub fn excluded_at(&self, index: usize) -> Option<&AccountId> {
        self.excluded.get(index)
    }

    /// All excluded accounts in list order.
    pub fn excluded(&self) -> &[AccountId] {
        &self.excluded
    }

    /// Epoch of the most recent applied rebase.
    pub fn last_rebase_epoch(&self) -> Option<u64> {
        self.last_rebase_epoch
    }

    /// Every account with a stored holding.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.holdings.keys()
    }

    /// Amount `spender` may still move or burn on behalf of `owner`.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances.allowance(owner, spender)
    }

    // ------------------------------------------------------------------
    // Fungible surface
    // ------------------------------------------------------------------

    /// Set the allowance of `spender` over `owner`'s balance, replacing any previous value.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances.approve(owner, spender, amount);
    }

    /// Mint `amount` to `account`. Non-excluded mints grow `rebase_supply`.
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` holds the minter role.
    pub fn mint(&mut self, caller: &AccountId, account: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.roles.require(Role::Minter, caller)?;
        let (holding, supply) = self.plan_credit(self.supply, self.holding(account), amount)?;
        self.commit(account, holding, supply);
        tracing::debug!("{}: minted {} to {}", self.symbol, amount, account);
        Ok(())
    }

    /// Burn from the caller's own balance.
    pub fn burn(&mut self, owner: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let holding = self.require_balance(owner, amount)?;
        let (holding, supply) = self.plan_debit(self.supply, holding, amount)?;
        self.commit(owner, holding, supply);
        tracing::debug!("{}: burned {} from {}", self.symbol, amount, owner);
        Ok(())
    }

    /// Burn from `owner` against the allowance granted to `spender`.
    pub fn burn_from(&mut self, spender: &AccountId, owner: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.allowances.check(owner, spender, amount)?;
        let holding = self.require_balance(owner, amount)?;
        let (holding, supply) = self.plan_debit(self.supply, holding, amount)?;
        self.allowances.spend(owner, spender, amount)?;
        self.commit(owner, holding, supply);
        tracing::debug!("{}: {} burned {} from {}", self.symbol, spender, amount, owner);
        Ok(())
    }

    /// Move `amount` of effective balance between accounts.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` holds less than `amount`.
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let sender = self.require_balance(from, amount)?;
        if from == to || amount == 0 {
            return Ok(());
        }

        let receiver = self.holding(to);
        let (sender_after, receiver_after, supply) = match (sender, receiver) {
            // Both sides rebasing: move shares, the rebasing supply is unchanged.
            (Holding::Scaled(held), None | Some(Holding::Scaled(_))) => {
                let available = self.supply.value_of(held);
                let moved = self.supply.shares_for_debit(held, available, amount)?;
                let existing = match receiver {
                    Some(Holding::Scaled(s)) => s,
                    _ => 0,
                };
                (
                    Holding::Scaled(held - moved),
                    Holding::Scaled(existing + moved),
                    self.supply,
                )
            }
            // Crossing domains: debit in one, credit in the other.
            _ => {
                let (sender_after, supply) = self.plan_debit(self.supply, sender, amount)?;
                let (receiver_after, supply) = self.plan_credit(supply, receiver, amount)?;
                (sender_after, receiver_after, supply)
            }
        };

        self.commit(from, sender_after, supply);
        self.commit(to, receiver_after, supply);
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
        self.require_balance(from, amount)?;
        self.transfer(from, to, amount)?;
        self.allowances.spend(from, spender, amount)
    }

    // ------------------------------------------------------------------
    // Rebase and exclusion
    // ------------------------------------------------------------------

    /// Adjust the rebasing supply by `supply_delta` (negative contracts).
    ///
    /// Excluded balances and share counts are untouched. With no non-excluded
    /// holders the call is a no-op. Returns the new total supply.
    ///
    /// # Errors
    /// - `Unauthorized` unless `caller` holds the rebaser role.
    /// - `InvalidDelta` if the rebasing supply would reach zero or below.
    pub fn rebase(&mut self, caller: &AccountId, epoch: u64, supply_delta: i128) -> Result<Amount, KeelError> {
        self.roles.require(Role::Rebaser, caller)?;
        if supply_delta == 0 || self.supply.shares == 0 {
            tracing::debug!(
                "{}: rebase epoch {} delta {} is a no-op",
                self.symbol,
                epoch,
                supply_delta
            );
            self.last_rebase_epoch = Some(epoch);
            return Ok(self.total_supply());
        }

        let magnitude = supply_delta.unsigned_abs();
        let rebasing = if supply_delta < 0 {
            if magnitude >= self.supply.rebasing {
                return Err(KeelError::InvalidDelta(format!(
                    "contraction of {} would exhaust rebase supply {}",
                    magnitude, self.supply.rebasing
                )));
            }
            self.supply.rebasing - magnitude
        } else {
            let grown = self.supply.rebasing.checked_add(magnitude).ok_or_else(|| {
                KeelError::InvalidDelta(format!(
                    "expansion of {} overflows rebase supply {}",
                    magnitude, self.supply.rebasing
                ))
            })?;
            grown.checked_add(self.supply.pinned).ok_or_else(|| {
                KeelError::InvalidDelta(format!("expansion of {} overflows total supply", magnitude))
            })?;
            grown
        };

        self.supply.rebasing = rebasing;
        self.last_rebase_epoch = Some(epoch);
        tracing::debug!(
            "{}: rebase epoch {} delta {} -> rebase supply {}, total supply {}",
            self.symbol,
            epoch,
            supply_delta,
            self.supply.rebasing,
            self.total_supply()
        );
        Ok(self.total_supply())
    }

    /// Exclude `account` from rebases, pinning its current effective balance.
    ///
    /// # Errors
    /// `Unauthorized` without the excluder role, `InvalidState` if already excluded.
    pub fn grant_rebase_exclusion(&mut self, caller: &AccountId, account: &AccountId) -> Result<(), KeelError> {
        self.roles.require(Role::Excluder, caller)?;
        let pinned = match self.holding(account) {
            Some(Holding::Pinned(_)) => {
                return Err(KeelError::InvalidState(format!(
                    "{} is already excluded from rebases",
                    account
                )));
            }
            Some(Holding::Scaled(shares)) => {
                // The last scaled holder takes any rounding remainder with it.
                let value = if shares == self.supply.shares {
                    self.supply.rebasing
                } else {
                    self.supply.value_of(shares)
                };
                self.supply.shares -= shares;
                self.supply.rebasing -= value;
                self.supply.pinned += value;
                value
            }
            None => 0,
        };

        self.holdings.insert(account.clone(), Holding::Pinned(pinned));
        self.excluded.push(account.clone());
        tracing::debug!(
            "{}: excluded {} from rebases with pinned balance {}",
            self.symbol,
            account,
            pinned
        );
        Ok(())
    }

    /// Return `account` to the rebasing domain at the current scaling factor.
    ///
    /// The excluded list is compacted by swapping the last entry into the
    /// removed slot.
    ///
    /// # Errors
    /// `Unauthorized` without the excluder role, `InvalidState` if not excluded.
    pub fn revoke_rebase_exclusion(&mut self, caller: &AccountId, account: &AccountId) -> Result<(), KeelError> {
        self.roles.require(Role::Excluder, caller)?;
        let index = self.excluded.iter().position(|a| a == account);
        let (index, pinned) = match (index, self.holding(account)) {
            (Some(i), Some(Holding::Pinned(amount))) => (i, amount),
            _ => {
                return Err(KeelError::InvalidState(format!(
                    "{} is not excluded from rebases",
                    account
                )));
            }
        };

        let mut supply = self.supply;
        supply.pinned -= pinned;
        let (holding, supply) = self.plan_credit(supply, None, pinned)?;
        self.excluded.swap_remove(index);
        self.commit(account, holding, supply);
        tracing::debug!(
            "{}: revoked rebase exclusion of {} ({} returned to rebasing supply)",
            self.symbol,
            account,
            pinned
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_balance(&self, account: &AccountId, amount: Amount) -> Result<Holding, KeelError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(KeelError::InsufficientBalance(format!(
                "{} holds {} {} but {} requested",
                account, available, self.symbol, amount
            )));
        }
        Ok(self.holding(account).unwrap_or(Holding::Scaled(0)))
    }

    // Caller guarantees `amount <= balance`.
    fn plan_debit(&self, supply: Supply, holding: Holding, amount: Amount) -> Result<(Holding, Supply), KeelError> {
        match holding {
            Holding::Pinned(value) => Ok((
                Holding::Pinned(value - amount),
                Supply {
                    pinned: supply.pinned - amount,
                    ..supply
                },
            )),
            Holding::Scaled(held) => {
                let available = supply.value_of(held);
                let burned = supply.shares_for_debit(held, available, amount)?;
                Ok((
                    Holding::Scaled(held - burned),
                    Supply {
                        shares: supply.shares - burned,
                        rebasing: supply.rebasing - amount,
                        ..supply
                    },
                ))
            }
        }
    }

    fn plan_credit(
        &self,
        supply: Supply,
        holding: Option<Holding>,
        amount: Amount,
    ) -> Result<(Holding, Supply), KeelError> {
        let overflow = || KeelError::Overflow(format!("{} supply overflow crediting {}", self.symbol, amount));
        supply.total().checked_add(amount).ok_or_else(overflow)?;
        match holding {
            Some(Holding::Pinned(value)) => Ok((
                Holding::Pinned(value.checked_add(amount).ok_or_else(overflow)?),
                Supply {
                    pinned: supply.pinned + amount,
                    ..supply
                },
            )),
            Some(Holding::Scaled(_)) | None => {
                let held = match holding {
                    Some(Holding::Scaled(s)) => s,
                    _ => 0,
                };
                let minted = supply.shares_for_credit(amount)?;
                Ok((
                    Holding::Scaled(held.checked_add(minted).ok_or_else(overflow)?),
                    Supply {
                        shares: supply.shares.checked_add(minted).ok_or_else(overflow)?,
                        rebasing: supply.rebasing + amount,
                        ..supply
                    },
                ))
            }
        }
    }

    fn commit(&mut self, account: &AccountId, holding: Holding, supply: Supply) {
        match holding {
            Holding::Scaled(0) => {
                self.holdings.remove(account);
            }
            other => {
                self.holdings.insert(account.clone(), other);
            }
        }
        self.supply = supply;
    }
}
