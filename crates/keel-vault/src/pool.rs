// crates/keel-vault/src/pool.rs
//
// Pooled bond-and-yield vault.
//
// Each depositor owns pool shares; their bond claim is
//
//   balance(account) = shares(account) * total_underlying / total_shares
//
// Seigniorage payments lower `total_underlying` without touching shares, so
// every claim shrinks by the same factor, and credit the same dollar value
// to an accumulator read pro rata by shares. Strategy rewards use one
// accumulator per reward token. Accumulators carry `ACC_PRECISION` extra
// digits and are settled into a position before its shares change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keel_core::{
    bps_of, mul_div, mul_div_up, to_amount, AccountId, Amount, KeelError, Role, RoleSet,
    BPS_DENOMINATOR, ONE, U256,
};
use keel_ledger::{ElasticLedger, Token, TokenRegistry};

use crate::strategy::{StrategyInfo, YieldStrategy};

const ACC_PRECISION: u128 = ONE;

/// The ledgers a pool operation may touch.
pub struct PoolAssets<'a> {
    pub bond: &'a mut Token,
    pub dollar: &'a mut ElasticLedger,
    pub rewards: &'a mut TokenRegistry,
}

/// What a withdrawal paid out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub bonds: Amount,
    pub dollars: Amount,
    pub rewards: Vec<(String, Amount)>,
}

#[derive(Debug, Clone, Default)]
struct Position {
    shares: Amount,
    dollar_debt: U256,
    dollars_owed: Amount,
    reward_debts: BTreeMap<String, U256>,
    rewards_owed: BTreeMap<String, Amount>,
}

impl Position {
    /// Move everything accrued since the last checkpoint into the owed buckets.
    fn settle(&mut self, acc_dollar: U256, reward_accs: &BTreeMap<String, U256>) -> Result<(), KeelError> {
        let pending = accrued(self.shares, acc_dollar).saturating_sub(self.dollar_debt);
        self.dollars_owed = add_owed(self.dollars_owed, pending)?;
        for (symbol, acc) in reward_accs {
            let debt = self.reward_debts.get(symbol).copied().unwrap_or_default();
            let pending = accrued(self.shares, *acc).saturating_sub(debt);
            let owed = self.rewards_owed.entry(symbol.clone()).or_insert(0);
            *owed = add_owed(*owed, pending)?;
        }
        Ok(())
    }

    /// Reset debts so nothing accrued so far is counted again.
    fn checkpoint(&mut self, acc_dollar: U256, reward_accs: &BTreeMap<String, U256>) {
        self.dollar_debt = accrued(self.shares, acc_dollar);
        for (symbol, acc) in reward_accs {
            self.reward_debts.insert(symbol.clone(), accrued(self.shares, *acc));
        }
    }

    fn is_empty(&self) -> bool {
        self.shares == 0 && self.dollars_owed == 0 && self.rewards_owed.values().all(|v| *v == 0)
    }
}

fn accrued(shares: Amount, acc: U256) -> U256 {
    U256::from(shares) * acc / U256::from(ACC_PRECISION)
}

fn add_owed(owed: Amount, pending: U256) -> Result<Amount, KeelError> {
    owed.checked_add(to_amount(pending)?)
        .ok_or_else(|| KeelError::Overflow("owed reward overflow".to_string()))
}

#[derive(Debug)]
struct StrategySlot {
    adapter: Box<dyn YieldStrategy>,
    reward_tokens: Vec<String>,
    allocation_bps: u32,
}

/// Pooled vault over the bond token.
#[derive(Debug)]
pub struct BondPool {
    account: AccountId,
    roles: RoleSet,
    total_underlying: Amount,
    total_shares: Amount,
    positions: BTreeMap<AccountId, Position>,
    acc_dollar_per_share: U256,
    reward_accs: BTreeMap<String, U256>,
    strategies: Vec<StrategySlot>,
}

impl BondPool {
    /// Create an empty pool that holds its assets under `account`.
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            roles: RoleSet::new(),
            total_underlying: 0,
            total_shares: 0,
            positions: BTreeMap::new(),
            acc_dollar_per_share: U256::zero(),
            reward_accs: BTreeMap::new(),
            strategies: Vec::new(),
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn grant_role(&mut self, role: Role, account: &AccountId) -> bool {
        self.roles.grant(role, account)
    }

    pub fn revoke_role(&mut self, role: Role, account: &AccountId) -> bool {
        self.roles.revoke(role, account)
    }

    pub fn has_role(&self, role: Role, account: &AccountId) -> bool {
        self.roles.has(role, account)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Bonds the pool is accountable for across all depositors.
    pub fn total_balance(&self) -> Amount {
        self.total_underlying
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    pub fn shares_of(&self, account: &AccountId) -> Amount {
        self.positions.get(account).map_or(0, |p| p.shares)
    }

    /// Bond claim of `account`, rounded down.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        if self.total_shares == 0 {
            return 0;
        }
        let claim = U256::from(self.shares_of(account)) * U256::from(self.total_underlying)
            / U256::from(self.total_shares);
        claim.low_u128()
    }

    /// Bonds held by the pool itself rather than by strategies.
    pub fn idle_underlying(&self, bond: &Token) -> Amount {
        bond.balance_of(&self.account)
    }

    /// Bonds currently held by strategies.
    pub fn invested(&self) -> Amount {
        self.strategies.iter().map(|s| s.adapter.withdrawable()).sum()
    }

    /// Dollars `account` could claim now.
    pub fn pending_dollars(&self, account: &AccountId) -> Amount {
        let Some(position) = self.positions.get(account) else {
            return 0;
        };
        let pending = accrued(position.shares, self.acc_dollar_per_share).saturating_sub(position.dollar_debt);
        position.dollars_owed.saturating_add(pending.low_u128())
    }

    /// Rewards `account` could claim now, excluding anything not yet harvested.
    pub fn pending_rewards(&self, account: &AccountId) -> BTreeMap<String, Amount> {
        let Some(position) = self.positions.get(account) else {
            return BTreeMap::new();
        };
        self.reward_accs
            .iter()
            .map(|(symbol, acc)| {
                let debt = position.reward_debts.get(symbol).copied().unwrap_or_default();
                let pending = accrued(position.shares, *acc).saturating_sub(debt).low_u128();
                let owed = position.rewards_owed.get(symbol).copied().unwrap_or(0);
                (symbol.clone(), owed.saturating_add(pending))
            })
            .collect()
    }

    pub fn strategies(&self) -> Vec<StrategyInfo> {
        self.strategies
            .iter()
            .map(|s| StrategyInfo {
                name: s.adapter.name().to_string(),
                reward_tokens: s.reward_tokens.clone(),
                allocation_bps: s.allocation_bps,
                withdrawable: s.adapter.withdrawable(),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Register a yield strategy receiving `allocation_bps` of every deposit.
    ///
    /// # Errors
    /// `Unauthorized` without the strategist role; `InvalidState` if the
    /// combined allocation would exceed 100%.
    pub fn add_strategy(
        &mut self,
        caller: &AccountId,
        adapter: Box<dyn YieldStrategy>,
        reward_tokens: Vec<String>,
        allocation_bps: u32,
    ) -> Result<(), KeelError> {
        self.roles.require(Role::Strategist, caller)?;
        let allocated: u128 = self.strategies.iter().map(|s| s.allocation_bps as u128).sum();
        if allocated + allocation_bps as u128 > BPS_DENOMINATOR {
            return Err(KeelError::InvalidState(format!(
                "strategy allocation {} bps on top of {} bps exceeds {}",
                allocation_bps, allocated, BPS_DENOMINATOR
            )));
        }

        for symbol in &reward_tokens {
            self.reward_accs.entry(symbol.clone()).or_insert_with(U256::zero);
        }
        tracing::info!(
            "bond pool: added strategy {} ({} bps, rewards {:?})",
            adapter.name(),
            allocation_bps,
            reward_tokens
        );
        self.strategies.push(StrategySlot {
            adapter,
            reward_tokens,
            allocation_bps,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Depositor operations
    // ------------------------------------------------------------------

    /// Deposit `amount` bonds from `caller`. Returns the shares minted.
    pub fn deposit(
        &mut self,
        assets: &mut PoolAssets<'_>,
        caller: &AccountId,
        amount: Amount,
    ) -> Result<Amount, KeelError> {
        let shares = self.shares_for_deposit(amount)?;
        let available = assets.bond.balance_of(caller);
        if available < amount {
            return Err(KeelError::InsufficientBalance(format!(
                "{} holds {} bonds but deposits {}",
                caller, available, amount
            )));
        }

        self.harvest(assets.rewards)?;
        if self.total_underlying == 0 && self.total_shares > 0 {
            self.retire_shares()?;
        }
        assets.bond.transfer(caller, &self.account, amount)?;

        let acc_dollar = self.acc_dollar_per_share;
        let reward_accs = &self.reward_accs;
        let position = self.positions.entry(caller.clone()).or_default();
        position.settle(acc_dollar, reward_accs)?;
        position.shares += shares;
        position.checkpoint(acc_dollar, reward_accs);
        self.total_shares += shares;
        self.total_underlying += amount;

        self.invest(assets.bond, amount)?;
        tracing::debug!("bond pool: {} deposited {} for {} shares", caller, amount, shares);
        Ok(shares)
    }

    /// Claim everything owed to `caller` and withdraw `amount` bonds.
    ///
    /// `amount == 0` only claims. Pending dollars are paid up to what the pool
    /// holds; anything unpaid stays owed.
    ///
    /// # Errors
    /// `InsufficientBalance` if `amount` exceeds the caller's bond claim.
    pub fn withdraw(
        &mut self,
        assets: &mut PoolAssets<'_>,
        caller: &AccountId,
        amount: Amount,
    ) -> Result<WithdrawReceipt, KeelError> {
        let balance = self.balance_of(caller);
        if amount > balance {
            return Err(KeelError::InsufficientBalance(format!(
                "{} has {} bonds in the pool but withdraws {}",
                caller, balance, amount
            )));
        }
        let held = self.shares_of(caller);
        let burned = if amount == 0 {
            0
        } else if amount == balance {
            held
        } else {
            mul_div_up(amount, self.total_shares, self.total_underlying)?.min(held)
        };
        let shortfall = self.plan_shortfall(assets.bond, amount)?;

        self.harvest(assets.rewards)?;

        let acc_dollar = self.acc_dollar_per_share;
        let reward_accs = &self.reward_accs;
        let Some(position) = self.positions.get_mut(caller) else {
            return Ok(WithdrawReceipt::default());
        };
        position.settle(acc_dollar, reward_accs)?;
        position.shares -= burned;
        position.checkpoint(acc_dollar, reward_accs);

        let dollars = position.dollars_owed.min(assets.dollar.balance_of(&self.account));
        if dollars < position.dollars_owed {
            tracing::warn!(
                "bond pool: {} owed {} dollars but pool holds {}",
                caller,
                position.dollars_owed,
                dollars
            );
        }
        position.dollars_owed -= dollars;

        let mut rewards = Vec::new();
        for (symbol, owed) in position.rewards_owed.iter_mut() {
            let held = assets
                .rewards
                .get(symbol)
                .map_or(0, |t| t.balance_of(&self.account));
            let paid = (*owed).min(held);
            if paid > 0 {
                *owed -= paid;
                rewards.push((symbol.clone(), paid));
            }
        }
        if position.is_empty() {
            self.positions.remove(caller);
        }
        self.total_shares -= burned;
        self.total_underlying -= amount;

        if dollars > 0 {
            assets.dollar.transfer(&self.account, caller, dollars)?;
        }
        for (symbol, paid) in &rewards {
            assets.rewards.get_mut(symbol)?.transfer(&self.account, caller, *paid)?;
        }
        if amount > 0 {
            self.divest(assets.bond, shortfall)?;
            assets.bond.transfer(&self.account, caller, amount)?;
        }

        tracing::debug!(
            "bond pool: {} withdrew {} bonds ({} shares), claimed {} dollars",
            caller,
            amount,
            burned,
            dollars
        );
        Ok(WithdrawReceipt {
            bonds: amount,
            dollars,
            rewards,
        })
    }

    /// Accept `dollars` from `caller` in exchange for the same amount of
    /// pooled bonds, which are burned.
    ///
    /// Every depositor's claim shrinks by the same factor and the dollars are
    /// credited pro rata to current shares. Shares are not touched and no
    /// strategy is harvested.
    ///
    /// # Errors
    /// - `Unauthorized` without the allocator role.
    /// - `InvalidState` with no depositors or if `dollars` exceeds the pooled bonds.
    /// - `InsufficientBalance` if the caller cannot pay.
    pub fn allocate_seigniorage(
        &mut self,
        assets: &mut PoolAssets<'_>,
        caller: &AccountId,
        dollars: Amount,
    ) -> Result<(), KeelError> {
        if dollars == 0 {
            return self.roles.require(Role::Allocator, caller);
        }
        self.check_allocation(assets.bond, caller, dollars)?;
        let available = assets.dollar.balance_of(caller);
        if available < dollars {
            return Err(KeelError::InsufficientBalance(format!(
                "{} holds {} dollars but allocates {}",
                caller, available, dollars
            )));
        }
        let shortfall = self.plan_shortfall(assets.bond, dollars)?;

        self.total_underlying -= dollars;
        self.acc_dollar_per_share +=
            U256::from(dollars) * U256::from(ACC_PRECISION) / U256::from(self.total_shares);

        assets.dollar.transfer(caller, &self.account, dollars)?;
        self.divest(assets.bond, shortfall)?;
        assets.bond.burn(&self.account, dollars)?;

        tracing::info!(
            "bond pool: allocated {} dollars over {} shares, {} bonds remain",
            dollars,
            self.total_shares,
            self.total_underlying
        );
        Ok(())
    }

    /// Everything `allocate_seigniorage` verifies except the payer's balance.
    ///
    /// Lets a caller that first has to mint the payment confirm the pool
    /// will accept it.
    pub fn check_allocation(&self, bond: &Token, caller: &AccountId, dollars: Amount) -> Result<(), KeelError> {
        self.roles.require(Role::Allocator, caller)?;
        if self.total_shares == 0 {
            return Err(KeelError::InvalidState(
                "bond pool has no depositors to credit".to_string(),
            ));
        }
        if dollars > self.total_underlying {
            return Err(KeelError::InvalidState(format!(
                "seigniorage {} exceeds pooled bonds {}",
                dollars, self.total_underlying
            )));
        }
        self.plan_shortfall(bond, dollars).map(|_| ())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn shares_for_deposit(&self, amount: Amount) -> Result<Amount, KeelError> {
        if amount == 0 {
            return Err(KeelError::InvalidState("deposit of zero bonds".to_string()));
        }
        // Shares left over after seigniorage consumed every pooled bond are
        // worthless; the next deposit starts the pool again at 1:1.
        if self.total_shares == 0 || self.total_underlying == 0 {
            return Ok(amount);
        }
        let shares = mul_div(amount, self.total_shares, self.total_underlying)?;
        if shares == 0 {
            return Err(KeelError::InvalidState(format!(
                "deposit of {} mints no shares",
                amount
            )));
        }
        Ok(shares)
    }

    /// Settle every position and drop all shares. Only valid once nothing
    /// is left to claim in bonds; owed dollars and rewards stay claimable
    /// through `withdraw(0)`.
    fn retire_shares(&mut self) -> Result<(), KeelError> {
        let acc_dollar = self.acc_dollar_per_share;
        let reward_accs = &self.reward_accs;
        for position in self.positions.values_mut() {
            position.settle(acc_dollar, reward_accs)?;
            position.shares = 0;
            position.checkpoint(acc_dollar, reward_accs);
        }
        self.positions.retain(|_, p| !p.is_empty());
        tracing::info!(
            "bond pool: retired {} shares left without underlying",
            self.total_shares
        );
        self.total_shares = 0;
        Ok(())
    }

    /// Bonds that must come back from strategies to release `amount`.
    fn plan_shortfall(&self, bond: &Token, amount: Amount) -> Result<Amount, KeelError> {
        let shortfall = amount.saturating_sub(self.idle_underlying(bond));
        let invested = self.invested();
        if invested < shortfall {
            return Err(KeelError::InvalidState(format!(
                "strategies can return {} bonds but {} are needed",
                invested, shortfall
            )));
        }
        Ok(shortfall)
    }

    fn harvest(&mut self, rewards: &mut TokenRegistry) -> Result<(), KeelError> {
        if self.total_shares == 0 {
            return Ok(());
        }
        let total_shares = U256::from(self.total_shares);
        for slot in self.strategies.iter_mut() {
            for (symbol, amount) in slot.adapter.harvest(rewards, &self.account)? {
                let acc = self.reward_accs.entry(symbol.clone()).or_insert_with(U256::zero);
                *acc += U256::from(amount) * U256::from(ACC_PRECISION) / total_shares;
                tracing::debug!(
                    "bond pool: harvested {} {} from {}",
                    amount,
                    symbol,
                    slot.adapter.name()
                );
            }
        }
        Ok(())
    }

    fn invest(&mut self, bond: &mut Token, amount: Amount) -> Result<(), KeelError> {
        for slot in self.strategies.iter_mut() {
            let portion = bps_of(amount, slot.allocation_bps)?;
            if portion > 0 {
                slot.adapter.invest(bond, &self.account, portion)?;
            }
        }
        Ok(())
    }

    fn divest(&mut self, bond: &mut Token, shortfall: Amount) -> Result<(), KeelError> {
        let mut remaining = shortfall;
        for slot in self.strategies.iter_mut() {
            if remaining == 0 {
                break;
            }
            remaining -= slot.adapter.divest(bond, &self.account, remaining)?;
        }
        if remaining > 0 {
            return Err(KeelError::InvalidState(format!(
                "strategies left {} bonds undelivered",
                remaining
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::FixedRewardStrategy;
    use keel_core::tokens;

    const REWARD: &str = "BUSD";

    struct Fixture {
        pool: BondPool,
        bond: Token,
        dollar: ElasticLedger,
        rewards: TokenRegistry,
        admin: AccountId,
        treasury: AccountId,
    }

    impl Fixture {
        /// Pool with one strategy taking half of every deposit and paying 100
        /// reward tokens per harvest.
        fn new() -> Self {
            let admin = AccountId::from("admin");
            let treasury = AccountId::from("treasury");
            let mut pool = BondPool::new(AccountId::from("bond-pool"));
            pool.grant_role(Role::Strategist, &admin);
            pool.grant_role(Role::Allocator, &treasury);

            let strategy = FixedRewardStrategy::new(
                "mock",
                AccountId::from("strategy"),
                REWARD,
                tokens(100),
            );
            let mut rewards = TokenRegistry::new();
            rewards.insert(strategy.reward_token()).unwrap();
            pool.add_strategy(&admin, Box::new(strategy), vec![REWARD.to_string()], 5_000)
                .unwrap();

            let mut bond = Token::new("BOND");
            bond.grant_role(Role::Minter, &admin);

            let mut dollar = ElasticLedger::new("KEEL");
            dollar.grant_role(Role::Minter, &admin);
            dollar.grant_role(Role::Excluder, &admin);
            dollar.grant_rebase_exclusion(&admin, pool.account()).unwrap();

            Self {
                pool,
                bond,
                dollar,
                rewards,
                admin,
                treasury,
            }
        }

        fn fund(&mut self, who: &str, bonds: Amount) -> AccountId {
            let account = AccountId::from(who);
            self.bond.mint(&self.admin, &account, bonds).unwrap();
            account
        }

        fn deposit(&mut self, who: &AccountId, amount: Amount) -> Result<Amount, KeelError> {
            let mut assets = PoolAssets {
                bond: &mut self.bond,
                dollar: &mut self.dollar,
                rewards: &mut self.rewards,
            };
            self.pool.deposit(&mut assets, who, amount)
        }

        fn withdraw(&mut self, who: &AccountId, amount: Amount) -> Result<WithdrawReceipt, KeelError> {
            let mut assets = PoolAssets {
                bond: &mut self.bond,
                dollar: &mut self.dollar,
                rewards: &mut self.rewards,
            };
            self.pool.withdraw(&mut assets, who, amount)
        }

        fn allocate(&mut self, dollars: Amount) -> Result<(), KeelError> {
            let treasury = self.treasury.clone();
            self.dollar.mint(&self.admin, &treasury, dollars).unwrap();
            let mut assets = PoolAssets {
                bond: &mut self.bond,
                dollar: &mut self.dollar,
                rewards: &mut self.rewards,
            };
            self.pool.allocate_seigniorage(&mut assets, &treasury, dollars)
        }

        fn reward_balance(&self, who: &AccountId) -> Amount {
            self.rewards.get(REWARD).unwrap().balance_of(who)
        }
    }

    fn close(a: Amount, b: Amount) -> bool {
        a.abs_diff(b) <= 10
    }

    #[test]
    fn test_deposit() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        assert_eq!(f.deposit(&owner, tokens(100)).unwrap(), tokens(100));

        assert_eq!(f.pool.total_balance(), tokens(100));
        assert_eq!(f.pool.balance_of(&owner), tokens(100));
        assert_eq!(f.pool.idle_underlying(&f.bond), tokens(50));
        assert_eq!(f.pool.invested(), tokens(50));
        assert_eq!(f.pool.strategies()[0].withdrawable, tokens(50));
    }

    #[test]
    fn test_deposit_rejections() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(1));
        assert!(matches!(f.deposit(&owner, 0), Err(KeelError::InvalidState(_))));
        assert!(matches!(
            f.deposit(&owner, tokens(2)),
            Err(KeelError::InsufficientBalance(_))
        ));
        assert_eq!(f.pool.total_shares(), 0);
    }

    #[test]
    fn test_withdraw_everything() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        let receipt = f.withdraw(&owner, tokens(100)).unwrap();

        assert_eq!(receipt.bonds, tokens(100));
        assert_eq!(f.pool.total_balance(), 0);
        assert_eq!(f.pool.balance_of(&owner), 0);
        assert_eq!(f.bond.balance_of(&owner), tokens(100));
        assert_eq!(f.pool.invested(), 0);
    }

    #[test]
    fn test_withdraw_more_than_balance() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        assert!(matches!(
            f.withdraw(&owner, tokens(100) + 1),
            Err(KeelError::InsufficientBalance(_))
        ));
        assert_eq!(f.reward_balance(&owner), 0);
    }

    #[test]
    fn test_claim_only_withdraw() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        let receipt = f.withdraw(&owner, 0).unwrap();

        assert_eq!(receipt.bonds, 0);
        assert_eq!(receipt.rewards, vec![(REWARD.to_string(), tokens(100))]);
        assert_eq!(f.reward_balance(&owner), tokens(100));
        assert_eq!(f.pool.balance_of(&owner), tokens(100));
    }

    #[test]
    fn test_one_user_allocate() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        f.allocate(tokens(25)).unwrap();

        assert_eq!(f.dollar.balance_of(f.pool.account()), tokens(25));
        assert_eq!(f.pool.balance_of(&owner), tokens(75));
        assert_eq!(f.pool.pending_dollars(&owner), tokens(25));
        assert_eq!(f.pool.total_shares(), tokens(100));
        assert_eq!(f.bond.total_supply(), tokens(75));

        f.withdraw(&owner, 0).unwrap();
        assert_eq!(f.pool.balance_of(&owner), tokens(75));
        assert_eq!(f.dollar.balance_of(&owner), tokens(25));
        assert_eq!(f.reward_balance(&owner), tokens(100));
        assert_eq!(f.pool.pending_dollars(&owner), 0);
    }

    #[test]
    fn test_one_user_allocate_then_partial_withdraw() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        f.allocate(tokens(25)).unwrap();

        let receipt = f.withdraw(&owner, tokens(50)).unwrap();
        assert_eq!(receipt.dollars, tokens(25));
        assert_eq!(f.pool.balance_of(&owner), tokens(25));
        assert_eq!(f.bond.balance_of(&owner), tokens(50));
        assert_eq!(f.dollar.balance_of(&owner), tokens(25));
        assert_eq!(f.reward_balance(&owner), tokens(100));
    }

    #[test]
    fn test_allocate_requires_role_and_depositors() {
        let mut f = Fixture::new();
        assert!(matches!(f.allocate(tokens(1)), Err(KeelError::InvalidState(_))));

        let owner = f.fund("owner", tokens(10));
        f.deposit(&owner, tokens(10)).unwrap();
        assert!(matches!(f.allocate(tokens(11)), Err(KeelError::InvalidState(_))));

        let mut assets = PoolAssets {
            bond: &mut f.bond,
            dollar: &mut f.dollar,
            rewards: &mut f.rewards,
        };
        assert!(matches!(
            f.pool.allocate_seigniorage(&mut assets, &owner, tokens(1)),
            Err(KeelError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_two_users_withdraw_after_allocate() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        let user2 = f.fund("user2", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        f.deposit(&user2, tokens(100)).unwrap();
        f.allocate(tokens(50)).unwrap();

        assert_eq!(f.pool.pending_dollars(&owner), tokens(25));
        assert_eq!(f.pool.pending_dollars(&user2), tokens(25));

        f.withdraw(&user2, tokens(75)).unwrap();
        f.withdraw(&owner, tokens(75)).unwrap();

        assert_eq!(f.pool.balance_of(&owner), 0);
        assert_eq!(f.pool.balance_of(&user2), 0);
        assert_eq!(f.bond.balance_of(&owner), tokens(75));
        assert_eq!(f.bond.balance_of(&user2), tokens(75));
        assert_eq!(f.dollar.balance_of(&owner), tokens(25));
        assert_eq!(f.dollar.balance_of(&user2), tokens(25));

        // owner alone at user2's deposit, half at user2's withdraw, alone again after.
        assert!(close(f.reward_balance(&owner), tokens(250)));
        assert!(close(f.reward_balance(&user2), tokens(50)));
    }

    #[test]
    fn test_two_allocations_with_partial_withdraw_between() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        let user2 = f.fund("user2", tokens(100));
        f.deposit(&owner, tokens(100)).unwrap();
        f.deposit(&user2, tokens(100)).unwrap();
        f.allocate(tokens(50)).unwrap();

        f.withdraw(&owner, tokens(25)).unwrap();
        assert!(close(f.pool.balance_of(&owner), tokens(50)));
        f.allocate(tokens(25)).unwrap();

        assert!(close(f.pool.balance_of(&owner), tokens(40)));
        assert!(close(f.pool.balance_of(&user2), tokens(60)));
        assert!(close(f.pool.pending_dollars(&owner), tokens(10)));
        assert!(close(f.pool.pending_dollars(&user2), tokens(40)));
        assert!(close(f.reward_balance(&owner), tokens(150)));
        assert_eq!(f.pool.total_balance(), tokens(100));
    }

    #[test]
    fn test_late_depositor_misses_past_allocation() {
        let mut f = Fixture::new();
        let owner = f.fund("owner", tokens(100));
        let late = f.fund("late", tokens(75));
        f.deposit(&owner, tokens(100)).unwrap();
        f.allocate(tokens(25)).unwrap();
        f.deposit(&late, tokens(75)).unwrap();

        assert_eq!(f.pool.shares_of(&late), tokens(100));
        assert_eq!(f.pool.pending_dollars(&late), 0);
        assert_eq!(f.pool.pending_dollars(&owner), tokens(25));
        assert_eq!(f.pool.balance_of(&late), tokens(75));
    }

    #[test]
    fn test_share_price_non_decreasing_under_deposits() {
        let mut f = Fixture::new();
        let mut last = (0u128, 1u128);
        for (i, amount) in [tokens(3), tokens(7) / 3, 1, tokens(11)].into_iter().enumerate() {
            let who = f.fund(&format!("user{}", i), amount);
            f.deposit(&who, amount).unwrap();
            let now = (f.pool.total_balance(), f.pool.total_shares());
            // now.0 / now.1 >= last.0 / last.1
            assert!(U256::from(now.0) * U256::from(last.1) >= U256::from(last.0) * U256::from(now.1));
            last = now;
        }
    }

    #[test]
    fn test_deposit_after_allocation_takes_every_bond() {
        let mut f = Fixture::new();
        let first = f.fund("first", tokens(10));
        let second = f.fund("second", tokens(10));
        f.deposit(&first, tokens(10)).unwrap();
        f.allocate(tokens(10)).unwrap();
        assert_eq!(f.pool.total_balance(), 0);
        assert_eq!(f.pool.total_shares(), tokens(10));
        assert_eq!(f.pool.balance_of(&first), 0);

        // The next depositor restarts the pool at 1:1.
        assert_eq!(f.deposit(&second, tokens(10)).unwrap(), tokens(10));
        assert_eq!(f.pool.total_shares(), tokens(10));
        assert_eq!(f.pool.shares_of(&first), 0);
        assert_eq!(f.pool.balance_of(&second), tokens(10));
        assert_eq!(f.pool.pending_dollars(&first), tokens(10));
        assert_eq!(f.pool.pending_dollars(&second), 0);

        // The retired depositor still collects its dollars and the harvest
        // taken before the restart.
        let receipt = f.withdraw(&first, 0).unwrap();
        assert_eq!(receipt.dollars, tokens(10));
        assert_eq!(receipt.rewards, vec![(REWARD.to_string(), tokens(100))]);
        assert_eq!(f.pool.pending_dollars(&first), 0);

        let receipt = f.withdraw(&second, tokens(10)).unwrap();
        assert_eq!(receipt.bonds, tokens(10));
        assert_eq!(receipt.dollars, 0);
        assert_eq!(f.bond.balance_of(&second), tokens(10));
    }

    #[test]
    fn test_strategy_allocation_capped() {
        let mut f = Fixture::new();
        let extra = FixedRewardStrategy::new("extra", AccountId::from("extra"), REWARD, 0);
        let admin = f.admin.clone();
        assert!(matches!(
            f.pool.add_strategy(&admin, Box::new(extra.clone()), vec![], 5_001),
            Err(KeelError::InvalidState(_))
        ));
        assert!(matches!(
            f.pool.add_strategy(&AccountId::from("eve"), Box::new(extra.clone()), vec![], 1),
            Err(KeelError::Unauthorized(_))
        ));
        f.pool.add_strategy(&admin, Box::new(extra), vec![], 5_000).unwrap();
        assert_eq!(f.pool.strategies().len(), 2);
    }
}
