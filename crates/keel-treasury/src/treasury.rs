// crates/keel-treasury/src/treasury.rs
//
// Treasury epoch state machine.
//
//   Idle --(now >= next_epoch_point)--> allocate_seigniorage:
//       p > ceiling       Expand     print, fund reserve + bond pool, pay boardrooms
//       1 <= p <= ceiling HoldAtPeg  nothing but the share mint
//       p < 1             Contract   rebase down once triggered
//   then mint the epoch's governance shares and close the epoch.
//
// Every operation checks all preconditions before its first mutation, so a
// failed call leaves every ledger untouched.

use serde::{Deserialize, Serialize};

use keel_core::{
    bps_of, format_amount, mul_div, AccountId, Amount, KeelError, PriceOracle, Role, RoleSet, ONE,
};
use keel_ledger::{ElasticLedger, ShareToken, Token, TokenRegistry};
use keel_vault::{BondPool, PoolAssets};

use crate::boardroom::BoardroomAllocation;
use crate::epoch::EpochClock;
use crate::policy::{PolicyConfig, PolicyParam};
use crate::report::{payouts, EpochReport, Phase};

/// The ledgers and the bond pool the treasury drives. It owns none of them.
pub struct TreasuryLedgers<'a> {
    pub dollar: &'a mut ElasticLedger,
    pub bond: &'a mut Token,
    pub share: &'a mut ShareToken,
    pub pool: &'a mut BondPool,
    pub rewards: &'a mut TokenRegistry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treasury {
    account: AccountId,
    roles: RoleSet,
    policy: PolicyConfig,
    clock: EpochClock,
    boardrooms: BoardroomAllocation,
    /// Dollars held back to redeem bonds.
    seigniorage_saved: Amount,
    epochs_under_one: u64,
    bonds_issued_this_epoch: Amount,
    /// Bond issuance cap fixed when the last epoch closed. `None` until then,
    /// in which case the live supply is used.
    epoch_bond_budget: Option<Amount>,
}

/// Per-branch effects, computed before anything is mutated.
struct Plan {
    phase: Phase,
    print: Amount,
    to_reserve: Amount,
    pool_cut: Amount,
    boardroom_dollars: Vec<(AccountId, Amount)>,
    rebase_delta: i128,
    epochs_under_one: u64,
}

impl Treasury {
    pub fn new(
        account: AccountId,
        policy: PolicyConfig,
        clock: EpochClock,
        boardrooms: BoardroomAllocation,
    ) -> Result<Self, KeelError> {
        policy.validate()?;
        Ok(Self {
            account,
            roles: RoleSet::new(),
            policy,
            clock,
            boardrooms,
            seigniorage_saved: 0,
            epochs_under_one: 0,
            bonds_issued_this_epoch: 0,
            epoch_bond_budget: None,
        })
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

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn epoch(&self) -> u64 {
        self.clock.epoch()
    }

    pub fn next_epoch_point(&self) -> u64 {
        self.clock.next_epoch_point()
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    /// Dollars saved for bond redemption.
    pub fn reserve(&self) -> Amount {
        self.seigniorage_saved
    }

    pub fn epochs_under_one(&self) -> u64 {
        self.epochs_under_one
    }

    pub fn bonds_issued_this_epoch(&self) -> Amount {
        self.bonds_issued_this_epoch
    }

    pub fn epoch_bond_budget(&self) -> Option<Amount> {
        self.epoch_bond_budget
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn boardrooms(&self) -> &BoardroomAllocation {
        &self.boardrooms
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    pub fn set_policy(&mut self, caller: &AccountId, param: PolicyParam) -> Result<(), KeelError> {
        self.roles.require(Role::Governance, caller)?;
        self.policy.apply(param)?;
        tracing::info!("treasury: policy updated: {:?}", param);
        Ok(())
    }

    /// Swap in a whole policy at once. The current policy is kept if the new
    /// one fails validation.
    pub fn replace_policy(&mut self, caller: &AccountId, policy: PolicyConfig) -> Result<(), KeelError> {
        self.roles.require(Role::Governance, caller)?;
        policy.validate()?;
        self.policy = policy;
        tracing::info!("treasury: policy replaced");
        Ok(())
    }

    pub fn add_boardroom(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        dollar_weight: u32,
        share_weight: u32,
    ) -> Result<(), KeelError> {
        self.roles.require(Role::Governance, caller)?;
        self.boardrooms.add_boardroom(account, dollar_weight, share_weight)
    }

    pub fn update_boardroom(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        dollar_weight: u32,
        share_weight: u32,
    ) -> Result<(), KeelError> {
        self.roles.require(Role::Governance, caller)?;
        self.boardrooms.update_boardroom(account, dollar_weight, share_weight)
    }

    pub fn remove_boardroom(&mut self, caller: &AccountId, account: &AccountId) -> Result<(), KeelError> {
        self.roles.require(Role::Governance, caller)?;
        self.boardrooms.remove_boardroom(account).map(|_| ())
    }

    // ------------------------------------------------------------------
    // Epoch allocation
    // ------------------------------------------------------------------

    /// Run the epoch state machine once. Callable by anyone.
    ///
    /// # Errors
    /// - `EpochNotReady` before the next epoch point.
    /// - Any oracle error.
    /// - `Unauthorized` if the treasury lacks a role it needs this epoch.
    /// - `InvalidDelta` if the contraction would wipe out the rebasing supply.
    pub fn allocate_seigniorage(
        &mut self,
        ledgers: &mut TreasuryLedgers<'_>,
        oracle: &dyn PriceOracle,
        now: u64,
    ) -> Result<EpochReport, KeelError> {
        self.clock.check_ready(now)?;
        let price = oracle.price()?;
        let policy = self.policy.clone();
        let supply = ledgers.dollar.rebase_supply();

        let plan = if price > policy.dollar_price_ceiling {
            self.plan_expansion(ledgers, &policy, price, supply)?
        } else if price >= ONE {
            Plan {
                phase: Phase::HoldAtPeg,
                print: 0,
                to_reserve: 0,
                pool_cut: 0,
                boardroom_dollars: Vec::new(),
                rebase_delta: 0,
                epochs_under_one: 0,
            }
        } else {
            self.plan_contraction(ledgers, &policy, price, supply)?
        };

        let shares = policy
            .shares_minted_per_epoch
            .min(ledgers.share.mintable(&self.account));
        let share_split = self.boardrooms.split_shares(shares)?;

        // Effects. The rebase goes first: it is the only step the ledger may
        // still reject.
        if plan.rebase_delta != 0 {
            ledgers.dollar.rebase(&self.account, self.clock.epoch(), plan.rebase_delta)?;
        }
        if plan.print > 0 {
            ledgers.dollar.mint(&self.account, &self.account, plan.print)?;
        }
        if plan.pool_cut > 0 {
            let mut assets = PoolAssets {
                bond: &mut *ledgers.bond,
                dollar: &mut *ledgers.dollar,
                rewards: &mut *ledgers.rewards,
            };
            ledgers
                .pool
                .allocate_seigniorage(&mut assets, &self.account, plan.pool_cut)?;
        }
        for (boardroom, amount) in &plan.boardroom_dollars {
            ledgers.dollar.transfer(&self.account, boardroom, *amount)?;
        }

        if share_split.is_empty() {
            tracing::warn!(
                "treasury: epoch {} share mint skipped (mintable {}, per epoch {})",
                self.clock.epoch(),
                format_amount(ledgers.share.mintable(&self.account)),
                format_amount(policy.shares_minted_per_epoch)
            );
        }
        for (boardroom, amount) in &share_split {
            ledgers.share.mint(&self.account, boardroom, *amount)?;
        }

        self.seigniorage_saved += plan.to_reserve - plan.pool_cut;
        self.epochs_under_one = plan.epochs_under_one;
        let epoch = self.clock.advance();
        self.bonds_issued_this_epoch = 0;
        let budget = bps_of(
            ledgers.dollar.rebase_supply(),
            policy.max_supply_contraction_percent,
        )?;
        self.epoch_bond_budget = Some(budget);

        let mut report = EpochReport::new(epoch, price, plan.phase);
        report.minted = plan.print;
        report.saved_for_bonds = plan.to_reserve - plan.pool_cut;
        report.paid_to_pool = plan.pool_cut;
        report.boardroom_dollars = payouts(plan.boardroom_dollars);
        report.boardroom_shares = payouts(share_split);
        report.rebase_delta = plan.rebase_delta;
        report.epochs_under_one = self.epochs_under_one;
        report.total_supply = ledgers.dollar.total_supply();
        report.reserve = self.seigniorage_saved;

        tracing::info!(
            "treasury: epoch {} price {} {} minted {} saved {} pool {} rebase {} shares {} under-one {}",
            epoch,
            format_amount(price),
            report.phase,
            format_amount(report.minted),
            format_amount(report.saved_for_bonds),
            format_amount(report.paid_to_pool),
            report.rebase_delta,
            format_amount(report.shares_minted()),
            report.epochs_under_one
        );
        Ok(report)
    }

    fn plan_expansion(
        &self,
        ledgers: &TreasuryLedgers<'_>,
        policy: &PolicyConfig,
        price: Amount,
        supply: Amount,
    ) -> Result<Plan, KeelError> {
        let excess = mul_div(supply, price - ONE, ONE)?;
        let print = bps_of(excess, policy.expansion_index)?;

        let bond_supply = ledgers.bond.total_supply();
        let outstanding = bond_supply.saturating_sub(self.seigniorage_saved);
        let to_reserve = bps_of(print, policy.bond_repay_percent)?.min(outstanding);

        let pool_bonds = ledgers.pool.total_balance();
        let pool_cut = if to_reserve > 0 && pool_bonds > 0 && ledgers.pool.total_shares() > 0 {
            mul_div(to_reserve, pool_bonds, bond_supply)?
        } else {
            0
        };

        if print > 0 && !ledgers.dollar.has_role(Role::Minter, &self.account) {
            return Err(KeelError::Unauthorized(format!(
                "{} cannot mint {}",
                self.account,
                ledgers.dollar.symbol()
            )));
        }
        if pool_cut > 0 {
            ledgers
                .pool
                .check_allocation(&*ledgers.bond, &self.account, pool_cut)?;
        }

        let to_boardrooms = print - to_reserve;
        let boardroom_dollars = self.boardrooms.split_dollars(to_boardrooms)?;
        if to_boardrooms > 0 && boardroom_dollars.is_empty() {
            tracing::warn!(
                "treasury: no boardroom dollar weight, {} stays in treasury",
                format_amount(to_boardrooms)
            );
        }

        Ok(Plan {
            phase: Phase::Expand,
            print,
            to_reserve,
            pool_cut,
            boardroom_dollars,
            rebase_delta: 0,
            epochs_under_one: 0,
        })
    }

    fn plan_contraction(
        &self,
        ledgers: &TreasuryLedgers<'_>,
        policy: &PolicyConfig,
        price: Amount,
        supply: Amount,
    ) -> Result<Plan, KeelError> {
        let epochs_under_one = self.epochs_under_one + 1;
        let triggered = price <= policy.trigger_rebase_price_ceiling
            || epochs_under_one > policy.trigger_rebase_num_epoch_floor;

        let rebase_delta = if triggered {
            let shortfall = mul_div(supply, ONE - price, ONE)?;
            let contraction = bps_of(shortfall, policy.contraction_index)?;
            let contraction = i128::try_from(contraction)
                .map_err(|_| KeelError::Overflow(format!("contraction {} exceeds i128", contraction)))?;
            -contraction
        } else {
            0
        };
        if rebase_delta != 0 && !ledgers.dollar.has_role(Role::Rebaser, &self.account) {
            return Err(KeelError::Unauthorized(format!(
                "{} cannot rebase {}",
                self.account,
                ledgers.dollar.symbol()
            )));
        }

        Ok(Plan {
            phase: Phase::Contract,
            print: 0,
            to_reserve: 0,
            pool_cut: 0,
            boardroom_dollars: Vec::new(),
            rebase_delta,
            epochs_under_one,
        })
    }

    // ------------------------------------------------------------------
    // Bonds
    // ------------------------------------------------------------------

    /// Burn `amount` dollars from `caller` for the same amount of bonds.
    ///
    /// The caller must have approved the treasury on the dollar ledger.
    ///
    /// # Errors
    /// `PriceNotEligible`, `EpochCapExceeded`, `DebtRatioExceeded`,
    /// `InsufficientBalance`, in that order of precedence.
    pub fn buy_bonds(
        &mut self,
        dollar: &mut ElasticLedger,
        bond: &mut Token,
        oracle: &dyn PriceOracle,
        caller: &AccountId,
        amount: Amount,
    ) -> Result<(), KeelError> {
        if amount == 0 {
            return Err(KeelError::InvalidState("cannot buy zero bonds".to_string()));
        }
        let price = oracle.price()?;
        if price >= ONE {
            return Err(KeelError::PriceNotEligible(format!(
                "dollar price {} not eligible for bond purchase",
                format_amount(price)
            )));
        }

        let supply = dollar.rebase_supply();
        let budget = match self.epoch_bond_budget {
            Some(budget) => budget,
            None => bps_of(supply, self.policy.max_supply_contraction_percent)?,
        };
        if self.bonds_issued_this_epoch.saturating_add(amount) > budget {
            return Err(KeelError::EpochCapExceeded(format!(
                "not enough bonds left to purchase this epoch: {} issued of {}",
                format_amount(self.bonds_issued_this_epoch),
                format_amount(budget)
            )));
        }

        let max_debt = bps_of(supply, self.policy.max_debt_ratio_percent)?;
        if bond.total_supply().saturating_add(amount) > max_debt {
            return Err(KeelError::DebtRatioExceeded(format!(
                "over max debt ratio: {} bonds outstanding, cap {}",
                format_amount(bond.total_supply()),
                format_amount(max_debt)
            )));
        }

        let available = dollar.balance_of(caller);
        if available < amount {
            return Err(KeelError::InsufficientBalance(format!(
                "{} holds {} dollars, not enough to buy {} bonds",
                caller,
                format_amount(available),
                format_amount(amount)
            )));
        }
        if !bond.has_role(Role::Minter, &self.account) {
            return Err(KeelError::Unauthorized(format!(
                "{} cannot mint {}",
                self.account,
                bond.symbol()
            )));
        }

        dollar.burn_from(&self.account, caller, amount)?;
        bond.mint(&self.account, caller, amount)?;
        self.bonds_issued_this_epoch += amount;
        tracing::debug!(
            "treasury: {} bought {} bonds at {}",
            caller,
            format_amount(amount),
            format_amount(price)
        );
        Ok(())
    }

    /// Burn `amount` bonds from `caller` and pay the same amount of dollars
    /// out of the reserve.
    ///
    /// The caller must have approved the treasury on the bond ledger.
    ///
    /// # Errors
    /// `PriceNotEligible` unless the price is strictly above the ceiling,
    /// `NoReserve` with nothing saved, `BudgetExceeded` if the reserve or the
    /// treasury's dollars cannot cover `amount`.
    pub fn redeem_bonds(
        &mut self,
        dollar: &mut ElasticLedger,
        bond: &mut Token,
        oracle: &dyn PriceOracle,
        caller: &AccountId,
        amount: Amount,
    ) -> Result<(), KeelError> {
        let price = oracle.price()?;
        if price <= self.policy.dollar_price_ceiling {
            return Err(KeelError::PriceNotEligible(format!(
                "dollar price {} not eligible for bond redemption",
                format_amount(price)
            )));
        }
        if self.seigniorage_saved == 0 {
            return Err(KeelError::NoReserve);
        }
        let held = dollar.balance_of(&self.account);
        if amount > self.seigniorage_saved || amount > held {
            return Err(KeelError::BudgetExceeded(format!(
                "treasury has no more budget: {} requested, {} saved, {} held",
                format_amount(amount),
                format_amount(self.seigniorage_saved),
                format_amount(held)
            )));
        }

        bond.burn_from(&self.account, caller, amount)?;
        dollar.transfer(&self.account, caller, amount)?;
        self.seigniorage_saved -= amount;
        tracing::debug!(
            "treasury: {} redeemed {} bonds, reserve now {}",
            caller,
            format_amount(amount),
            format_amount(self.seigniorage_saved)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::DEFAULT_PERIOD_SECS;
    use crate::oracle::FixedPriceOracle;
    use keel_core::tokens;

    fn price(text: &str) -> Amount {
        keel_core::parse_amount(text).unwrap()
    }

    struct Fixture {
        treasury: Treasury,
        dollar: ElasticLedger,
        bond: Token,
        share: ShareToken,
        pool: BondPool,
        rewards: TokenRegistry,
        oracle: FixedPriceOracle,
        admin: AccountId,
        boardroom: AccountId,
        now: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let admin = AccountId::from("admin");
            let account = AccountId::from("treasury");
            let boardroom = AccountId::from("boardroom");

            let mut boardrooms = BoardroomAllocation::new();
            boardrooms.add_boardroom(boardroom.clone(), 1_000, 1_000).unwrap();
            let mut treasury = Treasury::new(
                account.clone(),
                PolicyConfig::default(),
                EpochClock::new(0, DEFAULT_PERIOD_SECS),
                boardrooms,
            )
            .unwrap();
            treasury.grant_role(Role::Governance, &admin);

            let mut pool = BondPool::new(AccountId::from("bond-pool"));
            pool.grant_role(Role::Allocator, &account);

            let mut dollar = ElasticLedger::new("KEEL");
            for role in [Role::Minter, Role::Rebaser, Role::Excluder] {
                dollar.grant_role(role, &admin);
            }
            dollar.grant_role(Role::Minter, &account);
            dollar.grant_role(Role::Rebaser, &account);
            dollar.grant_rebase_exclusion(&admin, &account).unwrap();
            dollar.grant_rebase_exclusion(&admin, pool.account()).unwrap();

            let mut bond = Token::new("KBOND");
            bond.grant_role(Role::Minter, &admin);
            bond.grant_role(Role::Minter, &account);

            let mut share = ShareToken::new("KSHARE", tokens(10_000_000_000));
            share.register_minter(&account, tokens(10_000_000_000)).unwrap();

            Self {
                treasury,
                dollar,
                bond,
                share,
                pool,
                rewards: TokenRegistry::new(),
                oracle: FixedPriceOracle::new(ONE),
                admin,
                boardroom,
                now: 0,
            }
        }

        fn user(&mut self, name: &str, dollars: Amount) -> AccountId {
            let account = AccountId::from(name);
            if dollars > 0 {
                self.dollar.mint(&self.admin, &account, dollars).unwrap();
            }
            account
        }

        fn set_price(&self, text: &str) {
            self.oracle.set_price(price(text)).unwrap();
        }

        fn set(&mut self, param: PolicyParam) {
            let admin = self.admin.clone();
            self.treasury.set_policy(&admin, param).unwrap();
        }

        fn allocate(&mut self) -> Result<EpochReport, KeelError> {
            let mut ledgers = TreasuryLedgers {
                dollar: &mut self.dollar,
                bond: &mut self.bond,
                share: &mut self.share,
                pool: &mut self.pool,
                rewards: &mut self.rewards,
            };
            let report = self
                .treasury
                .allocate_seigniorage(&mut ledgers, &self.oracle, self.now)?;
            self.now += DEFAULT_PERIOD_SECS;
            Ok(report)
        }

        fn buy(&mut self, who: &AccountId, amount: Amount) -> Result<(), KeelError> {
            self.treasury
                .buy_bonds(&mut self.dollar, &mut self.bond, &self.oracle, who, amount)
        }

        fn redeem(&mut self, who: &AccountId, amount: Amount) -> Result<(), KeelError> {
            self.treasury
                .redeem_bonds(&mut self.dollar, &mut self.bond, &self.oracle, who, amount)
        }

        fn bonds_for(&mut self, who: &AccountId, amount: Amount) {
            self.bond.mint(&self.admin, who, amount).unwrap();
        }
    }

    /// Holder with one dollar approved to the treasury, bonds cheap.
    fn bond_buyer(f: &mut Fixture) -> AccountId {
        f.set_price("0.1");
        let owner = f.user("owner", ONE);
        f.dollar.approve(&owner, f.treasury.account(), ONE);
        f.set(PolicyParam::ContractionIndex(0));
        f.set(PolicyParam::MaxSupplyContractionPercent(2_000));
        owner
    }

    // --- bonds ---------------------------------------------------------

    #[test]
    fn test_cannot_buy_above_peg() {
        let mut f = Fixture::new();
        f.set_price("1.1");
        let owner = f.user("owner", ONE);
        f.dollar.approve(&owner, f.treasury.account(), ONE);
        assert!(matches!(f.buy(&owner, ONE), Err(KeelError::PriceNotEligible(_))));
    }

    #[test]
    fn test_epoch_bond_cap() {
        let mut f = Fixture::new();
        let owner = bond_buyer(&mut f);
        f.set(PolicyParam::MaxDebtRatioPercent(10_000));
        f.allocate().unwrap();

        f.buy(&owner, price("0.2")).unwrap();
        assert!(matches!(
            f.buy(&owner, price("0.1")),
            Err(KeelError::EpochCapExceeded(_))
        ));
        assert_eq!(f.dollar.balance_of(&owner), price("0.8"));
        assert_eq!(f.bond.balance_of(&owner), price("0.2"));
        assert_eq!(f.treasury.bonds_issued_this_epoch(), price("0.2"));
    }

    #[test]
    fn test_max_debt_ratio() {
        let mut f = Fixture::new();
        let owner = bond_buyer(&mut f);
        f.set(PolicyParam::MaxDebtRatioPercent(2_000));
        f.allocate().unwrap();
        f.buy(&owner, price("0.2")).unwrap();

        f.allocate().unwrap();
        assert_eq!(f.treasury.bonds_issued_this_epoch(), 0);
        assert!(matches!(
            f.buy(&owner, price("0.1")),
            Err(KeelError::DebtRatioExceeded(_))
        ));
        assert_eq!(f.dollar.balance_of(&owner), price("0.8"));
        assert_eq!(f.bond.balance_of(&owner), price("0.2"));
    }

    #[test]
    fn test_budget_is_snapshotted_at_epoch_close() {
        let mut f = Fixture::new();
        let owner = bond_buyer(&mut f);
        f.set(PolicyParam::MaxDebtRatioPercent(3_000));
        f.allocate().unwrap();
        assert_eq!(f.treasury.epoch_bond_budget(), Some(price("0.2")));

        // The second purchase is measured against the budget fixed at the
        // epoch close, not the supply the first purchase shrank.
        f.buy(&owner, price("0.1")).unwrap();
        f.buy(&owner, price("0.1")).unwrap();
        assert_eq!(f.dollar.balance_of(&owner), price("0.8"));
        assert_eq!(f.bond.balance_of(&owner), price("0.2"));
    }

    #[test]
    fn test_cannot_buy_more_than_balance() {
        let mut f = Fixture::new();
        f.set_price("0.1");
        let owner = f.user("owner", ONE);
        f.user("user2", ONE);
        f.set(PolicyParam::ContractionIndex(0));
        f.set(PolicyParam::MaxSupplyContractionPercent(10_000));
        f.set(PolicyParam::MaxDebtRatioPercent(10_000));
        f.allocate().unwrap();

        f.dollar.approve(&owner, f.treasury.account(), tokens(2));
        assert!(matches!(
            f.buy(&owner, tokens(2)),
            Err(KeelError::InsufficientBalance(_))
        ));
    }

    #[test]
    fn test_buy_requires_allowance() {
        let mut f = Fixture::new();
        f.set_price("0.9");
        let owner = f.user("owner", tokens(10));
        assert!(matches!(
            f.buy(&owner, ONE / 100),
            Err(KeelError::InsufficientAllowance(_))
        ));
        assert_eq!(f.bond.total_supply(), 0);
    }

    fn redeemable(f: &mut Fixture, saved: Amount, treasury_dollars: Amount, text: &str) -> AccountId {
        let owner = f.user("owner", 0);
        f.bonds_for(&owner, ONE);
        if treasury_dollars > 0 {
            let account = f.treasury.account().clone();
            f.dollar.mint(&f.admin, &account, treasury_dollars).unwrap();
        }
        f.set_price(text);
        f.bond.approve(&owner, f.treasury.account(), ONE);
        f.treasury.seigniorage_saved = saved;
        owner
    }

    #[test]
    fn test_redeem_above_ceiling() {
        let mut f = Fixture::new();
        let owner = redeemable(&mut f, ONE, ONE, "1.1");
        f.redeem(&owner, ONE).unwrap();
        assert_eq!(f.bond.balance_of(&owner), 0);
        assert_eq!(f.dollar.balance_of(&owner), ONE);
        assert_eq!(f.treasury.reserve(), 0);
    }

    #[test]
    fn test_redeem_without_reserve() {
        let mut f = Fixture::new();
        let owner = redeemable(&mut f, 0, ONE, "1.1");
        assert!(matches!(f.redeem(&owner, ONE), Err(KeelError::NoReserve)));
    }

    #[test]
    fn test_redeem_without_treasury_dollars() {
        let mut f = Fixture::new();
        let owner = redeemable(&mut f, ONE, 0, "1.1");
        assert!(matches!(f.redeem(&owner, ONE), Err(KeelError::BudgetExceeded(_))));
        assert_eq!(f.bond.balance_of(&owner), ONE);
    }

    #[test]
    fn test_redeem_at_or_below_ceiling() {
        for text in ["1.01", "1"] {
            let mut f = Fixture::new();
            let owner = redeemable(&mut f, ONE, ONE, text);
            assert!(matches!(
                f.redeem(&owner, ONE),
                Err(KeelError::PriceNotEligible(_))
            ));
        }
    }

    // --- allocate_seigniorage -----------------------------------------

    #[test]
    fn test_hold_at_ceiling_and_peg() {
        for text in ["1.01", "1"] {
            let mut f = Fixture::new();
            let user2 = f.user("user2", price("0.1"));
            f.set_price(text);
            let report = f.allocate().unwrap();

            assert_eq!(report.phase, Phase::HoldAtPeg);
            assert_eq!(f.dollar.balance_of(&user2), price("0.1"));
            assert_eq!(f.dollar.balance_of(&f.boardroom), 0);
            assert_eq!(f.share.balance_of(&f.boardroom), ONE);
            assert_eq!(f.treasury.epochs_under_one(), 0);
            assert_eq!(f.treasury.epoch(), 1);
        }
    }

    #[test]
    fn test_expansion_without_debt() {
        let mut f = Fixture::new();
        f.user("user2", price("0.1"));
        f.set_price("1.1");
        let report = f.allocate().unwrap();

        assert_eq!(report.phase, Phase::Expand);
        assert_eq!(report.minted, price("0.001"));
        assert_eq!(f.dollar.total_supply(), price("0.101"));
        assert_eq!(f.dollar.balance_of(&f.boardroom), price("0.001"));
        assert_eq!(f.share.balance_of(&f.boardroom), ONE);
        assert_eq!(f.treasury.reserve(), 0);
    }

    #[test]
    fn test_expansion_repays_small_debt_in_full() {
        let mut f = Fixture::new();
        let user2 = f.user("user2", tokens(10));
        let debt = 10_000_000_000;
        f.bonds_for(&user2, debt);
        f.set_price("1.1");
        f.allocate().unwrap();

        assert_eq!(f.treasury.reserve(), debt);
        assert_eq!(f.treasury.epochs_under_one(), 0);
        assert_eq!(f.share.balance_of(&f.boardroom), ONE);
        assert_eq!(f.dollar.balance_of(&f.boardroom), price("0.1") - debt);
    }

    #[test]
    fn test_expansion_caps_reserve_by_repay_percent() {
        let mut f = Fixture::new();
        let user2 = f.user("user2", tokens(10));
        f.bonds_for(&user2, tokens(1_000_000_000));
        f.set_price("1.1");
        f.set(PolicyParam::ExpansionIndex(2_000));
        let report = f.allocate().unwrap();

        // print = 10 * 0.1 * 20% = 0.2, reserve = 10% of print.
        assert_eq!(report.minted, price("0.2"));
        assert_eq!(f.treasury.reserve(), price("0.02"));
        assert_eq!(f.dollar.balance_of(f.treasury.account()), price("0.02"));
        assert_eq!(f.dollar.balance_of(&f.boardroom), price("0.18"));
    }

    #[test]
    fn test_expansion_pays_bond_pool_share_of_reserve() {
        let mut f = Fixture::new();
        f.user("user2", tokens(10));
        let depositor = AccountId::from("depositor");
        f.bonds_for(&depositor, ONE);
        let mut assets = PoolAssets {
            bond: &mut f.bond,
            dollar: &mut f.dollar,
            rewards: &mut f.rewards,
        };
        f.pool.deposit(&mut assets, &depositor, ONE).unwrap();

        f.set_price("1.1");
        let report = f.allocate().unwrap();

        // Reserve 0.01 is all owed to the pool, which holds every bond.
        assert_eq!(report.paid_to_pool, price("0.01"));
        assert_eq!(report.saved_for_bonds, 0);
        assert_eq!(f.treasury.reserve(), 0);
        assert_eq!(f.bond.total_supply(), price("0.99"));
        assert_eq!(f.pool.balance_of(&depositor), price("0.99"));
        assert_eq!(f.pool.pending_dollars(&depositor), price("0.01"));
        assert_eq!(f.dollar.balance_of(f.pool.account()), price("0.01"));
    }

    #[test]
    fn test_pool_reopens_after_repayment_takes_every_bond() {
        let mut f = Fixture::new();
        f.user("user2", tokens(10));
        let depositor = AccountId::from("depositor");
        let late = AccountId::from("late");
        f.bonds_for(&depositor, price("0.1"));
        let mut assets = PoolAssets {
            bond: &mut f.bond,
            dollar: &mut f.dollar,
            rewards: &mut f.rewards,
        };
        f.pool.deposit(&mut assets, &depositor, price("0.1")).unwrap();

        // Print 1.0, reserve share 0.1 covers every outstanding bond, all pooled.
        f.set_price("2");
        let report = f.allocate().unwrap();
        assert_eq!(report.paid_to_pool, price("0.1"));
        assert_eq!(f.pool.total_balance(), 0);
        assert_eq!(f.bond.total_supply(), 0);

        f.bonds_for(&late, ONE);
        let mut assets = PoolAssets {
            bond: &mut f.bond,
            dollar: &mut f.dollar,
            rewards: &mut f.rewards,
        };
        assert_eq!(f.pool.deposit(&mut assets, &late, ONE).unwrap(), ONE);
        let receipt = f.pool.withdraw(&mut assets, &depositor, 0).unwrap();
        assert_eq!(receipt.dollars, price("0.1"));
        assert_eq!(f.pool.balance_of(&late), ONE);
        assert_eq!(f.pool.total_shares(), ONE);
    }

    #[test]
    fn test_epochs_under_one_resets_at_or_above_peg() {
        for text in ["1", "1.1"] {
            let mut f = Fixture::new();
            f.user("user2", price("0.1"));
            f.treasury.epochs_under_one = 5;
            f.set_price(text);
            f.allocate().unwrap();
            assert_eq!(f.treasury.epochs_under_one(), 0);
        }
    }

    #[test]
    fn test_epochs_under_one_increments_below_peg() {
        let mut f = Fixture::new();
        f.user("user2", price("0.1"));
        f.treasury.epochs_under_one = 3;
        f.set_price("0.99");
        f.allocate().unwrap();
        assert_eq!(f.treasury.epochs_under_one(), 4);
    }

    #[test]
    fn test_no_share_mint_without_minter() {
        let mut f = Fixture::new();
        f.user("user2", ONE);
        let account = f.treasury.account().clone();
        f.share.remove_minter(&account).unwrap();
        f.set_price("1.02");
        let report = f.allocate().unwrap();

        assert_eq!(report.shares_minted(), 0);
        assert_eq!(f.share.balance_of(&f.boardroom), 0);
        assert_eq!(f.share.balance_of(&account), 0);
    }

    #[test]
    fn test_no_share_mint_when_cap_exhausted() {
        let mut f = Fixture::new();
        f.user("user2", ONE);
        let account = f.treasury.account().clone();
        f.share.update_minter(&account, tokens(101)).unwrap();
        f.share.mint(&account, &AccountId::from("early"), tokens(101)).unwrap();
        f.set_price("1.02");
        f.allocate().unwrap();

        assert_eq!(f.share.balance_of(&f.boardroom), 0);
        assert_eq!(f.share.total_supply(), tokens(101));
    }

    #[test]
    fn test_no_share_mint_when_rate_zero() {
        let mut f = Fixture::new();
        f.user("user2", ONE);
        f.set(PolicyParam::SharesMintedPerEpoch(0));
        f.set_price("1.02");
        let report = f.allocate().unwrap();

        assert_eq!(report.shares_minted(), 0);
        assert!(report.boardroom_shares.is_empty());
        assert_eq!(f.treasury.epoch(), 1);
        assert_eq!(f.share.balance_of(&f.boardroom), 0);
        assert_eq!(f.share.total_supply(), 0);
    }

    #[test]
    fn test_epoch_gate() {
        let mut f = Fixture::new();
        f.allocate().unwrap();
        f.now -= 1;
        assert!(matches!(f.allocate(), Err(KeelError::EpochNotReady { .. })));
        assert_eq!(f.treasury.epoch(), 1);
        f.now += 1;
        f.allocate().unwrap();
        assert_eq!(f.treasury.epoch(), 2);
        assert_eq!(f.treasury.next_epoch_point(), 2 * DEFAULT_PERIOD_SECS);
    }

    #[test]
    fn test_failed_allocation_changes_nothing() {
        let mut f = Fixture::new();
        let user2 = f.user("user2", ONE);
        let account = f.treasury.account().clone();
        f.dollar.revoke_role(Role::Rebaser, &account);
        f.set_price("0.5");

        assert!(matches!(f.allocate(), Err(KeelError::Unauthorized(_))));
        assert_eq!(f.treasury.epoch(), 0);
        assert_eq!(f.treasury.epochs_under_one(), 0);
        assert_eq!(f.share.total_supply(), 0);
        assert_eq!(f.dollar.balance_of(&user2), ONE);
    }

    #[test]
    fn test_governance_required() {
        let mut f = Fixture::new();
        let eve = AccountId::from("eve");
        assert!(matches!(
            f.treasury.set_policy(&eve, PolicyParam::ExpansionIndex(1)),
            Err(KeelError::Unauthorized(_))
        ));
        assert!(matches!(
            f.treasury.add_boardroom(&eve, eve.clone(), 1, 1),
            Err(KeelError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_replace_policy() {
        let mut f = Fixture::new();
        let admin = f.admin.clone();
        let tighter = PolicyConfig {
            expansion_index: 500,
            shares_minted_per_epoch: 0,
            ..PolicyConfig::default()
        };

        assert!(matches!(
            f.treasury.replace_policy(&AccountId::from("eve"), tighter.clone()),
            Err(KeelError::Unauthorized(_))
        ));
        let invalid = PolicyConfig {
            bond_repay_percent: 10_001,
            ..PolicyConfig::default()
        };
        assert!(matches!(
            f.treasury.replace_policy(&admin, invalid),
            Err(KeelError::Config(_))
        ));
        assert_eq!(f.treasury.policy(), &PolicyConfig::default());

        f.treasury.replace_policy(&admin, tighter.clone()).unwrap();
        assert_eq!(f.treasury.policy(), &tighter);
    }

    // --- contraction --------------------------------------------------

    /// One holder with one dollar at 0.95.
    fn under_peg(rebase_ceiling: &str, floor: u64) -> (Fixture, AccountId) {
        let mut f = Fixture::new();
        let user2 = f.user("user2", ONE);
        f.set_price("0.95");
        f.set(PolicyParam::TriggerRebasePriceCeiling(price(rebase_ceiling)));
        f.set(PolicyParam::TriggerRebaseNumEpochFloor(floor));
        (f, user2)
    }

    /// Balance after a contraction at 0.95 with the default 50% index.
    fn contracted(balance: Amount) -> Amount {
        balance - balance * 5 / 100 / 2
    }

    /// Run one epoch and report whether the holder was rebased.
    fn step(f: &mut Fixture, user2: &AccountId) -> bool {
        let before = f.dollar.balance_of(user2);
        let report = f.allocate().unwrap();
        assert_eq!(report.phase, Phase::Contract);
        assert_eq!(f.dollar.balance_of(&f.boardroom), 0);
        let after = f.dollar.balance_of(user2);
        if after == before {
            false
        } else {
            assert_eq!(after, contracted(before));
            true
        }
    }

    #[test]
    fn test_below_rebase_ceiling_rebases_immediately() {
        for floor in [0, 1, 2, 3] {
            let (mut f, user2) = under_peg("0.99", floor);
            assert!(step(&mut f, &user2));
            assert_eq!(f.dollar.balance_of(&user2), price("0.975"));
            assert_eq!(f.share.balance_of(&f.boardroom), ONE);
            assert_eq!(f.treasury.epochs_under_one(), 1);
        }
    }

    #[test]
    fn test_above_rebase_ceiling_floor_zero() {
        let (mut f, user2) = under_peg("0.9", 0);
        assert!(step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 1);
    }

    #[test]
    fn test_above_rebase_ceiling_floor_one() {
        let (mut f, user2) = under_peg("0.9", 1);
        assert!(!step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 1);
        assert!(step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 2);
        assert!(step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 3);
        assert_eq!(f.share.balance_of(&f.boardroom), tokens(3));
    }

    #[test]
    fn test_above_rebase_ceiling_floor_two() {
        let (mut f, user2) = under_peg("0.9", 2);
        assert!(!step(&mut f, &user2));
        assert!(!step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 2);
        assert!(step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 3);
        assert!(step(&mut f, &user2));
        assert_eq!(f.treasury.epochs_under_one(), 4);
    }

    #[test]
    fn test_recovery_resets_floor_wait() {
        let (mut f, user2) = under_peg("0.9", 1);
        assert!(!step(&mut f, &user2));
        assert!(step(&mut f, &user2));
        f.set_price("1");
        f.allocate().unwrap();
        assert_eq!(f.treasury.epochs_under_one(), 0);
        f.set_price("0.95");
        assert!(!step(&mut f, &user2));
    }
}
