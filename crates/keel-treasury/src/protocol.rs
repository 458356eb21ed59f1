// crates/keel-treasury/src/protocol.rs
//
// Protocol wiring: owns every ledger, the bond pool, the treasury and the
// price oracle, and grants the roles that let the treasury drive them.
//
// Role layout after `bootstrap`:
//   treasury   -> dollar minter + rebaser, bond minter, share minter (capped),
//                 bond-pool allocator
//   governance -> dollar minter + excluder (genesis and exclusions),
//                 bond-pool strategist, treasury governance
// The treasury and the bond pool are excluded from rebases: the treasury's
// dollars back the bond reserve and the pool's back fixed dollar claims.

use serde::{Deserialize, Serialize};

use keel_core::{AccountId, Amount, KeelError, PriceOracle, Role};
use keel_ledger::{ElasticLedger, ShareToken, Token, TokenRegistry};
use keel_vault::{BondPool, FixedRewardStrategy, PoolAssets, WithdrawReceipt};

use crate::boardroom::BoardroomAllocation;
use crate::config::ProtocolConfig;
use crate::epoch::EpochClock;
use crate::report::EpochReport;
use crate::treasury::{Treasury, TreasuryLedgers};

pub const TREASURY_ACCOUNT: &str = "treasury";
pub const POOL_ACCOUNT: &str = "bond-pool";
pub const GOVERNANCE_ACCOUNT: &str = "governance";

/// Point-in-time view of the protocol, as printed by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub epoch: u64,
    pub next_epoch_point: u64,
    #[serde(with = "keel_core::amount::decimal")]
    pub dollar_supply: Amount,
    #[serde(with = "keel_core::amount::decimal")]
    pub rebase_supply: Amount,
    #[serde(with = "keel_core::amount::decimal")]
    pub bond_supply: Amount,
    #[serde(with = "keel_core::amount::decimal")]
    pub share_supply: Amount,
    #[serde(with = "keel_core::amount::decimal")]
    pub reserve: Amount,
    #[serde(with = "keel_core::amount::decimal")]
    pub pool_bonds: Amount,
    pub epochs_under_one: u64,
}

pub struct Protocol {
    pub dollar: ElasticLedger,
    pub bond: Token,
    pub share: ShareToken,
    pub rewards: TokenRegistry,
    pub pool: BondPool,
    pub treasury: Treasury,
    oracle: Box<dyn PriceOracle>,
    governance: AccountId,
}

impl Protocol {
    /// Build every component from `config` and grant the treasury its roles.
    ///
    /// `now` is used as the first epoch point unless the config fixes one.
    pub fn bootstrap(config: &ProtocolConfig, oracle: Box<dyn PriceOracle>, now: u64) -> Result<Self, KeelError> {
        config.validate()?;
        let treasury_account = AccountId::from(TREASURY_ACCOUNT);
        let pool_account = AccountId::from(POOL_ACCOUNT);
        let governance = AccountId::from(GOVERNANCE_ACCOUNT);

        let mut dollar = ElasticLedger::new(config.tokens.dollar_symbol.clone());
        dollar.grant_role(Role::Minter, &treasury_account);
        dollar.grant_role(Role::Rebaser, &treasury_account);
        dollar.grant_role(Role::Minter, &governance);
        dollar.grant_role(Role::Excluder, &governance);
        dollar.grant_rebase_exclusion(&governance, &treasury_account)?;
        dollar.grant_rebase_exclusion(&governance, &pool_account)?;

        let mut bond = Token::new(config.tokens.bond_symbol.clone());
        bond.grant_role(Role::Minter, &treasury_account);

        let mut share = ShareToken::new(config.tokens.share_symbol.clone(), config.tokens.share_max_supply);
        share.register_minter(&treasury_account, config.tokens.treasury_share_cap)?;

        let mut pool = BondPool::new(pool_account);
        pool.grant_role(Role::Allocator, &treasury_account);
        pool.grant_role(Role::Strategist, &governance);

        let mut rewards = TokenRegistry::new();
        for strategy in &config.strategies {
            let account = AccountId::new(format!("strategy-{}", strategy.name));
            let adapter = FixedRewardStrategy::new(
                strategy.name.clone(),
                account.clone(),
                strategy.reward_symbol.clone(),
                strategy.reward_per_harvest,
            );
            if rewards.contains(&strategy.reward_symbol) {
                rewards
                    .get_mut(&strategy.reward_symbol)?
                    .grant_role(Role::Minter, &account);
            } else {
                rewards.insert(adapter.reward_token())?;
            }
            pool.add_strategy(
                &governance,
                Box::new(adapter),
                vec![strategy.reward_symbol.clone()],
                strategy.allocation_bps,
            )?;
        }

        let mut boardrooms = BoardroomAllocation::new();
        for entry in &config.boardrooms {
            boardrooms.add_boardroom(entry.account.clone(), entry.dollar_weight, entry.share_weight)?;
        }
        let clock = EpochClock::new(config.epoch.start_time.unwrap_or(now), config.epoch.period_secs);
        let mut treasury = Treasury::new(treasury_account, config.policy.clone(), clock, boardrooms)?;
        treasury.grant_role(Role::Governance, &governance);

        tracing::info!(
            "protocol bootstrapped: {} / {} / {}, {} strategies, {} boardrooms, first epoch at {}",
            dollar.symbol(),
            bond.symbol(),
            share.symbol(),
            config.strategies.len(),
            config.boardrooms.len(),
            treasury.next_epoch_point()
        );

        Ok(Self {
            dollar,
            bond,
            share,
            rewards,
            pool,
            treasury,
            oracle,
            governance,
        })
    }

    pub fn governance(&self) -> &AccountId {
        &self.governance
    }

    pub fn price(&self) -> Result<Amount, KeelError> {
        self.oracle.price()
    }

    /// Mint initial dollars to `account` as governance.
    pub fn genesis_mint(&mut self, account: &AccountId, amount: Amount) -> Result<(), KeelError> {
        self.dollar.mint(&self.governance, account, amount)
    }

    pub fn allocate_seigniorage(&mut self, now: u64) -> Result<EpochReport, KeelError> {
        let mut ledgers = TreasuryLedgers {
            dollar: &mut self.dollar,
            bond: &mut self.bond,
            share: &mut self.share,
            pool: &mut self.pool,
            rewards: &mut self.rewards,
        };
        self.treasury
            .allocate_seigniorage(&mut ledgers, self.oracle.as_ref(), now)
    }

    /// Approve the treasury for `amount` dollars and buy bonds with them.
    pub fn buy_bonds(&mut self, caller: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let treasury = self.treasury.account().clone();
        let previous = self.dollar.allowance(caller, &treasury);
        self.dollar.approve(caller, &treasury, previous.saturating_add(amount));
        let result = self
            .treasury
            .buy_bonds(&mut self.dollar, &mut self.bond, self.oracle.as_ref(), caller, amount);
        if result.is_err() {
            self.dollar.approve(caller, &treasury, previous);
        }
        result
    }

    /// Approve the treasury for `amount` bonds and redeem them.
    pub fn redeem_bonds(&mut self, caller: &AccountId, amount: Amount) -> Result<(), KeelError> {
        let treasury = self.treasury.account().clone();
        let previous = self.bond.allowance(caller, &treasury);
        self.bond.approve(caller, &treasury, previous.saturating_add(amount));
        let result = self
            .treasury
            .redeem_bonds(&mut self.dollar, &mut self.bond, self.oracle.as_ref(), caller, amount);
        if result.is_err() {
            self.bond.approve(caller, &treasury, previous);
        }
        result
    }

    pub fn deposit(&mut self, caller: &AccountId, amount: Amount) -> Result<Amount, KeelError> {
        let mut assets = PoolAssets {
            bond: &mut self.bond,
            dollar: &mut self.dollar,
            rewards: &mut self.rewards,
        };
        self.pool.deposit(&mut assets, caller, amount)
    }

    pub fn withdraw(&mut self, caller: &AccountId, amount: Amount) -> Result<WithdrawReceipt, KeelError> {
        let mut assets = PoolAssets {
            bond: &mut self.bond,
            dollar: &mut self.dollar,
            rewards: &mut self.rewards,
        };
        self.pool.withdraw(&mut assets, caller, amount)
    }

    pub fn summary(&self) -> ProtocolSummary {
        ProtocolSummary {
            epoch: self.treasury.epoch(),
            next_epoch_point: self.treasury.next_epoch_point(),
            dollar_supply: self.dollar.total_supply(),
            rebase_supply: self.dollar.rebase_supply(),
            bond_supply: self.bond.total_supply(),
            share_supply: self.share.total_supply(),
            reserve: self.treasury.reserve(),
            pool_bonds: self.pool.total_balance(),
            epochs_under_one: self.treasury.epochs_under_one(),
        }
    }
}
