// crates/keel-treasury/src/config.rs
//
// Protocol configuration, loaded from TOML.
//
// Every table is optional; missing fields fall back to the defaults below.
//
//   [policy]
//   dollar_price_ceiling = "1.01"
//   contraction_index = 5000
//
//   [epoch]
//   period_secs = 28800
//
//   [[boardrooms]]
//   account = "boardroom"
//   dollar_weight = 1000
//   share_weight = 1000
//
//   [[strategies]]
//   name = "lending"
//   reward_symbol = "RWD"
//   reward_per_harvest = "100"
//   allocation_bps = 5000

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use keel_core::{tokens, AccountId, Amount, KeelError, BPS_DENOMINATOR};

use crate::boardroom::BoardroomEntry;
use crate::epoch::DEFAULT_PERIOD_SECS;
use crate::policy::PolicyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub epoch: EpochConfig,

    #[serde(default)]
    pub tokens: TokenConfig,

    #[serde(default = "default_boardrooms")]
    pub boardrooms: Vec<BoardroomEntry>,

    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochConfig {
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Unix seconds of the first epoch point. Defaults to bootstrap time.
    #[serde(default)]
    pub start_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_dollar_symbol")]
    pub dollar_symbol: String,

    #[serde(default = "default_bond_symbol")]
    pub bond_symbol: String,

    #[serde(default = "default_share_symbol")]
    pub share_symbol: String,

    #[serde(default = "default_share_max_supply", with = "keel_core::amount::decimal")]
    pub share_max_supply: Amount,

    /// Lifetime share-mint cap of the treasury.
    #[serde(default = "default_share_max_supply", with = "keel_core::amount::decimal")]
    pub treasury_share_cap: Amount,
}

/// A `FixedRewardStrategy` registered on the bond pool at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub reward_symbol: String,
    #[serde(with = "keel_core::amount::decimal")]
    pub reward_per_harvest: Amount,
    pub allocation_bps: u32,
}

fn default_period_secs() -> u64 {
    DEFAULT_PERIOD_SECS
}

fn default_dollar_symbol() -> String {
    "KEEL".to_string()
}

fn default_bond_symbol() -> String {
    "KBOND".to_string()
}

fn default_share_symbol() -> String {
    "KSHARE".to_string()
}

fn default_share_max_supply() -> Amount {
    tokens(10_000_000_000)
}

fn default_boardrooms() -> Vec<BoardroomEntry> {
    vec![BoardroomEntry {
        account: AccountId::from("boardroom"),
        dollar_weight: 1_000,
        share_weight: 1_000,
    }]
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            start_time: None,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            dollar_symbol: default_dollar_symbol(),
            bond_symbol: default_bond_symbol(),
            share_symbol: default_share_symbol(),
            share_max_supply: default_share_max_supply(),
            treasury_share_cap: default_share_max_supply(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            epoch: EpochConfig::default(),
            tokens: TokenConfig::default(),
            boardrooms: default_boardrooms(),
            strategies: Vec::new(),
        }
    }
}

impl ProtocolConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, KeelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, KeelError> {
        let config: ProtocolConfig =
            toml::from_str(contents).map_err(|e| KeelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KeelError> {
        self.policy.validate()?;
        if self.epoch.period_secs == 0 {
            return Err(KeelError::Config("epoch.period_secs must be positive".to_string()));
        }
        let allocated: u128 = self.strategies.iter().map(|s| s.allocation_bps as u128).sum();
        if allocated > BPS_DENOMINATOR {
            return Err(KeelError::Config(format!(
                "strategy allocations sum to {} bps",
                allocated
            )));
        }
        Ok(())
    }
}
