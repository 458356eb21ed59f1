// crates/keel-daemon/src/config.rs
//
// Runtime configuration for the Keel daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use keel_core::{tokens, Amount};
use keel_treasury::ProtocolConfig;

use crate::error::DaemonError;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of epochs to run. Zero runs until ctrl-c.
    #[serde(default = "default_epochs")]
    pub epochs: u64,

    /// Wall-clock milliseconds between simulated epochs.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default)]
    pub oracle: OracleConfig,

    /// Accounts funded at genesis that trade bonds as the price moves.
    #[serde(default = "default_holders")]
    pub holders: Vec<HolderConfig>,

    #[serde(default)]
    pub protocol: ProtocolConfig,
}

/// Price feed settings. Scripted prices are played first, then the feed
/// falls back to a seeded random walk.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_initial_price", with = "keel_core::amount::decimal")]
    pub initial_price: Amount,

    /// Maximum per-epoch move, in basis points.
    #[serde(default = "default_volatility_bps")]
    pub volatility_bps: u32,

    /// Constant per-epoch bias added to every move, in basis points.
    #[serde(default)]
    pub drift_bps: i32,

    #[serde(default)]
    pub seed: Option<u64>,

    /// Decimal price strings, e.g. `["0.9", "0.95", "1.05"]`.
    #[serde(default)]
    pub prices: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HolderConfig {
    pub account: String,

    #[serde(with = "keel_core::amount::decimal")]
    pub dollars: Amount,

    /// Share of the dollar balance spent on bonds in an under-peg epoch.
    #[serde(default = "default_bond_bps")]
    pub bond_bps: u32,

    /// Park purchased bonds in the bond pool.
    #[serde(default)]
    pub pool_deposit: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_epochs() -> u64 {
    30
}

fn default_tick_ms() -> u64 {
    250
}

fn default_initial_price() -> Amount {
    keel_core::ONE
}

fn default_volatility_bps() -> u32 {
    500
}

fn default_bond_bps() -> u32 {
    1_000
}

fn default_holders() -> Vec<HolderConfig> {
    vec![
        HolderConfig {
            account: "alice".to_string(),
            dollars: tokens(1_000),
            bond_bps: default_bond_bps(),
            pool_deposit: true,
        },
        HolderConfig {
            account: "bob".to_string(),
            dollars: tokens(500),
            bond_bps: default_bond_bps(),
            pool_deposit: false,
        },
    ]
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            initial_price: default_initial_price(),
            volatility_bps: default_volatility_bps(),
            drift_bps: 0,
            seed: None,
            prices: Vec::new(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            epochs: default_epochs(),
            tick_ms: default_tick_ms(),
            oracle: OracleConfig::default(),
            holders: default_holders(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, DaemonError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, DaemonError> {
        let config: DaemonConfig = toml::from_str(contents)?;
        config.protocol.validate()?;
        if config.oracle.volatility_bps > keel_core::BPS_DENOMINATOR as u32 {
            return Err(DaemonError::Config(format!(
                "oracle volatility_bps {} exceeds 10000",
                config.oracle.volatility_bps
            )));
        }
        Ok(config)
    }
}
