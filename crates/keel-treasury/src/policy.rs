// crates/keel-treasury/src/policy.rs
//
// Treasury policy parameters.
//
// Prices are fixed-point amounts written as decimal strings in configuration
// files ("1.01"); indices and percentages are basis points out of 10_000.
// The treasury copies the policy once at the start of each
// `allocate_seigniorage` call so a governance update never lands mid-epoch.

use serde::{Deserialize, Serialize};

use keel_core::{Amount, KeelError, BPS_DENOMINATOR, ONE};

/// Monetary policy knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Prices strictly above this expand supply and allow bond redemption.
    #[serde(default = "default_dollar_price_ceiling", with = "keel_core::amount::decimal")]
    pub dollar_price_ceiling: Amount,

    /// Prices at or below this rebase immediately when under peg.
    #[serde(
        default = "default_trigger_rebase_price_ceiling",
        with = "keel_core::amount::decimal"
    )]
    pub trigger_rebase_price_ceiling: Amount,

    /// Under-peg epochs to wait before rebasing above the rebase ceiling.
    #[serde(default)]
    pub trigger_rebase_num_epoch_floor: u64,

    /// Share of the price excess printed on expansion (bps).
    #[serde(default = "default_expansion_index")]
    pub expansion_index: u32,

    /// Share of the price shortfall removed on contraction (bps).
    #[serde(default = "default_contraction_index")]
    pub contraction_index: u32,

    /// Share of each print set aside to redeem bonds (bps).
    #[serde(default = "default_bond_repay_percent")]
    pub bond_repay_percent: u32,

    /// Per-epoch bond issuance cap relative to the rebasing supply (bps).
    #[serde(default = "default_max_supply_contraction_percent")]
    pub max_supply_contraction_percent: u32,

    /// Cap on outstanding bonds relative to the rebasing supply (bps).
    #[serde(default = "default_max_debt_ratio_percent")]
    pub max_debt_ratio_percent: u32,

    /// Governance shares minted to boardrooms every epoch.
    #[serde(
        default = "default_shares_minted_per_epoch",
        with = "keel_core::amount::decimal"
    )]
    pub shares_minted_per_epoch: Amount,
}

fn default_dollar_price_ceiling() -> Amount {
    ONE + ONE / 100
}

fn default_trigger_rebase_price_ceiling() -> Amount {
    ONE * 95 / 100
}

fn default_expansion_index() -> u32 {
    1_000
}

fn default_contraction_index() -> u32 {
    5_000
}

fn default_bond_repay_percent() -> u32 {
    1_000
}

fn default_max_supply_contraction_percent() -> u32 {
    300
}

fn default_max_debt_ratio_percent() -> u32 {
    3_500
}

fn default_shares_minted_per_epoch() -> Amount {
    ONE
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dollar_price_ceiling: default_dollar_price_ceiling(),
            trigger_rebase_price_ceiling: default_trigger_rebase_price_ceiling(),
            trigger_rebase_num_epoch_floor: 0,
            expansion_index: default_expansion_index(),
            contraction_index: default_contraction_index(),
            bond_repay_percent: default_bond_repay_percent(),
            max_supply_contraction_percent: default_max_supply_contraction_percent(),
            max_debt_ratio_percent: default_max_debt_ratio_percent(),
            shares_minted_per_epoch: default_shares_minted_per_epoch(),
        }
    }
}

impl PolicyConfig {
    /// # Errors
    /// `Config` if a basis-point value exceeds 10_000 or the price ceilings
    /// are on the wrong side of the peg.
    pub fn validate(&self) -> Result<(), KeelError> {
        let bps = [
            ("expansion_index", self.expansion_index),
            ("contraction_index", self.contraction_index),
            ("bond_repay_percent", self.bond_repay_percent),
            ("max_supply_contraction_percent", self.max_supply_contraction_percent),
            ("max_debt_ratio_percent", self.max_debt_ratio_percent),
        ];
        for (name, value) in bps {
            if value as u128 > BPS_DENOMINATOR {
                return Err(KeelError::Config(format!(
                    "{} = {} exceeds {} bps",
                    name, value, BPS_DENOMINATOR
                )));
            }
        }
        if self.dollar_price_ceiling < ONE {
            return Err(KeelError::Config(
                "dollar_price_ceiling must be at least 1.0".to_string(),
            ));
        }
        if self.trigger_rebase_price_ceiling > ONE {
            return Err(KeelError::Config(
                "trigger_rebase_price_ceiling must not exceed 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a single parameter change, validating the result.
    pub fn apply(&mut self, param: PolicyParam) -> Result<(), KeelError> {
        let mut next = self.clone();
        match param {
            PolicyParam::DollarPriceCeiling(v) => next.dollar_price_ceiling = v,
            PolicyParam::TriggerRebasePriceCeiling(v) => next.trigger_rebase_price_ceiling = v,
            PolicyParam::TriggerRebaseNumEpochFloor(v) => next.trigger_rebase_num_epoch_floor = v,
            PolicyParam::ExpansionIndex(v) => next.expansion_index = v,
            PolicyParam::ContractionIndex(v) => next.contraction_index = v,
            PolicyParam::BondRepayPercent(v) => next.bond_repay_percent = v,
            PolicyParam::MaxSupplyContractionPercent(v) => next.max_supply_contraction_percent = v,
            PolicyParam::MaxDebtRatioPercent(v) => next.max_debt_ratio_percent = v,
            PolicyParam::SharesMintedPerEpoch(v) => next.shares_minted_per_epoch = v,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// One governance-settable policy parameter with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyParam {
    DollarPriceCeiling(Amount),
    TriggerRebasePriceCeiling(Amount),
    TriggerRebaseNumEpochFloor(u64),
    ExpansionIndex(u32),
    ContractionIndex(u32),
    BondRepayPercent(u32),
    MaxSupplyContractionPercent(u32),
    MaxDebtRatioPercent(u32),
    SharesMintedPerEpoch(Amount),
}
