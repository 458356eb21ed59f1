// crates/keel-treasury/src/report.rs

use serde::{Deserialize, Serialize};

use keel_core::{AccountId, Amount};

/// Which branch of the epoch state machine ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Price above the dollar ceiling: supply expanded.
    Expand,
    /// Price between peg and the ceiling: only shares minted.
    HoldAtPeg,
    /// Price under peg: supply possibly rebased down.
    Contract,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Expand => write!(f, "expand"),
            Phase::HoldAtPeg => write!(f, "hold"),
            Phase::Contract => write!(f, "contract"),
        }
    }
}

/// One boardroom transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub account: AccountId,
    #[serde(with = "keel_core::amount::decimal")]
    pub amount: Amount,
}

/// Outcome of one `allocate_seigniorage` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochReport {
    /// The epoch that was closed.
    pub epoch: u64,
    #[serde(with = "keel_core::amount::decimal")]
    pub price: Amount,
    pub phase: Phase,
    /// Dollars printed on expansion.
    #[serde(with = "keel_core::amount::decimal")]
    pub minted: Amount,
    /// Added to the bond reserve, net of what was paid to the bond pool.
    #[serde(with = "keel_core::amount::decimal")]
    pub saved_for_bonds: Amount,
    /// Delivered to the bond pool against its bonds.
    #[serde(with = "keel_core::amount::decimal")]
    pub paid_to_pool: Amount,
    pub boardroom_dollars: Vec<Payout>,
    pub boardroom_shares: Vec<Payout>,
    /// Signed rebase applied to the dollar supply, zero if none.
    pub rebase_delta: i128,
    pub epochs_under_one: u64,
    #[serde(with = "keel_core::amount::decimal")]
    pub total_supply: Amount,
    #[serde(with = "keel_core::amount::decimal")]
    pub reserve: Amount,
}

impl EpochReport {
    pub fn new(epoch: u64, price: Amount, phase: Phase) -> Self {
        Self {
            epoch,
            price,
            phase,
            minted: 0,
            saved_for_bonds: 0,
            paid_to_pool: 0,
            boardroom_dollars: Vec::new(),
            boardroom_shares: Vec::new(),
            rebase_delta: 0,
            epochs_under_one: 0,
            total_supply: 0,
            reserve: 0,
        }
    }

    pub fn shares_minted(&self) -> Amount {
        self.boardroom_shares.iter().map(|p| p.amount).sum()
    }

    pub fn boardroom_dollar_total(&self) -> Amount {
        self.boardroom_dollars.iter().map(|p| p.amount).sum()
    }
}

pub(crate) fn payouts(split: Vec<(AccountId, Amount)>) -> Vec<Payout> {
    split
        .into_iter()
        .map(|(account, amount)| Payout { account, amount })
        .collect()
}
