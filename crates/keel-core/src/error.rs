// crates/keel-core/src/error.rs

use thiserror::Error;

/// Protocol-wide error types for the Keel protocol.
///
/// Every operation on the ledgers, the bond pool and the treasury either
/// completes or returns one of these without leaving a partial mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeelError {
    /// Caller lacks the role or capability the operation requires.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid state transition (double exclusion, revoke of an absent
    /// exclusion, empty pool, bad parameter).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Account balance is below the requested amount.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Spender allowance is below the requested amount.
    #[error("Insufficient allowance: {0}")]
    InsufficientAllowance(String),

    /// Oracle price does not permit the bond operation.
    #[error("DollarPrice not eligible: {0}")]
    PriceNotEligible(String),

    /// Bond purchase would exceed this epoch's contraction budget.
    #[error("Not enough bond left to purchase this epoch: {0}")]
    EpochCapExceeded(String),

    /// Bond purchase would push outstanding bonds over the max debt ratio.
    #[error("over max debt ratio: {0}")]
    DebtRatioExceeded(String),

    /// Treasury holds no dollars saved for bond redemption.
    #[error("Treasury hasn't saved any dollar")]
    NoReserve,

    /// Redemption exceeds the saved reserve or the treasury's dollar holding.
    #[error("Treasury has no more budget: {0}")]
    BudgetExceeded(String),

    /// Rebase would drive the rebasing supply to zero or below.
    #[error("Invalid rebase delta: {0}")]
    InvalidDelta(String),

    /// `allocate_seigniorage` called before the next epoch point.
    #[error("Epoch not ready: next epoch opens at {next_epoch_point}, now is {now}")]
    EpochNotReady { now: u64, next_epoch_point: u64 },

    /// Fixed-point arithmetic overflowed.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Unknown token, strategy or account entry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for KeelError {
    fn from(e: serde_json::Error) -> Self {
        KeelError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for KeelError {
    fn from(e: std::io::Error) -> Self {
        KeelError::Config(e.to_string())
    }
}
