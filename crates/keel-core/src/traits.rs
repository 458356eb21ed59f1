// crates/keel-core/src/traits.rs

use crate::amount::Amount;
use crate::error::KeelError;

/// Source of the dollar price consulted by the treasury.
///
/// Prices are 18-decimal fixed point (1.0 == `ONE`). A sample may be stale
/// but is trusted as-is. Oracles are shared with the task that feeds them,
/// hence `Send + Sync`.
pub trait PriceOracle: Send + Sync {
    /// Current dollar price sample.
    fn price(&self) -> Result<Amount, KeelError>;
}

impl<T: PriceOracle + ?Sized> PriceOracle for Box<T> {
    fn price(&self) -> Result<Amount, KeelError> {
        (**self).price()
    }
}
