// crates/keel-treasury/src/oracle.rs

use std::sync::{Arc, RwLock};

use keel_core::{Amount, KeelError, PriceOracle};

/// Oracle returning whatever price was last set.
///
/// Clones share the same price cell, so a test or the daemon can keep a
/// handle and move the price while the protocol owns another clone.
#[derive(Debug, Clone)]
pub struct FixedPriceOracle {
    price: Arc<RwLock<Amount>>,
}

impl FixedPriceOracle {
    pub fn new(price: Amount) -> Self {
        Self {
            price: Arc::new(RwLock::new(price)),
        }
    }

    pub fn set_price(&self, price: Amount) -> Result<(), KeelError> {
        let mut guard = self
            .price
            .write()
            .map_err(|_| KeelError::InvalidState("price cell poisoned".to_string()))?;
        *guard = price;
        Ok(())
    }
}

impl PriceOracle for FixedPriceOracle {
    fn price(&self) -> Result<Amount, KeelError> {
        self.price
            .read()
            .map(|guard| *guard)
            .map_err(|_| KeelError::InvalidState("price cell poisoned".to_string()))
    }
}
