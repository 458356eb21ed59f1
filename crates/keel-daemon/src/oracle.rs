// crates/keel-daemon/src/oracle.rs
//
// Simulated price feed. Plays any scripted prices first, then follows a
// seeded random walk. Each step is pushed into a `FixedPriceOracle` handle
// that the protocol reads from.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use keel_core::{format_amount, mul_div, parse_amount, Amount, BPS_DENOMINATOR, ONE};
use keel_treasury::FixedPriceOracle;

use crate::config::OracleConfig;
use crate::error::DaemonError;

/// The walk never drops below one cent.
const PRICE_FLOOR: Amount = ONE / 100;

pub struct SimulatedOracle {
    handle: FixedPriceOracle,
    price: Amount,
    volatility_bps: i64,
    drift_bps: i64,
    script: VecDeque<Amount>,
    rng: StdRng,
}

impl SimulatedOracle {
    pub fn from_config(config: &OracleConfig) -> Result<Self, DaemonError> {
        let script = config
            .prices
            .iter()
            .map(|p| parse_amount(p))
            .collect::<Result<VecDeque<_>, _>>()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let price = config.initial_price.max(PRICE_FLOOR);
        Ok(Self {
            handle: FixedPriceOracle::new(price),
            price,
            volatility_bps: i64::from(config.volatility_bps),
            drift_bps: i64::from(config.drift_bps),
            script,
            rng,
        })
    }

    /// Handle the protocol samples from.
    pub fn handle(&self) -> FixedPriceOracle {
        self.handle.clone()
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    /// Move to the next price and publish it.
    pub fn step(&mut self) -> Result<Amount, DaemonError> {
        let next = match self.script.pop_front() {
            Some(price) => price,
            None => self.walk()?,
        };
        self.price = next;
        self.handle.set_price(next)?;
        tracing::debug!("oracle: price {}", format_amount(next));
        Ok(next)
    }

    fn walk(&mut self) -> Result<Amount, DaemonError> {
        let noise = if self.volatility_bps > 0 {
            self.rng.gen_range(-self.volatility_bps..=self.volatility_bps)
        } else {
            0
        };
        let factor = (BPS_DENOMINATOR as i64 + noise + self.drift_bps).max(0) as u128;
        let next = mul_div(self.price, factor, BPS_DENOMINATOR)?;
        Ok(next.max(PRICE_FLOOR))
    }
}
