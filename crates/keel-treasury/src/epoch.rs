// crates/keel-treasury/src/epoch.rs
//
// Epoch gating for seigniorage allocation.
//
// Epoch `n` opens at `start_time + n * period_secs`. The clock does not
// observe time itself; callers pass `now` (unix seconds) so tests and the
// daemon can drive it.

use serde::{Deserialize, Serialize};

use keel_core::KeelError;

/// Eight hours.
pub const DEFAULT_PERIOD_SECS: u64 = 8 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    /// Epochs completed so far.
    epoch: u64,
    start_time: u64,
    period_secs: u64,
}

impl EpochClock {
    pub fn new(start_time: u64, period_secs: u64) -> Self {
        Self {
            epoch: 0,
            start_time,
            period_secs: period_secs.max(1),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }

    /// Earliest time the next allocation may run.
    pub fn next_epoch_point(&self) -> u64 {
        self.start_time
            .saturating_add(self.epoch.saturating_mul(self.period_secs))
    }

    pub fn is_ready(&self, now: u64) -> bool {
        now >= self.next_epoch_point()
    }

    /// # Errors
    /// `EpochNotReady` before the next epoch point.
    pub fn check_ready(&self, now: u64) -> Result<(), KeelError> {
        if !self.is_ready(now) {
            return Err(KeelError::EpochNotReady {
                now,
                next_epoch_point: self.next_epoch_point(),
            });
        }
        Ok(())
    }

    /// Close the current epoch. Returns the epoch that was closed.
    pub fn advance(&mut self) -> u64 {
        let closed = self.epoch;
        self.epoch += 1;
        closed
    }
}
