// crates/keel-daemon/src/scheduler.rs
//
// Epoch scheduler for the Keel daemon.
//
// Every tick moves the simulated oracle, runs `allocate_seigniorage` at the
// treasury's next epoch point (simulated time, so a tick stands for a full
// epoch period) and lets the holders react. Reports go out on a broadcast
// channel.

use std::time::Duration;

use tokio::sync::broadcast;

use keel_treasury::{Protocol, ProtocolSummary};

use crate::error::DaemonError;
use crate::events::EpochEvent;
use crate::holders::Holder;
use crate::oracle::SimulatedOracle;

pub struct EpochScheduler {
    protocol: Protocol,
    oracle: SimulatedOracle,
    holders: Vec<Holder>,
    tick: Duration,
    /// Epochs to run; zero runs until ctrl-c.
    epochs: u64,
    events: broadcast::Sender<EpochEvent>,
}

impl EpochScheduler {
    pub fn new(
        protocol: Protocol,
        oracle: SimulatedOracle,
        holders: Vec<Holder>,
        tick: Duration,
        epochs: u64,
        events: broadcast::Sender<EpochEvent>,
    ) -> Self {
        Self {
            protocol,
            oracle,
            holders,
            tick,
            epochs,
            events,
        }
    }

    #[cfg(test)]
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Run until the epoch target is reached or ctrl-c arrives. Returns the
    /// final protocol summary.
    pub async fn run(mut self) -> Result<ProtocolSummary, DaemonError> {
        tracing::info!(
            "Epoch scheduler started (epochs={}, tick={}ms)",
            self.epochs,
            self.tick.as_millis()
        );
        let mut interval = tokio::time::interval(self.tick);
        let mut closed = 0u64;

        while self.epochs == 0 || closed < self.epochs {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Epoch scheduler received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if self.step()? {
                        closed += 1;
                    }
                }
            }
        }

        let summary = self.protocol.summary();
        // No subscriber is not an error.
        let _ = self.events.send(EpochEvent::Finished(summary.clone()));
        Ok(summary)
    }

    /// Run one epoch. Returns whether the epoch closed.
    pub fn step(&mut self) -> Result<bool, DaemonError> {
        let price = self.oracle.step()?;
        let now = self.protocol.treasury.next_epoch_point();
        let epoch = self.protocol.treasury.epoch();

        let closed = match self.protocol.allocate_seigniorage(now) {
            Ok(report) => {
                let _ = self.events.send(EpochEvent::Allocated(report));
                true
            }
            Err(e) => {
                tracing::warn!("epoch {} allocation rejected: {}", epoch, e);
                let _ = self.events.send(EpochEvent::Rejected {
                    epoch,
                    reason: e.to_string(),
                });
                false
            }
        };

        for holder in &self.holders {
            holder.act(&mut self.protocol, price)?;
        }
        Ok(closed)
    }
}

/// Log every event until the scheduler finishes or the channel closes.
pub async fn report_events(mut rx: broadcast::Receiver<EpochEvent>) {
    loop {
        match rx.recv().await {
            Ok(EpochEvent::Allocated(report)) => {
                tracing::info!(
                    "=== EPOCH {} === {} at {} supply {} reserve {}",
                    report.epoch,
                    report.phase,
                    keel_core::format_amount(report.price),
                    keel_core::format_amount(report.total_supply),
                    keel_core::format_amount(report.reserve)
                );
            }
            Ok(EpochEvent::Rejected { epoch, reason }) => {
                tracing::warn!("epoch {} stays open: {}", epoch, reason);
            }
            Ok(EpochEvent::Finished(summary)) => {
                tracing::info!("scheduler finished at epoch {}", summary.epoch);
                break;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("report task lagged, {} events dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HolderConfig, OracleConfig};
    use keel_core::{tokens, ONE};
    use keel_treasury::{Phase, ProtocolConfig};

    fn scheduler(prices: &[&str], epochs: u64) -> (EpochScheduler, broadcast::Receiver<EpochEvent>) {
        let oracle = SimulatedOracle::from_config(&OracleConfig {
            seed: Some(11),
            prices: prices.iter().map(|p| p.to_string()).collect(),
            ..OracleConfig::default()
        })
        .unwrap();
        let mut protocol =
            Protocol::bootstrap(&ProtocolConfig::default(), Box::new(oracle.handle()), 1_000).unwrap();
        let holder = Holder::from_config(&HolderConfig {
            account: "alice".to_string(),
            dollars: tokens(100),
            bond_bps: 100,
            pool_deposit: false,
        });
        protocol.genesis_mint(holder.account(), tokens(100)).unwrap();
        let (tx, rx) = broadcast::channel(16);
        let scheduler = EpochScheduler::new(
            protocol,
            oracle,
            vec![holder],
            Duration::from_millis(100),
            epochs,
            tx,
        );
        (scheduler, rx)
    }

    #[test]
    fn test_step_closes_epoch_at_next_point() {
        let (mut s, mut rx) = scheduler(&["0.9"], 1);
        assert!(s.step().unwrap());
        assert_eq!(s.protocol().treasury.epoch(), 1);
        match rx.try_recv().unwrap() {
            EpochEvent::Allocated(report) => {
                assert_eq!(report.epoch, 0);
                assert_eq!(report.phase, Phase::Contract);
                assert_eq!(report.price, ONE * 9 / 10);
            }
            other => panic!("unexpected event {:?}", other),
        }
        // The holder bought 1% of its rebased balance.
        assert_eq!(s.protocol().bond.balance_of(&"alice".into()), ONE * 95 / 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_after_target() {
        let (s, mut rx) = scheduler(&["0.9", "1.0", "2.0"], 3);
        let summary = s.run().await.unwrap();
        assert_eq!(summary.epoch, 3);

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                EpochEvent::Allocated(report) => phases.push(report.phase),
                EpochEvent::Finished(done) => assert_eq!(done, summary),
                EpochEvent::Rejected { .. } => panic!("no epoch should be rejected"),
            }
        }
        assert_eq!(phases, vec![Phase::Contract, Phase::HoldAtPeg, Phase::Expand]);
    }
}
