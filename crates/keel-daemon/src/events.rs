// crates/keel-daemon/src/events.rs
//
// Events broadcast from the epoch scheduler to the reporting task.

use keel_treasury::{EpochReport, ProtocolSummary};

#[derive(Debug, Clone)]
pub enum EpochEvent {
    /// An epoch closed.
    Allocated(EpochReport),
    /// The treasury rejected the allocation; the epoch stays open and is
    /// retried on the next tick.
    Rejected {
        epoch: u64,
        reason: String,
    },
    /// The scheduler stopped.
    Finished(ProtocolSummary),
}
