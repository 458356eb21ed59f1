// crates/keel-treasury/src/lib.rs
//
// keel-treasury: the monetary-policy state machine.
//
// Once per epoch the treasury samples the dollar price and either expands
// (mints dollars, funds the bond reserve and the bond pool, pays
// boardrooms), holds at peg, or contracts (rebases the dollar supply down).
// Between epochs it sells bonds under peg and redeems them over the ceiling.
// `Protocol` wires the ledgers, the bond pool and the treasury together.

pub mod boardroom;
pub mod config;
pub mod epoch;
pub mod oracle;
pub mod policy;
pub mod protocol;
pub mod report;
pub mod treasury;

pub use boardroom::{BoardroomAllocation, BoardroomEntry};
pub use config::{ProtocolConfig, StrategyConfig};
pub use epoch::EpochClock;
pub use oracle::FixedPriceOracle;
pub use policy::{PolicyConfig, PolicyParam};
pub use protocol::{Protocol, ProtocolSummary, GOVERNANCE_ACCOUNT, POOL_ACCOUNT, TREASURY_ACCOUNT};
pub use report::{EpochReport, Payout, Phase};
pub use treasury::{Treasury, TreasuryLedgers};
