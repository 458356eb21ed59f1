// crates/keel-vault/src/lib.rs
//
// keel-vault: the pooled bond-and-yield vault.
//
// Depositors pool bond tokens and receive pool shares. Part of the pooled
// bonds can be routed to external yield strategies whose harvested rewards
// are credited to depositors pro rata. When the treasury pays seigniorage to
// the pool it redeems pooled bonds 1:1 for dollars: every depositor's bond
// claim shrinks proportionally and the same value becomes a claimable dollar
// reward.

pub mod pool;
pub mod strategy;

pub use pool::{BondPool, PoolAssets, WithdrawReceipt};
pub use strategy::{FixedRewardStrategy, StrategyInfo, YieldStrategy};
