// crates/keel-ledger/src/lib.rs
//
// keel-ledger: the fungible ledgers the Keel protocol drives.
//
// - `ElasticLedger`: the pegged dollar. Its rebasing supply can be rescaled
//   up or down; excluded accounts hold pinned absolute balances.
// - `Token`: a plain fungible ledger, used for the bond token and for the
//   reward tokens paid out by yield strategies.
// - `ShareToken`: the governance share, minted under per-minter caps.
//
// All amounts are 18-decimal fixed point (see `keel_core::amount`).

pub mod allowance;
pub mod elastic;
pub mod share;
pub mod token;

pub use allowance::Allowances;
pub use elastic::{ElasticLedger, Holding, SHARES_PER_UNIT};
pub use share::{MinterQuota, ShareToken};
pub use token::{Token, TokenRegistry};
