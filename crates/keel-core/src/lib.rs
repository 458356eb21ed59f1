// crates/keel-core/src/lib.rs
//
// keel-core: Core types, fixed-point math, roles and error kinds for the
// Keel elastic-supply protocol.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the canonical amount representation, account identifiers,
// the protocol-wide error type and the price oracle seam used by the
// treasury.

pub mod account;
pub mod amount;
pub mod error;
pub mod roles;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
pub use account::AccountId;
pub use amount::{
    bps_of, format_amount, mul_div, mul_div_up, parse_amount, to_amount, tokens, Amount,
    BPS_DENOMINATOR, DECIMALS, ONE, U256,
};
pub use error::KeelError;
pub use roles::{Role, RoleSet};
pub use traits::PriceOracle;
