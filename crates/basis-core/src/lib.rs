// crates/basis-core/src/lib.rs
//
// basis-core: Core types, fixed-point math, and collaborator traits for the
// Basis Protocol.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines addresses and call contexts, the protocol error type, the
// 10^18 fixed-point helpers, the epoch scheduler, the in-memory token bank,
// and the trait seams between the Treasury and its collaborators.

pub mod epoch;
pub mod error;
pub mod identity;
pub mod math;
pub mod token;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use basis_core::{Address, BasisError, U256};`

pub use epoch::Epoch;
pub use error::{BasisError, BestEffort};
pub use identity::{Address, CallContext};
pub use math::{format_units, parse_units, units, SafeMath, U256, UNIT};
pub use token::TokenBank;
pub use traits::{FundSink, PriceOracle, RewardNotifier, SeigniorageDistributor};
