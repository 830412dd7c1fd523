// crates/basis-oracle/src/lib.rs
//
// basis-oracle: the Treasury's price source.
//
// A constant-product pair accumulates prices over time; the TWAP oracle
// commits a new time-weighted average once per epoch and answers `consult`
// queries from it. Prices use the UQ112x112 binary fixed-point format.

pub mod fixed_point;
pub mod oracle;
pub mod pair;

pub use fixed_point::{Uq112x112, Uq144x112};
pub use oracle::{PairOracle, TwapOracle, UpdateOutcome};
pub use pair::{current_cumulative_prices, ConstantProductPair, PairSource};
