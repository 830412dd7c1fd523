// crates/basis-treasury/src/lib.rs
//
// basis-treasury: the monetary controller and the protocol it drives.
//
// - `treasury`: bonds, debt, seigniorage allocation, migration.
// - `config`: policy parameters with serde defaults.
// - `guard`: one guarded call per actor per block.
// - `fund`: development fund receiving a cut of every expansion.
// - `events`: the Treasury's event log.
// - `protocol`: every component wired together behind a transactional
//   front door.

pub mod config;
pub mod events;
pub mod fund;
pub mod guard;
pub mod protocol;
pub mod treasury;

pub use config::TreasuryConfig;
pub use events::{EventRecord, TreasuryEvent};
pub use fund::{FundFlow, FundRecord, SimpleFund};
pub use guard::OneBlockGuard;
pub use protocol::{
    BoardroomKind, BoardroomSettings, GenesisAllocation, GenesisParams, Protocol, ProtocolAddresses,
    ProtocolConfig, ProtocolState, RewardPoolSettings,
};
pub use treasury::{
    AllocationReport, MigrationHandoff, Treasury, TreasuryAssets, TreasuryEnv, TreasuryState, FUND_MEMO,
};
