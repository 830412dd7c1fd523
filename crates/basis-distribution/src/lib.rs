// crates/basis-distribution/src/lib.rs
//
// basis-distribution: Reward-accounting engines for the Basis Protocol.
//
// - `boardroom`: snapshot-based proportional distributor of seigniorage
//   with epoch lockups.
// - `reward_pool`: continuous-rate staking pool fed by reward notifications.
//
// Both hold their stake and reward reserves at their own address in the
// shared `TokenBank` and pull incoming tokens with allowances.

pub mod boardroom;
pub mod reward_pool;

pub use boardroom::{BoardSnapshot, Boardroom, Boardseat, EpochClock, MAX_LOCKUP_EPOCHS};
pub use reward_pool::{PoolAccount, RewardPool};
