// crates/basis-core/src/traits.rs
//
// Collaborator interfaces the Treasury calls into.
//
// The Treasury only ever sees these traits: the TWAP oracle, the Boardroom
// and Reward Pool distributors, and the development fund are wired in by the
// `Protocol` aggregate in basis-treasury.

use crate::error::BasisError;
use crate::identity::{Address, CallContext};
use crate::math::U256;
use crate::token::TokenBank;

/// Price source consulted once per epoch.
///
/// Implemented by basis-oracle.
pub trait PriceOracle {
    /// Amount of the counter asset received for `amount_in` of `token` at the
    /// committed average price. Zero before the first successful update.
    fn consult(&self, token: &Address, amount_in: U256) -> Result<U256, BasisError>;

    /// Commit a new average price if the oracle's epoch allows it.
    ///
    /// Callers in the Treasury wrap this in `BestEffort` so a misbehaving price
    /// source cannot freeze monetary policy.
    fn update(&mut self, ctx: &CallContext) -> Result<(), BasisError>;
}

/// Receiver of freshly minted seigniorage (the Boardroom).
///
/// Implemented by basis-distribution.
pub trait SeigniorageDistributor {
    /// Address the distributor holds its reserve under.
    fn address(&self) -> Address;

    /// Address allowed to call `allocate_seigniorage`.
    fn operator(&self) -> Address;

    /// Pull `amount` cash from `ctx.caller` and credit it to stakers.
    ///
    /// A zero amount is a no-op; a positive amount with nothing staked fails.
    fn allocate_seigniorage(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError>;

    /// Hand the operator role to `new_operator`. Current operator only.
    fn transfer_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<(), BasisError>;
}

/// Continuous-rate pool topped up by the Treasury (the bond Reward Pool).
///
/// Implemented by basis-distribution.
pub trait RewardNotifier {
    /// Address the pool holds its reserve under.
    fn address(&self) -> Address;

    /// Address allowed to call `notify_reward_amount`.
    fn reward_distribution(&self) -> Address;

    /// Start or extend a reward period funded with `reward`.
    ///
    /// The reward must already sit at the pool's address. Zero is a no-op.
    fn notify_reward_amount(&mut self, ctx: &CallContext, reward: U256) -> Result<(), BasisError>;

    /// Hand the reward distribution role to a successor. Callable only by the
    /// current reward distribution.
    fn transfer_reward_distribution(
        &mut self,
        ctx: &CallContext,
        successor: Address,
    ) -> Result<(), BasisError>;
}

/// Development fund receiving its share of seigniorage.
///
/// Implemented by basis-treasury's `SimpleFund`. Failures propagate.
pub trait FundSink {
    /// Address the fund holds its assets under.
    fn address(&self) -> Address;

    /// Pull `amount` of `asset` from `ctx.caller`, recording `memo`.
    fn deposit(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        asset: &Address,
        amount: U256,
        memo: &str,
    ) -> Result<(), BasisError>;
}
