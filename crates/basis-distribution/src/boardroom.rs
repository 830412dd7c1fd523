// crates/basis-distribution/src/boardroom.rs
//
// Boardroom: pull-based distributor of seigniorage to stakers.
//
// Every allocation appends a snapshot to an append-only arena holding the
// cumulative reward per staked unit. A staker's seat remembers the index of
// the last snapshot it was settled against, so the reward owed since then is
//
//   balance * (latest_reward_per_share - seat_reward_per_share) / UNIT
//
// and settling is O(1) regardless of how many allocations happened. Snapshot
// 0 is a genesis entry with zero reward, so every index is always valid.
//
// Stakers are subject to two lockups counted in Boardroom epochs: one before
// stake may be withdrawn and one before rewards may be claimed. Both timers
// restart on every stake.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use basis_core::{
    format_units, Address, BasisError, CallContext, SafeMath, SeigniorageDistributor, TokenBank,
    U256, UNIT,
};

/// Upper bound for either lockup, in Boardroom epochs.
pub const MAX_LOCKUP_EPOCHS: u64 = 56;

/// Default withdraw lockup in epochs.
pub const DEFAULT_WITHDRAW_LOCKUP_EPOCHS: u64 = 6;

/// Default reward lockup in epochs.
pub const DEFAULT_REWARD_LOCKUP_EPOCHS: u64 = 3;

/// One entry of the snapshot arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Block in which the allocation happened.
    pub block_number: u64,
    /// Cash allocated by this snapshot.
    pub reward_received: U256,
    /// Cumulative reward per staked unit, scaled by 10^18.
    pub reward_per_share: U256,
}

/// Per-staker position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boardseat {
    pub balance: U256,
    /// Snapshot the seat was last settled against.
    pub last_snapshot_index: usize,
    /// Settled but unclaimed reward.
    pub reward_earned: U256,
    /// Boardroom epoch of the most recent stake.
    pub epoch_timer_start: u64,
}

/// The Boardroom's own epoch clock, used only for lockups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    pub aligned_timestamp: u64,
    pub period: u64,
}

impl EpochClock {
    /// Epoch index at `now`; zero before the aligned timestamp.
    pub fn current_epoch(&self, now: u64) -> u64 {
        now.saturating_sub(self.aligned_timestamp) / self.period
    }
}

/// Snapshot-based seigniorage distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boardroom {
    address: Address,
    operator: Address,
    /// Asset users stake (share or the LP token).
    stake_asset: Address,
    /// Asset paid out (cash).
    reward_asset: Address,
    total_supply: U256,
    seats: BTreeMap<Address, Boardseat>,
    history: Vec<BoardSnapshot>,
    withdraw_lockup_epochs: u64,
    reward_lockup_epochs: u64,
    clock: EpochClock,
}

impl Boardroom {
    /// Create a Boardroom with the genesis snapshot at `genesis_block`.
    ///
    /// # Errors
    /// Returns `BasisError::Config` for a zero epoch period or lockups that
    /// violate `reward <= withdraw <= MAX_LOCKUP_EPOCHS`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        operator: Address,
        stake_asset: Address,
        reward_asset: Address,
        genesis_block: u64,
        clock: EpochClock,
        withdraw_lockup_epochs: u64,
        reward_lockup_epochs: u64,
    ) -> Result<Self, BasisError> {
        validate_clock(&clock)?;
        validate_lockups(withdraw_lockup_epochs, reward_lockup_epochs)?;
        Ok(Self {
            address,
            operator,
            stake_asset,
            reward_asset,
            total_supply: U256::zero(),
            seats: BTreeMap::new(),
            history: vec![BoardSnapshot {
                block_number: genesis_block,
                reward_received: U256::zero(),
                reward_per_share: U256::zero(),
            }],
            withdraw_lockup_epochs,
            reward_lockup_epochs,
            clock,
        })
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn stake_asset(&self) -> Address {
        self.stake_asset
    }

    pub fn reward_asset(&self) -> Address {
        self.reward_asset
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, staker: &Address) -> U256 {
        self.seats.get(staker).map(|s| s.balance).unwrap_or_default()
    }

    pub fn seat(&self, staker: &Address) -> Option<&Boardseat> {
        self.seats.get(staker)
    }

    pub fn history(&self) -> &[BoardSnapshot] {
        &self.history
    }

    pub fn latest_snapshot_index(&self) -> usize {
        self.history.len() - 1
    }

    pub fn latest_snapshot(&self) -> &BoardSnapshot {
        &self.history[self.latest_snapshot_index()]
    }

    /// Cumulative reward per share at the latest snapshot.
    pub fn reward_per_share(&self) -> U256 {
        self.latest_snapshot().reward_per_share
    }

    pub fn clock(&self) -> EpochClock {
        self.clock
    }

    pub fn current_epoch(&self, now: u64) -> u64 {
        self.clock.current_epoch(now)
    }

    pub fn withdraw_lockup_epochs(&self) -> u64 {
        self.withdraw_lockup_epochs
    }

    pub fn reward_lockup_epochs(&self) -> u64 {
        self.reward_lockup_epochs
    }

    /// Reward owed to `staker`, settled or not.
    pub fn earned(&self, staker: &Address) -> Result<U256, BasisError> {
        let Some(seat) = self.seats.get(staker) else {
            return Ok(U256::zero());
        };
        let latest = self.reward_per_share();
        let stored = self.history[seat.last_snapshot_index].reward_per_share;
        seat.balance
            .safe_mul(latest.safe_sub(stored)?)?
            .safe_div(UNIT)?
            .safe_add(seat.reward_earned)
    }

    pub fn can_withdraw(&self, staker: &Address, now: u64) -> bool {
        self.lockup_elapsed(staker, self.withdraw_lockup_epochs, now)
    }

    pub fn can_claim_reward(&self, staker: &Address, now: u64) -> bool {
        self.lockup_elapsed(staker, self.reward_lockup_epochs, now)
    }

    fn lockup_elapsed(&self, staker: &Address, lockup: u64, now: u64) -> bool {
        match self.seats.get(staker) {
            Some(seat) => seat.epoch_timer_start.saturating_add(lockup) <= self.current_epoch(now),
            None => true,
        }
    }

    // -----------------------------------------------------------------
    // Staker entry points
    // -----------------------------------------------------------------

    /// Stake `amount` of the stake asset, pulled from the caller.
    ///
    /// The caller must have approved the Boardroom for `amount`.
    pub fn stake(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError> {
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot stake 0".to_string()));
        }
        let staker = ctx.caller;
        self.update_reward(&staker)?;

        bank.transfer_from(
            &ctx.forward(self.address),
            &self.stake_asset,
            staker,
            self.address,
            amount,
        )?;

        let epoch = self.current_epoch(ctx.timestamp);
        let latest = self.latest_snapshot_index();
        self.total_supply = self.total_supply.safe_add(amount)?;
        let seat = self.seats.entry(staker).or_insert_with(|| Boardseat {
            last_snapshot_index: latest,
            ..Boardseat::default()
        });
        seat.balance = seat.balance.safe_add(amount)?;
        seat.epoch_timer_start = epoch;

        tracing::debug!(staker = %staker, amount = %format_units(amount), epoch, "Boardroom stake");
        Ok(())
    }

    /// Withdraw `amount` of stake once the withdraw lockup has elapsed.
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError> {
        let staker = ctx.caller;
        let balance = match self.seats.get(&staker) {
            Some(seat) if !seat.balance.is_zero() => seat.balance,
            _ => {
                return Err(BasisError::NotFound(format!(
                    "{} has no stake in the Boardroom",
                    staker
                )))
            }
        };
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot withdraw 0".to_string()));
        }
        if !self.can_withdraw(&staker, ctx.timestamp) {
            return Err(BasisError::Lockup(format!(
                "{} is still within the {}-epoch withdraw lockup",
                staker, self.withdraw_lockup_epochs
            )));
        }
        if amount > balance {
            return Err(BasisError::InsufficientBalance(format!(
                "{} staked {} but tried to withdraw {}",
                staker,
                format_units(balance),
                format_units(amount)
            )));
        }
        self.update_reward(&staker)?;

        self.total_supply = self.total_supply.safe_sub(amount)?;
        if let Some(seat) = self.seats.get_mut(&staker) {
            seat.balance = seat.balance.safe_sub(amount)?;
        }
        bank.transfer(&ctx.forward(self.address), &self.stake_asset, staker, amount)?;

        tracing::debug!(staker = %staker, amount = %format_units(amount), "Boardroom withdraw");
        Ok(())
    }

    /// Pay out the caller's settled reward if the reward lockup has elapsed.
    ///
    /// Returns the amount paid, zero when nothing was due or the reward is
    /// still locked.
    pub fn claim_reward(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
    ) -> Result<U256, BasisError> {
        let staker = ctx.caller;
        self.update_reward(&staker)?;

        let unlocked = self.can_claim_reward(&staker, ctx.timestamp);
        let Some(seat) = self.seats.get_mut(&staker) else {
            return Ok(U256::zero());
        };
        let reward = seat.reward_earned;
        if reward.is_zero() || !unlocked {
            return Ok(U256::zero());
        }
        seat.reward_earned = U256::zero();
        bank.transfer(&ctx.forward(self.address), &self.reward_asset, staker, reward)?;

        tracing::debug!(staker = %staker, reward = %format_units(reward), "Boardroom reward paid");
        Ok(reward)
    }

    /// Withdraw the whole stake and claim the reward.
    pub fn exit(&mut self, ctx: &CallContext, bank: &mut TokenBank) -> Result<U256, BasisError> {
        let balance = self.balance_of(&ctx.caller);
        self.withdraw(ctx, bank, balance)?;
        self.claim_reward(ctx, bank)
    }

    /// Settle the seat against the latest snapshot. No-op without a seat.
    fn update_reward(&mut self, staker: &Address) -> Result<(), BasisError> {
        let earned = self.earned(staker)?;
        let latest = self.latest_snapshot_index();
        let Some(seat) = self.seats.get_mut(staker) else {
            return Ok(());
        };
        seat.reward_earned = earned;
        seat.last_snapshot_index = latest;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Operator entry points
    // -----------------------------------------------------------------

    /// Pull `amount` cash from the caller and append a snapshot crediting it
    /// to current stakers.
    pub fn allocate_seigniorage(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError> {
        self.require_operator(&ctx.caller)?;
        if amount.is_zero() {
            return Ok(());
        }
        if self.total_supply.is_zero() {
            return Err(BasisError::InvalidState(
                "Cannot allocate when the Boardroom has no stake".to_string(),
            ));
        }

        let prev = self.reward_per_share();
        let next = prev.safe_add(amount.mul_div(UNIT, self.total_supply)?)?;

        bank.transfer_from(
            &ctx.forward(self.address),
            &self.reward_asset,
            ctx.caller,
            self.address,
            amount,
        )?;
        self.history.push(BoardSnapshot {
            block_number: ctx.block_number,
            reward_received: amount,
            reward_per_share: next,
        });

        tracing::info!(
            boardroom = %self.address,
            amount = %format_units(amount),
            snapshot = self.latest_snapshot_index(),
            "Boardroom received seigniorage"
        );
        Ok(())
    }

    /// Set both lockups. Requires `reward <= withdraw <= MAX_LOCKUP_EPOCHS`.
    pub fn set_lockup(
        &mut self,
        ctx: &CallContext,
        withdraw_lockup_epochs: u64,
        reward_lockup_epochs: u64,
    ) -> Result<(), BasisError> {
        self.require_operator(&ctx.caller)?;
        validate_lockups(withdraw_lockup_epochs, reward_lockup_epochs)?;
        self.withdraw_lockup_epochs = withdraw_lockup_epochs;
        self.reward_lockup_epochs = reward_lockup_epochs;
        Ok(())
    }

    pub fn set_epoch_clock(&mut self, ctx: &CallContext, clock: EpochClock) -> Result<(), BasisError> {
        self.require_operator(&ctx.caller)?;
        validate_clock(&clock)?;
        self.clock = clock;
        Ok(())
    }

    pub fn transfer_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<(), BasisError> {
        self.require_operator(&ctx.caller)?;
        tracing::info!(boardroom = %self.address, from = %self.operator, to = %new_operator, "Boardroom operator transferred");
        self.operator = new_operator;
        Ok(())
    }

    fn require_operator(&self, caller: &Address) -> Result<(), BasisError> {
        if *caller != self.operator {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the operator of Boardroom {}",
                caller, self.address
            )));
        }
        Ok(())
    }
}

fn validate_lockups(withdraw: u64, reward: u64) -> Result<(), BasisError> {
    if withdraw < reward || withdraw > MAX_LOCKUP_EPOCHS {
        return Err(BasisError::Config(format!(
            "lockups must satisfy reward ({}) <= withdraw ({}) <= {}",
            reward, withdraw, MAX_LOCKUP_EPOCHS
        )));
    }
    Ok(())
}

fn validate_clock(clock: &EpochClock) -> Result<(), BasisError> {
    if clock.period == 0 {
        return Err(BasisError::Config("Boardroom epoch period must be non-zero".to_string()));
    }
    Ok(())
}

impl SeigniorageDistributor for Boardroom {
    fn address(&self) -> Address {
        self.address
    }

    fn operator(&self) -> Address {
        self.operator
    }

    fn allocate_seigniorage(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError> {
        Boardroom::allocate_seigniorage(self, ctx, bank, amount)
    }

    fn transfer_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<(), BasisError> {
        Boardroom::transfer_operator(self, ctx, new_operator)
    }
}
