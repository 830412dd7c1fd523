// crates/basis-distribution/src/reward_pool.rs
//
// Continuous-rate staking pool.
//
// A reward notified to the pool is streamed linearly over `duration` seconds.
// The pool keeps a global accumulator of reward per staked unit
//
//   reward_per_token = stored + (applicable - last_update) * rate * UNIT / total_supply
//
// and per-account checkpoints of that accumulator, so every account accrues
// in proportion to its balance and the time it was staked. A new reward
// notified mid-period folds the unstreamed remainder into the new rate.
//
// Rates round down, so the sum of all payouts never exceeds the sum of all
// notified rewards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use basis_core::{
    format_units, Address, BasisError, CallContext, RewardNotifier, SafeMath, TokenBank, U256,
    UNIT,
};

/// Default reward streaming duration: 30 days.
pub const DEFAULT_DURATION: u64 = 30 * 86_400;

/// Per-account position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAccount {
    pub balance: U256,
    /// Accumulator value the account was last settled against.
    pub reward_per_token_paid: U256,
    /// Settled but unpaid reward.
    pub rewards: U256,
}

/// Synthetix-style continuous-rate reward pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardPool {
    address: Address,
    operator: Address,
    reward_distribution: Address,
    stake_asset: Address,
    reward_asset: Address,
    duration: u64,
    start_time: u64,
    period_finish: u64,
    reward_rate: U256,
    last_update_time: u64,
    reward_per_token_stored: U256,
    total_supply: U256,
    accounts: BTreeMap<Address, PoolAccount>,
    total_notified: U256,
    total_paid: U256,
}

impl RewardPool {
    /// Create an empty pool that accepts stakes from `start_time`.
    ///
    /// # Errors
    /// Returns `BasisError::Config` for a zero duration.
    pub fn new(
        address: Address,
        operator: Address,
        reward_distribution: Address,
        stake_asset: Address,
        reward_asset: Address,
        duration: u64,
        start_time: u64,
    ) -> Result<Self, BasisError> {
        if duration == 0 {
            return Err(BasisError::Config("Reward pool duration must be non-zero".to_string()));
        }
        Ok(Self {
            address,
            operator,
            reward_distribution,
            stake_asset,
            reward_asset,
            duration,
            start_time,
            period_finish: 0,
            reward_rate: U256::zero(),
            last_update_time: 0,
            reward_per_token_stored: U256::zero(),
            total_supply: U256::zero(),
            accounts: BTreeMap::new(),
            total_notified: U256::zero(),
            total_paid: U256::zero(),
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

    pub fn reward_distribution(&self) -> Address {
        self.reward_distribution
    }

    pub fn stake_asset(&self) -> Address {
        self.stake_asset
    }

    pub fn reward_asset(&self) -> Address {
        self.reward_asset
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn period_finish(&self) -> u64 {
        self.period_finish
    }

    pub fn reward_rate(&self) -> U256 {
        self.reward_rate
    }

    pub fn last_update_time(&self) -> u64 {
        self.last_update_time
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.accounts.get(account).map(|a| a.balance).unwrap_or_default()
    }

    /// Sum of all rewards ever notified.
    pub fn total_notified(&self) -> U256 {
        self.total_notified
    }

    /// Sum of all rewards ever paid out.
    pub fn total_paid(&self) -> U256 {
        self.total_paid
    }

    pub fn last_time_reward_applicable(&self, now: u64) -> u64 {
        now.min(self.period_finish)
    }

    pub fn reward_per_token(&self, now: u64) -> Result<U256, BasisError> {
        let applicable = self.last_time_reward_applicable(now);
        // `last_update_time` sits in the future after a notify before start.
        if self.total_supply.is_zero() || applicable <= self.last_update_time {
            return Ok(self.reward_per_token_stored);
        }
        let elapsed = U256::from(applicable - self.last_update_time);
        self.reward_per_token_stored.safe_add(
            elapsed
                .safe_mul(self.reward_rate)?
                .safe_mul(UNIT)?
                .safe_div(self.total_supply)?,
        )
    }

    pub fn earned(&self, account: &Address, now: u64) -> Result<U256, BasisError> {
        let Some(acct) = self.accounts.get(account) else {
            return Ok(U256::zero());
        };
        acct.balance
            .safe_mul(self.reward_per_token(now)?.safe_sub(acct.reward_per_token_paid)?)?
            .safe_div(UNIT)?
            .safe_add(acct.rewards)
    }

    // -----------------------------------------------------------------
    // Staker entry points
    // -----------------------------------------------------------------

    /// Stake `amount`, pulled from the caller (requires an allowance).
    pub fn stake(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError> {
        self.check_start(ctx.timestamp)?;
        self.update_reward(Some(ctx.caller), ctx.timestamp)?;
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot stake 0".to_string()));
        }
        bank.transfer_from(
            &ctx.forward(self.address),
            &self.stake_asset,
            ctx.caller,
            self.address,
            amount,
        )?;
        self.total_supply = self.total_supply.safe_add(amount)?;
        let acct = self.accounts.entry(ctx.caller).or_default();
        acct.balance = acct.balance.safe_add(amount)?;

        tracing::debug!(account = %ctx.caller, amount = %format_units(amount), "Reward pool stake");
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), BasisError> {
        self.check_start(ctx.timestamp)?;
        self.update_reward(Some(ctx.caller), ctx.timestamp)?;
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot withdraw 0".to_string()));
        }
        let balance = self.balance_of(&ctx.caller);
        if amount > balance {
            return Err(BasisError::InsufficientBalance(format!(
                "{} staked {} but tried to withdraw {}",
                ctx.caller,
                format_units(balance),
                format_units(amount)
            )));
        }
        self.total_supply = self.total_supply.safe_sub(amount)?;
        if let Some(acct) = self.accounts.get_mut(&ctx.caller) {
            acct.balance = acct.balance.safe_sub(amount)?;
        }
        bank.transfer(&ctx.forward(self.address), &self.stake_asset, ctx.caller, amount)?;

        tracing::debug!(account = %ctx.caller, amount = %format_units(amount), "Reward pool withdraw");
        Ok(())
    }

    /// Pay the caller everything accrued so far. Returns the amount paid.
    pub fn get_reward(&mut self, ctx: &CallContext, bank: &mut TokenBank) -> Result<U256, BasisError> {
        self.check_start(ctx.timestamp)?;
        self.update_reward(Some(ctx.caller), ctx.timestamp)?;
        let Some(acct) = self.accounts.get_mut(&ctx.caller) else {
            return Ok(U256::zero());
        };
        let reward = acct.rewards;
        if reward.is_zero() {
            return Ok(reward);
        }
        acct.rewards = U256::zero();
        self.total_paid = self.total_paid.safe_add(reward)?;
        bank.transfer(&ctx.forward(self.address), &self.reward_asset, ctx.caller, reward)?;

        tracing::debug!(account = %ctx.caller, reward = %format_units(reward), "Reward pool reward paid");
        Ok(reward)
    }

    /// Withdraw everything and collect the reward.
    pub fn exit(&mut self, ctx: &CallContext, bank: &mut TokenBank) -> Result<U256, BasisError> {
        let balance = self.balance_of(&ctx.caller);
        self.withdraw(ctx, bank, balance)?;
        self.get_reward(ctx, bank)
    }

    fn check_start(&self, now: u64) -> Result<(), BasisError> {
        if now < self.start_time {
            return Err(BasisError::NotStarted(format!(
                "reward pool opens at {}, now {}",
                self.start_time, now
            )));
        }
        Ok(())
    }

    fn update_reward(&mut self, account: Option<Address>, now: u64) -> Result<(), BasisError> {
        self.reward_per_token_stored = self.reward_per_token(now)?;
        self.last_update_time = self
            .last_update_time
            .max(self.last_time_reward_applicable(now));
        if let Some(account) = account {
            let earned = self.earned(&account, now)?;
            let acct = self.accounts.entry(account).or_default();
            acct.rewards = earned;
            acct.reward_per_token_paid = self.reward_per_token_stored;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Distributor / operator entry points
    // -----------------------------------------------------------------

    /// Start or extend a reward period funded with `reward`.
    ///
    /// The reward tokens must already sit at the pool's address.
    pub fn notify_reward_amount(&mut self, ctx: &CallContext, reward: U256) -> Result<(), BasisError> {
        if ctx.caller != self.reward_distribution {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the reward distribution of pool {}",
                ctx.caller, self.address
            )));
        }
        if reward.is_zero() {
            return Ok(());
        }
        let now = ctx.timestamp;
        self.update_reward(None, now)?;

        let duration = U256::from(self.duration);
        if now > self.start_time {
            self.reward_rate = if now >= self.period_finish {
                reward.safe_div(duration)?
            } else {
                let remaining = U256::from(self.period_finish - now);
                let leftover = remaining.safe_mul(self.reward_rate)?;
                reward.safe_add(leftover)?.safe_div(duration)?
            };
            self.last_update_time = now;
            self.period_finish = now.saturating_add(self.duration);
        } else {
            self.reward_rate = reward.safe_div(duration)?;
            self.last_update_time = self.start_time;
            self.period_finish = self.start_time.saturating_add(self.duration);
        }
        self.total_notified = self.total_notified.safe_add(reward)?;

        tracing::info!(
            pool = %self.address,
            reward = %format_units(reward),
            rate = %self.reward_rate,
            period_finish = self.period_finish,
            "Reward added"
        );
        Ok(())
    }

    pub fn set_reward_distribution(&mut self, ctx: &CallContext, distribution: Address) -> Result<(), BasisError> {
        self.require_operator(&ctx.caller)?;
        tracing::info!(pool = %self.address, from = %self.reward_distribution, to = %distribution, "Reward distribution changed");
        self.reward_distribution = distribution;
        Ok(())
    }

    pub fn transfer_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<(), BasisError> {
        self.require_operator(&ctx.caller)?;
        self.operator = new_operator;
        Ok(())
    }

    fn require_operator(&self, caller: &Address) -> Result<(), BasisError> {
        if *caller != self.operator {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the operator of pool {}",
                caller, self.address
            )));
        }
        Ok(())
    }
}

impl RewardNotifier for RewardPool {
    fn address(&self) -> Address {
        self.address
    }

    fn reward_distribution(&self) -> Address {
        self.reward_distribution
    }

    fn notify_reward_amount(&mut self, ctx: &CallContext, reward: U256) -> Result<(), BasisError> {
        RewardPool::notify_reward_amount(self, ctx, reward)
    }

    fn transfer_reward_distribution(
        &mut self,
        ctx: &CallContext,
        successor: Address,
    ) -> Result<(), BasisError> {
        if ctx.caller != self.reward_distribution {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the reward distribution of pool {}",
                ctx.caller, self.address
            )));
        }
        tracing::info!(pool = %self.address, from = %self.reward_distribution, to = %successor, "Reward distribution handed over");
        self.reward_distribution = successor;
        Ok(())
    }
}
