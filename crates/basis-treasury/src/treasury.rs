// crates/basis-treasury/src/treasury.rs
//
// The Treasury: epoch-gated monetary controller.
//
// Below the peg the Treasury accrues debt and sells bonds at a discount
// against it; above the ceiling it mints seigniorage and splits it between
// the development fund, a reserve for bond redemption, and the two
// Boardrooms. Bond holders are senior to stakers: the redemption reserve is
// filled before any Boardroom sees cash.
//
// Lifecycle: Uninitialized -> Active -> Migrated. A genesis Treasury is
// activated by its operator; a successor is activated exactly once by its
// predecessor during `migrate`. Once migrated nothing mutates.
//
// Price-sensitive entry points pass these guards in order:
//   1. one guarded call per origin and per caller per block
//   2. not migrated (and initialized)
//   3. start time reached
//   4. the Treasury holds every role it needs over its collaborators

use serde::{Deserialize, Serialize};

use basis_core::{
    format_units, Address, BasisError, BestEffort, CallContext, Epoch, FundSink, PriceOracle,
    RewardNotifier, SafeMath, SeigniorageDistributor, TokenBank, U256, UNIT,
};

use crate::config::{check_bond_price_bounds, check_debt_rates, check_percentage, TreasuryConfig};
use crate::events::{EventRecord, TreasuryEvent};
use crate::guard::OneBlockGuard;

/// Memo attached to every development fund deposit.
pub const FUND_MEMO: &str = "Treasury: Seigniorage Allocation";

/// Lifecycle of a Treasury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasuryState {
    Uninitialized,
    Active,
    Migrated,
}

/// Addresses of everything the Treasury controls or pays into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryAssets {
    pub cash: Address,
    pub bond: Address,
    pub share: Address,
    pub share_boardroom: Address,
    pub lp_boardroom: Address,
    pub bond_reward_pool: Address,
    pub fund: Address,
}

/// State carried from a Treasury to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHandoff {
    pub accumulated_seigniorage: U256,
    pub accumulated_debt: U256,
    pub bond_price: U256,
    pub cash_price_one: U256,
}

/// Live collaborators for one Treasury call.
pub struct TreasuryEnv<'a> {
    pub bank: &'a mut TokenBank,
    pub oracle: &'a mut dyn PriceOracle,
    pub share_boardroom: &'a mut dyn SeigniorageDistributor,
    pub lp_boardroom: &'a mut dyn SeigniorageDistributor,
    pub bond_reward_pool: &'a mut dyn RewardNotifier,
    pub fund: &'a mut dyn FundSink,
}

/// What one `allocate_seigniorage` call decided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub epoch: u64,
    pub cash_price: U256,
    pub circulating_supply: U256,
    pub bond_reward: U256,
    pub debt_added: U256,
    pub accumulated_debt: U256,
    pub bond_price: U256,
    pub seigniorage: U256,
    pub fund_reserve: U256,
    pub treasury_reserve: U256,
    pub share_boardroom_reserve: U256,
    pub lp_boardroom_reserve: U256,
}

/// Epoch-gated monetary controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treasury {
    address: Address,
    /// Governance: may initialize, migrate, and tune parameters.
    operator: Address,
    /// Treasury allowed to activate this one through `initialize_from`.
    predecessor: Option<Address>,
    assets: TreasuryAssets,
    state: TreasuryState,
    config: TreasuryConfig,
    epoch: Epoch,
    guard: OneBlockGuard,
    bond_price: U256,
    accumulated_seigniorage: U256,
    accumulated_debt: U256,
    events: Vec<EventRecord>,
}

impl Treasury {
    /// Create an uninitialized Treasury.
    ///
    /// Pass `predecessor` for a successor that will receive a migration;
    /// leave it `None` for a genesis Treasury.
    ///
    /// # Errors
    /// Returns `BasisError::Config` if `config` is inconsistent.
    pub fn new(
        address: Address,
        operator: Address,
        assets: TreasuryAssets,
        config: TreasuryConfig,
        predecessor: Option<Address>,
    ) -> Result<Self, BasisError> {
        config.validate()?;
        let epoch = Epoch::new(config.period, config.start_time, config.start_epoch)?;
        Ok(Self {
            address,
            operator,
            predecessor,
            assets,
            state: TreasuryState::Uninitialized,
            config,
            epoch,
            guard: OneBlockGuard::new(),
            bond_price: UNIT,
            accumulated_seigniorage: U256::zero(),
            accumulated_debt: U256::zero(),
            events: Vec::new(),
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

    pub fn predecessor(&self) -> Option<Address> {
        self.predecessor
    }

    pub fn assets(&self) -> &TreasuryAssets {
        &self.assets
    }

    pub fn state(&self) -> TreasuryState {
        self.state
    }

    pub fn config(&self) -> &TreasuryConfig {
        &self.config
    }

    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn bond_price(&self) -> U256 {
        self.bond_price
    }

    pub fn accumulated_debt(&self) -> U256 {
        self.accumulated_debt
    }

    /// Cash reserved for bond redemption.
    pub fn reserve(&self) -> U256 {
        self.accumulated_seigniorage
    }

    /// Oracle price of one unit of cash.
    pub fn cash_price(&self, oracle: &dyn PriceOracle) -> Result<U256, BasisError> {
        oracle.consult(&self.assets.cash, UNIT)
    }

    /// Cash supply not held back as redemption reserve.
    pub fn circulating_supply(&self, bank: &TokenBank) -> Result<U256, BasisError> {
        bank.total_supply(&self.assets.cash)
            .safe_sub(self.accumulated_seigniorage)
    }

    pub fn handoff(&self) -> MigrationHandoff {
        MigrationHandoff {
            accumulated_seigniorage: self.accumulated_seigniorage,
            accumulated_debt: self.accumulated_debt,
            bond_price: self.bond_price,
            cash_price_one: self.config.cash_price_one,
        }
    }

    // -----------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------

    fn check_migration(&self) -> Result<(), BasisError> {
        match self.state {
            TreasuryState::Active => Ok(()),
            TreasuryState::Migrated => Err(BasisError::Migrated),
            TreasuryState::Uninitialized => Err(BasisError::NotInitialized),
        }
    }

    /// Require that the Treasury holds every role it exercises and that the
    /// collaborators handed in are the ones it was wired to.
    fn check_operator(&self, env: &TreasuryEnv<'_>) -> Result<(), BasisError> {
        for asset in [self.assets.cash, self.assets.bond, self.assets.share] {
            if env.bank.operator_of(&asset)? != self.address {
                return Err(BasisError::Unauthorized(format!(
                    "Treasury {} is not the operator of asset {}",
                    self.address, asset
                )));
            }
        }
        for (name, wired, room) in [
            ("share boardroom", self.assets.share_boardroom, &*env.share_boardroom),
            ("LP boardroom", self.assets.lp_boardroom, &*env.lp_boardroom),
        ] {
            if room.address() != wired {
                return Err(BasisError::InvalidState(format!(
                    "{} {} is not the wired {}",
                    name,
                    room.address(),
                    wired
                )));
            }
            if room.operator() != self.address {
                return Err(BasisError::Unauthorized(format!(
                    "Treasury {} is not the operator of the {}",
                    self.address, name
                )));
            }
        }
        if env.bond_reward_pool.address() != self.assets.bond_reward_pool {
            return Err(BasisError::InvalidState(format!(
                "reward pool {} is not the wired {}",
                env.bond_reward_pool.address(),
                self.assets.bond_reward_pool
            )));
        }
        if env.bond_reward_pool.reward_distribution() != self.address {
            return Err(BasisError::Unauthorized(format!(
                "Treasury {} is not the reward distribution of the bond reward pool",
                self.address
            )));
        }
        if env.fund.address() != self.assets.fund {
            return Err(BasisError::InvalidState(format!(
                "fund {} is not the wired {}",
                env.fund.address(),
                self.assets.fund
            )));
        }
        Ok(())
    }

    fn enter_guarded(&mut self, ctx: &CallContext, env: &TreasuryEnv<'_>) -> Result<(), BasisError> {
        self.guard.enter(ctx)?;
        self.check_migration()?;
        self.epoch.check_start_time(ctx.timestamp)?;
        self.check_operator(env)
    }

    fn require_operator(&self, ctx: &CallContext) -> Result<(), BasisError> {
        if ctx.caller != self.operator {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the operator of Treasury {}",
                ctx.caller, self.address
            )));
        }
        Ok(())
    }

    fn require_governance(&self, ctx: &CallContext) -> Result<(), BasisError> {
        self.require_operator(ctx)?;
        if self.state == TreasuryState::Migrated {
            return Err(BasisError::Migrated);
        }
        Ok(())
    }

    fn check_target_price(target_price: Option<U256>, price: U256) -> Result<(), BasisError> {
        match target_price {
            Some(expected) if expected != price => Err(BasisError::PriceMoved {
                expected: format_units(expected),
                actual: format_units(price),
            }),
            _ => Ok(()),
        }
    }

    fn refresh_oracle(&self, env: &mut TreasuryEnv<'_>, me: &CallContext) {
        BestEffort::from(env.oracle.update(me)).ignore("cash price oracle refresh");
    }

    fn record(&mut self, ctx: &CallContext, event: TreasuryEvent) {
        tracing::info!(treasury = %self.address, block = ctx.block_number, ?event, "Treasury event");
        self.events.push(EventRecord {
            block_number: ctx.block_number,
            timestamp: ctx.timestamp,
            event,
        });
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Activate a genesis Treasury, burning any cash it already holds.
    pub fn initialize(&mut self, ctx: &CallContext, env: &mut TreasuryEnv<'_>) -> Result<(), BasisError> {
        self.require_operator(ctx)?;
        match self.state {
            TreasuryState::Uninitialized => {}
            TreasuryState::Active => {
                return Err(BasisError::AlreadyInitialized(format!(
                    "Treasury {} is already active",
                    self.address
                )))
            }
            TreasuryState::Migrated => return Err(BasisError::Migrated),
        }
        if self.predecessor.is_some() {
            return Err(BasisError::Unauthorized(
                "a successor Treasury is activated by its predecessor".to_string(),
            ));
        }
        self.check_operator(env)?;

        let me = ctx.forward(self.address);
        let stray = env.bank.balance_of(&self.assets.cash, &self.address);
        if !stray.is_zero() {
            env.bank.burn(&me, &self.assets.cash, stray)?;
            tracing::info!(amount = %format_units(stray), "Burned stray Treasury cash");
        }
        self.accumulated_seigniorage = U256::zero();
        self.state = TreasuryState::Active;
        self.record(ctx, TreasuryEvent::Initialized { executor: ctx.caller });
        Ok(())
    }

    /// Activate a successor with the state handed over by its predecessor.
    pub fn initialize_from(&mut self, ctx: &CallContext, handoff: MigrationHandoff) -> Result<(), BasisError> {
        self.check_accepts_handoff(&ctx.caller)?;
        if handoff.cash_price_one.is_zero() {
            return Err(BasisError::Config("handed-over cash_price_one is zero".to_string()));
        }
        self.accumulated_seigniorage = handoff.accumulated_seigniorage;
        self.accumulated_debt = handoff.accumulated_debt;
        self.bond_price = handoff.bond_price;
        self.config.cash_price_one = handoff.cash_price_one;
        self.state = TreasuryState::Active;
        self.record(ctx, TreasuryEvent::Initialized { executor: ctx.caller });
        Ok(())
    }

    /// Whether `from` may activate this Treasury through `initialize_from`.
    fn check_accepts_handoff(&self, from: &Address) -> Result<(), BasisError> {
        if self.state != TreasuryState::Uninitialized {
            return Err(BasisError::AlreadyInitialized(format!(
                "Treasury {} has already been initialized",
                self.address
            )));
        }
        match self.predecessor {
            Some(predecessor) if predecessor == *from => Ok(()),
            _ => Err(BasisError::Unauthorized(format!(
                "{} is not the predecessor of Treasury {}",
                from, self.address
            ))),
        }
    }

    /// Hand every role and asset to `target` and activate it. Irreversible.
    pub fn migrate(
        &mut self,
        ctx: &CallContext,
        env: &mut TreasuryEnv<'_>,
        target: &mut Treasury,
    ) -> Result<(), BasisError> {
        self.require_operator(ctx)?;
        self.check_migration()?;
        if target.address == self.address {
            return Err(BasisError::InvalidState("Cannot migrate to self".to_string()));
        }
        target.check_accepts_handoff(&self.address)?;
        self.check_operator(env)?;

        let me = ctx.forward(self.address);
        let to = target.address;
        for asset in [self.assets.cash, self.assets.bond, self.assets.share] {
            env.bank.transfer_operator(&me, &asset, to)?;
            let balance = env.bank.balance_of(&asset, &self.address);
            if !balance.is_zero() {
                env.bank.transfer(&me, &asset, to, balance)?;
            }
        }
        env.share_boardroom.transfer_operator(&me, to)?;
        env.lp_boardroom.transfer_operator(&me, to)?;
        env.bond_reward_pool.transfer_reward_distribution(&me, to)?;

        self.state = TreasuryState::Migrated;
        self.record(ctx, TreasuryEvent::Migration { target: to });
        target.initialize_from(&me, self.handoff())
    }

    // -----------------------------------------------------------------
    // Bonds
    // -----------------------------------------------------------------

    /// Burn up to `amount` cash from the caller for discounted bonds.
    ///
    /// Returns the bonds minted. `target_price` rejects the trade if the
    /// oracle price differs from what the caller saw.
    pub fn buy_bonds(
        &mut self,
        ctx: &CallContext,
        env: &mut TreasuryEnv<'_>,
        amount: U256,
        target_price: Option<U256>,
    ) -> Result<U256, BasisError> {
        self.enter_guarded(ctx, env)?;
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot purchase bonds with zero amount".to_string()));
        }
        let price = self.cash_price(&*env.oracle)?;
        Self::check_target_price(target_price, price)?;
        if price >= self.config.cash_price_one {
            return Err(BasisError::PriceNotEligible(format!(
                "cash price {} is not below {}",
                format_units(price),
                format_units(self.config.cash_price_one)
            )));
        }

        let capacity = self.accumulated_debt.mul_div(self.bond_price, UNIT)?;
        let burn = amount.min(capacity);
        if burn.is_zero() {
            return Err(BasisError::NoDebtCapacity(format!(
                "accumulated debt is {}",
                format_units(self.accumulated_debt)
            )));
        }
        let bonds = burn.mul_div(UNIT, self.bond_price)?;

        let me = ctx.forward(self.address);
        env.bank.burn_from(&me, &self.assets.cash, ctx.caller, burn)?;
        env.bank.mint(&me, &self.assets.bond, ctx.caller, bonds)?;
        self.accumulated_debt = self.accumulated_debt.safe_sub(bonds)?;

        self.record(
            ctx,
            TreasuryEvent::BoughtBonds {
                account: ctx.caller,
                cash_burned: burn,
                bonds_minted: bonds,
            },
        );
        self.refresh_oracle(env, &me);
        Ok(bonds)
    }

    /// Redeem up to `amount` bonds 1:1 for cash from the redemption reserve.
    ///
    /// Returns the amount redeemed.
    pub fn redeem_bonds(
        &mut self,
        ctx: &CallContext,
        env: &mut TreasuryEnv<'_>,
        amount: U256,
        target_price: Option<U256>,
    ) -> Result<U256, BasisError> {
        self.enter_guarded(ctx, env)?;
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot redeem bonds with zero amount".to_string()));
        }
        let price = self.cash_price(&*env.oracle)?;
        Self::check_target_price(target_price, price)?;
        let ceiling = self.config.cash_price_ceiling()?;
        if price <= ceiling {
            return Err(BasisError::PriceNotEligible(format!(
                "cash price {} is not above {}",
                format_units(price),
                format_units(ceiling)
            )));
        }

        let redeem = self.accumulated_seigniorage.min(amount);
        if redeem.is_zero() {
            return Err(BasisError::InsufficientBudget(
                "no seigniorage is reserved for redemption".to_string(),
            ));
        }
        let on_hand = env.bank.balance_of(&self.assets.cash, &self.address);
        if on_hand < redeem {
            return Err(BasisError::InsufficientBudget(format!(
                "Treasury holds {} cash but {} is needed",
                format_units(on_hand),
                format_units(redeem)
            )));
        }

        self.accumulated_seigniorage = self.accumulated_seigniorage.safe_sub(redeem)?;
        let me = ctx.forward(self.address);
        env.bank.burn_from(&me, &self.assets.bond, ctx.caller, redeem)?;
        env.bank.transfer(&me, &self.assets.cash, ctx.caller, redeem)?;

        self.record(
            ctx,
            TreasuryEvent::RedeemedBonds {
                account: ctx.caller,
                amount: redeem,
            },
        );
        self.refresh_oracle(env, &me);
        Ok(redeem)
    }

    // -----------------------------------------------------------------
    // Policy
    // -----------------------------------------------------------------

    /// Run the once-per-epoch policy step.
    pub fn allocate_seigniorage(
        &mut self,
        ctx: &CallContext,
        env: &mut TreasuryEnv<'_>,
    ) -> Result<AllocationReport, BasisError> {
        self.enter_guarded(ctx, env)?;
        self.epoch.check_epoch(ctx.timestamp)?;
        let epoch_index = self.epoch.current_epoch(ctx.timestamp);
        self.epoch.mark_executed(ctx.timestamp);

        let me = ctx.forward(self.address);
        self.refresh_oracle(env, &me);
        let price = self.cash_price(&*env.oracle)?;
        let circulating = self.circulating_supply(env.bank)?;

        let mut report = AllocationReport {
            epoch: epoch_index,
            cash_price: price,
            circulating_supply: circulating,
            ..AllocationReport::default()
        };

        if price <= self.config.bond_reward_threshold()? {
            report.bond_reward = self.fund_bond_rewards(ctx, env)?;
        }

        if price <= self.config.cash_price_floor()? {
            let cap = circulating.percent(self.config.max_debt_rate)?;
            let grown = self
                .accumulated_debt
                .safe_add(circulating.percent(self.config.debt_add_rate)?)?;
            let next_debt = grown.min(cap);
            report.debt_added = next_debt.saturating_sub(self.accumulated_debt);
            self.accumulated_debt = next_debt;
            self.bond_price = self
                .bond_price
                .saturating_sub(self.config.bond_price_delta)
                .max(self.config.min_bond_price);
            if !report.debt_added.is_zero() {
                self.record(ctx, TreasuryEvent::DebtAdded { amount: report.debt_added });
            }
        } else {
            if !self.accumulated_debt.is_zero() {
                self.record(ctx, TreasuryEvent::DebtCleared { amount: self.accumulated_debt });
            }
            self.accumulated_debt = U256::zero();
            self.bond_price = UNIT;
        }
        report.accumulated_debt = self.accumulated_debt;
        report.bond_price = self.bond_price;

        if price <= self.config.cash_price_ceiling()? {
            tracing::info!(
                epoch = epoch_index,
                price = %format_units(price),
                debt = %format_units(self.accumulated_debt),
                bond_price = %format_units(self.bond_price),
                "No expansion this epoch"
            );
            return Ok(report);
        }

        let one = self.config.cash_price_one;
        let premium = price.safe_sub(one)?;
        let seigniorage = circulating
            .mul_div(premium, one)?
            .min(circulating.percent(self.config.max_inflation_rate)?);
        report.seigniorage = seigniorage;
        if seigniorage.is_zero() {
            return Ok(report);
        }
        env.bank.mint(&me, &self.assets.cash, self.address, seigniorage)?;

        let fund_reserve = seigniorage.percent(self.config.fund_allocation_rate)?;
        if !fund_reserve.is_zero() {
            env.bank
                .approve(&me, &self.assets.cash, env.fund.address(), fund_reserve)?;
            env.fund
                .deposit(&me, env.bank, &self.assets.cash, fund_reserve, FUND_MEMO)?;
            self.record(ctx, TreasuryEvent::DevelopmentFunded { amount: fund_reserve });
        }
        report.fund_reserve = fund_reserve;

        let remaining = seigniorage.safe_sub(fund_reserve)?;
        let unbacked_bonds = env
            .bank
            .total_supply(&self.assets.bond)
            .safe_sub(self.accumulated_seigniorage)?;
        let treasury_reserve = (remaining / 2).min(unbacked_bonds);
        if !treasury_reserve.is_zero() {
            self.accumulated_seigniorage = self.accumulated_seigniorage.safe_add(treasury_reserve)?;
            self.record(ctx, TreasuryEvent::TreasuryFunded { amount: treasury_reserve });
        }
        report.treasury_reserve = treasury_reserve;

        let boardroom_reserve = remaining.safe_sub(treasury_reserve)?;
        let share_part = boardroom_reserve.percent(self.config.share_boardroom_pct)?;
        let lp_part = boardroom_reserve.safe_sub(share_part)?;
        self.fund_boardroom(ctx, env.bank, env.share_boardroom, share_part)?;
        self.fund_boardroom(ctx, env.bank, env.lp_boardroom, lp_part)?;
        report.share_boardroom_reserve = share_part;
        report.lp_boardroom_reserve = lp_part;

        tracing::info!(
            epoch = epoch_index,
            price = %format_units(price),
            seigniorage = %format_units(seigniorage),
            reserve = %format_units(self.accumulated_seigniorage),
            "Seigniorage allocated"
        );
        Ok(report)
    }

    /// Mint 1% of the bond supply into the bond reward pool.
    fn fund_bond_rewards(&mut self, ctx: &CallContext, env: &mut TreasuryEnv<'_>) -> Result<U256, BasisError> {
        let reward = env.bank.total_supply(&self.assets.bond).percent(1)?;
        if reward.is_zero() {
            return Ok(reward);
        }
        let me = ctx.forward(self.address);
        let pool = env.bond_reward_pool.address();
        env.bank.mint(&me, &self.assets.bond, pool, reward)?;
        env.bond_reward_pool.notify_reward_amount(&me, reward)?;
        self.record(ctx, TreasuryEvent::BondRewardFunded { amount: reward });
        Ok(reward)
    }

    fn fund_boardroom(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        room: &mut dyn SeigniorageDistributor,
        amount: U256,
    ) -> Result<(), BasisError> {
        if amount.is_zero() {
            return Ok(());
        }
        let me = ctx.forward(self.address);
        bank.approve(&me, &self.assets.cash, room.address(), amount)?;
        room.allocate_seigniorage(&me, bank, amount)?;
        self.record(
            ctx,
            TreasuryEvent::BoardroomFunded {
                boardroom: room.address(),
                amount,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------

    /// Point the Treasury at a new development fund.
    ///
    /// Crate-private: `Protocol::set_fund` swaps the fund component in the
    /// same transaction, so the wiring check keeps passing.
    pub(crate) fn set_fund(&mut self, ctx: &CallContext, fund: Address) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        tracing::info!(from = %self.assets.fund, to = %fund, "Fund changed");
        self.assets.fund = fund;
        Ok(())
    }

    pub fn set_fund_allocation_rate(&mut self, ctx: &CallContext, rate: u64) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        check_percentage("fund_allocation_rate", rate)?;
        self.config.fund_allocation_rate = rate;
        Ok(())
    }

    pub fn set_max_inflation_rate(&mut self, ctx: &CallContext, rate: u64) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        check_percentage("max_inflation_rate", rate)?;
        self.config.max_inflation_rate = rate;
        Ok(())
    }

    pub fn set_debt_rates(
        &mut self,
        ctx: &CallContext,
        debt_add_rate: u64,
        max_debt_rate: u64,
    ) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        check_debt_rates(debt_add_rate, max_debt_rate)?;
        self.config.debt_add_rate = debt_add_rate;
        self.config.max_debt_rate = max_debt_rate;
        Ok(())
    }

    /// Re-peg the target price. The band moves with it.
    pub fn set_cash_price_one(&mut self, ctx: &CallContext, price: U256) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        if price.is_zero() {
            return Err(BasisError::Config("cash_price_one must be non-zero".to_string()));
        }
        tracing::info!(price = %format_units(price), "Cash target price changed");
        self.config.cash_price_one = price;
        Ok(())
    }

    /// Change the bond price decay step and floor, clamping the current
    /// bond price into the new range.
    pub fn set_bond_price_bounds(
        &mut self,
        ctx: &CallContext,
        delta: U256,
        min_bond_price: U256,
    ) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        check_bond_price_bounds(delta, min_bond_price)?;
        self.config.bond_price_delta = delta;
        self.config.min_bond_price = min_bond_price;
        self.bond_price = self.bond_price.max(min_bond_price);
        Ok(())
    }

    pub fn set_period(&mut self, ctx: &CallContext, period: u64) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        self.epoch.set_period(period)?;
        self.config.period = period;
        Ok(())
    }

    pub fn transfer_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<(), BasisError> {
        self.require_governance(ctx)?;
        tracing::info!(from = %self.operator, to = %new_operator, "Treasury operator transferred");
        self.operator = new_operator;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis_core::{parse_units, units};
    use basis_distribution::{Boardroom, EpochClock, RewardPool};

    use crate::fund::SimpleFund;

    const START: u64 = 1_000;
    const PERIOD: u64 = 3_600;

    /// Oracle returning a fixed cash price.
    #[derive(Debug, Clone)]
    struct MockOracle {
        cash: Address,
        price: U256,
        updates: u32,
        fail_updates: bool,
    }

    impl PriceOracle for MockOracle {
        fn consult(&self, token: &Address, amount_in: U256) -> Result<U256, BasisError> {
            if *token != self.cash {
                return Err(BasisError::Oracle("unknown token".to_string()));
            }
            amount_in.mul_div(self.price, UNIT)
        }

        fn update(&mut self, _ctx: &CallContext) -> Result<(), BasisError> {
            if self.fail_updates {
                return Err(BasisError::Oracle("pair unavailable".to_string()));
            }
            self.updates += 1;
            Ok(())
        }
    }

    struct Fixture {
        bank: TokenBank,
        oracle: MockOracle,
        share_room: Boardroom,
        lp_room: Boardroom,
        pool: RewardPool,
        fund: SimpleFund,
        treasury: Treasury,
        assets: TreasuryAssets,
        gov: Address,
        block: u64,
    }

    impl Fixture {
        /// Wired and initialized Treasury quoting `price`.
        fn new(price: &str) -> Self {
            let mut f = Self::build(price);
            let ctx = f.ctx(f.gov, START);
            f.call(|t, env| t.initialize(&ctx, env)).unwrap();
            f
        }

        fn build(price: &str) -> Self {
            let gov = Address::from_label("gov");
            let me = Address::from_label("treasury");
            let assets = TreasuryAssets {
                cash: Address::from_label("cash"),
                bond: Address::from_label("bond"),
                share: Address::from_label("share"),
                share_boardroom: Address::from_label("share-boardroom"),
                lp_boardroom: Address::from_label("lp-boardroom"),
                bond_reward_pool: Address::from_label("bond-pool"),
                fund: Address::from_label("fund"),
            };
            let lp = Address::from_label("lp");
            let mut bank = TokenBank::new();
            bank.register(assets.cash, "BAC", me).unwrap();
            bank.register(assets.bond, "BAB", me).unwrap();
            bank.register(assets.share, "BAS", me).unwrap();
            bank.register(lp, "BAC-DAI-LP", gov).unwrap();

            let clock = EpochClock { aligned_timestamp: START, period: PERIOD };
            let share_room = Boardroom::new(
                assets.share_boardroom, me, assets.share, assets.cash, 0, clock, 0, 0,
            )
            .unwrap();
            let lp_room =
                Boardroom::new(assets.lp_boardroom, me, lp, assets.cash, 0, clock, 0, 0).unwrap();
            let pool = RewardPool::new(
                assets.bond_reward_pool, gov, me, assets.bond, assets.bond, 30 * 86_400, START,
            )
            .unwrap();
            let config = TreasuryConfig {
                period: PERIOD,
                start_time: START,
                ..TreasuryConfig::default()
            };
            let treasury = Treasury::new(me, gov, assets, config, None).unwrap();
            let oracle = MockOracle {
                cash: assets.cash,
                price: parse_units(price).unwrap(),
                updates: 0,
                fail_updates: false,
            };
            Self {
                bank,
                oracle,
                share_room,
                lp_room,
                pool,
                fund: SimpleFund::new(assets.fund, gov),
                treasury,
                assets,
                gov,
                block: 1,
            }
        }

        /// Context for `who` in a fresh block at `ts`.
        fn ctx(&mut self, who: Address, ts: u64) -> CallContext {
            self.block += 1;
            CallContext::new(who, self.block, ts)
        }

        fn call<T>(
            &mut self,
            f: impl FnOnce(&mut Treasury, &mut TreasuryEnv<'_>) -> Result<T, BasisError>,
        ) -> Result<T, BasisError> {
            let mut env = TreasuryEnv {
                bank: &mut self.bank,
                oracle: &mut self.oracle,
                share_boardroom: &mut self.share_room,
                lp_boardroom: &mut self.lp_room,
                bond_reward_pool: &mut self.pool,
                fund: &mut self.fund,
            };
            f(&mut self.treasury, &mut env)
        }

        fn mint(&mut self, asset: Address, to: Address, amount: U256) {
            let ctx = CallContext::new(self.treasury.address(), 0, 0);
            self.bank.mint(&ctx, &asset, to, amount).unwrap();
        }

        fn set_price(&mut self, price: &str) {
            self.oracle.price = parse_units(price).unwrap();
        }

        fn allocate(&mut self, ts: u64) -> Result<AllocationReport, BasisError> {
            let ctx = self.ctx(Address::from_label("keeper"), ts);
            self.call(|t, env| t.allocate_seigniorage(&ctx, env))
        }

        /// Stake in both Boardrooms so allocations have somewhere to go.
        fn seat_stakers(&mut self) {
            let bob = Address::from_label("bob");
            self.mint(self.assets.share, bob, units(100));
            let c = CallContext::new(bob, 0, START + 1);
            self.bank
                .approve(&c, &self.assets.share, self.assets.share_boardroom, units(100))
                .unwrap();
            self.share_room.stake(&c, &mut self.bank, units(100)).unwrap();

            let carol = Address::from_label("carol");
            let lp = self.lp_room.stake_asset();
            self.bank
                .mint(&CallContext::new(self.gov, 0, 0), &lp, carol, units(100))
                .unwrap();
            let c = CallContext::new(carol, 0, START + 1);
            self.bank.approve(&c, &lp, self.assets.lp_boardroom, units(100)).unwrap();
            self.lp_room.stake(&c, &mut self.bank, units(100)).unwrap();
        }
    }

    fn epoch_ts(n: u64) -> u64 {
        START + 1 + n * PERIOD
    }

    #[test]
    fn test_initialize_burns_stray_cash() {
        let mut f = Fixture::build("1.0");
        let me = f.treasury.address();
        f.mint(f.assets.cash, me, units(7));
        let ctx = f.ctx(Address::from_label("mallory"), START);
        assert!(matches!(
            f.call(|t, env| t.initialize(&ctx, env)),
            Err(BasisError::Unauthorized(_))
        ));

        let ctx = f.ctx(f.gov, START);
        f.call(|t, env| t.initialize(&ctx, env)).unwrap();
        assert!(f.bank.balance_of(&f.assets.cash, &me).is_zero());
        assert!(f.bank.total_supply(&f.assets.cash).is_zero());
    }

    #[test]
    fn test_uninitialized_treasury_rejects_calls() {
        let mut f = Fixture::build("0.9");
        assert!(matches!(f.allocate(epoch_ts(0)), Err(BasisError::NotInitialized)));
    }

    #[test]
    fn test_initialize_only_once() {
        let mut f = Fixture::new("1.0");
        assert_eq!(f.treasury.state(), TreasuryState::Active);
        let ctx = f.ctx(f.gov, START);
        assert!(matches!(
            f.call(|t, env| t.initialize(&ctx, env)),
            Err(BasisError::AlreadyInitialized(_))
        ));
        assert!(matches!(f.treasury.events()[0].event, TreasuryEvent::Initialized { .. }));
    }

    #[test]
    fn test_calls_before_start_rejected() {
        let mut f = Fixture::new("0.9");
        let alice = Address::from_label("alice");
        let ctx = f.ctx(alice, START);
        assert!(matches!(
            f.call(|t, env| t.buy_bonds(&ctx, env, units(1), None)),
            Err(BasisError::NotStarted(_))
        ));
    }

    #[test]
    fn test_buy_bonds_requires_debt_then_succeeds() {
        let mut f = Fixture::new("0.90");
        let alice = Address::from_label("alice");
        f.mint(f.assets.cash, alice, units(10_000));
        let c = f.ctx(alice, START + 1);
        f.bank.approve(&c, &f.assets.cash, f.treasury.address(), units(1_000)).unwrap();

        let ctx = f.ctx(alice, START + 2);
        assert!(matches!(
            f.call(|t, env| t.buy_bonds(&ctx, env, units(100), None)),
            Err(BasisError::NoDebtCapacity(_))
        ));

        let report = f.allocate(epoch_ts(0)).unwrap();
        assert_eq!(report.debt_added, units(200));
        assert_eq!(f.treasury.bond_price(), parse_units("0.99").unwrap());

        let ctx = f.ctx(alice, epoch_ts(0) + 1);
        let bonds = f.call(|t, env| t.buy_bonds(&ctx, env, units(100), None)).unwrap();
        let expected = units(100) * UNIT / parse_units("0.99").unwrap();
        assert_eq!(bonds, expected);
        assert_eq!(f.bank.balance_of(&f.assets.cash, &alice), units(9_900));
        assert_eq!(f.bank.balance_of(&f.assets.bond, &alice), expected);
        assert_eq!(f.treasury.accumulated_debt(), units(200) - expected);
    }

    #[test]
    fn test_buy_bonds_price_guards() {
        let mut f = Fixture::new("1.0");
        let alice = Address::from_label("alice");
        let ctx = f.ctx(alice, START + 1);
        assert!(matches!(
            f.call(|t, env| t.buy_bonds(&ctx, env, units(1), None)),
            Err(BasisError::PriceNotEligible(_))
        ));
        f.set_price("0.9");
        let ctx = f.ctx(alice, START + 2);
        assert!(matches!(
            f.call(|t, env| t.buy_bonds(&ctx, env, units(1), Some(parse_units("0.91").unwrap()))),
            Err(BasisError::PriceMoved { .. })
        ));
        let ctx = f.ctx(alice, START + 3);
        assert!(matches!(
            f.call(|t, env| t.buy_bonds(&ctx, env, U256::zero(), None)),
            Err(BasisError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_redeem_with_empty_treasury_is_insufficient_budget() {
        let mut f = Fixture::new("1.10");
        let alice = Address::from_label("alice");
        f.mint(f.assets.bond, alice, units(50));
        let ctx = f.ctx(alice, START + 1);
        assert!(matches!(
            f.call(|t, env| t.redeem_bonds(&ctx, env, units(50), None)),
            Err(BasisError::InsufficientBudget(_))
        ));

        // Even with reserve bookkeeping, no cash on hand still fails.
        f.treasury.accumulated_seigniorage = units(50);
        let ctx = f.ctx(alice, START + 2);
        assert!(matches!(
            f.call(|t, env| t.redeem_bonds(&ctx, env, units(50), None)),
            Err(BasisError::InsufficientBudget(_))
        ));
    }

    #[test]
    fn test_expansion_split_without_bonds() {
        let mut f = Fixture::new("1.06");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        f.seat_stakers();

        let report = f.allocate(epoch_ts(0)).unwrap();
        assert_eq!(report.seigniorage, units(60));
        assert_eq!(report.fund_reserve, parse_units("1.2").unwrap());
        assert!(report.treasury_reserve.is_zero());
        assert_eq!(report.share_boardroom_reserve, parse_units("35.28").unwrap());
        assert_eq!(report.lp_boardroom_reserve, parse_units("23.52").unwrap());
        assert_eq!(
            f.bank.balance_of(&f.assets.cash, &f.assets.share_boardroom),
            parse_units("35.28").unwrap()
        );
        assert_eq!(
            f.bank.balance_of(&f.assets.cash, &f.assets.fund),
            parse_units("1.2").unwrap()
        );
        assert!(f.bank.balance_of(&f.assets.cash, &f.treasury.address()).is_zero());
    }

    #[test]
    fn test_bond_holders_are_senior() {
        let mut f = Fixture::new("1.06");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        f.mint(f.assets.bond, Address::from_label("dave"), units(20));
        f.seat_stakers();

        let report = f.allocate(epoch_ts(0)).unwrap();
        assert_eq!(report.treasury_reserve, units(20));
        assert_eq!(f.treasury.reserve(), units(20));
        assert_eq!(f.bank.balance_of(&f.assets.cash, &f.treasury.address()), units(20));
        assert_eq!(report.share_boardroom_reserve, parse_units("23.28").unwrap());

        // Bonds are now redeemable against the reserve.
        let dave = Address::from_label("dave");
        let c = f.ctx(dave, epoch_ts(0) + 1);
        f.bank.approve(&c, &f.assets.bond, f.treasury.address(), units(20)).unwrap();
        let ctx = f.ctx(dave, epoch_ts(0) + 2);
        let paid = f.call(|t, env| t.redeem_bonds(&ctx, env, units(50), None)).unwrap();
        assert_eq!(paid, units(20));
        assert_eq!(f.bank.balance_of(&f.assets.cash, &dave), units(20));
        assert!(f.treasury.reserve().is_zero());
    }

    #[test]
    fn test_expansion_with_empty_boardroom_fails() {
        let mut f = Fixture::new("1.06");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        assert!(matches!(f.allocate(epoch_ts(0)), Err(BasisError::InvalidState(_))));
    }

    #[test]
    fn test_inflation_is_capped() {
        let mut f = Fixture::new("2.0");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        f.seat_stakers();
        let report = f.allocate(epoch_ts(0)).unwrap();
        assert_eq!(report.seigniorage, units(100));
    }

    #[test]
    fn test_debt_capped_and_bond_price_floored() {
        let mut f = Fixture::new("0.90");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        for n in 0..60 {
            let report = f.allocate(epoch_ts(n)).unwrap();
            assert!(report.accumulated_debt <= units(200));
            assert!(f.treasury.bond_price() >= parse_units("0.5").unwrap());
            assert!(f.treasury.bond_price() <= UNIT);
        }
        assert_eq!(f.treasury.accumulated_debt(), units(200));
        assert_eq!(f.treasury.bond_price(), parse_units("0.5").unwrap());

        f.set_price("1.0");
        f.allocate(epoch_ts(60)).unwrap();
        assert!(f.treasury.accumulated_debt().is_zero());
        assert_eq!(f.treasury.bond_price(), UNIT);
        assert!(f
            .treasury
            .events()
            .iter()
            .any(|r| matches!(r.event, TreasuryEvent::DebtCleared { .. })));
    }

    #[test]
    fn test_bond_reward_channel() {
        let mut f = Fixture::new("0.80");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        f.mint(f.assets.bond, Address::from_label("dave"), units(100));
        let report = f.allocate(epoch_ts(0)).unwrap();
        assert_eq!(report.bond_reward, units(1));
        assert_eq!(f.bank.balance_of(&f.assets.bond, &f.assets.bond_reward_pool), units(1));
        assert_eq!(f.pool.total_notified(), units(1));
        // Debt bookkeeping ignores the reward bonds.
        assert_eq!(report.accumulated_debt, units(20));
    }

    #[test]
    fn test_allocation_once_per_epoch() {
        let mut f = Fixture::new("1.0");
        f.allocate(epoch_ts(0)).unwrap();
        assert!(matches!(
            f.allocate(epoch_ts(0) + 10),
            Err(BasisError::EpochNotReady { current: 0, next: 1 })
        ));
        f.allocate(epoch_ts(1)).unwrap();
    }

    #[test]
    fn test_failed_oracle_refresh_does_not_block_policy() {
        let mut f = Fixture::new("1.0");
        f.oracle.fail_updates = true;
        f.allocate(epoch_ts(0)).unwrap();
        assert_eq!(f.oracle.updates, 0);
        f.oracle.fail_updates = false;
        f.allocate(epoch_ts(1)).unwrap();
        assert_eq!(f.oracle.updates, 1);
    }

    #[test]
    fn test_same_block_reentry_rejected() {
        let mut f = Fixture::new("1.0");
        let keeper = Address::from_label("keeper");
        let ctx = f.ctx(keeper, epoch_ts(0));
        f.call(|t, env| t.allocate_seigniorage(&ctx, env)).unwrap();
        assert!(matches!(
            f.call(|t, env| t.buy_bonds(&ctx, env, units(1), None)),
            Err(BasisError::SameBlockReentry { .. })
        ));
    }

    #[test]
    fn test_missing_roles_rejected() {
        let mut f = Fixture::new("1.0");
        let me = f.treasury.address();
        let ctx = CallContext::new(me, 0, 0);
        f.share_room.transfer_operator(&ctx, f.gov).unwrap();
        assert!(matches!(f.allocate(epoch_ts(0)), Err(BasisError::Unauthorized(_))));
    }

    #[test]
    fn test_migrate_hands_everything_over() {
        let mut f = Fixture::new("0.90");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        f.allocate(epoch_ts(0)).unwrap();
        f.mint(f.assets.share, f.treasury.address(), units(5));

        let gov = f.gov;
        let next_addr = Address::from_label("treasury-v2");
        let mut next = Treasury::new(
            next_addr,
            gov,
            f.assets,
            f.treasury.config().clone(),
            Some(f.treasury.address()),
        )
        .unwrap();

        let ctx = f.ctx(gov, epoch_ts(0) + 5);
        f.call(|t, env| t.migrate(&ctx, env, &mut next)).unwrap();

        assert_eq!(f.treasury.state(), TreasuryState::Migrated);
        assert_eq!(next.state(), TreasuryState::Active);
        assert_eq!(next.accumulated_debt(), units(20));
        assert_eq!(next.bond_price(), parse_units("0.99").unwrap());
        assert_eq!(f.bank.operator_of(&f.assets.cash).unwrap(), next_addr);
        assert_eq!(f.share_room.operator(), next_addr);
        assert_eq!(f.pool.reward_distribution(), next_addr);
        assert_eq!(f.bank.balance_of(&f.assets.share, &next_addr), units(5));

        // Nothing moves on the old Treasury any more.
        assert!(matches!(f.allocate(epoch_ts(1)), Err(BasisError::Migrated)));
        let ctx = f.ctx(gov, epoch_ts(1));
        assert!(f.treasury.set_period(&ctx, 10).is_err());
        // And the successor cannot be re-initialized.
        let ctx = CallContext::new(f.treasury.address(), 99, epoch_ts(1));
        assert!(matches!(
            next.initialize_from(&ctx, f.treasury.handoff()),
            Err(BasisError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_initialize_from_only_predecessor() {
        let f = Fixture::new("1.0");
        let mut next = Treasury::new(
            Address::from_label("treasury-v2"),
            f.gov,
            f.assets,
            TreasuryConfig::default(),
            Some(f.treasury.address()),
        )
        .unwrap();
        let stranger = CallContext::new(Address::from_label("mallory"), 1, 1);
        assert!(matches!(
            next.initialize_from(&stranger, f.treasury.handoff()),
            Err(BasisError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_failed_migration_changes_nothing() {
        let mut f = Fixture::new("0.90");
        f.mint(f.assets.cash, Address::from_label("alice"), units(1_000));
        f.allocate(epoch_ts(0)).unwrap();
        f.mint(f.assets.share, f.treasury.address(), units(5));

        let gov = f.gov;
        let me = f.treasury.address();
        let orphan_addr = Address::from_label("treasury-orphan");
        let mut orphan =
            Treasury::new(orphan_addr, gov, f.assets, f.treasury.config().clone(), None).unwrap();
        let events_before = f.treasury.events().len();

        let ctx = f.ctx(gov, epoch_ts(0) + 5);
        assert!(matches!(
            f.call(|t, env| t.migrate(&ctx, env, &mut orphan)),
            Err(BasisError::Unauthorized(_))
        ));

        assert_eq!(f.treasury.state(), TreasuryState::Active);
        assert_eq!(orphan.state(), TreasuryState::Uninitialized);
        assert_eq!(f.treasury.events().len(), events_before);
        assert_eq!(f.bank.operator_of(&f.assets.cash).unwrap(), me);
        assert_eq!(f.share_room.operator(), me);
        assert_eq!(f.lp_room.operator(), me);
        assert_eq!(f.pool.reward_distribution(), me);
        assert_eq!(f.bank.balance_of(&f.assets.share, &me), units(5));
        assert_eq!(f.bank.balance_of(&f.assets.share, &orphan_addr), U256::zero());

        // An already active successor is refused the same way.
        let mut active = Treasury::new(
            Address::from_label("treasury-v2"),
            gov,
            f.assets,
            f.treasury.config().clone(),
            Some(me),
        )
        .unwrap();
        active
            .initialize_from(&CallContext::new(me, 0, 0), f.treasury.handoff())
            .unwrap();
        let ctx = f.ctx(gov, epoch_ts(0) + 6);
        assert!(matches!(
            f.call(|t, env| t.migrate(&ctx, env, &mut active)),
            Err(BasisError::AlreadyInitialized(_))
        ));
        assert_eq!(f.treasury.state(), TreasuryState::Active);
        assert_eq!(f.bank.operator_of(&f.assets.cash).unwrap(), me);
    }

    #[test]
    fn test_governance_setters() {
        let mut f = Fixture::new("1.0");
        let gov = f.gov;
        let ctx = f.ctx(gov, START);
        f.treasury.set_debt_rates(&ctx, 3, 30).unwrap();
        assert!(f.treasury.set_fund_allocation_rate(&ctx, 101).is_err());
        f.treasury
            .set_bond_price_bounds(&ctx, parse_units("0.02").unwrap(), parse_units("0.6").unwrap())
            .unwrap();
        f.treasury.set_cash_price_one(&ctx, parse_units("2").unwrap()).unwrap();
        assert_eq!(f.treasury.config().cash_price_ceiling().unwrap(), parse_units("2.1").unwrap());

        let mallory = Address::from_label("mallory");
        let ctx = f.ctx(mallory, START);
        assert!(matches!(
            f.treasury.set_max_inflation_rate(&ctx, 5),
            Err(BasisError::Unauthorized(_))
        ));
    }
}
