// crates/basis-treasury/src/protocol.rs
//
// The whole protocol as one transactional unit.
//
// `ProtocolState` owns every component: the token bank, the cash/dai pair,
// the TWAP oracle, both Boardrooms, the bond reward pool, the development
// fund, and the Treasury. `Protocol` wraps it and runs every entry point
// through `transact`, which works on a staged copy and commits only when the
// call returns `Ok`. A failed call leaves no trace, including its guard
// entries and events.

use serde::{Deserialize, Serialize};

use basis_core::{format_units, units, Address, BasisError, CallContext, FundSink, TokenBank, U256, UNIT};
use basis_distribution::{Boardroom, EpochClock, RewardPool};
use basis_oracle::{ConstantProductPair, PairOracle, TwapOracle, UpdateOutcome};

use crate::config::TreasuryConfig;
use crate::fund::SimpleFund;
use crate::treasury::{AllocationReport, Treasury, TreasuryAssets, TreasuryEnv};

/// Boardroom parameters shared by both Boardrooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardroomSettings {
    #[serde(default = "default_withdraw_lockup_epochs")]
    pub withdraw_lockup_epochs: u64,
    #[serde(default = "default_reward_lockup_epochs")]
    pub reward_lockup_epochs: u64,
}

fn default_withdraw_lockup_epochs() -> u64 {
    basis_distribution::boardroom::DEFAULT_WITHDRAW_LOCKUP_EPOCHS
}

fn default_reward_lockup_epochs() -> u64 {
    basis_distribution::boardroom::DEFAULT_REWARD_LOCKUP_EPOCHS
}

impl Default for BoardroomSettings {
    fn default() -> Self {
        Self {
            withdraw_lockup_epochs: default_withdraw_lockup_epochs(),
            reward_lockup_epochs: default_reward_lockup_epochs(),
        }
    }
}

/// Bond reward pool parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPoolSettings {
    /// Seconds over which each notified reward is streamed.
    #[serde(default = "default_reward_duration")]
    pub duration: u64,
}

fn default_reward_duration() -> u64 {
    basis_distribution::reward_pool::DEFAULT_DURATION
}

impl Default for RewardPoolSettings {
    fn default() -> Self {
        Self {
            duration: default_reward_duration(),
        }
    }
}

/// Everything needed to deploy the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub treasury: TreasuryConfig,
    #[serde(default)]
    pub boardroom: BoardroomSettings,
    #[serde(default)]
    pub reward_pool: RewardPoolSettings,
}

/// Well-known addresses of every deployed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAddresses {
    /// Deployer: governance of the Treasury, the oracle, the reward pool and
    /// the fund, and minter of the external dai and LP assets.
    pub admin: Address,
    pub cash: Address,
    pub bond: Address,
    pub share: Address,
    pub dai: Address,
    pub lp: Address,
    pub pair: Address,
    pub oracle: Address,
    pub treasury: Address,
    pub share_boardroom: Address,
    pub lp_boardroom: Address,
    pub bond_reward_pool: Address,
    pub fund: Address,
}

impl ProtocolAddresses {
    /// Deterministic addresses derived from component labels.
    pub fn from_labels() -> Self {
        Self {
            admin: Address::from_label("basis/admin"),
            cash: Address::from_label("basis/cash"),
            bond: Address::from_label("basis/bond"),
            share: Address::from_label("basis/share"),
            dai: Address::from_label("basis/dai"),
            lp: Address::from_label("basis/cash-dai-lp"),
            pair: Address::from_label("basis/cash-dai-pair"),
            oracle: Address::from_label("basis/oracle"),
            treasury: Address::from_label("basis/treasury"),
            share_boardroom: Address::from_label("basis/share-boardroom"),
            lp_boardroom: Address::from_label("basis/lp-boardroom"),
            bond_reward_pool: Address::from_label("basis/bond-reward-pool"),
            fund: Address::from_label("basis/fund"),
        }
    }

    fn treasury_assets(&self) -> TreasuryAssets {
        TreasuryAssets {
            cash: self.cash,
            bond: self.bond,
            share: self.share,
            share_boardroom: self.share_boardroom,
            lp_boardroom: self.lp_boardroom,
            bond_reward_pool: self.bond_reward_pool,
            fund: self.fund,
        }
    }
}

/// Initial cash and share holdings of one account, in whole units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub account: Address,
    #[serde(default)]
    pub cash: u64,
    #[serde(default)]
    pub share: u64,
}

/// Initial market and holders. Cash and share can only be minted by the
/// Treasury once it is wired, so every initial holder is listed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisParams {
    /// Cash seeded into the pair, in whole units.
    pub cash_liquidity: u64,
    /// Dai seeded into the pair, in whole units.
    pub dai_liquidity: u64,
    #[serde(default)]
    pub allocations: Vec<GenesisAllocation>,
}

/// Which Boardroom a staking call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardroomKind {
    Share,
    Lp,
}

/// All protocol components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolState {
    pub addresses: ProtocolAddresses,
    pub bank: TokenBank,
    pub pair: ConstantProductPair,
    pub oracle: TwapOracle,
    pub share_boardroom: Boardroom,
    pub lp_boardroom: Boardroom,
    pub bond_reward_pool: RewardPool,
    pub fund: SimpleFund,
    pub treasury: Treasury,
    /// Treasuries that have migrated away, oldest first.
    pub retired_treasuries: Vec<Treasury>,
}

impl ProtocolState {
    /// Run `f` against the Treasury with every collaborator wired in.
    pub fn with_treasury<T>(
        &mut self,
        f: impl FnOnce(&mut Treasury, &mut TreasuryEnv<'_>) -> Result<T, BasisError>,
    ) -> Result<T, BasisError> {
        let mut oracle = PairOracle::new(&mut self.oracle, &self.pair);
        let mut env = TreasuryEnv {
            bank: &mut self.bank,
            oracle: &mut oracle,
            share_boardroom: &mut self.share_boardroom,
            lp_boardroom: &mut self.lp_boardroom,
            bond_reward_pool: &mut self.bond_reward_pool,
            fund: &mut self.fund,
        };
        f(&mut self.treasury, &mut env)
    }

    pub fn boardroom_mut(&mut self, kind: BoardroomKind) -> &mut Boardroom {
        match kind {
            BoardroomKind::Share => &mut self.share_boardroom,
            BoardroomKind::Lp => &mut self.lp_boardroom,
        }
    }

    pub fn boardroom(&self, kind: BoardroomKind) -> &Boardroom {
        match kind {
            BoardroomKind::Share => &self.share_boardroom,
            BoardroomKind::Lp => &self.lp_boardroom,
        }
    }
}

/// Transactional front door to the protocol.
#[derive(Debug, Clone)]
pub struct Protocol {
    state: ProtocolState,
}

impl Protocol {
    /// Deploy and wire every component, seed the pair, and initialize the
    /// Treasury. Runs at `ctx` with `ctx.caller` as the admin.
    ///
    /// The Treasury's start time comes from `config.treasury.start_time`;
    /// the oracle, the Boardroom clocks, and the reward pool share it.
    pub fn genesis(
        ctx: &CallContext,
        config: &ProtocolConfig,
        params: &GenesisParams,
    ) -> Result<Self, BasisError> {
        config.treasury.validate()?;
        let addresses = ProtocolAddresses {
            admin: ctx.caller,
            ..ProtocolAddresses::from_labels()
        };
        let admin = addresses.admin;
        let start_time = config.treasury.start_time;
        let period = config.treasury.period;

        let mut bank = TokenBank::new();
        bank.register(addresses.cash, "BAC", admin)?;
        bank.register(addresses.bond, "BAB", admin)?;
        bank.register(addresses.share, "BAS", admin)?;
        bank.register(addresses.dai, "DAI", admin)?;
        bank.register(addresses.lp, "BAC-DAI-LP", admin)?;

        for allocation in &params.allocations {
            if allocation.cash > 0 {
                bank.mint(ctx, &addresses.cash, allocation.account, units(allocation.cash))?;
            }
            if allocation.share > 0 {
                bank.mint(ctx, &addresses.share, allocation.account, units(allocation.share))?;
            }
        }

        // Seed the pair and mirror its reserves in the bank.
        let cash_reserve = units(params.cash_liquidity);
        let dai_reserve = units(params.dai_liquidity);
        bank.mint(ctx, &addresses.cash, addresses.pair, cash_reserve)?;
        bank.mint(ctx, &addresses.dai, addresses.pair, dai_reserve)?;
        let mut pair = ConstantProductPair::new(addresses.pair, addresses.cash, addresses.dai)?;
        let (amount0, amount1) = if addresses.cash < addresses.dai {
            (cash_reserve.low_u128(), dai_reserve.low_u128())
        } else {
            (dai_reserve.low_u128(), cash_reserve.low_u128())
        };
        pair.add_liquidity(amount0, amount1, ctx.timestamp)?;

        let oracle = TwapOracle::new(addresses.oracle, admin, addresses.pair, &pair, period, start_time)?;

        let clock = EpochClock {
            aligned_timestamp: start_time,
            period,
        };
        let share_boardroom = Boardroom::new(
            addresses.share_boardroom,
            addresses.treasury,
            addresses.share,
            addresses.cash,
            ctx.block_number,
            clock,
            config.boardroom.withdraw_lockup_epochs,
            config.boardroom.reward_lockup_epochs,
        )?;
        let lp_boardroom = Boardroom::new(
            addresses.lp_boardroom,
            addresses.treasury,
            addresses.lp,
            addresses.cash,
            ctx.block_number,
            clock,
            config.boardroom.withdraw_lockup_epochs,
            config.boardroom.reward_lockup_epochs,
        )?;
        let bond_reward_pool = RewardPool::new(
            addresses.bond_reward_pool,
            admin,
            addresses.treasury,
            addresses.bond,
            addresses.bond,
            config.reward_pool.duration,
            start_time,
        )?;
        let fund = SimpleFund::new(addresses.fund, admin);
        let treasury = Treasury::new(
            addresses.treasury,
            admin,
            addresses.treasury_assets(),
            config.treasury.clone(),
            None,
        )?;

        for asset in [addresses.cash, addresses.bond, addresses.share] {
            bank.transfer_operator(ctx, &asset, addresses.treasury)?;
        }

        let mut state = ProtocolState {
            addresses,
            bank,
            pair,
            oracle,
            share_boardroom,
            lp_boardroom,
            bond_reward_pool,
            fund,
            treasury,
            retired_treasuries: Vec::new(),
        };
        state.with_treasury(|treasury, env| treasury.initialize(ctx, env))?;

        tracing::info!(
            treasury = %addresses.treasury,
            cash_reserve = params.cash_liquidity,
            dai_reserve = params.dai_liquidity,
            holders = params.allocations.len(),
            start_time,
            period,
            "Protocol deployed"
        );
        Ok(Self { state })
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn addresses(&self) -> &ProtocolAddresses {
        &self.state.addresses
    }

    /// Run `f` on a staged copy of the state; commit only on success.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut ProtocolState) -> Result<T, BasisError>,
    ) -> Result<T, BasisError> {
        let mut staged = self.state.clone();
        let out = f(&mut staged)?;
        self.state = staged;
        Ok(out)
    }

    /// Pretty JSON dump of the whole state.
    pub fn dump_json(&self) -> Result<String, BasisError> {
        Ok(serde_json::to_string_pretty(&self.state)?)
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    /// Cash price at the oracle's committed average.
    pub fn cash_price(&self) -> Result<U256, BasisError> {
        self.state.oracle.consult(&self.state.addresses.cash, UNIT)
    }

    /// Instantaneous pair price of cash in dai.
    pub fn spot_price(&self) -> Result<U256, BasisError> {
        self.state.pair.spot_price(&self.state.addresses.cash)
    }

    pub fn balance_of(&self, asset: &Address, account: &Address) -> U256 {
        self.state.bank.balance_of(asset, account)
    }

    pub fn treasury(&self) -> &Treasury {
        &self.state.treasury
    }

    pub fn boardroom(&self, kind: BoardroomKind) -> &Boardroom {
        self.state.boardroom(kind)
    }

    pub fn bond_reward_pool(&self) -> &RewardPool {
        &self.state.bond_reward_pool
    }

    pub fn fund(&self) -> &SimpleFund {
        &self.state.fund
    }

    // -----------------------------------------------------------------
    // Assets and market
    // -----------------------------------------------------------------

    /// Mint `amount` of `asset` to `to`. Operator of the asset only.
    pub fn mint(&mut self, ctx: &CallContext, asset: &Address, to: Address, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| s.bank.mint(ctx, asset, to, amount))
    }

    pub fn approve(&mut self, ctx: &CallContext, asset: &Address, spender: Address, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| s.bank.approve(ctx, asset, spender, amount))
    }

    pub fn transfer(&mut self, ctx: &CallContext, asset: &Address, to: Address, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| s.bank.transfer(ctx, asset, to, amount))
    }

    /// Swap an exact input of cash or dai through the pair. Returns the
    /// output amount.
    pub fn swap(&mut self, ctx: &CallContext, token_in: &Address, amount_in: U256) -> Result<U256, BasisError> {
        self.transact(|s| {
            let token_out = if *token_in == s.addresses.cash {
                s.addresses.dai
            } else if *token_in == s.addresses.dai {
                s.addresses.cash
            } else {
                return Err(BasisError::NotFound(format!("{} is not traded by the pair", token_in)));
            };
            if amount_in.bits() > 112 {
                return Err(BasisError::InvalidAmount("swap input exceeds pair capacity".to_string()));
            }
            s.bank.transfer(ctx, token_in, s.addresses.pair, amount_in)?;
            let out = U256::from(s.pair.swap_exact_in(token_in, amount_in.low_u128(), ctx.timestamp)?);
            s.bank
                .transfer(&ctx.forward(s.addresses.pair), &token_out, ctx.caller, out)?;
            tracing::debug!(
                trader = %ctx.caller,
                amount_in = %format_units(amount_in),
                amount_out = %format_units(out),
                "Swap"
            );
            Ok(out)
        })
    }

    /// Refresh the TWAP oracle directly.
    pub fn update_oracle(&mut self, ctx: &CallContext) -> Result<UpdateOutcome, BasisError> {
        self.transact(|s| s.oracle.update(ctx, &s.pair))
    }

    // -----------------------------------------------------------------
    // Treasury
    // -----------------------------------------------------------------

    pub fn buy_bonds(&mut self, ctx: &CallContext, amount: U256, target_price: Option<U256>) -> Result<U256, BasisError> {
        self.transact(|s| s.with_treasury(|t, env| t.buy_bonds(ctx, env, amount, target_price)))
    }

    pub fn redeem_bonds(&mut self, ctx: &CallContext, amount: U256, target_price: Option<U256>) -> Result<U256, BasisError> {
        self.transact(|s| s.with_treasury(|t, env| t.redeem_bonds(ctx, env, amount, target_price)))
    }

    pub fn allocate_seigniorage(&mut self, ctx: &CallContext) -> Result<AllocationReport, BasisError> {
        self.transact(|s| s.with_treasury(|t, env| t.allocate_seigniorage(ctx, env)))
    }

    /// Migrate to `successor`, which must name the current Treasury as its
    /// predecessor. The old Treasury is kept in `retired_treasuries`.
    pub fn migrate_treasury(&mut self, ctx: &CallContext, mut successor: Treasury) -> Result<(), BasisError> {
        self.transact(|s| {
            s.with_treasury(|t, env| t.migrate(ctx, env, &mut successor))?;
            s.addresses.treasury = successor.address();
            let retired = std::mem::replace(&mut s.treasury, successor);
            s.retired_treasuries.push(retired);
            Ok(())
        })
    }

    /// Apply a governance change to the Treasury.
    pub fn govern_treasury(
        &mut self,
        f: impl FnOnce(&mut Treasury) -> Result<(), BasisError>,
    ) -> Result<(), BasisError> {
        self.transact(|s| f(&mut s.treasury))
    }

    /// Replace the development fund. Governance only.
    pub fn set_fund(&mut self, ctx: &CallContext, fund: SimpleFund) -> Result<(), BasisError> {
        self.transact(|s| {
            s.treasury.set_fund(ctx, fund.address())?;
            s.addresses.fund = fund.address();
            s.fund = fund;
            Ok(())
        })
    }

    /// Withdraw from the development fund. Fund operator only.
    pub fn withdraw_fund(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        to: Address,
        amount: U256,
        reason: &str,
    ) -> Result<(), BasisError> {
        self.transact(|s| s.fund.withdraw(ctx, &mut s.bank, asset, to, amount, reason))
    }

    // -----------------------------------------------------------------
    // Boardrooms
    // -----------------------------------------------------------------

    pub fn boardroom_stake(&mut self, ctx: &CallContext, kind: BoardroomKind, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| {
            let ProtocolState { bank, share_boardroom, lp_boardroom, .. } = s;
            let room = match kind {
                BoardroomKind::Share => share_boardroom,
                BoardroomKind::Lp => lp_boardroom,
            };
            room.stake(ctx, bank, amount)
        })
    }

    pub fn boardroom_withdraw(&mut self, ctx: &CallContext, kind: BoardroomKind, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| {
            let ProtocolState { bank, share_boardroom, lp_boardroom, .. } = s;
            let room = match kind {
                BoardroomKind::Share => share_boardroom,
                BoardroomKind::Lp => lp_boardroom,
            };
            room.withdraw(ctx, bank, amount)
        })
    }

    pub fn boardroom_claim_reward(&mut self, ctx: &CallContext, kind: BoardroomKind) -> Result<U256, BasisError> {
        self.transact(|s| {
            let ProtocolState { bank, share_boardroom, lp_boardroom, .. } = s;
            let room = match kind {
                BoardroomKind::Share => share_boardroom,
                BoardroomKind::Lp => lp_boardroom,
            };
            room.claim_reward(ctx, bank)
        })
    }

    pub fn boardroom_exit(&mut self, ctx: &CallContext, kind: BoardroomKind) -> Result<U256, BasisError> {
        self.transact(|s| {
            let ProtocolState { bank, share_boardroom, lp_boardroom, .. } = s;
            let room = match kind {
                BoardroomKind::Share => share_boardroom,
                BoardroomKind::Lp => lp_boardroom,
            };
            room.exit(ctx, bank)
        })
    }

    // -----------------------------------------------------------------
    // Bond reward pool
    // -----------------------------------------------------------------

    pub fn pool_stake(&mut self, ctx: &CallContext, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| s.bond_reward_pool.stake(ctx, &mut s.bank, amount))
    }

    pub fn pool_withdraw(&mut self, ctx: &CallContext, amount: U256) -> Result<(), BasisError> {
        self.transact(|s| s.bond_reward_pool.withdraw(ctx, &mut s.bank, amount))
    }

    pub fn pool_get_reward(&mut self, ctx: &CallContext) -> Result<U256, BasisError> {
        self.transact(|s| s.bond_reward_pool.get_reward(ctx, &mut s.bank))
    }

    pub fn pool_exit(&mut self, ctx: &CallContext) -> Result<U256, BasisError> {
        self.transact(|s| s.bond_reward_pool.exit(ctx, &mut s.bank))
    }
}
