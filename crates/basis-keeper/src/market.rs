// crates/basis-keeper/src/market.rs
//
// Simulated market participants.
//
// Traders swap against the cash/dai pair with a seeded RNG, leaning towards
// selling cash in bearish regimes and buying it in bullish ones. After each
// allocation they react to the Treasury's offer: buying bonds while debt is
// open below the peg and redeeming them once the reserve is funded above the
// ceiling. Stakers claim their Boardroom rewards every epoch.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use basis_core::{format_units, Address, BasisError, CallContext, SafeMath, U256};
use basis_treasury::{AllocationReport, BoardroomKind, Protocol};

use crate::config::{staker_addresses, trader_addresses, MarketConfig};

/// What the participants did after one allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochActivity {
    pub bonds_bought: U256,
    pub bonds_redeemed: U256,
    pub rewards_claimed: U256,
}

pub struct Market {
    config: MarketConfig,
    rng: StdRng,
    traders: Vec<Address>,
    stakers: Vec<Address>,
}

impl Market {
    pub fn new(config: MarketConfig, seed: u64) -> Self {
        let traders = trader_addresses(config.traders);
        let stakers = staker_addresses(config.stakers);
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            traders,
            stakers,
        }
    }

    /// Fund traders with dai and seat every staker in both Boardrooms.
    pub fn setup(&self, protocol: &mut Protocol, ctx: &CallContext) -> Result<(), BasisError> {
        let a = *protocol.addresses();
        let dai = basis_core::units(self.config.trader_dai);
        let stake = basis_core::units(self.config.staker_stake);
        for trader in &self.traders {
            protocol.mint(ctx, &a.dai, *trader, dai)?;
        }
        for staker in &self.stakers {
            protocol.mint(ctx, &a.lp, *staker, stake)?;
            let own = CallContext::new(*staker, ctx.block_number, ctx.timestamp);
            for (kind, asset, room) in [
                (BoardroomKind::Share, a.share, a.share_boardroom),
                (BoardroomKind::Lp, a.lp, a.lp_boardroom),
            ] {
                protocol.approve(&own, &asset, room, stake)?;
                protocol.boardroom_stake(&own, kind, stake)?;
            }
        }
        tracing::info!(
            traders = self.traders.len(),
            stakers = self.stakers.len(),
            "Market participants ready"
        );
        Ok(())
    }

    /// Sentiment for `epoch`: bearish regimes come first.
    pub fn is_bearish(&self, epoch: u64) -> bool {
        (epoch / self.config.regime_epochs.max(1)) % 2 == 0
    }

    /// Maybe place one random trade in this block.
    pub fn trade(&mut self, protocol: &mut Protocol, block: u64, timestamp: u64, epoch: u64) {
        if self.traders.is_empty() {
            return;
        }
        let p_trade = f64::from(self.config.trade_probability_pct.min(100)) / 100.0;
        if !self.rng.gen_bool(p_trade) {
            return;
        }
        let trader = self.traders[self.rng.gen_range(0..self.traders.len())];
        let bias = self.config.sell_bias_pct.min(100);
        let sell_pct = if self.is_bearish(epoch) { bias } else { 100 - bias };
        let sell_cash = self.rng.gen_range(0..100) < sell_pct;

        let a = *protocol.addresses();
        let token_in = if sell_cash { a.cash } else { a.dai };
        let bps = self.rng.gen_range(1..=self.config.max_trade_bps.max(1));
        let reserve = protocol.balance_of(&token_in, &a.pair);
        let amount = (reserve * U256::from(bps) / U256::from(10_000u64))
            .min(protocol.balance_of(&token_in, &trader));
        if amount.is_zero() {
            return;
        }

        let ctx = CallContext::new(trader, block, timestamp);
        match protocol.swap(&ctx, &token_in, amount) {
            Ok(out) => tracing::debug!(
                trader = %trader,
                side = if sell_cash { "sell" } else { "buy" },
                amount_in = %format_units(amount),
                amount_out = %format_units(out),
                "Trade"
            ),
            Err(e) => tracing::debug!("Trade by {} rejected: {}", trader, e),
        }
    }

    /// React to a completed allocation.
    pub fn after_allocation(
        &mut self,
        protocol: &mut Protocol,
        report: &AllocationReport,
        block: u64,
        timestamp: u64,
    ) -> EpochActivity {
        let mut activity = EpochActivity::default();
        let one = protocol.treasury().config().cash_price_one;
        let ceiling = protocol.treasury().config().cash_price_ceiling().unwrap_or(one);

        if !report.accumulated_debt.is_zero() && report.cash_price < one {
            activity.bonds_bought = self.buy_bonds(protocol, report.cash_price, block, timestamp);
        }
        if !protocol.treasury().reserve().is_zero() && report.cash_price > ceiling {
            activity.bonds_redeemed = self.redeem_bonds(protocol, report.cash_price, block, timestamp);
        }
        activity.rewards_claimed = self.claim_rewards(protocol, block, timestamp);
        activity
    }

    fn buy_bonds(&mut self, protocol: &mut Protocol, price: U256, block: u64, timestamp: u64) -> U256 {
        let a = *protocol.addresses();
        let mut total = U256::zero();
        for trader in self.traders.clone() {
            if !self.rng.gen_bool(0.5) {
                continue;
            }
            let spend = match protocol
                .balance_of(&a.cash, &trader)
                .percent(self.config.bond_appetite_pct)
            {
                Ok(spend) if !spend.is_zero() => spend,
                _ => continue,
            };
            let ctx = CallContext::new(trader, block, timestamp);
            let result = protocol
                .approve(&ctx, &a.cash, a.treasury, spend)
                .and_then(|_| protocol.buy_bonds(&ctx, spend, Some(price)));
            match result {
                Ok(bonds) => total = total.saturating_add(bonds),
                Err(BasisError::NoDebtCapacity(_)) => break,
                Err(e) => tracing::debug!("Bond purchase by {} rejected: {}", trader, e),
            }
        }
        total
    }

    fn redeem_bonds(&mut self, protocol: &mut Protocol, price: U256, block: u64, timestamp: u64) -> U256 {
        let a = *protocol.addresses();
        let mut total = U256::zero();
        for trader in &self.traders {
            let held = protocol.balance_of(&a.bond, trader);
            if held.is_zero() {
                continue;
            }
            let ctx = CallContext::new(*trader, block, timestamp);
            let result = protocol
                .approve(&ctx, &a.bond, a.treasury, held)
                .and_then(|_| protocol.redeem_bonds(&ctx, held, Some(price)));
            match result {
                Ok(redeemed) => total = total.saturating_add(redeemed),
                Err(BasisError::InsufficientBudget(_)) => break,
                Err(e) => tracing::debug!("Bond redemption by {} rejected: {}", trader, e),
            }
        }
        total
    }

    fn claim_rewards(&self, protocol: &mut Protocol, block: u64, timestamp: u64) -> U256 {
        let mut total = U256::zero();
        for staker in &self.stakers {
            let ctx = CallContext::new(*staker, block, timestamp);
            for kind in [BoardroomKind::Share, BoardroomKind::Lp] {
                match protocol.boardroom_claim_reward(&ctx, kind) {
                    Ok(paid) => total = total.saturating_add(paid),
                    Err(e) => tracing::warn!("Reward claim by {} failed: {}", staker, e),
                }
            }
        }
        total
    }
}
