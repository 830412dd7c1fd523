// crates/basis-oracle/src/oracle.rs
//
// Epoch-gated time-weighted average price oracle.
//
// Once per epoch `update` reads the pair's cumulative prices (extrapolated to
// the current block without touching the pair), divides the growth since the
// previous reading by the elapsed time, and commits the result as the new
// average. `consult` prices an amount at the last committed average.

use serde::{Deserialize, Serialize};

use basis_core::{Address, BasisError, CallContext, Epoch, PriceOracle, U256};

use crate::fixed_point::Uq112x112;
use crate::pair::{current_cumulative_prices, PairSource};

/// What an `update` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// New averages were committed over `time_elapsed` seconds.
    Committed { time_elapsed: u32 },
    /// No time had elapsed since the previous reading; nothing was committed.
    Skipped,
}

/// TWAP oracle over a single pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapOracle {
    address: Address,
    operator: Address,
    pair: Address,
    token0: Address,
    token1: Address,
    epoch: Epoch,
    price0_cumulative_last: U256,
    price1_cumulative_last: U256,
    block_timestamp_last: u32,
    price0_average: Uq112x112,
    price1_average: Uq112x112,
    /// Number of committed averages.
    commits: u64,
}

impl TwapOracle {
    /// Create an oracle reading `pair`, with updates gated every `period`
    /// seconds from `start_time`.
    ///
    /// # Errors
    /// Returns `BasisError::Oracle` if either reserve of the pair is empty.
    pub fn new<P: PairSource + ?Sized>(
        address: Address,
        operator: Address,
        pair_address: Address,
        pair: &P,
        period: u64,
        start_time: u64,
    ) -> Result<Self, BasisError> {
        let (reserve0, reserve1, block_timestamp_last) = pair.get_reserves();
        if reserve0 == 0 || reserve1 == 0 {
            return Err(BasisError::Oracle("pair has no reserves".to_string()));
        }
        Ok(Self {
            address,
            operator,
            pair: pair_address,
            token0: pair.token0(),
            token1: pair.token1(),
            epoch: Epoch::new(period, start_time, 0)?,
            price0_cumulative_last: pair.price0_cumulative_last(),
            price1_cumulative_last: pair.price1_cumulative_last(),
            block_timestamp_last,
            price0_average: Uq112x112::default(),
            price1_average: Uq112x112::default(),
            commits: 0,
        })
    }

    /// Commit new averages if the oracle's epoch allows it.
    ///
    /// A zero elapsed time still consumes the epoch but leaves the averages
    /// untouched.
    ///
    /// # Errors
    /// `NotStarted` / `EpochNotReady` from the epoch gate, or `Arithmetic` if
    /// the pair reports unusable reserves.
    pub fn update<P: PairSource + ?Sized>(
        &mut self,
        ctx: &CallContext,
        pair: &P,
    ) -> Result<UpdateOutcome, BasisError> {
        self.epoch.check_epoch(ctx.timestamp)?;
        if pair.token0() != self.token0 || pair.token1() != self.token1 {
            return Err(BasisError::Oracle(format!(
                "pair {} does not match the oracle's tokens",
                self.pair
            )));
        }

        let (price0_cumulative, price1_cumulative, block_timestamp) =
            current_cumulative_prices(pair, ctx.timestamp)?;
        let time_elapsed = block_timestamp.wrapping_sub(self.block_timestamp_last);

        if time_elapsed == 0 {
            self.epoch.mark_executed(ctx.timestamp);
            tracing::debug!("Oracle {}: no time elapsed, averages unchanged", self.address);
            return Ok(UpdateOutcome::Skipped);
        }

        let elapsed = U256::from(time_elapsed);
        let price0_average = Uq112x112::from_raw(
            price0_cumulative.overflowing_sub(self.price0_cumulative_last).0 / elapsed,
        )?;
        let price1_average = Uq112x112::from_raw(
            price1_cumulative.overflowing_sub(self.price1_cumulative_last).0 / elapsed,
        )?;

        self.price0_average = price0_average;
        self.price1_average = price1_average;
        self.price0_cumulative_last = price0_cumulative;
        self.price1_cumulative_last = price1_cumulative;
        self.block_timestamp_last = block_timestamp;
        self.commits += 1;
        self.epoch.mark_executed(ctx.timestamp);

        tracing::info!(
            "Oracle {} updated over {}s (epoch {})",
            self.address,
            time_elapsed,
            self.epoch.last_epoch()
        );
        Ok(UpdateOutcome::Committed { time_elapsed })
    }

    /// Price `amount_in` of `token` at the committed average.
    ///
    /// Returns zero until the first committed update.
    ///
    /// # Errors
    /// `Oracle` for a token outside the pair, `Arithmetic` on overflow.
    pub fn consult(&self, token: &Address, amount_in: U256) -> Result<U256, BasisError> {
        let average = if *token == self.token0 {
            self.price0_average
        } else if *token == self.token1 {
            self.price1_average
        } else {
            return Err(BasisError::Oracle(format!("invalid token {}", token)));
        };
        Ok(average.mul(amount_in)?.decode144())
    }

    /// Change the update period. Operator only.
    pub fn set_period(&mut self, ctx: &CallContext, period: u64) -> Result<(), BasisError> {
        if ctx.caller != self.operator {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the oracle operator",
                ctx.caller
            )));
        }
        self.epoch.set_period(period)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pair(&self) -> Address {
        self.pair
    }

    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn block_timestamp_last(&self) -> u32 {
        self.block_timestamp_last
    }
}

/// An oracle bound to the pair it reads, usable wherever a `PriceOracle` is
/// expected.
pub struct PairOracle<'a, P: PairSource + ?Sized> {
    oracle: &'a mut TwapOracle,
    pair: &'a P,
}

impl<'a, P: PairSource + ?Sized> PairOracle<'a, P> {
    pub fn new(oracle: &'a mut TwapOracle, pair: &'a P) -> Self {
        Self { oracle, pair }
    }
}

impl<P: PairSource + ?Sized> PriceOracle for PairOracle<'_, P> {
    fn consult(&self, token: &Address, amount_in: U256) -> Result<U256, BasisError> {
        self.oracle.consult(token, amount_in)
    }

    fn update(&mut self, ctx: &CallContext) -> Result<(), BasisError> {
        self.oracle.update(ctx, self.pair).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair::ConstantProductPair;
    use basis_core::{units, UNIT};

    const HOUR: u64 = 3_600;
    const START: u64 = 1_000_000;

    struct Fixture {
        pair: ConstantProductPair,
        oracle: TwapOracle,
        cash: Address,
        dai: Address,
        keeper: Address,
    }

    /// Pair holding the given whole-unit reserves of cash and dai.
    fn fixture(cash_reserve: u64, dai_reserve: u64) -> Fixture {
        let cash = Address::from_label("cash");
        let dai = Address::from_label("dai");
        let keeper = Address::from_label("keeper");
        let mut pair = ConstantProductPair::new(Address::from_label("pair"), cash, dai).unwrap();
        let (a0, a1) = if pair.token0() == cash {
            (units(cash_reserve), units(dai_reserve))
        } else {
            (units(dai_reserve), units(cash_reserve))
        };
        pair.add_liquidity(a0.low_u128(), a1.low_u128(), START).unwrap();
        let oracle = TwapOracle::new(
            Address::from_label("oracle"),
            keeper,
            pair.address(),
            &pair,
            HOUR,
            START,
        )
        .unwrap();
        Fixture {
            pair,
            oracle,
            cash,
            dai,
            keeper,
        }
    }

    #[test]
    fn test_new_requires_reserves() {
        let cash = Address::from_label("cash");
        let dai = Address::from_label("dai");
        let pair = ConstantProductPair::new(Address::from_label("pair"), cash, dai).unwrap();
        let result = TwapOracle::new(Address::from_label("oracle"), cash, pair.address(), &pair, HOUR, 0);
        assert!(matches!(result, Err(BasisError::Oracle(_))));
    }

    #[test]
    fn test_consult_before_update_is_zero() {
        let f = fixture(1_000, 900);
        assert_eq!(f.oracle.consult(&f.cash, UNIT).unwrap(), U256::zero());
    }

    #[test]
    fn test_update_commits_average() {
        let mut f = fixture(1_000, 900);
        let ctx = CallContext::new(f.keeper, 10, START + HOUR);
        let outcome = f.oracle.update(&ctx, &f.pair).unwrap();
        assert_eq!(outcome, UpdateOutcome::Committed { time_elapsed: HOUR as u32 });

        let price = f.oracle.consult(&f.cash, UNIT).unwrap();
        // 0.9 dai per cash, give or take the truncated low bits.
        let expected = UNIT * 9 / 10;
        assert!(price <= expected && expected - price <= U256::from(1u64));
        let inverse = f.oracle.consult(&f.dai, UNIT * 9).unwrap();
        assert!(inverse <= units(10) && units(10) - inverse <= U256::from(10u64));
    }

    #[test]
    fn test_update_once_per_epoch() {
        let mut f = fixture(1_000, 1_000);
        let ctx = CallContext::new(f.keeper, 10, START + HOUR);
        f.oracle.update(&ctx, &f.pair).unwrap();
        let again = CallContext::new(f.keeper, 11, START + HOUR + 60);
        assert!(matches!(
            f.oracle.update(&again, &f.pair),
            Err(BasisError::EpochNotReady { .. })
        ));
        assert_eq!(f.oracle.commits(), 1);
    }

    #[test]
    fn test_zero_elapsed_is_silent_noop() {
        let mut f = fixture(1_000, 1_000);
        let ctx = CallContext::new(f.keeper, 10, START + HOUR);
        f.oracle.update(&ctx, &f.pair).unwrap();
        let committed = f.oracle.consult(&f.cash, UNIT).unwrap();

        // Open a fresh epoch without moving the clock past the last reading.
        f.oracle.epoch = Epoch::new(1, START, 0).unwrap();
        let same_time = CallContext::new(f.keeper, 11, START + HOUR);
        assert_eq!(
            f.oracle.update(&same_time, &f.pair).unwrap(),
            UpdateOutcome::Skipped
        );
        assert_eq!(f.oracle.consult(&f.cash, UNIT).unwrap(), committed);
        assert_eq!(f.oracle.commits(), 1);
    }

    #[test]
    fn test_average_tracks_price_change() {
        let mut f = fixture(1_000, 1_000);
        let cash = f.cash;
        // Sell cash into the pool halfway through the window.
        f.pair
            .swap_exact_in(&cash, units(100).low_u128(), START + HOUR / 2)
            .unwrap();
        let ctx = CallContext::new(f.keeper, 10, START + HOUR);
        f.oracle.update(&ctx, &f.pair).unwrap();
        let twap = f.oracle.consult(&cash, UNIT).unwrap();
        let spot = f.pair.spot_price(&cash).unwrap();
        assert!(twap < UNIT);
        assert!(twap > spot);
    }

    #[test]
    fn test_invalid_token() {
        let f = fixture(1_000, 1_000);
        let result = f.oracle.consult(&Address::from_label("eth"), UNIT);
        assert!(matches!(result, Err(BasisError::Oracle(_))));
    }

    #[test]
    fn test_set_period_requires_operator() {
        let mut f = fixture(1_000, 1_000);
        let stranger = CallContext::new(Address::from_label("mallory"), 1, START);
        assert!(f.oracle.set_period(&stranger, 60).is_err());
    }

    #[test]
    fn test_pair_oracle_implements_price_oracle() {
        let mut f = fixture(1_000, 1_100);
        let ctx = CallContext::new(f.keeper, 10, START + HOUR);
        let cash = f.cash;
        let mut bound = PairOracle::new(&mut f.oracle, &f.pair);
        bound.update(&ctx).unwrap();
        assert!(PriceOracle::consult(&bound, &cash, UNIT).unwrap() > UNIT);
    }
}
