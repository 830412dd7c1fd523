// crates/basis-oracle/src/pair.rs
//
// Constant-product pair used as the oracle's price source.
//
// The pair only tracks what the oracle reads: two 112-bit reserves, the
// 32-bit timestamp of the last reserve change, and the two cumulative price
// accumulators. Accumulators and timestamps wrap on overflow; only
// differences between two readings are ever meaningful.

use serde::{Deserialize, Serialize};

use basis_core::{Address, BasisError, U256, UNIT};

use crate::fixed_point::{Uq112x112, MAX_U112};

/// Fee numerator for swaps (0.3% fee => 997/1000 of the input is traded).
const SWAP_FEE_NUMERATOR: u128 = 997;
const SWAP_FEE_DENOMINATOR: u128 = 1000;

/// Read-only view of a pair, as consumed by the TWAP oracle.
pub trait PairSource {
    fn token0(&self) -> Address;
    fn token1(&self) -> Address;
    /// `(reserve0, reserve1, block_timestamp_last)`.
    fn get_reserves(&self) -> (u128, u128, u32);
    fn price0_cumulative_last(&self) -> U256;
    fn price1_cumulative_last(&self) -> U256;
}

/// Block timestamp truncated to 32 bits.
pub fn block_timestamp(now: u64) -> u32 {
    (now % (1u64 << 32)) as u32
}

/// Cumulative prices as they would read at `now`, without touching the pair.
///
/// If the reserves have not changed since the pair last accumulated, the
/// accumulators are extrapolated with the current reserve ratio over the
/// elapsed time. Returns `(price0_cumulative, price1_cumulative, timestamp)`.
pub fn current_cumulative_prices<P: PairSource + ?Sized>(
    pair: &P,
    now: u64,
) -> Result<(U256, U256, u32), BasisError> {
    let timestamp = block_timestamp(now);
    let mut price0_cumulative = pair.price0_cumulative_last();
    let mut price1_cumulative = pair.price1_cumulative_last();

    let (reserve0, reserve1, timestamp_last) = pair.get_reserves();
    if timestamp_last != timestamp {
        let elapsed = U256::from(timestamp.wrapping_sub(timestamp_last));
        let price0 = Uq112x112::fraction(reserve1, reserve0)?;
        let price1 = Uq112x112::fraction(reserve0, reserve1)?;
        price0_cumulative = price0_cumulative.overflowing_add(price0.raw() * elapsed).0;
        price1_cumulative = price1_cumulative.overflowing_add(price1.raw() * elapsed).0;
    }
    Ok((price0_cumulative, price1_cumulative, timestamp))
}

/// In-memory constant-product pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantProductPair {
    address: Address,
    token0: Address,
    token1: Address,
    reserve0: u128,
    reserve1: u128,
    block_timestamp_last: u32,
    price0_cumulative_last: U256,
    price1_cumulative_last: U256,
}

impl ConstantProductPair {
    /// Create an empty pair. Tokens are sorted so `token0 < token1`.
    pub fn new(address: Address, token_a: Address, token_b: Address) -> Result<Self, BasisError> {
        if token_a == token_b {
            return Err(BasisError::InvalidState("Pair tokens must differ".to_string()));
        }
        let (token0, token1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Ok(Self {
            address,
            token0,
            token1,
            reserve0: 0,
            reserve1: 0,
            block_timestamp_last: 0,
            price0_cumulative_last: U256::zero(),
            price1_cumulative_last: U256::zero(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Accumulate prices for the time since the last update, then store the
    /// new reserves.
    fn update(&mut self, balance0: u128, balance1: u128, now: u64) -> Result<(), BasisError> {
        if balance0 > MAX_U112 || balance1 > MAX_U112 {
            return Err(BasisError::Arithmetic("Pair reserve overflow".to_string()));
        }
        let timestamp = block_timestamp(now);
        let elapsed = timestamp.wrapping_sub(self.block_timestamp_last);
        if elapsed > 0 && self.reserve0 != 0 && self.reserve1 != 0 {
            let elapsed = U256::from(elapsed);
            let price0 = Uq112x112::fraction(self.reserve1, self.reserve0)?;
            let price1 = Uq112x112::fraction(self.reserve0, self.reserve1)?;
            self.price0_cumulative_last = self
                .price0_cumulative_last
                .overflowing_add(price0.raw() * elapsed)
                .0;
            self.price1_cumulative_last = self
                .price1_cumulative_last
                .overflowing_add(price1.raw() * elapsed)
                .0;
        }
        self.reserve0 = balance0;
        self.reserve1 = balance1;
        self.block_timestamp_last = timestamp;
        Ok(())
    }

    /// Add liquidity in `token0`/`token1` order.
    pub fn add_liquidity(&mut self, amount0: u128, amount1: u128, now: u64) -> Result<(), BasisError> {
        let balance0 = self
            .reserve0
            .checked_add(amount0)
            .ok_or_else(|| BasisError::Arithmetic("Pair reserve overflow".to_string()))?;
        let balance1 = self
            .reserve1
            .checked_add(amount1)
            .ok_or_else(|| BasisError::Arithmetic("Pair reserve overflow".to_string()))?;
        self.update(balance0, balance1, now)
    }

    /// Swap an exact input of `token_in` for the other token. Returns the
    /// output amount after the 0.3% fee.
    pub fn swap_exact_in(
        &mut self,
        token_in: &Address,
        amount_in: u128,
        now: u64,
    ) -> Result<u128, BasisError> {
        if amount_in == 0 {
            return Err(BasisError::InvalidAmount("Swap input must be non-zero".to_string()));
        }
        let zero_for_one = self.side_of(token_in)?;
        let (reserve_in, reserve_out) = if zero_for_one {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(BasisError::InvalidState("Pair has no liquidity".to_string()));
        }

        let amount_in_with_fee = U256::from(amount_in) * U256::from(SWAP_FEE_NUMERATOR);
        let numerator = amount_in_with_fee * U256::from(reserve_out);
        let denominator =
            U256::from(reserve_in) * U256::from(SWAP_FEE_DENOMINATOR) + amount_in_with_fee;
        let amount_out = (numerator / denominator).low_u128();
        if amount_out == 0 {
            return Err(BasisError::InvalidAmount("Swap output rounds to zero".to_string()));
        }

        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or_else(|| BasisError::Arithmetic("Pair reserve overflow".to_string()))?;
        let new_out = reserve_out - amount_out;
        if zero_for_one {
            self.update(new_in, new_out, now)?;
        } else {
            self.update(new_out, new_in, now)?;
        }
        Ok(amount_out)
    }

    /// Instantaneous price of `token` in units of the other token, scaled by 10^18.
    pub fn spot_price(&self, token: &Address) -> Result<U256, BasisError> {
        let (reserve_token, reserve_other) = if self.side_of(token)? {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        };
        if reserve_token == 0 {
            return Ok(U256::zero());
        }
        Ok(U256::from(reserve_other) * UNIT / U256::from(reserve_token))
    }

    /// `true` when `token` is `token0`.
    fn side_of(&self, token: &Address) -> Result<bool, BasisError> {
        if *token == self.token0 {
            Ok(true)
        } else if *token == self.token1 {
            Ok(false)
        } else {
            Err(BasisError::NotFound(format!("{} is not part of this pair", token)))
        }
    }
}

impl PairSource for ConstantProductPair {
    fn token0(&self) -> Address {
        self.token0
    }

    fn token1(&self) -> Address {
        self.token1
    }

    fn get_reserves(&self) -> (u128, u128, u32) {
        (self.reserve0, self.reserve1, self.block_timestamp_last)
    }

    fn price0_cumulative_last(&self) -> U256 {
        self.price0_cumulative_last
    }

    fn price1_cumulative_last(&self) -> U256 {
        self.price1_cumulative_last
    }
}
