// crates/basis-oracle/src/fixed_point.rs
//
// Binary fixed-point numbers for price accumulation.
//
// UQ112x112 holds a price as a 224-bit value with 112 integer and 112
// fractional bits. Multiplying by an integer yields UQ144x112, whose
// `decode144` drops the fractional bits. The low end is truncated on purpose;
// anything that would not fit is an error rather than a silent wrap.

use serde::{Deserialize, Serialize};

use basis_core::{BasisError, U256};

/// Number of fractional bits.
pub const RESOLUTION: usize = 112;

/// Largest reserve or integer part representable in 112 bits.
pub const MAX_U112: u128 = (1u128 << 112) - 1;

/// Unsigned 112.112 binary fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Uq112x112(U256);

/// Product of a UQ112x112 and an unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Uq144x112(U256);

impl Uq112x112 {
    /// Wrap a raw 224-bit value.
    ///
    /// # Errors
    /// Returns `BasisError::Arithmetic` if `raw` needs more than 224 bits.
    pub fn from_raw(raw: U256) -> Result<Self, BasisError> {
        if raw.bits() > 224 {
            return Err(BasisError::Arithmetic(format!(
                "value {} does not fit in UQ112x112",
                raw
            )));
        }
        Ok(Self(raw))
    }

    /// Encode an integer as UQ112x112.
    pub fn encode(x: u128) -> Result<Self, BasisError> {
        if x > MAX_U112 {
            return Err(BasisError::Arithmetic(format!("{} does not fit in 112 bits", x)));
        }
        Ok(Self(U256::from(x) << RESOLUTION))
    }

    /// `numerator / denominator` as UQ112x112.
    ///
    /// # Errors
    /// Fails on a zero denominator or a numerator wider than 112 bits.
    pub fn fraction(numerator: u128, denominator: u128) -> Result<Self, BasisError> {
        if denominator == 0 {
            return Err(BasisError::Arithmetic("fixed-point division by zero".to_string()));
        }
        if numerator > MAX_U112 {
            return Err(BasisError::Arithmetic(format!(
                "numerator {} does not fit in 112 bits",
                numerator
            )));
        }
        Ok(Self((U256::from(numerator) << RESOLUTION) / U256::from(denominator)))
    }

    /// Multiply by an unsigned integer.
    ///
    /// # Errors
    /// Returns `BasisError::Arithmetic` if the product exceeds 256 bits.
    pub fn mul(&self, y: U256) -> Result<Uq144x112, BasisError> {
        self.0
            .checked_mul(y)
            .map(Uq144x112)
            .ok_or_else(|| BasisError::Arithmetic("fixed-point multiplication overflow".to_string()))
    }

    /// Integer part.
    pub fn decode(&self) -> u128 {
        (self.0 >> RESOLUTION).low_u128()
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Uq144x112 {
    /// Integer part (at most 144 bits).
    pub fn decode144(&self) -> U256 {
        self.0 >> RESOLUTION
    }
}
