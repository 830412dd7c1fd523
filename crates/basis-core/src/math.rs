// crates/basis-core/src/math.rs
//
// Fixed-point arithmetic for the Basis Protocol.
//
// Every amount and price is a U256 scaled by 10^18 (`UNIT`): 1.0 cash is
// 1_000_000_000_000_000_000. All arithmetic on protocol state goes through
// `SafeMath`, which turns overflow, underflow, and division by zero into
// `BasisError::Arithmetic` instead of wrapping or panicking.

pub use primitive_types::U256;

use crate::error::BasisError;

/// Number of decimal places in the fixed-point representation.
pub const DECIMALS: usize = 18;

/// 1.0 in fixed-point (10^18).
pub const UNIT: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// Whole units to fixed-point. `units(3)` is 3.0.
pub fn units(whole: u64) -> U256 {
    // u64::MAX * 10^18 < 2^128, so this never overflows a U256.
    U256::from(whole) * UNIT
}

/// Checked arithmetic returning protocol errors.
pub trait SafeMath: Sized {
    fn safe_add(self, rhs: Self) -> Result<Self, BasisError>;
    fn safe_sub(self, rhs: Self) -> Result<Self, BasisError>;
    fn safe_mul(self, rhs: Self) -> Result<Self, BasisError>;
    fn safe_div(self, rhs: Self) -> Result<Self, BasisError>;

    /// `self * mul / div`, truncating.
    fn mul_div(self, mul: Self, div: Self) -> Result<Self, BasisError> {
        self.safe_mul(mul)?.safe_div(div)
    }

    /// `self * pct / 100`, truncating.
    fn percent(self, pct: u64) -> Result<Self, BasisError>;
}

impl SafeMath for U256 {
    fn safe_add(self, rhs: Self) -> Result<Self, BasisError> {
        self.checked_add(rhs)
            .ok_or_else(|| BasisError::Arithmetic(format!("addition overflow: {} + {}", self, rhs)))
    }

    fn safe_sub(self, rhs: Self) -> Result<Self, BasisError> {
        self.checked_sub(rhs).ok_or_else(|| {
            BasisError::Arithmetic(format!("subtraction underflow: {} - {}", self, rhs))
        })
    }

    fn safe_mul(self, rhs: Self) -> Result<Self, BasisError> {
        self.checked_mul(rhs).ok_or_else(|| {
            BasisError::Arithmetic(format!("multiplication overflow: {} * {}", self, rhs))
        })
    }

    fn safe_div(self, rhs: Self) -> Result<Self, BasisError> {
        self.checked_div(rhs)
            .ok_or_else(|| BasisError::Arithmetic(format!("division by zero: {} / 0", self)))
    }

    fn percent(self, pct: u64) -> Result<Self, BasisError> {
        self.mul_div(U256::from(pct), U256::from(100u64))
    }
}

/// Parse a decimal string ("1.05", "250", "0.000001") into fixed-point.
///
/// # Errors
/// Returns `BasisError::Config` for empty input, non-digit characters, more
/// than 18 fractional digits, or values that do not fit in a U256.
pub fn parse_units(s: &str) -> Result<U256, BasisError> {
    let s = s.trim().replace('_', "");
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(BasisError::Config(format!("Cannot parse '{}' as an amount", s)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(BasisError::Config(format!("Cannot parse '{}' as an amount", s)));
    }
    if frac.len() > DECIMALS {
        return Err(BasisError::Config(format!(
            "'{}' has more than {} decimal places",
            s, DECIMALS
        )));
    }

    let whole_value = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole)
            .map_err(|e| BasisError::Config(format!("Cannot parse '{}': {:?}", s, e)))?
    };
    let frac_value = if frac.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{:0<width$}", frac, width = DECIMALS);
        U256::from_dec_str(&padded)
            .map_err(|e| BasisError::Config(format!("Cannot parse '{}': {:?}", s, e)))?
    };

    whole_value
        .safe_mul(UNIT)?
        .safe_add(frac_value)
        .map_err(|_| BasisError::Config(format!("'{}' does not fit in 256 bits", s)))
}

/// Format a fixed-point value as a decimal string, trimming trailing zeros.
pub fn format_units(value: U256) -> String {
    let whole = value / UNIT;
    let frac = (value % UNIT).low_u64();
    if frac == 0 {
        whole.to_string()
    } else {
        let frac_str = format!("{:018}", frac);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }
}

/// Serde adapter storing fixed-point values as decimal strings.
///
/// Use with `#[serde(with = "basis_core::math::serde_units")]` so configs can
/// say `cash_price_ceiling = "1.05"`.
pub mod serde_units {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_units, parse_units, U256};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_units(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_units(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_is_ten_to_the_eighteen() {
        assert_eq!(UNIT, U256::exp10(18));
        assert_eq!(units(2), U256::exp10(18) * 2);
    }

    #[test]
    fn test_safe_sub_underflow_fails() {
        let err = U256::from(1u64).safe_sub(U256::from(2u64)).unwrap_err();
        assert!(matches!(err, BasisError::Arithmetic(_)));
    }

    #[test]
    fn test_safe_mul_overflow_fails() {
        assert!(U256::MAX.safe_mul(U256::from(2u64)).is_err());
    }

    #[test]
    fn test_safe_div_by_zero_fails() {
        assert!(UNIT.safe_div(U256::zero()).is_err());
    }

    #[test]
    fn test_mul_div_and_percent() {
        assert_eq!(units(10).mul_div(U256::from(3u64), U256::from(2u64)).unwrap(), units(15));
        assert_eq!(units(200).percent(2).unwrap(), units(4));
        assert_eq!(U256::from(99u64).percent(1).unwrap(), U256::zero());
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1").unwrap(), UNIT);
        assert_eq!(parse_units("1.05").unwrap(), UNIT * 105 / 100);
        assert_eq!(parse_units("0.5").unwrap(), UNIT / 2);
        assert_eq!(parse_units(".25").unwrap(), UNIT / 4);
        assert_eq!(parse_units("1_000").unwrap(), units(1_000));
        assert_eq!(parse_units("0.000000000000000001").unwrap(), U256::one());
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_units("").is_err());
        assert!(parse_units("1.2.3").is_err());
        assert!(parse_units("-1").is_err());
        assert!(parse_units("0.0000000000000000001").is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(units(42)), "42");
        assert_eq!(format_units(UNIT * 15 / 10), "1.5");
        assert_eq!(format_units(U256::zero()), "0");
        assert_eq!(format_units(U256::one()), "0.000000000000000001");
    }
}
