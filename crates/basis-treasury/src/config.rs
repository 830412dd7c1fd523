// crates/basis-treasury/src/config.rs
//
// Monetary policy parameters for the Treasury.
//
// Prices are fixed-point values written as decimal strings ("1.0", "0.01")
// so a TOML file reads naturally. The price band is expressed as percentages
// of `cash_price_one`, which keeps ceiling, floor, and bond-reward threshold
// consistent when governance re-pegs the target.

use serde::{Deserialize, Serialize};

use basis_core::math::serde_units;
use basis_core::{BasisError, SafeMath, U256, UNIT};

/// Treasury policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryConfig {
    /// Target cash price in the counter asset.
    #[serde(default = "default_cash_price_one", with = "serde_units")]
    pub cash_price_one: U256,

    /// Expansion starts above this percentage of the target.
    #[serde(default = "default_ceiling_pct")]
    pub cash_price_ceiling_pct: u64,

    /// Debt accrues at or below this percentage of the target.
    #[serde(default = "default_floor_pct")]
    pub cash_price_floor_pct: u64,

    /// Bond holders are rewarded at or below this percentage of the target.
    #[serde(default = "default_bond_reward_threshold_pct")]
    pub bond_reward_threshold_pct: u64,

    /// Step by which the bond price decays per contracting epoch.
    #[serde(default = "default_bond_price_delta", with = "serde_units")]
    pub bond_price_delta: U256,

    /// Lowest bond price the decay may reach.
    #[serde(default = "default_min_bond_price", with = "serde_units")]
    pub min_bond_price: U256,

    /// Cap on seigniorage per epoch, percent of circulating supply.
    #[serde(default = "default_max_inflation_rate")]
    pub max_inflation_rate: u64,

    /// Debt added per contracting epoch, percent of circulating supply.
    #[serde(default = "default_debt_add_rate")]
    pub debt_add_rate: u64,

    /// Cap on accumulated debt, percent of circulating supply.
    #[serde(default = "default_max_debt_rate")]
    pub max_debt_rate: u64,

    /// Share of seigniorage sent to the development fund, percent.
    #[serde(default = "default_fund_allocation_rate")]
    pub fund_allocation_rate: u64,

    /// Share of the Boardroom reserve sent to the share Boardroom, percent.
    /// The rest goes to the LP Boardroom.
    #[serde(default = "default_share_boardroom_pct")]
    pub share_boardroom_pct: u64,

    /// Epoch length in seconds.
    #[serde(default = "default_period")]
    pub period: u64,

    /// Absolute time at which the Treasury opens.
    #[serde(default)]
    pub start_time: u64,

    /// Epochs skipped before the first allocation.
    #[serde(default)]
    pub start_epoch: u64,
}

fn default_cash_price_one() -> U256 {
    UNIT
}

fn default_ceiling_pct() -> u64 {
    105
}

fn default_floor_pct() -> u64 {
    95
}

fn default_bond_reward_threshold_pct() -> u64 {
    85
}

fn default_bond_price_delta() -> U256 {
    UNIT / 100
}

fn default_min_bond_price() -> U256 {
    UNIT / 2
}

fn default_max_inflation_rate() -> u64 {
    10
}

fn default_debt_add_rate() -> u64 {
    2
}

fn default_max_debt_rate() -> u64 {
    20
}

fn default_fund_allocation_rate() -> u64 {
    2
}

fn default_share_boardroom_pct() -> u64 {
    60
}

fn default_period() -> u64 {
    86_400
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            cash_price_one: default_cash_price_one(),
            cash_price_ceiling_pct: default_ceiling_pct(),
            cash_price_floor_pct: default_floor_pct(),
            bond_reward_threshold_pct: default_bond_reward_threshold_pct(),
            bond_price_delta: default_bond_price_delta(),
            min_bond_price: default_min_bond_price(),
            max_inflation_rate: default_max_inflation_rate(),
            debt_add_rate: default_debt_add_rate(),
            max_debt_rate: default_max_debt_rate(),
            fund_allocation_rate: default_fund_allocation_rate(),
            share_boardroom_pct: default_share_boardroom_pct(),
            period: default_period(),
            start_time: 0,
            start_epoch: 0,
        }
    }
}

impl TreasuryConfig {
    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    /// Returns `BasisError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<(), BasisError> {
        if self.cash_price_one.is_zero() {
            return Err(BasisError::Config("cash_price_one must be non-zero".to_string()));
        }
        if self.cash_price_ceiling_pct < 100 {
            return Err(BasisError::Config(format!(
                "cash_price_ceiling_pct {} must be at least 100",
                self.cash_price_ceiling_pct
            )));
        }
        if self.cash_price_floor_pct > 100 {
            return Err(BasisError::Config(format!(
                "cash_price_floor_pct {} must be at most 100",
                self.cash_price_floor_pct
            )));
        }
        if self.bond_reward_threshold_pct > self.cash_price_floor_pct {
            return Err(BasisError::Config(format!(
                "bond_reward_threshold_pct {} must not exceed the floor {}",
                self.bond_reward_threshold_pct, self.cash_price_floor_pct
            )));
        }
        check_bond_price_bounds(self.bond_price_delta, self.min_bond_price)?;
        check_debt_rates(self.debt_add_rate, self.max_debt_rate)?;
        for (name, value) in [
            ("max_inflation_rate", self.max_inflation_rate),
            ("fund_allocation_rate", self.fund_allocation_rate),
            ("share_boardroom_pct", self.share_boardroom_pct),
        ] {
            check_percentage(name, value)?;
        }
        if self.period == 0 {
            return Err(BasisError::Config("period must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn cash_price_ceiling(&self) -> Result<U256, BasisError> {
        self.cash_price_one.percent(self.cash_price_ceiling_pct)
    }

    pub fn cash_price_floor(&self) -> Result<U256, BasisError> {
        self.cash_price_one.percent(self.cash_price_floor_pct)
    }

    pub fn bond_reward_threshold(&self) -> Result<U256, BasisError> {
        self.cash_price_one.percent(self.bond_reward_threshold_pct)
    }
}

pub(crate) fn check_percentage(name: &str, value: u64) -> Result<(), BasisError> {
    if value > 100 {
        return Err(BasisError::Config(format!("{} {} is above 100%", name, value)));
    }
    Ok(())
}

pub(crate) fn check_debt_rates(debt_add_rate: u64, max_debt_rate: u64) -> Result<(), BasisError> {
    check_percentage("debt_add_rate", debt_add_rate)?;
    check_percentage("max_debt_rate", max_debt_rate)
}

pub(crate) fn check_bond_price_bounds(delta: U256, min_bond_price: U256) -> Result<(), BasisError> {
    if min_bond_price.is_zero() || min_bond_price > UNIT {
        return Err(BasisError::Config(
            "min_bond_price must be in (0, 1]".to_string(),
        ));
    }
    if delta > UNIT {
        return Err(BasisError::Config("bond_price_delta must be at most 1".to_string()));
    }
    Ok(())
}
