// crates/basis-keeper/src/report.rs
//
// Per-epoch JSON report printed by the keeper.

use serde::Serialize;

use basis_core::{format_units, U256};
use basis_treasury::AllocationReport;

use crate::market::EpochActivity;

/// One line of keeper output. Amounts are decimal strings.
#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    pub epoch: u64,
    pub block: u64,
    pub timestamp: u64,
    pub regime: &'static str,
    pub twap: String,
    pub spot: String,
    pub circulating_supply: String,
    pub seigniorage: String,
    pub fund: String,
    pub treasury_reserve: String,
    pub share_boardroom: String,
    pub lp_boardroom: String,
    pub bond_reward: String,
    pub debt: String,
    pub bond_price: String,
    pub redemption_reserve: String,
    pub bonds_bought: String,
    pub bonds_redeemed: String,
    pub rewards_claimed: String,
}

impl EpochReport {
    pub fn new(
        allocation: &AllocationReport,
        activity: &EpochActivity,
        block: u64,
        timestamp: u64,
        bearish: bool,
        spot: U256,
        redemption_reserve: U256,
    ) -> Self {
        Self {
            epoch: allocation.epoch,
            block,
            timestamp,
            regime: if bearish { "bearish" } else { "bullish" },
            twap: format_units(allocation.cash_price),
            spot: format_units(spot),
            circulating_supply: format_units(allocation.circulating_supply),
            seigniorage: format_units(allocation.seigniorage),
            fund: format_units(allocation.fund_reserve),
            treasury_reserve: format_units(allocation.treasury_reserve),
            share_boardroom: format_units(allocation.share_boardroom_reserve),
            lp_boardroom: format_units(allocation.lp_boardroom_reserve),
            bond_reward: format_units(allocation.bond_reward),
            debt: format_units(allocation.accumulated_debt),
            bond_price: format_units(allocation.bond_price),
            redemption_reserve: format_units(redemption_reserve),
            bonds_bought: format_units(activity.bonds_bought),
            bonds_redeemed: format_units(activity.bonds_redeemed),
            rewards_claimed: format_units(activity.rewards_claimed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis_core::{units, UNIT};

    #[test]
    fn test_report_uses_decimal_strings() {
        let allocation = AllocationReport {
            epoch: 3,
            cash_price: UNIT + UNIT / 10,
            seigniorage: units(250),
            ..AllocationReport::default()
        };
        let report = EpochReport::new(
            &allocation,
            &EpochActivity::default(),
            40,
            4_000,
            false,
            UNIT,
            U256::zero(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["twap"], "1.1");
        assert_eq!(json["seigniorage"], "250");
        assert_eq!(json["regime"], "bullish");
        assert_eq!(json["epoch"], 3);
    }
}
