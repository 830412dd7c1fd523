// crates/basis-treasury/src/fund.rs
//
// Development fund receiving its share of every seigniorage allocation.
//
// Deposits are pulled from the depositor with an allowance and logged with
// their memo; only the fund operator can move assets out again.

use serde::{Deserialize, Serialize};

use basis_core::{format_units, Address, BasisError, CallContext, FundSink, TokenBank, U256};

/// Direction of a fund movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundFlow {
    Deposit,
    Withdrawal,
}

/// One entry of the fund's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundRecord {
    pub flow: FundFlow,
    pub asset: Address,
    /// Depositor for deposits, recipient for withdrawals.
    pub counterparty: Address,
    pub amount: U256,
    pub memo: String,
    pub block_number: u64,
}

/// Simple operator-controlled fund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleFund {
    address: Address,
    operator: Address,
    history: Vec<FundRecord>,
}

impl SimpleFund {
    pub fn new(address: Address, operator: Address) -> Self {
        Self {
            address,
            operator,
            history: Vec::new(),
        }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn history(&self) -> &[FundRecord] {
        &self.history
    }

    /// Total deposited of `asset` over the fund's lifetime.
    pub fn total_deposited(&self, asset: &Address) -> U256 {
        self.history
            .iter()
            .filter(|r| r.flow == FundFlow::Deposit && r.asset == *asset)
            .fold(U256::zero(), |acc, r| acc.saturating_add(r.amount))
    }

    /// Send `amount` of `asset` to `to`. Operator only.
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        asset: &Address,
        to: Address,
        amount: U256,
        reason: &str,
    ) -> Result<(), BasisError> {
        if ctx.caller != self.operator {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the operator of fund {}",
                ctx.caller, self.address
            )));
        }
        if amount.is_zero() {
            return Err(BasisError::InvalidAmount("Cannot withdraw 0 from the fund".to_string()));
        }
        bank.transfer(&ctx.forward(self.address), asset, to, amount)?;
        self.history.push(FundRecord {
            flow: FundFlow::Withdrawal,
            asset: *asset,
            counterparty: to,
            amount,
            memo: reason.to_string(),
            block_number: ctx.block_number,
        });
        tracing::info!(fund = %self.address, to = %to, amount = %format_units(amount), reason, "Fund withdrawal");
        Ok(())
    }
}

impl FundSink for SimpleFund {
    fn address(&self) -> Address {
        self.address
    }

    fn deposit(
        &mut self,
        ctx: &CallContext,
        bank: &mut TokenBank,
        asset: &Address,
        amount: U256,
        memo: &str,
    ) -> Result<(), BasisError> {
        bank.transfer_from(&ctx.forward(self.address), asset, ctx.caller, self.address, amount)?;
        self.history.push(FundRecord {
            flow: FundFlow::Deposit,
            asset: *asset,
            counterparty: ctx.caller,
            amount,
            memo: memo.to_string(),
            block_number: ctx.block_number,
        });
        tracing::info!(fund = %self.address, from = %ctx.caller, amount = %format_units(amount), memo, "Fund deposit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis_core::units;

    fn setup() -> (TokenBank, SimpleFund, Address, Address, Address) {
        let minter = Address::from_label("minter");
        let cash = Address::from_label("cash");
        let depositor = Address::from_label("treasury");
        let mut bank = TokenBank::new();
        bank.register(cash, "BAC", minter).unwrap();
        bank.mint(&CallContext::new(minter, 1, 1), &cash, depositor, units(10))
            .unwrap();
        let fund = SimpleFund::new(Address::from_label("fund"), Address::from_label("dev"));
        (bank, fund, cash, depositor, minter)
    }

    #[test]
    fn test_deposit_requires_allowance() {
        let (mut bank, mut fund, cash, depositor, _) = setup();
        let ctx = CallContext::new(depositor, 2, 2);
        assert!(fund.deposit(&ctx, &mut bank, &cash, units(1), "memo").is_err());

        bank.approve(&ctx, &cash, fund.address(), units(4)).unwrap();
        fund.deposit(&ctx, &mut bank, &cash, units(4), "Treasury: Seigniorage Allocation")
            .unwrap();
        assert_eq!(bank.balance_of(&cash, &fund.address()), units(4));
        assert_eq!(fund.total_deposited(&cash), units(4));
        assert_eq!(fund.history()[0].memo, "Treasury: Seigniorage Allocation");
    }

    #[test]
    fn test_withdraw_operator_only() {
        let (mut bank, mut fund, cash, depositor, _) = setup();
        let ctx = CallContext::new(depositor, 2, 2);
        bank.approve(&ctx, &cash, fund.address(), units(4)).unwrap();
        fund.deposit(&ctx, &mut bank, &cash, units(4), "seed").unwrap();

        let dev = fund.operator();
        let grantee = Address::from_label("grantee");
        assert!(fund
            .withdraw(&ctx, &mut bank, &cash, grantee, units(1), "grant")
            .is_err());
        fund.withdraw(&CallContext::new(dev, 3, 3), &mut bank, &cash, grantee, units(3), "grant")
            .unwrap();
        assert_eq!(bank.balance_of(&cash, &grantee), units(3));
        assert_eq!(fund.history().len(), 2);
        assert_eq!(fund.total_deposited(&cash), units(4));
    }
}
