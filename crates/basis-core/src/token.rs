// crates/basis-core/src/token.rs
//
// In-memory fungible asset bookkeeping for the Basis Protocol.
//
// The bank holds one ledger per asset (cash, bond, share, LP token), keyed by
// the asset's address. Each asset has a single operator that may mint and
// burn; the Treasury is the operator of cash, bond, and share while it is
// active. Amounts are fixed-point U256 values (see `math`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BasisError;
use crate::identity::{Address, CallContext};
use crate::math::{format_units, SafeMath, U256};

/// Ledger of a single fungible asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetLedger {
    /// Ticker, for logs and reports.
    pub symbol: String,
    /// The only address allowed to mint and burn.
    operator: Address,
    total_supply: U256,
    balances: BTreeMap<Address, U256>,
    /// owner -> spender -> remaining allowance.
    allowances: BTreeMap<Address, BTreeMap<Address, U256>>,
}

impl AssetLedger {
    fn new(symbol: &str, operator: Address) -> Self {
        Self {
            symbol: symbol.to_string(),
            operator,
            total_supply: U256::zero(),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, account: Address, amount: U256) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn debit(&mut self, account: Address, amount: U256) -> Result<(), BasisError> {
        let balance = self.balance(&account);
        if balance < amount {
            return Err(BasisError::InsufficientBalance(format!(
                "{} holds {} {} but {} is required",
                account,
                format_units(balance),
                self.symbol,
                format_units(amount)
            )));
        }
        self.set_balance(account, balance - amount);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: U256) -> Result<(), BasisError> {
        let balance = self.balance(&account).safe_add(amount)?;
        self.set_balance(account, balance);
        Ok(())
    }

    fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let allowance = self.allowance(&owner, &spender);
        if allowance < amount {
            return Err(BasisError::InsufficientAllowance(format!(
                "{} allowed {} to spend {} {} but {} is required",
                owner,
                spender,
                format_units(allowance),
                self.symbol,
                format_units(amount)
            )));
        }
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, allowance - amount);
        Ok(())
    }

    fn require_operator(&self, caller: &Address) -> Result<(), BasisError> {
        if *caller != self.operator {
            return Err(BasisError::Unauthorized(format!(
                "{} is not the operator of {}",
                caller, self.symbol
            )));
        }
        Ok(())
    }
}

/// All fungible assets known to the protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenBank {
    assets: BTreeMap<Address, AssetLedger>,
}

impl TokenBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new asset at `asset` with an initial operator.
    ///
    /// # Errors
    /// Returns `BasisError::InvalidState` if the address is already registered.
    pub fn register(
        &mut self,
        asset: Address,
        symbol: &str,
        operator: Address,
    ) -> Result<(), BasisError> {
        if self.assets.contains_key(&asset) {
            return Err(BasisError::InvalidState(format!(
                "Asset {} is already registered",
                asset
            )));
        }
        self.assets.insert(asset, AssetLedger::new(symbol, operator));
        Ok(())
    }

    fn ledger(&self, asset: &Address) -> Result<&AssetLedger, BasisError> {
        self.assets
            .get(asset)
            .ok_or_else(|| BasisError::NotFound(format!("Unknown asset {}", asset)))
    }

    fn ledger_mut(&mut self, asset: &Address) -> Result<&mut AssetLedger, BasisError> {
        self.assets
            .get_mut(asset)
            .ok_or_else(|| BasisError::NotFound(format!("Unknown asset {}", asset)))
    }

    /// Balance of `account`; zero for unknown assets.
    pub fn balance_of(&self, asset: &Address, account: &Address) -> U256 {
        self.assets
            .get(asset)
            .map(|l| l.balance(account))
            .unwrap_or_default()
    }

    /// Total supply; zero for unknown assets.
    pub fn total_supply(&self, asset: &Address) -> U256 {
        self.assets
            .get(asset)
            .map(|l| l.total_supply)
            .unwrap_or_default()
    }

    pub fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> U256 {
        self.assets
            .get(asset)
            .map(|l| l.allowance(owner, spender))
            .unwrap_or_default()
    }

    pub fn operator_of(&self, asset: &Address) -> Result<Address, BasisError> {
        Ok(self.ledger(asset)?.operator)
    }

    pub fn symbol_of(&self, asset: &Address) -> Result<&str, BasisError> {
        Ok(&self.ledger(asset)?.symbol)
    }

    /// Mint `amount` to `to`. Operator only.
    pub fn mint(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        to: Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger.require_operator(&ctx.caller)?;
        if to.is_zero() {
            return Err(BasisError::InvalidState("Cannot mint to the zero address".to_string()));
        }
        ledger.total_supply = ledger.total_supply.safe_add(amount)?;
        ledger.credit(to, amount)
    }

    /// Burn `amount` from the operator's own balance. Operator only.
    pub fn burn(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger.require_operator(&ctx.caller)?;
        ledger.debit(ctx.caller, amount)?;
        ledger.total_supply = ledger.total_supply.safe_sub(amount)?;
        Ok(())
    }

    /// Burn `amount` from `from`, spending the operator's allowance. Operator only.
    pub fn burn_from(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        from: Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger.require_operator(&ctx.caller)?;
        ledger.spend_allowance(from, ctx.caller, amount)?;
        ledger.debit(from, amount)?;
        ledger.total_supply = ledger.total_supply.safe_sub(amount)?;
        Ok(())
    }

    /// Move `amount` from the caller to `to`.
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        to: Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger.debit(ctx.caller, amount)?;
        ledger.credit(to, amount)
    }

    /// Move `amount` from `from` to `to`, spending the caller's allowance.
    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger.spend_allowance(from, ctx.caller, amount)?;
        ledger.debit(from, amount)?;
        ledger.credit(to, amount)
    }

    /// Set the caller's allowance for `spender` to exactly `amount`.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger
            .allowances
            .entry(ctx.caller)
            .or_default()
            .insert(spender, amount);
        Ok(())
    }

    /// Hand the operator role to `new_operator`. Current operator only.
    pub fn transfer_operator(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        new_operator: Address,
    ) -> Result<(), BasisError> {
        let ledger = self.ledger_mut(asset)?;
        ledger.require_operator(&ctx.caller)?;
        if new_operator.is_zero() {
            return Err(BasisError::InvalidState(
                "Operator cannot be the zero address".to_string(),
            ));
        }
        tracing::info!(
            "{} operator transferred: {} -> {}",
            ledger.symbol,
            ledger.operator,
            new_operator
        );
        ledger.operator = new_operator;
        Ok(())
    }
}
