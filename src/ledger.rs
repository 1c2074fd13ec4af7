// 9.0 ledger.rs: token balances per (holder, asset). every transfer in the protocol
// goes through here so balance deltas can be asserted in tests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{Address, AssetId, Quote};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient {asset} balance for {holder}: requested {requested}, available {available}")]
    InsufficientBalance {
        holder: Address,
        asset: AssetId,
        requested: Quote,
        available: Quote,
    },
    #[error("transfer amount must be positive, got {0}")]
    InvalidAmount(Quote),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    balances: HashMap<(Address, AssetId), Decimal>,
    supply: HashMap<AssetId, Decimal>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, holder: Address, asset: AssetId) -> Quote {
        Quote::new(self.balances.get(&(holder, asset)).copied().unwrap_or(Decimal::ZERO))
    }

    pub fn total_supply(&self, asset: AssetId) -> Quote {
        Quote::new(self.supply.get(&asset).copied().unwrap_or(Decimal::ZERO))
    }

    // fixture / bridge entry point. the protocol itself never mints.
    pub fn mint(&mut self, to: Address, asset: AssetId, amount: Quote) {
        if !amount.is_positive() {
            return;
        }
        *self.balances.entry((to, asset)).or_insert(Decimal::ZERO) += amount.value();
        *self.supply.entry(asset).or_insert(Decimal::ZERO) += amount.value();
    }

    // zero amounts are a no-op so callers can pass computed splits straight through
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        asset: AssetId,
        amount: Quote,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        if amount.is_negative() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.ensure_balance(from, asset, amount)?;

        *self.balances.entry((from, asset)).or_insert(Decimal::ZERO) -= amount.value();
        *self.balances.entry((to, asset)).or_insert(Decimal::ZERO) += amount.value();
        Ok(())
    }

    pub fn ensure_balance(&self, holder: Address, asset: AssetId, amount: Quote) -> Result<(), LedgerError> {
        let available = self.balance_of(holder, asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                holder,
                asset,
                requested: amount,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const USDC: AssetId = AssetId(1);

    #[test]
    fn mint_and_transfer() {
        let mut ledger = Ledger::new();
        let alice = Address(1);
        let bob = Address(2);

        ledger.mint(alice, USDC, Quote::new(dec!(100)));
        ledger.transfer(alice, bob, USDC, Quote::new(dec!(40))).unwrap();

        assert_eq!(ledger.balance_of(alice, USDC).value(), dec!(60));
        assert_eq!(ledger.balance_of(bob, USDC).value(), dec!(40));
        assert_eq!(ledger.total_supply(USDC).value(), dec!(100));
    }

    #[test]
    fn overdraft_rejected_without_change() {
        let mut ledger = Ledger::new();
        let alice = Address(1);
        ledger.mint(alice, USDC, Quote::new(dec!(10)));

        let result = ledger.transfer(alice, Address(2), USDC, Quote::new(dec!(11)));
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(ledger.balance_of(alice, USDC).value(), dec!(10));
    }

    #[test]
    fn zero_transfer_is_noop() {
        let mut ledger = Ledger::new();
        ledger.transfer(Address(1), Address(2), USDC, Quote::zero()).unwrap();
        assert!(ledger.balance_of(Address(2), USDC).is_zero());
    }

    #[test]
    fn negative_transfer_rejected() {
        let mut ledger = Ledger::new();
        ledger.mint(Address(1), USDC, Quote::new(dec!(10)));
        let result = ledger.transfer(Address(1), Address(2), USDC, Quote::new(dec!(-1)));
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }
}
