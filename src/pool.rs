// 8.0 pool.rs: single-stable lending pool. lenders hold shares of
// (stable balance + principal lent out). only the registered credit engine can
// draw from it, and changing that registration goes through the timelock.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::PoolParams;
use crate::ledger::{Ledger, LedgerError};
use crate::timelock::{Timelock, TimelockError, TimelockState};
use crate::types::{Address, AssetId, Quote, Timestamp};

const SHARE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("shares {minted} below minimum {minimum}")]
    SlippageShares { minted: Decimal, minimum: Decimal },
    #[error("amount {amount} below minimum {minimum}")]
    SlippageAmount { amount: Quote, minimum: Quote },
    #[error("insufficient shares: have {available}, requested {requested}")]
    InsufficientShares { requested: Decimal, available: Decimal },
    #[error("not enough liquidity: requested {requested}, free {available}")]
    InsufficientLiquidity { requested: Quote, available: Quote },
    #[error("caller {0} is not the registered credit engine")]
    NotCreditEngine(Address),
    #[error("caller {0} is not the admin")]
    NotAdmin(Address),
    #[error(transparent)]
    Timelock(#[from] TimelockError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/// Recovery of one liquidated loan, as booked by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recovery {
    pub principal_recovered: Quote,
    pub income: Quote,
    pub bad_debt: Quote,
}

#[derive(Debug, Clone)]
pub struct LendingPool {
    asset: AssetId,
    decimals: u32,
    admin: Address,
    credit_engine: Address,
    initial_share_rate: Decimal,
    shares: HashMap<Address, Decimal>,
    total_shares: Decimal,
    outstanding: Quote,
    income: Quote,
    bad_debt: Quote,
    timelock: Timelock,
}

impl LendingPool {
    pub fn new(asset: AssetId, decimals: u32, params: &PoolParams, admin: Address, credit_engine: Address) -> Self {
        Self {
            asset,
            decimals,
            admin,
            credit_engine,
            initial_share_rate: params.initial_share_rate,
            shares: HashMap::new(),
            total_shares: Decimal::ZERO,
            outstanding: Quote::zero(),
            income: Quote::zero(),
            bad_debt: Quote::zero(),
            timelock: Timelock::new(params.timelock_delay_ms, params.timelock_grace_ms),
        }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn credit_engine(&self) -> Address {
        self.credit_engine
    }

    pub fn timelock_state(&self) -> TimelockState {
        self.timelock.state()
    }

    pub fn shares_of(&self, holder: Address) -> Decimal {
        self.shares.get(&holder).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_shares(&self) -> Decimal {
        self.total_shares
    }

    pub fn outstanding(&self) -> Quote {
        self.outstanding
    }

    pub fn income(&self) -> Quote {
        self.income
    }

    pub fn bad_debt(&self) -> Quote {
        self.bad_debt
    }

    pub fn free_liquidity(&self, ledger: &Ledger) -> Quote {
        ledger.balance_of(Address::POOL, self.asset)
    }

    // what lenders own: idle balance plus principal lent out
    pub fn value(&self, ledger: &Ledger) -> Quote {
        self.free_liquidity(ledger).add(self.outstanding)
    }

    pub fn shares_for(&self, ledger: &Ledger, amount: Quote) -> Decimal {
        let value = self.value(ledger);
        let raw = if self.total_shares.is_zero() || !value.is_positive() {
            amount.value() * self.initial_share_rate
        } else {
            amount.value() * self.total_shares / value.value()
        };
        raw.round_dp_with_strategy(SHARE_DECIMALS, RoundingStrategy::ToZero)
    }

    pub fn amount_for(&self, ledger: &Ledger, shares: Decimal) -> Quote {
        if self.total_shares.is_zero() {
            return Quote::zero();
        }
        Quote::new(shares * self.value(ledger).value() / self.total_shares).truncate(self.decimals)
    }

    // 8.2: deposit. fails when the minted shares come in under min_shares.
    pub fn provide_from(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        amount: Quote,
        min_shares: Decimal,
    ) -> Result<Decimal, PoolError> {
        let amount = amount.truncate(self.decimals);
        if !amount.is_positive() {
            return Err(PoolError::ZeroAmount);
        }
        let minted = self.shares_for(ledger, amount);
        if minted < min_shares || minted.is_zero() {
            return Err(PoolError::SlippageShares { minted, minimum: min_shares });
        }
        ledger.transfer(caller, Address::POOL, self.asset, amount)?;
        *self.shares.entry(caller).or_insert(Decimal::ZERO) += minted;
        self.total_shares += minted;
        Ok(minted)
    }

    // 8.3: burn shares for their pro-rata value. only idle balance can leave.
    pub fn withdraw(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        shares: Decimal,
        min_amount: Quote,
    ) -> Result<Quote, PoolError> {
        if shares <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        let available = self.shares_of(caller);
        if shares > available {
            return Err(PoolError::InsufficientShares { requested: shares, available });
        }
        let amount = self.amount_for(ledger, shares);
        if amount < min_amount {
            return Err(PoolError::SlippageAmount { amount, minimum: min_amount });
        }
        let free = self.free_liquidity(ledger);
        if amount > free {
            return Err(PoolError::InsufficientLiquidity { requested: amount, available: free });
        }
        ledger.transfer(Address::POOL, caller, self.asset, amount)?;
        if let Some(held) = self.shares.get_mut(&caller) {
            *held -= shares;
        }
        self.total_shares -= shares;
        Ok(amount)
    }

    fn ensure_credit_engine(&self, caller: Address) -> Result<(), PoolError> {
        if caller != self.credit_engine {
            return Err(PoolError::NotCreditEngine(caller));
        }
        Ok(())
    }

    pub fn check_disburse(&self, ledger: &Ledger, caller: Address, amount: Quote) -> Result<(), PoolError> {
        self.ensure_credit_engine(caller)?;
        if !amount.is_positive() {
            return Err(PoolError::ZeroAmount);
        }
        let free = self.free_liquidity(ledger);
        if amount > free {
            return Err(PoolError::InsufficientLiquidity { requested: amount, available: free });
        }
        Ok(())
    }

    // 8.4: lend out. principal counts toward pool value until it comes back.
    pub fn disburse(&mut self, ledger: &mut Ledger, caller: Address, to: Address, amount: Quote) -> Result<(), PoolError> {
        self.check_disburse(ledger, caller, amount)?;
        ledger.transfer(Address::POOL, to, self.asset, amount)?;
        self.outstanding = self.outstanding.add(amount);
        Ok(())
    }

    // inflows are not gated on the registered engine
    pub fn receive_repayment(
        &mut self,
        ledger: &mut Ledger,
        from: Address,
        principal: Quote,
        interest: Quote,
    ) -> Result<(), PoolError> {
        ledger.transfer(from, Address::POOL, self.asset, principal.add(interest))?;
        self.outstanding = self.outstanding.saturating_sub(principal);
        self.income = self.income.add(interest);
        Ok(())
    }

    // liquidation proceeds for a closed loan. principal is written off either way,
    // whatever the proceeds do not cover is bad debt.
    pub fn receive_recovery(
        &mut self,
        ledger: &mut Ledger,
        from: Address,
        principal: Quote,
        received: Quote,
    ) -> Result<Recovery, PoolError> {
        ledger.transfer(from, Address::POOL, self.asset, received)?;
        let principal_recovered = received.min(principal);
        let recovery = Recovery {
            principal_recovered,
            income: received.saturating_sub(principal),
            bad_debt: principal.sub(principal_recovered),
        };
        self.outstanding = self.outstanding.saturating_sub(principal);
        self.income = self.income.add(recovery.income);
        self.bad_debt = self.bad_debt.add(recovery.bad_debt);
        Ok(recovery)
    }

    // 8.5: admin change of the credit engine, queued then committed
    pub fn unlock_function(&mut self, caller: Address, target: Address, now: Timestamp) -> Result<TimelockState, PoolError> {
        if caller != self.admin {
            return Err(PoolError::NotAdmin(caller));
        }
        Ok(self.timelock.queue(target, now))
    }

    pub fn lock_function(&mut self, caller: Address) -> Result<(), PoolError> {
        if caller != self.admin {
            return Err(PoolError::NotAdmin(caller));
        }
        self.timelock.cancel();
        Ok(())
    }

    // setDDLContract
    pub fn set_credit_engine(&mut self, caller: Address, target: Address, now: Timestamp) -> Result<(), PoolError> {
        if caller != self.admin {
            return Err(PoolError::NotAdmin(caller));
        }
        self.timelock.commit(target, now)?;
        self.credit_engine = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DAY_MS;
    use rust_decimal_macros::dec;

    const USDC: AssetId = AssetId(1);
    const ADMIN: Address = Address(1);
    const LP: Address = Address(2);
    const LP2: Address = Address(3);

    fn pool() -> (LendingPool, Ledger) {
        let pool = LendingPool::new(USDC, 6, &PoolParams::default(), ADMIN, Address::CREDIT_ENGINE);
        let mut ledger = Ledger::new();
        ledger.mint(LP, USDC, Quote::new(dec!(10000)));
        ledger.mint(LP2, USDC, Quote::new(dec!(10000)));
        (pool, ledger)
    }

    #[test]
    fn shares_track_pool_value() {
        let (mut pool, mut ledger) = pool();
        let first = pool.provide_from(&mut ledger, LP, Quote::new(dec!(1000)), Decimal::ZERO).unwrap();
        assert_eq!(first, dec!(1000));

        // lend 500, 50 interest comes back: value 1050
        pool.disburse(&mut ledger, Address::CREDIT_ENGINE, Address(9), Quote::new(dec!(500))).unwrap();
        ledger.mint(Address(9), USDC, Quote::new(dec!(50)));
        pool.receive_repayment(&mut ledger, Address(9), Quote::new(dec!(500)), Quote::new(dec!(50)))
            .unwrap();
        assert_eq!(pool.value(&ledger).value(), dec!(1050));

        let second = pool.provide_from(&mut ledger, LP2, Quote::new(dec!(1050)), Decimal::ZERO).unwrap();
        assert_eq!(second, dec!(1000));
        assert_eq!(pool.income().value(), dec!(50));
    }

    #[test]
    fn min_shares_enforced() {
        let (mut pool, mut ledger) = pool();
        let result = pool.provide_from(&mut ledger, LP, Quote::new(dec!(100)), dec!(101));
        assert!(matches!(result, Err(PoolError::SlippageShares { .. })));
        assert_eq!(ledger.balance_of(LP, USDC).value(), dec!(10000));
    }

    #[test]
    fn deposit_cut_to_token_precision() {
        let (mut pool, mut ledger) = pool();
        let shares = pool.provide_from(&mut ledger, LP, Quote::new(dec!(100.0000009)), Decimal::ZERO).unwrap();
        assert_eq!(shares, dec!(100));
        assert_eq!(ledger.balance_of(LP, USDC).value(), dec!(9900));
        let result = pool.provide_from(&mut ledger, LP, Quote::new(dec!(0.0000001)), Decimal::ZERO);
        assert!(matches!(result, Err(PoolError::ZeroAmount)));
    }

    #[test]
    fn withdraw_limited_by_free_balance() {
        let (mut pool, mut ledger) = pool();
        pool.provide_from(&mut ledger, LP, Quote::new(dec!(1000)), Decimal::ZERO).unwrap();
        pool.disburse(&mut ledger, Address::CREDIT_ENGINE, Address(9), Quote::new(dec!(800))).unwrap();

        let result = pool.withdraw(&mut ledger, LP, dec!(1000), Quote::zero());
        assert!(matches!(result, Err(PoolError::InsufficientLiquidity { .. })));

        let out = pool.withdraw(&mut ledger, LP, dec!(200), Quote::zero()).unwrap();
        assert_eq!(out.value(), dec!(200));
        assert_eq!(pool.shares_of(LP), dec!(800));
    }

    #[test]
    fn only_credit_engine_disburses() {
        let (mut pool, mut ledger) = pool();
        pool.provide_from(&mut ledger, LP, Quote::new(dec!(1000)), Decimal::ZERO).unwrap();
        let result = pool.disburse(&mut ledger, LP, LP, Quote::new(dec!(10)));
        assert!(matches!(result, Err(PoolError::NotCreditEngine(_))));
    }

    #[test]
    fn recovery_books_bad_debt() {
        let (mut pool, mut ledger) = pool();
        pool.provide_from(&mut ledger, LP, Quote::new(dec!(1000)), Decimal::ZERO).unwrap();
        pool.disburse(&mut ledger, Address::CREDIT_ENGINE, Address(9), Quote::new(dec!(100))).unwrap();
        ledger.mint(Address::CREDIT_ENGINE, USDC, Quote::new(dec!(60)));

        let r = pool
            .receive_recovery(&mut ledger, Address::CREDIT_ENGINE, Quote::new(dec!(100)), Quote::new(dec!(60)))
            .unwrap();
        assert_eq!(r.bad_debt.value(), dec!(40));
        assert!(pool.outstanding().is_zero());
        assert_eq!(pool.value(&ledger).value(), dec!(960));
    }

    #[test]
    fn credit_engine_change_is_timelocked() {
        let (mut pool, _) = pool();
        let next = Address(0xBEEF);
        let start = Timestamp::from_millis(0);

        assert!(matches!(pool.set_credit_engine(ADMIN, next, start), Err(PoolError::Timelock(TimelockError::NotQueued))));
        assert!(matches!(pool.unlock_function(LP, next, start), Err(PoolError::NotAdmin(_))));

        pool.unlock_function(ADMIN, next, start).unwrap();
        let err = pool.set_credit_engine(ADMIN, next, start.plus(6 * DAY_MS)).unwrap_err();
        assert!(err.to_string().starts_with("function is timelocked"));
        assert_eq!(pool.credit_engine(), Address::CREDIT_ENGINE);

        pool.set_credit_engine(ADMIN, next, start.plus(7 * DAY_MS)).unwrap();
        assert_eq!(pool.credit_engine(), next);
    }
}
