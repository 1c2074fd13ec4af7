// 3.0 loan.rs: per-slot loan record plus the pure credit math.
// borrow limit, liquidation / border prices and the proceeds split all live here
// so they can be tested without a venue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::PositionDelta;
use crate::types::{Address, Bps, Price, Quote, RequestKey, Side, SlotId, Timestamp, MIN_PRICE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidationKind {
    // price crossed liqPrice
    Hard,
    // price crossed borderPrice
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    // a liquidation close is in flight. only one claim per slot.
    Closing {
        request_key: RequestKey,
        kind: LiquidationKind,
        liquidator: Address,
    },
}

/** 3.1: one loan per locked slot */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub owner: Address,
    pub slot: SlotId,
    pub principal: Quote,
    // interest checkpointed up to last_accrual
    pub accrued_interest: Quote,
    pub last_accrual: Timestamp,
    // rate snapshot, annual
    pub rate: Decimal,
    pub locked_at: Timestamp,
    pub status: LoanStatus,
}

impl LoanRecord {
    pub fn new(owner: Address, slot: SlotId, rate: Decimal, now: Timestamp) -> Self {
        Self {
            owner,
            slot,
            principal: Quote::zero(),
            accrued_interest: Quote::zero(),
            last_accrual: now,
            rate,
            locked_at: now,
            status: LoanStatus::Active,
        }
    }

    // simple interest since the last checkpoint
    pub fn pending_interest(&self, now: Timestamp) -> Quote {
        self.principal.mul(self.rate * now.years_since(&self.last_accrual))
    }

    pub fn interest_owed(&self, now: Timestamp) -> Quote {
        self.accrued_interest.add(self.pending_interest(now))
    }

    pub fn owed(&self, now: Timestamp) -> Quote {
        self.principal.add(self.interest_owed(now))
    }

    pub fn accrue(&mut self, now: Timestamp) {
        self.accrued_interest = self.interest_owed(now);
        self.last_accrual = now;
    }

    pub fn has_debt(&self) -> bool {
        self.principal.is_positive() || self.accrued_interest.is_positive()
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.status, LoanStatus::Closing { .. })
    }
}

// 3.2: borrow limit = share of the position's unrealized profit
pub fn max_borrow(delta: &PositionDelta, share: Bps, decimals: u32) -> Quote {
    let intrinsic = delta.profit();
    if !intrinsic.is_positive() {
        return Quote::zero();
    }
    share.of(intrinsic).truncate(decimals)
}

// price where profit == buffer. long: P (1 + buffer/S), short: P (1 - buffer/S)
fn price_for_buffer(side: Side, size: Quote, average_price: Price, buffer: Quote) -> Option<Price> {
    if !size.is_positive() || !buffer.is_positive() {
        return None;
    }
    let move_frac = buffer.value() / size.value();
    let p = match side {
        Side::Long => average_price.value() * (Decimal::ONE + move_frac),
        Side::Short => average_price.value() * (Decimal::ONE - move_frac),
    };
    Some(Price::new_unchecked(p.max(MIN_PRICE)))
}

// 3.3: liqPrice. None while nothing is owed.
pub fn liquidation_price(side: Side, size: Quote, average_price: Price, owed: Quote, ratio: Decimal) -> Option<Price> {
    price_for_buffer(side, size, average_price, owed.mul(ratio))
}

// 3.4: borderPrice. zero coefficient disables it.
pub fn border_price(
    side: Side,
    size: Quote,
    average_price: Price,
    owed: Quote,
    coef: Decimal,
    multiplier: Decimal,
) -> Option<Price> {
    if coef <= Decimal::ZERO {
        return None;
    }
    price_for_buffer(side, size, average_price, owed.mul(coef * multiplier))
}

// whichever trigger an adverse move reaches first
pub fn trigger_price(side: Side, liq: Option<Price>, border: Option<Price>) -> Option<Price> {
    match (liq, border) {
        (Some(l), Some(b)) => Some(match side {
            Side::Long => l.max(b),
            Side::Short => l.min(b),
        }),
        (l, b) => l.or(b),
    }
}

// adverse means down for longs, up for shorts. inclusive.
pub fn crossed(side: Side, price: Price, trigger: Price) -> bool {
    match side {
        Side::Long => price <= trigger,
        Side::Short => price >= trigger,
    }
}

/** 3.5: where liquidation proceeds go. always sums to amount_out. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationSplit {
    pub liquidator_fee: Quote,
    pub pool: Quote,
    pub owner: Quote,
    // part of owed the proceeds could not cover
    pub shortfall: Quote,
}

impl LiquidationSplit {
    pub fn total(&self) -> Quote {
        self.liquidator_fee.add(self.pool).add(self.owner)
    }
}

// hard: liquidator earns a cut of the profit above debt, pool keeps the rest of the profit
pub fn hard_split(amount_out: Quote, realized_pnl: Quote, owed: Quote, fee: Bps, decimals: u32) -> LiquidationSplit {
    let amount_out = amount_out.max(Quote::zero());
    let profit = realized_pnl.max(Quote::zero());
    let (fee_due, pool_due) = if profit >= owed {
        let surplus = profit.sub(owed);
        let fee_due = fee.of(surplus).truncate(decimals);
        (fee_due, owed.add(surplus).sub(fee_due))
    } else {
        (Quote::zero(), owed)
    };
    settle_split(amount_out, owed, pool_due, fee_due)
}

// border: fixed cut of the debt for the liquidator, pool takes exactly what is owed
pub fn border_split(amount_out: Quote, owed: Quote, fee: Bps, decimals: u32) -> LiquidationSplit {
    let amount_out = amount_out.max(Quote::zero());
    let fee_due = fee.of(owed).truncate(decimals);
    settle_split(amount_out, owed, owed, fee_due)
}

// pool first, then liquidator, owner gets what is left
fn settle_split(amount_out: Quote, owed: Quote, pool_due: Quote, fee_due: Quote) -> LiquidationSplit {
    let pool = pool_due.min(amount_out);
    let liquidator_fee = fee_due.min(amount_out.sub(pool));
    let owner = amount_out.sub(pool).sub(liquidator_fee);
    LiquidationSplit {
        liquidator_fee,
        pool,
        owner,
        shortfall: owed.saturating_sub(pool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetId, ProxyId, DAY_MS};
    use rust_decimal_macros::dec;

    fn q(v: Decimal) -> Quote {
        Quote::new(v)
    }

    fn p(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn slot() -> SlotId {
        SlotId::derive(ProxyId(0), AssetId(5), Side::Short)
    }

    #[test]
    fn interest_is_simple_and_annual() {
        let mut loan = LoanRecord::new(Address(1), slot(), dec!(0.10), Timestamp::from_millis(0));
        loan.principal = q(dec!(500));
        let later = Timestamp::from_millis(365 * DAY_MS);
        assert_eq!(loan.interest_owed(later).value(), dec!(50));
        assert_eq!(loan.owed(later).value(), dec!(550));

        loan.accrue(later);
        assert_eq!(loan.accrued_interest.value(), dec!(50));
        assert_eq!(loan.pending_interest(later), Quote::zero());
    }

    #[test]
    fn max_borrow_is_half_of_profit() {
        let delta = PositionDelta { has_profit: true, delta: q(dec!(1000)) };
        assert_eq!(max_borrow(&delta, Bps::new(5000), 6).value(), dec!(500));

        let losing = PositionDelta { has_profit: false, delta: q(dec!(1000)) };
        assert!(max_borrow(&losing, Bps::new(5000), 6).is_zero());
    }

    #[test]
    fn liq_price_by_direction() {
        let short = liquidation_price(Side::Short, q(dec!(10000)), p(dec!(1000)), q(dec!(1000)), dec!(1.2)).unwrap();
        assert_eq!(short.value(), dec!(880));
        let long = liquidation_price(Side::Long, q(dec!(2000)), p(dec!(1000)), q(dec!(500)), dec!(1.2)).unwrap();
        assert_eq!(long.value(), dec!(1300));
        assert!(liquidation_price(Side::Long, q(dec!(2000)), p(dec!(1000)), Quote::zero(), dec!(1.2)).is_none());
    }

    #[test]
    fn short_liq_price_floors_at_min_tick() {
        let floor = liquidation_price(Side::Short, q(dec!(100)), p(dec!(1000)), q(dec!(1000)), dec!(1.2)).unwrap();
        assert_eq!(floor.value(), MIN_PRICE);
    }

    #[test]
    fn border_price_scales_with_coef() {
        let two = border_price(Side::Short, q(dec!(10000)), p(dec!(1000)), q(dec!(50)), dec!(2), dec!(2)).unwrap();
        assert_eq!(two.value(), dec!(980));
        let three = border_price(Side::Short, q(dec!(10000)), p(dec!(1000)), q(dec!(50)), dec!(3), dec!(2)).unwrap();
        assert_eq!(three.value(), dec!(970));
        assert!(border_price(Side::Short, q(dec!(10000)), p(dec!(1000)), q(dec!(50)), Decimal::ZERO, dec!(2)).is_none());
    }

    #[test]
    fn trigger_is_first_adverse_crossing() {
        let liq = Some(p(dec!(995)));
        let border = Some(p(dec!(980)));
        assert_eq!(trigger_price(Side::Short, liq, border), border);
        assert_eq!(trigger_price(Side::Long, Some(p(dec!(900))), Some(p(dec!(950)))), Some(p(dec!(950))));
        assert_eq!(trigger_price(Side::Short, liq, None), liq);
        assert!(crossed(Side::Short, p(dec!(981)), p(dec!(980))));
        assert!(crossed(Side::Short, p(dec!(980)), p(dec!(980))));
        assert!(!crossed(Side::Long, p(dec!(1001)), p(dec!(1000))));
    }

    #[test]
    fn hard_split_with_profit() {
        let split = hard_split(q(dec!(11170)), q(dec!(1190)), q(dec!(1000)), Bps::new(1000), 6);
        assert_eq!(split.liquidator_fee.value(), dec!(19));
        assert_eq!(split.pool.value(), dec!(1171));
        assert_eq!(split.owner.value(), dec!(9980));
        assert!(split.shortfall.is_zero());
        assert_eq!(split.total().value(), dec!(11170));
    }

    #[test]
    fn hard_split_at_loss() {
        let split = hard_split(q(dec!(8980)), q(dec!(-1000)), q(dec!(1000)), Bps::new(1000), 6);
        assert!(split.liquidator_fee.is_zero());
        assert_eq!(split.pool.value(), dec!(1000));
        assert_eq!(split.owner.value(), dec!(7980));
    }

    #[test]
    fn border_split_fixed_fee() {
        let split = border_split(q(dec!(10170)), q(dec!(50)), Bps::new(1000), 6);
        assert_eq!(split.liquidator_fee.value(), dec!(5));
        assert_eq!(split.pool.value(), dec!(50));
        assert_eq!(split.owner.value(), dec!(10115));
    }

    #[test]
    fn short_proceeds_leave_shortfall() {
        let split = border_split(q(dec!(30)), q(dec!(50)), Bps::new(1000), 6);
        assert_eq!(split.pool.value(), dec!(30));
        assert!(split.liquidator_fee.is_zero());
        assert!(split.owner.is_zero());
        assert_eq!(split.shortfall.value(), dec!(20));
    }
}
