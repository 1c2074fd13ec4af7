// 13.0 position.rs: venue position math. sizes and collateral are USD notionals, the way the
// venue reports them. pnl = size * (price - avg) / avg, sign flipped for shorts.
// 13.3 and 13.4 have increase/reduce at the bottom.

use crate::types::{Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("size delta {requested} exceeds position size {size}")]
    SizeExceeded { requested: Quote, size: Quote },
    #[error("collateral delta {requested} exceeds collateral {collateral}")]
    CollateralExceeded { requested: Quote, collateral: Quote },
    #[error("losses exceed collateral")]
    LossesExceedCollateral,
    #[error("fees exceed collateral")]
    FeesExceedCollateral,
    #[error("leverage {leverage} above max {max}")]
    MaxLeverageExceeded { leverage: Decimal, max: Decimal },
    #[error("position is empty")]
    EmptyPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub side: Side,
    pub size: Quote,
    pub collateral: Quote,
    pub average_price: Price,
    pub last_increased_at: Timestamp,
    pub realized_pnl: Quote,
}

impl VenuePosition {
    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    // 13.1: paper gains/losses based on current price
    pub fn delta(&self, price: Price) -> PositionDelta {
        position_delta(self.side, self.size, self.average_price, price)
    }

    pub fn unrealized_pnl(&self, price: Price) -> Quote {
        self.delta(price).signed()
    }

    pub fn leverage(&self) -> Option<Decimal> {
        if self.collateral.is_positive() {
            Some(self.size.value() / self.collateral.value())
        } else {
            None
        }
    }
}

/// Unsigned delta plus direction, as the venue reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDelta {
    pub has_profit: bool,
    pub delta: Quote,
}

impl PositionDelta {
    pub fn signed(&self) -> Quote {
        if self.has_profit {
            self.delta
        } else {
            self.delta.mul(Decimal::NEGATIVE_ONE)
        }
    }

    // zero when flat or losing
    pub fn profit(&self) -> Quote {
        if self.has_profit {
            self.delta
        } else {
            Quote::zero()
        }
    }
}

// 13.2: size * |price - avg| / avg, profit by direction
pub fn position_delta(side: Side, size: Quote, average_price: Price, price: Price) -> PositionDelta {
    if size.is_zero() {
        return PositionDelta { has_profit: false, delta: Quote::zero() };
    }
    let avg = average_price.value();
    let diff = price.value() - avg;
    let delta = size.value() * diff.abs() / avg;
    let has_profit = match side {
        Side::Long => diff > Decimal::ZERO,
        Side::Short => diff < Decimal::ZERO,
    };
    PositionDelta { has_profit, delta: Quote::new(delta) }
}

// USD sizes: units held = size / avg, so the new average is total USD over total units
pub fn next_average_price(size: Quote, average_price: Price, size_delta: Quote, price: Price) -> Price {
    if size.is_zero() {
        return price;
    }
    if size_delta.is_zero() {
        return average_price;
    }
    let units = size.value() / average_price.value() + size_delta.value() / price.value();
    Price::new_unchecked((size.value() + size_delta.value()) / units)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceOutcome {
    pub position: Option<VenuePosition>,
    // USD paid out before conversion to tokens
    pub usd_out: Quote,
    pub realized_pnl: Quote,
    pub fee: Quote,
}

// 13.3: open or add to a position. size_delta zero only adds collateral.
pub fn increase_position(
    existing: Option<&VenuePosition>,
    side: Side,
    collateral_usd: Quote,
    size_delta: Quote,
    price: Price,
    fee: Quote,
    max_leverage: Decimal,
    now: Timestamp,
) -> Result<VenuePosition, PositionError> {
    let (size, collateral, avg, realized) = match existing {
        Some(p) => (p.size, p.collateral, p.average_price, p.realized_pnl),
        None => (Quote::zero(), Quote::zero(), price, Quote::zero()),
    };

    let total_collateral = collateral.add(collateral_usd);
    if total_collateral < fee {
        return Err(PositionError::FeesExceedCollateral);
    }
    let new_collateral = total_collateral.sub(fee);
    let new_size = size.add(size_delta);
    if new_size.is_zero() {
        return Err(PositionError::EmptyPosition);
    }
    check_leverage(new_size, new_collateral, max_leverage)?;

    Ok(VenuePosition {
        side,
        size: new_size,
        collateral: new_collateral,
        average_price: next_average_price(size, avg, size_delta, price),
        last_increased_at: now,
        realized_pnl: realized,
    })
}

// 13.4: reduce or close. a full close pays out whatever collateral + pnl - fee is left.
pub fn reduce_position(
    position: &VenuePosition,
    collateral_delta: Quote,
    size_delta: Quote,
    price: Price,
    fee: Quote,
    max_leverage: Decimal,
) -> Result<ReduceOutcome, PositionError> {
    if size_delta > position.size {
        return Err(PositionError::SizeExceeded { requested: size_delta, size: position.size });
    }
    if collateral_delta > position.collateral {
        return Err(PositionError::CollateralExceeded {
            requested: collateral_delta,
            collateral: position.collateral,
        });
    }

    let delta = position.delta(price);
    let realized = if position.size.is_zero() {
        Quote::zero()
    } else {
        delta.signed().mul(size_delta.value() / position.size.value())
    };

    if size_delta == position.size {
        let net = position.collateral.add(realized).sub(fee);
        return Ok(ReduceOutcome {
            position: None,
            usd_out: net.max(Quote::zero()),
            realized_pnl: realized,
            fee,
        });
    }

    let mut collateral = position.collateral;
    let mut usd_out = Quote::zero();
    if realized.is_positive() {
        usd_out = usd_out.add(realized);
    } else {
        let loss = realized.mul(Decimal::NEGATIVE_ONE);
        if loss > collateral {
            return Err(PositionError::LossesExceedCollateral);
        }
        collateral = collateral.sub(loss);
    }

    if collateral_delta > collateral {
        return Err(PositionError::CollateralExceeded { requested: collateral_delta, collateral });
    }
    usd_out = usd_out.add(collateral_delta);
    collateral = collateral.sub(collateral_delta);

    if usd_out > fee {
        usd_out = usd_out.sub(fee);
    } else {
        if collateral < fee {
            return Err(PositionError::FeesExceedCollateral);
        }
        collateral = collateral.sub(fee);
    }

    let new_size = position.size.sub(size_delta);
    check_leverage(new_size, collateral, max_leverage)?;

    Ok(ReduceOutcome {
        position: Some(VenuePosition {
            side: position.side,
            size: new_size,
            collateral,
            average_price: position.average_price,
            last_increased_at: position.last_increased_at,
            realized_pnl: position.realized_pnl.add(realized),
        }),
        usd_out,
        realized_pnl: realized,
        fee,
    })
}

fn check_leverage(size: Quote, collateral: Quote, max_leverage: Decimal) -> Result<(), PositionError> {
    if !collateral.is_positive() {
        return Err(PositionError::FeesExceedCollateral);
    }
    let leverage = size.value() / collateral.value();
    if leverage > max_leverage {
        return Err(PositionError::MaxLeverageExceeded { leverage, max: max_leverage });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn short_10k() -> VenuePosition {
        VenuePosition {
            side: Side::Short,
            size: Quote::new(dec!(10000)),
            collateral: Quote::new(dec!(9990)),
            average_price: price(dec!(1000)),
            last_increased_at: Timestamp::from_millis(0),
            realized_pnl: Quote::zero(),
        }
    }

    #[test]
    fn short_profits_when_price_falls() {
        let pos = short_10k();
        let d = pos.delta(price(dec!(900)));
        assert!(d.has_profit);
        assert_eq!(d.delta.value(), dec!(1000));
        assert_eq!(pos.unrealized_pnl(price(dec!(1100))).value(), dec!(-1000));
    }

    #[test]
    fn flat_position_has_no_profit() {
        let d = short_10k().delta(price(dec!(1000)));
        assert!(!d.has_profit);
        assert!(d.profit().is_zero());
    }

    #[test]
    fn open_deducts_margin_fee() {
        let pos = increase_position(
            None,
            Side::Short,
            Quote::new(dec!(10000)),
            Quote::new(dec!(10000)),
            price(dec!(1000)),
            Quote::new(dec!(10)),
            dec!(50),
            Timestamp::from_millis(0),
        )
        .unwrap();
        assert_eq!(pos.size.value(), dec!(10000));
        assert_eq!(pos.collateral.value(), dec!(9990));
        assert_eq!(pos.average_price.value(), dec!(1000));
    }

    #[test]
    fn increase_averages_by_units() {
        // 1000 USD at 1000 (1 unit) + 1000 USD at 500 (2 units) = 2000 USD / 3 units
        let avg = next_average_price(Quote::new(dec!(1000)), price(dec!(1000)), Quote::new(dec!(1000)), price(dec!(500)));
        assert_eq!(avg.value().round_dp(6), dec!(666.666667));
    }

    #[test]
    fn leverage_cap_enforced() {
        let result = increase_position(
            None,
            Side::Long,
            Quote::new(dec!(100)),
            Quote::new(dec!(10000)),
            price(dec!(1000)),
            Quote::new(dec!(10)),
            dec!(50),
            Timestamp::from_millis(0),
        );
        assert!(matches!(result, Err(PositionError::MaxLeverageExceeded { .. })));
    }

    #[test]
    fn full_close_in_profit() {
        let out = reduce_position(&short_10k(), Quote::zero(), Quote::new(dec!(10000)), price(dec!(881)), Quote::new(dec!(10)), dec!(50)).unwrap();
        assert!(out.position.is_none());
        assert_eq!(out.realized_pnl.value(), dec!(1190));
        assert_eq!(out.usd_out.value(), dec!(11170));
    }

    #[test]
    fn full_close_in_loss() {
        let out = reduce_position(&short_10k(), Quote::zero(), Quote::new(dec!(10000)), price(dec!(1100)), Quote::new(dec!(10)), dec!(50)).unwrap();
        assert_eq!(out.realized_pnl.value(), dec!(-1000));
        assert_eq!(out.usd_out.value(), dec!(8980));
    }

    #[test]
    fn collateral_withdrawal_keeps_size() {
        let out = reduce_position(&short_10k(), Quote::new(dec!(500)), Quote::zero(), price(dec!(1000)), Quote::zero(), dec!(50)).unwrap();
        let pos = out.position.unwrap();
        assert_eq!(pos.size.value(), dec!(10000));
        assert_eq!(pos.collateral.value(), dec!(9490));
        assert_eq!(out.usd_out.value(), dec!(500));
    }

    #[test]
    fn partial_close_realizes_proportional_pnl() {
        let out = reduce_position(&short_10k(), Quote::zero(), Quote::new(dec!(5000)), price(dec!(900)), Quote::new(dec!(5)), dec!(50)).unwrap();
        assert_eq!(out.realized_pnl.value(), dec!(500));
        assert_eq!(out.usd_out.value(), dec!(495));
        assert_eq!(out.position.unwrap().size.value(), dec!(5000));
    }

    #[test]
    fn oversized_reduce_rejected() {
        let result = reduce_position(&short_10k(), Quote::zero(), Quote::new(dec!(20000)), price(dec!(900)), Quote::zero(), dec!(50));
        assert!(matches!(result, Err(PositionError::SizeExceeded { .. })));
    }
}
