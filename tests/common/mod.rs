//! Shared fixture: default config, WETH at $1,000, a funded pool and venue.

#![allow(dead_code)]

use perps_credit::config::{DAI, ETH, FRAX, USDC, USDT, WBTC, WETH};
use perps_credit::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const ADMIN: Address = Address(1);
pub const ALICE: Address = Address(2);
pub const BOB: Address = Address(3);
pub const LENDER: Address = Address(4);
pub const KEEPER: Address = Address(5);
pub const LIQUIDATOR: Address = Address(6);

pub const EXECUTION_FEE: Decimal = dec!(0.0003);

pub fn q(v: Decimal) -> Quote {
    Quote::new(v)
}

pub fn p(v: Decimal) -> Price {
    Price::new_unchecked(v)
}

pub fn protocol() -> Protocol {
    let mut protocol = Protocol::simulated(ProtocolConfig::default(), ADMIN).unwrap();
    protocol.venue_mut().set_price(WETH, p(dec!(1000)));
    protocol.venue_mut().set_price(WBTC, p(dec!(20000)));
    protocol.venue_mut().set_price(ETH, p(dec!(1000)));
    protocol.venue_mut().set_keeper(KEEPER, true);

    protocol.mint(Address::VENUE, USDC, q(dec!(10000000)));
    protocol.mint(LENDER, USDC, q(dec!(100000)));
    for user in [ALICE, BOB] {
        protocol.mint(user, USDC, q(dec!(20000)));
        protocol.mint(user, USDT, q(dec!(20000)));
        protocol.mint(user, DAI, q(dec!(20000)));
        protocol.mint(user, FRAX, q(dec!(20000)));
        protocol.mint(user, WETH, q(dec!(20)));
        protocol.mint(user, WBTC, q(dec!(1)));
        protocol.mint(user, ETH, q(dec!(1)));
    }
    protocol.mint(LIQUIDATOR, ETH, q(dec!(1)));

    protocol.provide(LENDER, q(dec!(100000)), Decimal::ZERO).unwrap();
    protocol
}

pub fn set_price(protocol: &mut Protocol, v: Decimal) {
    protocol.venue_mut().set_price(WETH, p(v));
}

pub fn short_order(path: Vec<AssetId>, amount_in: Decimal) -> OpenOrder {
    OpenOrder {
        path,
        index_asset: WETH,
        amount_in: q(amount_in),
        min_out: Quote::zero(),
        size_delta: q(dec!(10000)),
        side: Side::Short,
        acceptable_price: p(dec!(990)),
        execution_fee: q(EXECUTION_FEE),
        referral: None,
    }
}

pub fn long_order(weth_in: Decimal, size: Decimal) -> OpenOrder {
    OpenOrder {
        path: vec![WETH],
        index_asset: WETH,
        amount_in: q(weth_in),
        min_out: Quote::zero(),
        size_delta: q(size),
        side: Side::Long,
        acceptable_price: p(dec!(1010)),
        execution_fee: q(EXECUTION_FEE),
        referral: None,
    }
}

/// $10,000 USDC short on WETH at $1,000, executed.
pub fn open_short(protocol: &mut Protocol, user: Address) -> SlotId {
    let receipt = protocol.open_position(user, short_order(vec![USDC], dec!(10000))).unwrap();
    protocol.execute_pending(KEEPER, KEEPER).unwrap();
    receipt.slot
}

/// 2 WETH long, $2,000 size, executed.
pub fn open_long(protocol: &mut Protocol, user: Address) -> SlotId {
    let receipt = protocol.open_position(user, long_order(dec!(2), dec!(2000))).unwrap();
    protocol.execute_pending(KEEPER, KEEPER).unwrap();
    receipt.slot
}

pub fn usdc(protocol: &Protocol, holder: Address) -> Decimal {
    protocol.balance_of(holder, USDC).value()
}
