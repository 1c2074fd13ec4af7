//! Account router behaviour through the protocol facade: collateral paths,
//! permissions, long/short exclusivity and slot token ownership.

mod common;

use common::*;
use perps_credit::config::{DAI, FRAX, USDC, USDT, WBTC, WETH};
use perps_credit::*;
use rust_decimal_macros::dec;

#[test]
fn short_collateral_paths_converge_to_one_position() {
    let cases = vec![
        (vec![USDC], dec!(10000)),
        (vec![USDT], dec!(10000)),
        (vec![DAI], dec!(10000)),
        (vec![FRAX, USDC], dec!(10000)),
        (vec![WETH], dec!(10)),
        (vec![WBTC], dec!(0.5)),
    ];
    for (path, amount_in) in cases {
        let mut protocol = protocol();
        let receipt = protocol.open_position(ALICE, short_order(path.clone(), amount_in)).unwrap();
        assert_eq!(*receipt.path.last().unwrap(), USDC, "path {:?}", path);

        protocol.execute_pending(KEEPER, KEEPER).unwrap();
        let position = protocol.slot_position(receipt.slot).unwrap();
        assert_eq!(position.size.value(), dec!(10000), "path {:?}", path);
        assert_eq!(position.average_price.value(), dec!(1000), "path {:?}", path);
        assert!(position.collateral.value() > dec!(9900), "path {:?}", path);
    }
}

#[test]
fn short_rejects_foreign_settlement_stable() {
    let mut protocol = protocol();
    let before = usdc(&protocol, ALICE);

    let err = protocol.open_position(ALICE, short_order(vec![DAI, USDT], dec!(10000))).unwrap_err();
    assert_eq!(err.to_string(), "short collateral must be the stable asset");
    let err = protocol.open_position(ALICE, short_order(vec![WETH, USDT], dec!(10))).unwrap_err();
    assert_eq!(err.to_string(), "short collateral must be the stable asset");

    assert_eq!(usdc(&protocol, ALICE), before);
    assert!(protocol.proxy_of(ALICE).is_none());
}

#[test]
fn long_collateral_must_be_index() {
    let mut protocol = protocol();
    let mut order = long_order(dec!(2000), dec!(2000));
    order.path = vec![USDC, USDT];
    let err = protocol.open_position(ALICE, order).unwrap_err();
    assert!(matches!(err, ProtocolError::Router(RouterError::LongCollateralNotIndex)));
}

#[test]
fn long_single_foreign_asset_gets_swap_hop() {
    let mut protocol = protocol();
    let mut order = long_order(dec!(2000), dec!(2000));
    order.path = vec![USDC];
    let receipt = protocol.open_position(ALICE, order).unwrap();
    assert_eq!(receipt.path, vec![USDC, WETH]);
}

#[test]
fn long_opens_with_index_collateral() {
    let mut protocol = protocol();
    let slot = open_long(&mut protocol, ALICE);
    let position = protocol.slot_position(slot).unwrap();
    assert_eq!(position.size.value(), dec!(2000));
    assert_eq!(position.collateral.value(), dec!(1998));
    assert_eq!(protocol.balance_of(ALICE, WETH).value(), dec!(18));
}

#[test]
fn permission_toggle_stops_new_opens() {
    let mut protocol = protocol();
    protocol.set_permission(ADMIN, WETH, Side::Short, false).unwrap();

    let err = protocol.open_position(ALICE, short_order(vec![USDC], dec!(10000))).unwrap_err();
    assert_eq!(err.to_string(), "trading stopped");
    // the other direction is unaffected
    protocol.open_position(ALICE, long_order(dec!(2), dec!(2000))).unwrap();

    let err = protocol.set_permission(ALICE, WETH, Side::Short, true).unwrap_err();
    assert!(matches!(err, ProtocolError::Router(RouterError::NotAdmin(_))));

    protocol.set_permission(ADMIN, WETH, Side::Short, true).unwrap();
    assert!(protocol.router().is_enabled(WETH, Side::Short));
}

#[test]
fn opposite_direction_blocked_while_pending() {
    let mut protocol = protocol();
    protocol.open_position(ALICE, short_order(vec![USDC], dec!(10000))).unwrap();

    // nothing settled yet, the pending increase alone blocks the long
    let err = protocol.open_position(ALICE, long_order(dec!(2), dec!(2000))).unwrap_err();
    assert_eq!(err.to_string(), "cannot hold long and short simultaneously");

    protocol.execute_pending(KEEPER, KEEPER).unwrap();
    let err = protocol.open_position(ALICE, long_order(dec!(2), dec!(2000))).unwrap_err();
    assert_eq!(err.to_string(), "cannot hold long and short simultaneously");

    // other users are independent
    protocol.open_position(BOB, long_order(dec!(2), dec!(2000))).unwrap();
}

#[test]
fn cancelled_increase_frees_the_direction() {
    let mut protocol = protocol();
    let mut order = short_order(vec![USDC], dec!(10000));
    order.acceptable_price = p(dec!(1010));
    protocol.open_position(ALICE, order).unwrap();

    let outcomes = protocol.execute_pending(KEEPER, KEEPER).unwrap();
    assert!(!outcomes[0].report.is_executed());
    assert_eq!(usdc(&protocol, ALICE), dec!(20000));

    protocol.open_position(ALICE, long_order(dec!(2), dec!(2000))).unwrap();
}

#[test]
fn proxy_created_once() {
    let mut protocol = protocol();
    let proxy = protocol.create_position_proxy(ALICE).unwrap();
    assert!(proxy.is_proxy());
    let err = protocol.create_position_proxy(ALICE).unwrap_err();
    assert_eq!(err.to_string(), "already exists");

    let receipt = protocol.open_position(ALICE, short_order(vec![USDC], dec!(10000))).unwrap();
    assert!(!receipt.proxy_created);
    assert_eq!(receipt.proxy, proxy);
}

#[test]
fn first_open_mints_slot_token() {
    let mut protocol = protocol();
    let receipt = protocol.open_position(ALICE, short_order(vec![USDC], dec!(10000))).unwrap();
    assert!(receipt.minted);
    assert!(receipt.proxy_created);
    assert_eq!(protocol.tokens().owner_of(receipt.slot).unwrap(), ALICE);
    assert_eq!(protocol.slot_of(ALICE, WETH, Side::Short), Some(receipt.slot));

    let minted = protocol
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::TokenMinted(_)))
        .count();
    assert_eq!(minted, 1);

    protocol.execute_pending(KEEPER, KEEPER).unwrap();
    let again = protocol.open_position(ALICE, short_order(vec![USDC], dec!(1000))).unwrap();
    assert!(!again.minted);
    assert_eq!(again.slot, receipt.slot);
}

#[test]
fn only_token_holder_closes() {
    let mut protocol = protocol();
    let slot = open_short(&mut protocol, ALICE);
    let params = CloseParams {
        path: vec![],
        collateral_delta: Quote::zero(),
        size_delta: q(dec!(10000)),
        receiver: BOB,
        acceptable_price: p(dec!(1010)),
        min_out: Quote::zero(),
        execution_fee: q(EXECUTION_FEE),
    };

    let err = protocol.close_position(BOB, slot, params.clone()).unwrap_err();
    assert_eq!(err.to_string(), "not the owner of the position");

    protocol.transfer_token(ALICE, BOB, slot).unwrap();
    protocol.close_position(BOB, slot, params).unwrap();
    let outcomes = protocol.execute_pending(KEEPER, KEEPER).unwrap();
    assert!(outcomes[0].report.is_executed());
    assert!(protocol.slot_position(slot).is_none());
    // 9990 collateral back, less the 10 close fee
    assert_eq!(usdc(&protocol, BOB), dec!(29980));
}

#[test]
fn revoked_proxy_cannot_open() {
    let mut protocol = protocol();
    protocol.create_position_proxy(ALICE).unwrap();
    protocol.set_proxy_approval(ALICE, false).unwrap();
    let err = protocol.open_position(ALICE, short_order(vec![USDC], dec!(10000))).unwrap_err();
    assert!(matches!(err, ProtocolError::Router(RouterError::Proxy(ProxyError::NotApproved(_)))));
    assert_eq!(usdc(&protocol, ALICE), dec!(20000));
}
