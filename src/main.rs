//! Perp credit line simulation.
//!
//! Walks the protocol lifecycle against the in-memory venue: open through a proxy,
//! lock the slot token, borrow against unrealized profit, get liquidated.

use perps_credit::config::{ETH, USDC, WETH};
use perps_credit::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

const ADMIN: Address = Address(1);
const ALICE: Address = Address(2);
const LENDER: Address = Address(3);
const KEEPER: Address = Address(4);
const LIQUIDATOR: Address = Address(5);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Perp Credit Simulation");
    println!("WETH shorts and longs, USDC credit line, single lending pool\n");

    let scenarios: [(&str, fn() -> Result<(), ProtocolError>); 3] = [
        ("hard liquidation", scenario_1_hard_liquidation),
        ("border liquidation", scenario_2_border_liquidation),
        ("pool timelock", scenario_3_pool_timelock),
    ];
    for (name, run) in scenarios {
        if let Err(e) = run() {
            eprintln!("  scenario {} failed: {}", name, e);
            std::process::exit(1);
        }
    }

    println!("\nAll simulations completed successfully.");
}

fn price(v: Decimal) -> Price {
    Price::new_unchecked(v)
}

fn setup() -> Result<Protocol, ProtocolError> {
    let mut protocol = Protocol::simulated(ProtocolConfig::default(), ADMIN)?;
    protocol.set_time(Timestamp::now());
    protocol.venue_mut().set_price(WETH, price(dec!(1000)));
    protocol.venue_mut().set_price(ETH, price(dec!(1000)));
    protocol.venue_mut().set_keeper(KEEPER, true);

    protocol.mint(Address::VENUE, USDC, Quote::new(dec!(1000000)));
    protocol.mint(LENDER, USDC, Quote::new(dec!(100000)));
    protocol.mint(ALICE, USDC, Quote::new(dec!(20000)));
    protocol.mint(ALICE, ETH, Quote::new(dec!(1)));
    protocol.mint(LIQUIDATOR, ETH, Quote::new(dec!(1)));

    protocol.provide(LENDER, Quote::new(dec!(100000)), Decimal::ZERO)?;
    Ok(protocol)
}

fn open_short(protocol: &mut Protocol) -> Result<SlotId, ProtocolError> {
    let receipt = protocol.open_position(
        ALICE,
        OpenOrder {
            path: vec![USDC],
            index_asset: WETH,
            amount_in: Quote::new(dec!(10000)),
            min_out: Quote::zero(),
            size_delta: Quote::new(dec!(10000)),
            side: Side::Short,
            acceptable_price: price(dec!(990)),
            execution_fee: Quote::new(dec!(0.0003)),
            referral: None,
        },
    )?;
    protocol.execute_pending(KEEPER, KEEPER)?;
    Ok(receipt.slot)
}

fn print_slot(protocol: &Protocol, slot: SlotId) -> Result<(), ProtocolError> {
    let info = protocol.slot_info(slot)?;
    println!(
        "  price ${}, owed {}, maxBorrow {}, liqPrice {:?}, borderPrice {:?}",
        info.price,
        info.owed,
        info.max_borrow,
        info.liq_price.map(|p| p.to_string()),
        info.border_price.map(|p| p.to_string()),
    );
    Ok(())
}

/// Short, borrow half the profit, price reverses through liqPrice.
fn scenario_1_hard_liquidation() -> Result<(), ProtocolError> {
    println!("Scenario 1: Hard Liquidation\n");
    let mut protocol = setup()?;

    let slot = open_short(&mut protocol)?;
    println!("  Alice shorts $10,000 WETH at $1,000 (slot {})", slot);

    protocol.venue_mut().set_price(WETH, price(dec!(800)));
    protocol.lock_collateral(ALICE, slot)?;
    let borrowed = protocol.borrow(ALICE, slot, Quote::new(dec!(1000)))?;
    println!("  WETH falls to $800, Alice locks the slot and borrows {}", borrowed.amount);
    print_slot(&protocol, slot)?;

    protocol.venue_mut().set_price(WETH, price(dec!(881)));
    let request = protocol.liquidate(LIQUIDATOR, slot, Quote::new(dec!(0.0003)))?;
    println!("\n  WETH back at $881, liquidator claims the slot (trigger {})", request.trigger);

    let outcomes = protocol.execute_pending(KEEPER, KEEPER)?;
    for settlement in outcomes.iter().filter_map(|o| o.settlement.as_ref()) {
        println!(
            "  settled: liquidator {}, pool {}, owner {}",
            settlement.split.liquidator_fee, settlement.split.pool, settlement.split.owner
        );
    }
    println!("  pool value now {}", protocol.pool_value());
    for event in protocol.recent_events(3) {
        println!("  event #{} at {}: {:?}", event.id.0, event.timestamp, event.payload);
    }
    println!();
    Ok(())
}

/// Border trigger fires before liqPrice once the coefficient is set.
fn scenario_2_border_liquidation() -> Result<(), ProtocolError> {
    println!("Scenario 2: Border Liquidation\n");
    let mut protocol = setup()?;

    let slot = open_short(&mut protocol)?;
    protocol.set_border_price_coef(ADMIN, WETH, dec!(2))?;
    protocol.venue_mut().set_price(WETH, price(dec!(950)));
    protocol.lock_collateral(ALICE, slot)?;
    protocol.borrow(ALICE, slot, Quote::new(dec!(50)))?;
    println!("  Alice borrows 50 with WETH at $950, border coefficient 2");
    print_slot(&protocol, slot)?;

    protocol.venue_mut().set_price(WETH, price(dec!(981)));
    protocol.liquidate_by_border_price(LIQUIDATOR, slot, Quote::new(dec!(0.0003)))?;
    let outcomes = protocol.execute_pending(KEEPER, KEEPER)?;
    for settlement in outcomes.iter().filter_map(|o| o.settlement.as_ref()) {
        println!(
            "  settled at $981: liquidator {}, pool {}, owner {}",
            settlement.split.liquidator_fee, settlement.split.pool, settlement.split.owner
        );
    }
    println!("  slot token back with {}\n", protocol.tokens().owner_of(slot)?);
    Ok(())
}

/// Credit engine switch has to sit in the queue for the full delay.
fn scenario_3_pool_timelock() -> Result<(), ProtocolError> {
    println!("Scenario 3: Pool Timelock\n");
    let mut protocol = setup()?;
    let replacement = Address(0xBEEF);

    protocol.unlock_function(ADMIN, replacement)?;
    protocol.advance_time(6 * DAY_MS);
    match protocol.set_credit_engine(ADMIN, replacement) {
        Err(e) => println!("  after 6 days: {}", e),
        Ok(()) => println!("  after 6 days: committed early"),
    }

    protocol.advance_time(DAY_MS);
    protocol.set_credit_engine(ADMIN, replacement)?;
    println!("  after 7 days: credit engine is now {}", protocol.pool().credit_engine());
    Ok(())
}
