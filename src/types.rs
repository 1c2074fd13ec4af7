// 1.0: all the primitives live here. nothing in the protocol works without these types.
// addresses, assets, slot ids, request keys, prices, amounts, timestamps.
// each is a newtype so the compiler catches type mixups.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const YEAR_MS: i64 = 365 * DAY_MS;

// 1.1: ledger identity. users, proxies and protocol components all hold balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    pub const ZERO: Address = Address(0);
    pub const VENUE: Address = Address(0xFFFF_0001);
    pub const ROUTER: Address = Address(0xFFFF_0002);
    pub const CREDIT_ENGINE: Address = Address(0xFFFF_0003);
    pub const POOL: Address = Address(0xFFFF_0004);

    // proxies live in their own range so they never collide with user addresses
    pub const PROXY_BASE: u64 = 1 << 40;

    pub fn for_proxy(proxy: ProxyId) -> Self {
        Self(Self::PROXY_BASE + proxy.0 as u64)
    }

    pub fn is_proxy(&self) -> bool {
        self.0 >= Self::PROXY_BASE
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

// index into the proxy arena. one per user, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProxyId(pub u32);

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

// 1.2: position slot id. derived from (proxy, index asset, side), so the same
// slot always maps to the same ownership token.
// layout: proxy in the high 32 bits, asset in bits 1..32, side in bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u64);

impl SlotId {
    pub fn derive(proxy: ProxyId, asset: AssetId, side: Side) -> Self {
        let side_bit = match side {
            Side::Long => 1,
            Side::Short => 0,
        };
        let asset_bits = (asset.0 as u64 & 0x7FFF_FFFF) << 1;
        Self(((proxy.0 as u64) << 32) | asset_bits | side_bit)
    }

    pub fn proxy(&self) -> ProxyId {
        ProxyId((self.0 >> 32) as u32)
    }

    pub fn index_asset(&self) -> AssetId {
        AssetId(((self.0 & 0xFFFF_FFFF) >> 1) as u32)
    }

    pub fn side(&self) -> Side {
        if self.0 & 1 == 1 {
            Side::Long
        } else {
            Side::Short
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

// 1.3: venue request handle. (account, sequence) like the venue's own request keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub account: Address,
    pub index: u64,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Increase,
    Decrease,
}

// 1.4: price in USD per unit of asset. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // price moved up or down by `bps`. used for slippage bounds.
    pub fn shifted(&self, bps: Bps, up: bool) -> Self {
        let factor = if up {
            Decimal::ONE + bps.as_fraction()
        } else {
            Decimal::ONE - bps.as_fraction()
        };
        Self((self.0 * factor).max(MIN_PRICE))
    }
}

pub const MIN_PRICE: Decimal = dec!(0.00000001);

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.5: USD / stable amount. sizes, collateral, pnl, debt, fees all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }

    // subtraction floored at zero
    pub fn saturating_sub(&self, other: Quote) -> Self {
        Self((self.0 - other.0).max(Decimal::ZERO))
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn min(&self, other: Quote) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max(&self, other: Quote) -> Self {
        Self(self.0.max(other.0))
    }

    // truncate to token precision. never rounds in the holder's favour.
    pub fn truncate(&self, decimals: u32) -> Self {
        Self(self.0.round_dp_with_strategy(decimals, RoundingStrategy::ToZero))
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.6: basis points. 100 bps = 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(i32);

impl Bps {
    pub fn new(bps: i32) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }

    pub fn of(&self, amount: Quote) -> Quote {
        amount.mul(self.as_fraction())
    }
}

// 1.7: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn plus(&self, millis: i64) -> Self {
        Self(self.0 + millis)
    }

    pub fn millis_since(&self, earlier: &Timestamp) -> i64 {
        (self.0 - earlier.0).max(0)
    }

    // fraction of a 365 day year between two timestamps
    pub fn years_since(&self, earlier: &Timestamp) -> Decimal {
        Decimal::from(self.millis_since(earlier)) / Decimal::from(YEAR_MS)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn slot_id_roundtrips_components() {
        let slot = SlotId::derive(ProxyId(7), AssetId(3), Side::Long);
        assert_eq!(slot.proxy(), ProxyId(7));
        assert_eq!(slot.index_asset(), AssetId(3));
        assert_eq!(slot.side(), Side::Long);

        let short = SlotId::derive(ProxyId(7), AssetId(3), Side::Short);
        assert_ne!(slot, short);
        assert_eq!(short.side(), Side::Short);
    }

    #[test]
    fn slot_id_is_deterministic() {
        let a = SlotId::derive(ProxyId(1), AssetId(10), Side::Short);
        let b = SlotId::derive(ProxyId(1), AssetId(10), Side::Short);
        assert_eq!(a, b);
        assert_ne!(a, SlotId::derive(ProxyId(2), AssetId(10), Side::Short));
    }

    #[test]
    fn proxy_addresses_are_out_of_user_range() {
        let addr = Address::for_proxy(ProxyId(0));
        assert!(addr.is_proxy());
        assert!(!Address(42).is_proxy());
    }

    #[test]
    fn quote_truncates_toward_zero() {
        let q = Quote::new(dec!(2014.7719999999));
        assert_eq!(q.truncate(6).value(), dec!(2014.771999));
    }

    #[test]
    fn bps_conversion() {
        assert_eq!(Bps::new(100).as_fraction(), dec!(0.01));
        assert_eq!(Bps::new(5000).of(Quote::new(dec!(1000))).value(), dec!(500));
    }

    #[test]
    fn year_fraction() {
        let start = Timestamp::from_millis(0);
        let end = start.plus(YEAR_MS / 2);
        assert_eq!(end.years_since(&start), dec!(0.5));
        assert_eq!(start.years_since(&end), Decimal::ZERO);
    }
}
