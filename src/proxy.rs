// 6.0 proxy.rs: one isolated venue account per user. proxies live in an arena
// indexed by ProxyId and only expose open / close / approve.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::ledger::Ledger;
use crate::types::{Address, AssetId, Price, ProxyId, Quote, RequestKey, Side, SlotId, Timestamp};
use crate::venue::{DecreaseRequest, IncreaseRequest, PerpVenue, VenueError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("already exists")]
    AlreadyExists(Address),
    #[error("no proxy for {0}")]
    NotFound(Address),
    #[error("proxy {0} has not approved the venue router")]
    NotApproved(Address),
    #[error("venue: {0}")]
    Venue(#[from] VenueError),
}

/// Increase order as the user describes it. The proxy fills in its own account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub path: Vec<AssetId>,
    pub index_asset: AssetId,
    pub amount_in: Quote,
    pub min_out: Quote,
    pub size_delta: Quote,
    pub side: Side,
    pub acceptable_price: Price,
    pub execution_fee: Quote,
    pub referral: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub path: Vec<AssetId>,
    pub index_asset: AssetId,
    pub collateral_delta: Quote,
    pub size_delta: Quote,
    pub side: Side,
    pub receiver: Address,
    pub acceptable_price: Price,
    pub min_out: Quote,
    pub execution_fee: Quote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionProxy {
    pub id: ProxyId,
    pub owner: Address,
    pub address: Address,
}

impl PositionProxy {
    pub fn key_by_index_token(&self, index: AssetId, side: Side) -> SlotId {
        SlotId::derive(self.id, index, side)
    }

    pub fn approve_all<V: PerpVenue>(&self, venue: &mut V) {
        venue.approve_plugin(self.address);
    }

    pub fn revoke<V: PerpVenue>(&self, venue: &mut V) {
        venue.deny_plugin(self.address);
    }

    // payer funds amount_in and the execution fee; on rejection the funds go back
    pub fn open<V: PerpVenue>(
        &self,
        venue: &mut V,
        ledger: &mut Ledger,
        payer: Address,
        native: AssetId,
        order: OpenOrder,
        now: Timestamp,
    ) -> Result<RequestKey, ProxyError> {
        if !venue.is_plugin_approved(self.address) {
            return Err(ProxyError::NotApproved(self.address));
        }
        let pay_asset = *order.path.first().ok_or(VenueError::InvalidPath)?;
        let funding = [(pay_asset, order.amount_in), (native, order.execution_fee)];
        self.fund(ledger, payer, &funding)?;

        let request = IncreaseRequest {
            account: self.address,
            path: order.path,
            index_asset: order.index_asset,
            amount_in: order.amount_in,
            min_out: order.min_out,
            size_delta: order.size_delta,
            side: order.side,
            acceptable_price: order.acceptable_price,
            execution_fee: order.execution_fee,
            referral: order.referral,
            refund_to: payer,
        };
        match venue.create_increase_position(ledger, request, now) {
            Ok(key) => Ok(key),
            Err(e) => {
                self.unwind(ledger, payer, &funding)?;
                Err(e.into())
            }
        }
    }

    pub fn close<V: PerpVenue>(
        &self,
        venue: &mut V,
        ledger: &mut Ledger,
        payer: Address,
        native: AssetId,
        order: CloseOrder,
        now: Timestamp,
    ) -> Result<RequestKey, ProxyError> {
        if !venue.is_plugin_approved(self.address) {
            return Err(ProxyError::NotApproved(self.address));
        }
        let funding = [(native, order.execution_fee)];
        self.fund(ledger, payer, &funding)?;

        let request = DecreaseRequest {
            account: self.address,
            path: order.path,
            index_asset: order.index_asset,
            collateral_delta: order.collateral_delta,
            size_delta: order.size_delta,
            side: order.side,
            receiver: order.receiver,
            acceptable_price: order.acceptable_price,
            min_out: order.min_out,
            execution_fee: order.execution_fee,
        };
        match venue.create_decrease_position(ledger, request, now) {
            Ok(key) => Ok(key),
            Err(e) => {
                self.unwind(ledger, payer, &funding)?;
                Err(e.into())
            }
        }
    }

    fn fund(&self, ledger: &mut Ledger, payer: Address, legs: &[(AssetId, Quote)]) -> Result<(), ProxyError> {
        let mut needed: HashMap<AssetId, Quote> = HashMap::new();
        for (asset, amount) in legs {
            let entry = needed.entry(*asset).or_insert_with(Quote::zero);
            *entry = entry.add(*amount);
        }
        for (asset, amount) in &needed {
            ledger.ensure_balance(payer, *asset, *amount).map_err(VenueError::from)?;
        }
        for (asset, amount) in legs {
            ledger.transfer(payer, self.address, *asset, *amount).map_err(VenueError::from)?;
        }
        Ok(())
    }

    // the venue rejected before pulling anything, so the proxy still holds the legs
    fn unwind(&self, ledger: &mut Ledger, payer: Address, legs: &[(AssetId, Quote)]) -> Result<(), ProxyError> {
        for (asset, amount) in legs {
            let held = ledger.balance_of(self.address, *asset).min(*amount);
            ledger.transfer(self.address, payer, *asset, held).map_err(VenueError::from)?;
        }
        Ok(())
    }
}

/** 6.1: proxy arena. user -> proxy is permanent once created */
#[derive(Debug, Clone, Default)]
pub struct ProxyArena {
    proxies: Vec<PositionProxy>,
    by_owner: HashMap<Address, ProxyId>,
}

impl ProxyArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, owner: Address) -> Result<&PositionProxy, ProxyError> {
        if self.by_owner.contains_key(&owner) {
            return Err(ProxyError::AlreadyExists(owner));
        }
        let id = ProxyId(self.proxies.len() as u32);
        self.proxies.push(PositionProxy {
            id,
            owner,
            address: Address::for_proxy(id),
        });
        self.by_owner.insert(owner, id);
        Ok(&self.proxies[id.0 as usize])
    }

    // undo a create within the same call. only the newest proxy can be discarded.
    pub fn discard(&mut self, owner: Address) {
        if let Some(id) = self.by_owner.get(&owner).copied() {
            if id.0 as usize + 1 == self.proxies.len() {
                self.proxies.pop();
                self.by_owner.remove(&owner);
            }
        }
    }

    pub fn get(&self, id: ProxyId) -> Option<&PositionProxy> {
        self.proxies.get(id.0 as usize)
    }

    pub fn of_owner(&self, owner: Address) -> Option<&PositionProxy> {
        self.by_owner.get(&owner).and_then(|id| self.get(*id))
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProtocolConfig, ETH, USDC, WETH};
    use crate::venue::SimVenue;
    use rust_decimal_macros::dec;

    #[test]
    fn one_proxy_per_user() {
        let mut arena = ProxyArena::new();
        let first = arena.create(Address(1)).unwrap().clone();
        assert_eq!(first.id, ProxyId(0));
        assert!(first.address.is_proxy());

        let err = arena.create(Address(1)).unwrap_err();
        assert_eq!(err.to_string(), "already exists");
        assert_eq!(arena.create(Address(2)).unwrap().id, ProxyId(1));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn slot_key_depends_on_proxy() {
        let mut arena = ProxyArena::new();
        let a = arena.create(Address(1)).unwrap().clone();
        let b = arena.create(Address(2)).unwrap().clone();
        assert_ne!(a.key_by_index_token(WETH, Side::Long), b.key_by_index_token(WETH, Side::Long));
        assert_eq!(a.key_by_index_token(WETH, Side::Long).proxy(), a.id);
    }

    #[test]
    fn rejected_open_returns_funds() {
        let config = ProtocolConfig::default();
        let mut venue = SimVenue::new(&config);
        let mut ledger = Ledger::new();
        let user = Address(1);
        ledger.mint(user, USDC, Quote::new(dec!(100)));
        ledger.mint(user, ETH, Quote::new(dec!(1)));

        let mut arena = ProxyArena::new();
        let proxy = arena.create(user).unwrap().clone();
        proxy.approve_all(&mut venue);

        let order = OpenOrder {
            path: vec![USDC],
            index_asset: WETH,
            amount_in: Quote::new(dec!(100)),
            min_out: Quote::zero(),
            size_delta: Quote::new(dec!(1000)),
            side: Side::Short,
            acceptable_price: Price::new_unchecked(dec!(1000)),
            execution_fee: Quote::new(dec!(0.0001)),
            referral: None,
        };
        let result = proxy.open(&mut venue, &mut ledger, user, ETH, order, Timestamp::from_millis(0));
        assert!(matches!(result, Err(ProxyError::Venue(VenueError::InsufficientExecutionFee { .. }))));
        assert_eq!(ledger.balance_of(user, USDC).value(), dec!(100));
        assert_eq!(ledger.balance_of(user, ETH).value(), dec!(1));
    }

    #[test]
    fn revoked_proxy_cannot_trade() {
        let config = ProtocolConfig::default();
        let mut venue = SimVenue::new(&config);
        let mut ledger = Ledger::new();
        let mut arena = ProxyArena::new();
        let proxy = arena.create(Address(1)).unwrap().clone();
        proxy.approve_all(&mut venue);
        proxy.revoke(&mut venue);

        let order = CloseOrder {
            path: vec![USDC],
            index_asset: WETH,
            collateral_delta: Quote::zero(),
            size_delta: Quote::new(dec!(1000)),
            side: Side::Short,
            receiver: Address(1),
            acceptable_price: Price::new_unchecked(dec!(1000)),
            min_out: Quote::zero(),
            execution_fee: Quote::new(dec!(0.0003)),
        };
        let result = proxy.close(&mut venue, &mut ledger, Address(1), ETH, order, Timestamp::from_millis(0));
        assert!(matches!(result, Err(ProxyError::NotApproved(_))));
    }
}
