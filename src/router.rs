// 2.0 router.rs: account router. user -> proxy mapping, trading permissions,
// collateral path rules and long/short exclusivity. everything is checked before
// an order is forwarded to the venue.
// 2.1 pending increases are tracked here until a keeper settles them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{AssetConfig, ProtocolConfig};
use crate::ledger::Ledger;
use crate::ownership::{OwnershipError, OwnershipRegistry};
use crate::position::{PositionDelta, VenuePosition};
use crate::proxy::{CloseOrder, OpenOrder, PositionProxy, ProxyArena, ProxyError};
use crate::types::{Address, AssetId, Price, Quote, RequestKey, RequestKind, Side, SlotId, Timestamp};
use crate::venue::{ExecutionReport, PerpVenue, VenueError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("trading stopped")]
    TradingStopped { asset: AssetId, side: Side },
    #[error("short collateral must be the stable asset")]
    ShortCollateralNotStable,
    #[error("long collateral must be the index asset")]
    LongCollateralNotIndex,
    #[error("cannot hold long and short simultaneously")]
    ConflictingDirection { asset: AssetId },
    #[error("invalid path")]
    InvalidPath,
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),
    #[error("caller {0} is not the admin")]
    NotAdmin(Address),
    #[error("caller {0} is not the credit engine")]
    NotCreditEngine(Address),
    #[error("no open position for {0}")]
    NoOpenPosition(SlotId),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    #[error(transparent)]
    Venue(#[from] VenueError),
}

/// Close parameters for a slot the caller holds. Index asset and side come from
/// the slot itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseParams {
    // empty means "pay out in the position collateral"
    pub path: Vec<AssetId>,
    pub collateral_delta: Quote,
    pub size_delta: Quote,
    pub receiver: Address,
    pub acceptable_price: Price,
    pub min_out: Quote,
    pub execution_fee: Quote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReceipt {
    pub key: RequestKey,
    pub slot: SlotId,
    pub proxy: Address,
    pub path: Vec<AssetId>,
    // true when this order minted the slot token
    pub minted: bool,
    // true when this order created the caller's proxy
    pub proxy_created: bool,
}

#[derive(Debug, Clone)]
pub struct AccountRouter {
    admin: Address,
    credit_engine: Address,
    stable_asset: AssetId,
    native_asset: AssetId,
    assets: HashMap<AssetId, AssetConfig>,
    proxies: ProxyArena,
    permissions: HashMap<(AssetId, Side), bool>,
    // submitted but not yet executed or cancelled
    pending_increases: HashMap<RequestKey, SlotId>,
    pending_decreases: HashMap<RequestKey, SlotId>,
}

impl AccountRouter {
    pub fn new(config: &ProtocolConfig, admin: Address, credit_engine: Address) -> Self {
        Self {
            admin,
            credit_engine,
            stable_asset: config.stable_asset,
            native_asset: config.native_asset,
            assets: config.assets.iter().map(|a| (a.id, a.clone())).collect(),
            proxies: ProxyArena::new(),
            permissions: config.permissions.iter().map(|p| ((p.asset, p.side), p.enabled)).collect(),
            pending_increases: HashMap::new(),
            pending_decreases: HashMap::new(),
        }
    }

    pub fn credit_engine(&self) -> Address {
        self.credit_engine
    }

    pub fn proxy_of(&self, user: Address) -> Option<&PositionProxy> {
        self.proxies.of_owner(user)
    }

    pub fn is_enabled(&self, asset: AssetId, side: Side) -> bool {
        self.permissions.get(&(asset, side)).copied().unwrap_or(false)
    }

    pub fn has_pending_increase(&self, slot: SlotId) -> bool {
        self.pending_increases.values().any(|s| *s == slot)
    }

    pub fn has_pending_decrease(&self, slot: SlotId) -> bool {
        self.pending_decreases.values().any(|s| *s == slot)
    }

    // collateral token held by the venue position of each side
    pub fn collateral_for(&self, index: AssetId, side: Side) -> AssetId {
        match side {
            Side::Long => index,
            Side::Short => self.stable_asset,
        }
    }

    pub fn create_position_proxy<V: PerpVenue>(&mut self, venue: &mut V, user: Address) -> Result<PositionProxy, RouterError> {
        let proxy = self.proxies.create(user)?.clone();
        proxy.approve_all(venue);
        Ok(proxy)
    }

    pub fn set_permission(&mut self, caller: Address, asset: AssetId, side: Side, enabled: bool) -> Result<(), RouterError> {
        if caller != self.admin {
            return Err(RouterError::NotAdmin(caller));
        }
        match self.assets.get(&asset) {
            Some(a) if a.is_index => {}
            _ => return Err(RouterError::UnknownAsset(asset)),
        }
        self.permissions.insert((asset, side), enabled);
        Ok(())
    }

    pub fn set_credit_engine(&mut self, caller: Address, engine: Address) -> Result<(), RouterError> {
        if caller != self.admin {
            return Err(RouterError::NotAdmin(caller));
        }
        self.credit_engine = engine;
        Ok(())
    }

    // 2.2: short collateral settles in the stable asset, long collateral in the index
    // asset. a single foreign asset gets the swap hop appended.
    pub fn resolve_path(&self, index: AssetId, side: Side, path: &[AssetId]) -> Result<Vec<AssetId>, RouterError> {
        let first = *path.first().ok_or(RouterError::InvalidPath)?;
        for asset in path {
            if !self.assets.contains_key(asset) {
                return Err(RouterError::UnknownAsset(*asset));
            }
        }
        let collateral = self.collateral_for(index, side);
        if path.last() == Some(&collateral) {
            return Ok(path.to_vec());
        }
        if path.len() == 1 {
            return Ok(vec![first, collateral]);
        }
        match side {
            Side::Short => Err(RouterError::ShortCollateralNotStable),
            Side::Long => Err(RouterError::LongCollateralNotIndex),
        }
    }

    pub fn slot_account(&self, slot: SlotId) -> Address {
        Address::for_proxy(slot.proxy())
    }

    pub fn slot_position<V: PerpVenue>(&self, venue: &V, slot: SlotId) -> Option<VenuePosition> {
        let index = slot.index_asset();
        venue
            .get_position(self.slot_account(slot), self.collateral_for(index, slot.side()), index, slot.side())
            .filter(|p| !p.is_empty())
    }

    pub fn slot_delta<V: PerpVenue>(&self, venue: &V, slot: SlotId) -> Result<PositionDelta, RouterError> {
        let index = slot.index_asset();
        let delta = venue.get_position_delta(
            self.slot_account(slot),
            self.collateral_for(index, slot.side()),
            index,
            slot.side(),
        )?;
        Ok(delta)
    }

    pub fn current_price<V: PerpVenue>(&self, venue: &V, slot: SlotId) -> Result<Price, RouterError> {
        Ok(venue.price(slot.index_asset())?)
    }

    // settled opposite position, or an opposite increase still waiting on a keeper
    fn ensure_exclusive<V: PerpVenue>(&self, venue: &V, proxy: &PositionProxy, index: AssetId, side: Side) -> Result<(), RouterError> {
        let opposite = proxy.key_by_index_token(index, side.opposite());
        if self.slot_position(venue, opposite).is_some() || self.has_pending_increase(opposite) {
            return Err(RouterError::ConflictingDirection { asset: index });
        }
        Ok(())
    }

    /// 2.3: validate and forward an increase. Creates the proxy and mints the slot
    /// token on first use.
    pub fn open_position<V: PerpVenue>(
        &mut self,
        venue: &mut V,
        ledger: &mut Ledger,
        tokens: &mut OwnershipRegistry,
        caller: Address,
        mut order: OpenOrder,
        now: Timestamp,
    ) -> Result<OpenReceipt, RouterError> {
        if !self.is_enabled(order.index_asset, order.side) {
            return Err(RouterError::TradingStopped { asset: order.index_asset, side: order.side });
        }
        order.path = self.resolve_path(order.index_asset, order.side, &order.path)?;

        if let Some(proxy) = self.proxies.of_owner(caller) {
            self.ensure_exclusive(venue, proxy, order.index_asset, order.side)?;
            let slot = proxy.key_by_index_token(order.index_asset, order.side);
            if tokens.exists(slot) {
                let holder = tokens.owner_of(slot)?;
                if holder != caller && holder != self.credit_engine {
                    return Err(OwnershipError::NotOwner { slot, caller }.into());
                }
            }
        }

        let (proxy, proxy_created) = match self.proxies.of_owner(caller) {
            Some(p) => (p.clone(), false),
            None => (self.create_position_proxy(venue, caller)?, true),
        };
        let slot = proxy.key_by_index_token(order.index_asset, order.side);
        let path = order.path.clone();

        let key = match proxy.open(venue, ledger, caller, self.native_asset, order, now) {
            Ok(key) => key,
            Err(e) => {
                if proxy_created {
                    proxy.revoke(venue);
                    self.proxies.discard(caller);
                }
                return Err(e.into());
            }
        };

        let minted = !tokens.exists(slot);
        if minted {
            tokens.mint(caller, slot)?;
        }
        self.pending_increases.insert(key, slot);

        Ok(OpenReceipt {
            key,
            slot,
            proxy: proxy.address,
            path,
            minted,
            proxy_created,
        })
    }

    /// 2.4: decrease or close. only the token holder may close; permissions and
    /// exclusivity do not apply so users can always exit.
    pub fn close_position<V: PerpVenue>(
        &mut self,
        venue: &mut V,
        ledger: &mut Ledger,
        tokens: &OwnershipRegistry,
        caller: Address,
        slot: SlotId,
        params: CloseParams,
        now: Timestamp,
    ) -> Result<RequestKey, RouterError> {
        tokens.ensure_owner(slot, caller)?;
        self.submit_close(venue, ledger, caller, slot, params, now)
    }

    /// 2.5: full close on behalf of the credit engine. proceeds go to the engine's
    /// escrow in the stable asset.
    pub fn close_for_credit<V: PerpVenue>(
        &mut self,
        venue: &mut V,
        ledger: &mut Ledger,
        caller: Address,
        payer: Address,
        slot: SlotId,
        acceptable_price: Price,
        execution_fee: Quote,
        now: Timestamp,
    ) -> Result<RequestKey, RouterError> {
        if caller != self.credit_engine {
            return Err(RouterError::NotCreditEngine(caller));
        }
        let position = self.slot_position(venue, slot).ok_or(RouterError::NoOpenPosition(slot))?;
        let collateral = self.collateral_for(slot.index_asset(), slot.side());
        let params = CloseParams {
            path: vec![collateral, self.stable_asset],
            collateral_delta: Quote::zero(),
            size_delta: position.size,
            receiver: self.credit_engine,
            acceptable_price,
            min_out: Quote::zero(),
            execution_fee,
        };
        self.submit_close(venue, ledger, payer, slot, params, now)
    }

    fn submit_close<V: PerpVenue>(
        &mut self,
        venue: &mut V,
        ledger: &mut Ledger,
        payer: Address,
        slot: SlotId,
        params: CloseParams,
        now: Timestamp,
    ) -> Result<RequestKey, RouterError> {
        let proxy = self.proxies.get(slot.proxy()).cloned().ok_or(RouterError::NoOpenPosition(slot))?;
        let index = slot.index_asset();
        let collateral = self.collateral_for(index, slot.side());

        let mut path = params.path;
        if path.is_empty() {
            path.push(collateral);
        }
        if path[0] != collateral || path.len() > 2 {
            return Err(RouterError::InvalidPath);
        }
        // same stable twice is a no-op hop
        path.dedup();

        let order = CloseOrder {
            path,
            index_asset: index,
            collateral_delta: params.collateral_delta,
            size_delta: params.size_delta,
            side: slot.side(),
            receiver: params.receiver,
            acceptable_price: params.acceptable_price,
            min_out: params.min_out,
            execution_fee: params.execution_fee,
        };
        let key = proxy.close(venue, ledger, payer, self.native_asset, order, now)?;
        self.pending_decreases.insert(key, slot);
        Ok(key)
    }

    // 2.6: keeper processed a request. it leaves the pending table either way.
    pub fn on_execution(&mut self, report: &ExecutionReport) -> Option<SlotId> {
        match report.kind {
            RequestKind::Increase => self.pending_increases.remove(&report.key),
            RequestKind::Decrease => self.pending_decreases.remove(&report.key),
        }
    }
}
