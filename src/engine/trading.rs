// 12.3 engine/trading.rs: router operations. proxies, permissions, open / close.

use tracing::debug;

use super::core::Protocol;
use super::results::ProtocolError;
use crate::events::{
    EventPayload, PermissionSetEvent, PositionRequestedEvent, ProxyCreatedEvent, TokenMintedEvent, TokenTransferredEvent,
};
use crate::position::VenuePosition;
use crate::proxy::{OpenOrder, ProxyError};
use crate::router::{CloseParams, OpenReceipt};
use crate::types::{Address, AssetId, Price, RequestKey, RequestKind, Side, SlotId};
use crate::venue::PerpVenue;

impl<V: PerpVenue> Protocol<V> {
    /// Create the caller's proxy. Fails "already exists" on a second call.
    pub fn create_position_proxy(&mut self, caller: Address) -> Result<Address, ProtocolError> {
        let proxy = self.router.create_position_proxy(&mut self.venue, caller)?;
        self.emit_event(EventPayload::ProxyCreated(ProxyCreatedEvent {
            owner: caller,
            proxy: proxy.address,
        }));
        Ok(proxy.address)
    }

    pub fn proxy_of(&self, user: Address) -> Option<Address> {
        self.router.proxy_of(user).map(|p| p.address)
    }

    // owner can pull or restore the venue approval of its proxy
    pub fn set_proxy_approval(&mut self, caller: Address, approved: bool) -> Result<(), ProtocolError> {
        let proxy = self
            .router
            .proxy_of(caller)
            .cloned()
            .ok_or(ProxyError::NotFound(caller))?;
        if approved {
            proxy.approve_all(&mut self.venue);
        } else {
            proxy.revoke(&mut self.venue);
        }
        Ok(())
    }

    pub fn slot_of(&self, user: Address, index: AssetId, side: Side) -> Option<SlotId> {
        self.router.proxy_of(user).map(|p| p.key_by_index_token(index, side))
    }

    pub fn open_position(&mut self, caller: Address, order: OpenOrder) -> Result<OpenReceipt, ProtocolError> {
        let now = self.current_time;
        let size_delta = order.size_delta;
        let acceptable_price = order.acceptable_price;
        let receipt = self
            .router
            .open_position(&mut self.venue, &mut self.ledger, &mut self.tokens, caller, order, now)?;

        if receipt.proxy_created {
            self.emit_event(EventPayload::ProxyCreated(ProxyCreatedEvent {
                owner: caller,
                proxy: receipt.proxy,
            }));
        }
        if receipt.minted {
            self.emit_event(EventPayload::TokenMinted(TokenMintedEvent {
                slot: receipt.slot,
                owner: caller,
            }));
        }
        self.emit_event(EventPayload::PositionRequested(PositionRequestedEvent {
            key: receipt.key,
            kind: RequestKind::Increase,
            slot: receipt.slot,
            caller,
            size_delta,
            acceptable_price,
        }));
        debug!(key = %receipt.key, slot = %receipt.slot, "increase forwarded");
        Ok(receipt)
    }

    pub fn close_position(&mut self, caller: Address, slot: SlotId, params: CloseParams) -> Result<RequestKey, ProtocolError> {
        let now = self.current_time;
        let size_delta = params.size_delta;
        let acceptable_price = params.acceptable_price;
        let key = self
            .router
            .close_position(&mut self.venue, &mut self.ledger, &self.tokens, caller, slot, params, now)?;

        self.emit_event(EventPayload::PositionRequested(PositionRequestedEvent {
            key,
            kind: RequestKind::Decrease,
            slot,
            caller,
            size_delta,
            acceptable_price,
        }));
        Ok(key)
    }

    pub fn set_permission(&mut self, caller: Address, asset: AssetId, side: Side, enabled: bool) -> Result<(), ProtocolError> {
        self.router.set_permission(caller, asset, side, enabled)?;
        self.emit_event(EventPayload::PermissionSet(PermissionSetEvent { asset, side, enabled }));
        Ok(())
    }

    pub fn transfer_token(&mut self, caller: Address, to: Address, slot: SlotId) -> Result<(), ProtocolError> {
        self.tokens.transfer(caller, to, slot)?;
        self.emit_event(EventPayload::TokenTransferred(TokenTransferredEvent { slot, from: caller, to }));
        Ok(())
    }

    pub fn current_price(&self, slot: SlotId) -> Result<Price, ProtocolError> {
        Ok(self.router.current_price(&self.venue, slot)?)
    }

    pub fn slot_position(&self, slot: SlotId) -> Option<VenuePosition> {
        self.router.slot_position(&self.venue, slot)
    }
}
