// 11.0: every state change produces an event. used for audit trails and for tests
// that assert on what happened. the EventPayload enum lists all event types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loan::{LiquidationKind, LiquidationSplit};
use crate::types::{Address, AssetId, Price, Quote, RequestKey, RequestKind, Side, SlotId, Timestamp};
use crate::venue::ExecutionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Router events
    ProxyCreated(ProxyCreatedEvent),
    PermissionSet(PermissionSetEvent),
    TokenMinted(TokenMintedEvent),
    TokenTransferred(TokenTransferredEvent),
    PositionRequested(PositionRequestedEvent),

    // Keeper events
    RequestExecuted(RequestExecutedEvent),

    // Credit events
    CollateralLocked(CollateralEvent),
    CollateralUnlocked(CollateralEvent),
    Borrowed(BorrowedEvent),
    Repaid(RepaidEvent),
    InterestRateSet(InterestRateSetEvent),
    BorderCoefSet(BorderCoefSetEvent),

    // Liquidation events
    LiquidationRequested(LiquidationRequestedEvent),
    LiquidationReleased(LiquidationReleasedEvent),
    LiquidationSettled(LiquidationSettledEvent),
    BadDebt(BadDebtEvent),

    // Pool events
    Deposited(PoolFlowEvent),
    Withdrawn(PoolFlowEvent),
    CreditEngineQueued(CreditEngineQueuedEvent),
    CreditEngineChanged(CreditEngineChangedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyCreatedEvent {
    pub owner: Address,
    pub proxy: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSetEvent {
    pub asset: AssetId,
    pub side: Side,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMintedEvent {
    pub slot: SlotId,
    pub owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransferredEvent {
    pub slot: SlotId,
    pub from: Address,
    pub to: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRequestedEvent {
    pub key: RequestKey,
    pub kind: RequestKind,
    pub slot: SlotId,
    pub caller: Address,
    pub size_delta: Quote,
    pub acceptable_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestExecutedEvent {
    pub key: RequestKey,
    pub kind: RequestKind,
    pub status: ExecutionStatus,
    pub fill_price: Price,
    pub size_delta: Quote,
    pub amount_out: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralEvent {
    pub slot: SlotId,
    pub owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowedEvent {
    pub slot: SlotId,
    pub owner: Address,
    pub amount: Quote,
    pub principal: Quote,
    pub max_borrow: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaidEvent {
    pub slot: SlotId,
    pub payer: Address,
    pub interest: Quote,
    pub principal: Quote,
    pub remaining_principal: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRateSetEvent {
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderCoefSetEvent {
    pub asset: AssetId,
    pub coef: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRequestedEvent {
    pub slot: SlotId,
    pub key: RequestKey,
    pub kind: LiquidationKind,
    pub liquidator: Address,
    pub price: Price,
    pub trigger: Price,
    pub owed: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationReleasedEvent {
    pub slot: SlotId,
    pub key: RequestKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationSettledEvent {
    pub slot: SlotId,
    pub key: RequestKey,
    pub kind: LiquidationKind,
    pub owner: Address,
    pub liquidator: Address,
    pub amount_out: Quote,
    pub split: LiquidationSplit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub slot: SlotId,
    pub amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFlowEvent {
    pub account: Address,
    pub amount: Quote,
    pub shares: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEngineQueuedEvent {
    pub target: Address,
    pub eligible_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEngineChangedEvent {
    pub previous: Address,
    pub current: Address,
}
