// 12.0.2: result types and errors for protocol operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::credit::{CreditError, Settlement};
use crate::ledger::LedgerError;
use crate::loan::LiquidationKind;
use crate::ownership::OwnershipError;
use crate::pool::PoolError;
use crate::position::VenuePosition;
use crate::proxy::ProxyError;
use crate::router::RouterError;
use crate::types::{Address, Price, Quote, RequestKey, SlotId};
use crate::venue::{ExecutionReport, VenueError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowResult {
    pub slot: SlotId,
    pub amount: Quote,
    pub principal: Quote,
    pub max_borrow: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayResult {
    pub slot: SlotId,
    pub interest_paid: Quote,
    pub principal_paid: Quote,
    pub remaining_principal: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRequest {
    pub slot: SlotId,
    pub key: RequestKey,
    pub kind: LiquidationKind,
    pub price: Price,
    pub trigger: Price,
    pub owed: Quote,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub report: ExecutionReport,
    // set when the request was a liquidation close that executed
    pub settlement: Option<Settlement>,
    // set when a liquidation close was cancelled and the claim released
    pub released: Option<SlotId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolPosition {
    pub shares: Decimal,
    pub value: Quote,
}

/// Read-only snapshot of a slot for callers computing bounds off-chain.
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub slot: SlotId,
    pub holder: Option<Address>,
    pub position: Option<VenuePosition>,
    pub price: Price,
    pub owed: Quote,
    pub max_borrow: Quote,
    pub liq_price: Option<Price>,
    pub border_price: Option<Price>,
    pub trigger_price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("no open position for {0}")]
    NoPosition(SlotId),

    #[error("slot {0} has a close request in flight")]
    CloseInFlight(SlotId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Credit(#[from] CreditError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
