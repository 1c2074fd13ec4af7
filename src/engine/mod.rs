// 12.0: protocol facade. owns the ledger, venue, router, credit engine and pool,
// and runs every operation as one validated step.
// deterministic with no external I/O; time is driven by the caller.

mod config;
mod core;
mod keeper;
mod lending;
mod liquidity;
mod results;
mod trading;

pub use config::EngineConfig;
pub use core::Protocol;
pub use results::{
    BorrowResult, ExecutionOutcome, LiquidationRequest, PoolPosition, ProtocolError, RepayResult, SlotInfo,
};
