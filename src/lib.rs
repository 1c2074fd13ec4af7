// perps-credit: credit lines collateralized by perpetual positions.
// liquidation-first architecture: trigger prices and proceeds splits take priority.
// all computation is deterministic with no external I/O. the venue is a trait.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, SlotId, RequestKey, Price, Quote, Bps
//   2.x  router.rs: account router: proxies, permissions, path rules, exclusivity
//   3.x  loan.rs: loan record, maxBorrow, liqPrice, borderPrice, proceeds split
//   4.x  credit.rs: credit engine: lock, borrow, repay, liquidation claims
//   5.x  venue.rs: perp venue interface + in-memory venue
//   6.x  proxy.rs: per-user venue accounts
//   7.x  config.rs: assets, credit, pool and venue params, env presets
//   8.x  pool.rs: lending pool shares, disbursement
//   8.1  timelock.rs: queued admin changes
//   9.x  ledger.rs: token balances
//   10.x ownership.rs: one ownership token per position slot
//   11.x events.rs: state transition events for audit
//   12.x engine/: protocol facade: trading, lending, liquidity, keeper
//   13.x position.rs: venue position math

// venue side
pub mod position;
pub mod proxy;
pub mod router;
pub mod types;
pub mod venue;

// credit side
pub mod credit;
pub mod loan;
pub mod pool;
pub mod timelock;

// shared state
pub mod config;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod ownership;

// re exports for convenience
pub use config::{AssetConfig, BorderCoef, ConfigError, CreditParams, Environment, PoolParams, ProtocolConfig, VenueParams};
pub use credit::{CreditEngine, CreditError, RepayPlan, Settlement};
pub use engine::*;
pub use events::*;
pub use ledger::{Ledger, LedgerError};
pub use loan::{LiquidationKind, LiquidationSplit, LoanRecord, LoanStatus};
pub use ownership::{OwnershipError, OwnershipRegistry};
pub use pool::{LendingPool, PoolError, Recovery};
pub use position::{PositionDelta, PositionError, VenuePosition};
pub use proxy::{CloseOrder, OpenOrder, PositionProxy, ProxyError};
pub use router::{AccountRouter, CloseParams, OpenReceipt, RouterError};
pub use timelock::{TimelockError, TimelockState};
pub use types::*;
pub use venue::{ExecutionReport, ExecutionStatus, PendingRequest, PerpVenue, SimVenue, VenueError};
