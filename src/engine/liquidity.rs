// 12.5 engine/liquidity.rs: lender side of the pool, plus the timelocked engine switch.

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::core::Protocol;
use super::results::{PoolPosition, ProtocolError};
use crate::events::{CreditEngineChangedEvent, CreditEngineQueuedEvent, EventPayload, PoolFlowEvent};
use crate::timelock::TimelockState;
use crate::types::{Address, Quote};
use crate::venue::PerpVenue;

impl<V: PerpVenue> Protocol<V> {
    pub fn provide(&mut self, caller: Address, amount: Quote, min_shares: Decimal) -> Result<Decimal, ProtocolError> {
        let amount = amount.truncate(self.config.stable_decimals());
        let shares = self.pool.provide_from(&mut self.ledger, caller, amount, min_shares)?;
        self.emit_event(EventPayload::Deposited(PoolFlowEvent { account: caller, amount, shares }));
        Ok(shares)
    }

    pub fn withdraw(&mut self, caller: Address, shares: Decimal, min_amount: Quote) -> Result<Quote, ProtocolError> {
        let amount = self.pool.withdraw(&mut self.ledger, caller, shares, min_amount)?;
        self.emit_event(EventPayload::Withdrawn(PoolFlowEvent { account: caller, amount, shares }));
        Ok(amount)
    }

    pub fn pool_value(&self) -> Quote {
        self.pool.value(&self.ledger)
    }

    pub fn pool_position(&self, holder: Address) -> PoolPosition {
        let shares = self.pool.shares_of(holder);
        PoolPosition {
            shares,
            value: self.pool.amount_for(&self.ledger, shares),
        }
    }

    /// Queue a credit engine change. It becomes committable after the delay.
    pub fn unlock_function(&mut self, caller: Address, target: Address) -> Result<TimelockState, ProtocolError> {
        let state = self.pool.unlock_function(caller, target, self.current_time)?;
        if let TimelockState::Queued { eligible_at, .. } = state {
            info!(%target, %eligible_at, "credit engine change queued");
            self.emit_event(EventPayload::CreditEngineQueued(CreditEngineQueuedEvent { target, eligible_at }));
        }
        Ok(state)
    }

    pub fn lock_function(&mut self, caller: Address) -> Result<(), ProtocolError> {
        self.pool.lock_function(caller)?;
        Ok(())
    }

    pub fn set_credit_engine(&mut self, caller: Address, target: Address) -> Result<(), ProtocolError> {
        let previous = self.pool.credit_engine();
        self.pool.set_credit_engine(caller, target, self.current_time)?;
        // router follows the pool so a retired engine can no longer force closes
        self.router.set_credit_engine(caller, target)?;
        // this protocol keeps signing as CREDIT_ENGINE, so its own borrows and
        // liquidations stop here
        if target != Address::CREDIT_ENGINE {
            warn!(%previous, current = %target, "pool no longer lends to this credit engine");
        }
        self.emit_event(EventPayload::CreditEngineChanged(CreditEngineChangedEvent { previous, current: target }));
        Ok(())
    }
}
