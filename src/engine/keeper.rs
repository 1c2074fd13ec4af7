// 12.6 engine/keeper.rs: request execution. liquidation closes settle here, from the
// venue's reported numbers.

use tracing::{info, warn};

use super::core::Protocol;
use super::results::{ExecutionOutcome, ProtocolError};
use crate::credit::Settlement;
use crate::events::{BadDebtEvent, EventPayload, LiquidationReleasedEvent, LiquidationSettledEvent, RequestExecutedEvent};
use crate::types::{Address, RequestKey, RequestKind, SlotId};
use crate::venue::{ExecutionReport, PerpVenue, VenueError};

impl<V: PerpVenue> Protocol<V> {
    pub fn execute_increase(
        &mut self,
        keeper: Address,
        key: RequestKey,
        fee_receiver: Address,
    ) -> Result<ExecutionOutcome, ProtocolError> {
        let report = self
            .venue
            .execute_increase_position(&mut self.ledger, keeper, key, fee_receiver, self.current_time)?;
        self.router.on_execution(&report);
        self.record_execution(&report);
        Ok(ExecutionOutcome { report, settlement: None, released: None })
    }

    pub fn execute_decrease(
        &mut self,
        keeper: Address,
        key: RequestKey,
        fee_receiver: Address,
    ) -> Result<ExecutionOutcome, ProtocolError> {
        let report = self
            .venue
            .execute_decrease_position(&mut self.ledger, keeper, key, fee_receiver, self.current_time)?;
        self.router.on_execution(&report);
        self.record_execution(&report);

        let mut outcome = ExecutionOutcome { report, settlement: None, released: None };
        if self.credit.closing_slot(key).is_none() {
            return Ok(outcome);
        }
        if outcome.report.is_executed() {
            outcome.settlement = Some(self.settle_liquidation(&outcome.report)?);
        } else {
            let slot = self.credit.release(key)?;
            info!(%slot, %key, "liquidation close cancelled, claim released");
            self.emit_event(EventPayload::LiquidationReleased(LiquidationReleasedEvent { slot, key }));
            outcome.released = Some(slot);
        }
        Ok(outcome)
    }

    /// Process every pending venue request, oldest first.
    pub fn execute_pending(&mut self, keeper: Address, fee_receiver: Address) -> Result<Vec<ExecutionOutcome>, ProtocolError> {
        let mut outcomes = Vec::new();
        for key in self.venue.pending_keys() {
            let kind = self
                .venue
                .pending_request(key)
                .map(|r| r.kind())
                .ok_or(VenueError::RequestNotFound(key))?;
            let outcome = match kind {
                RequestKind::Increase => self.execute_increase(keeper, key, fee_receiver)?,
                RequestKind::Decrease => self.execute_decrease(keeper, key, fee_receiver)?,
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn record_execution(&mut self, report: &ExecutionReport) {
        self.emit_event(EventPayload::RequestExecuted(RequestExecutedEvent {
            key: report.key,
            kind: report.kind,
            status: report.status.clone(),
            fill_price: report.fill_price,
            size_delta: report.size_delta,
            amount_out: report.amount_out,
        }));
    }

    // proceeds already sit with the credit engine. pool first, then the liquidator,
    // the rest and the token go back to the borrower.
    fn settle_liquidation(&mut self, report: &ExecutionReport) -> Result<Settlement, ProtocolError> {
        let key = report.key;
        let settlement = self
            .credit
            .plan_settlement(key, report.amount_out, report.realized_pnl, self.current_time)?;
        let slot: SlotId = settlement.slot;
        let stable = self.config.stable_asset;
        let split = settlement.split;

        let recovery = self
            .pool
            .receive_recovery(&mut self.ledger, Address::CREDIT_ENGINE, settlement.principal, split.pool)?;
        self.ledger
            .transfer(Address::CREDIT_ENGINE, settlement.liquidator, stable, split.liquidator_fee)?;
        self.ledger.transfer(Address::CREDIT_ENGINE, settlement.owner, stable, split.owner)?;
        self.tokens.transfer(Address::CREDIT_ENGINE, settlement.owner, slot)?;
        self.credit.finish_settlement(key, slot);

        info!(
            %slot,
            %key,
            kind = ?settlement.kind,
            amount_out = %report.amount_out,
            pool = %split.pool,
            liquidator_fee = %split.liquidator_fee,
            owner = %split.owner,
            "liquidation settled"
        );
        if split.shortfall.is_positive() {
            warn!(%slot, shortfall = %split.shortfall, bad_debt = %recovery.bad_debt, "liquidation left debt uncovered");
            self.emit_event(EventPayload::BadDebt(BadDebtEvent { slot, amount: split.shortfall }));
        }
        self.emit_event(EventPayload::LiquidationSettled(LiquidationSettledEvent {
            slot,
            key,
            kind: settlement.kind,
            owner: settlement.owner,
            liquidator: settlement.liquidator,
            amount_out: report.amount_out,
            split,
        }));
        Ok(settlement)
    }
}
