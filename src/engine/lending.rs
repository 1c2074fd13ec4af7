// 12.4 engine/lending.rs: credit operations. lock, borrow, repay, liquidate.
// each op validates everything first, then moves tokens, then writes state.

use rust_decimal::Decimal;
use tracing::info;

use super::core::Protocol;
use super::results::{BorrowResult, LiquidationRequest, ProtocolError, RepayResult, SlotInfo};
use crate::credit::CreditError;
use crate::events::{
    BorderCoefSetEvent, BorrowedEvent, CollateralEvent, EventPayload, InterestRateSetEvent, LiquidationRequestedEvent,
    RepaidEvent,
};
use crate::loan::{LiquidationKind, LoanRecord};
use crate::types::{Address, AssetId, Price, Quote, SlotId};
use crate::venue::PerpVenue;

impl<V: PerpVenue> Protocol<V> {
    pub fn loan(&self, slot: SlotId) -> Option<&LoanRecord> {
        self.credit.loan(slot)
    }

    pub fn owed(&self, slot: SlotId) -> Quote {
        self.credit.owed(slot, self.current_time).truncate(self.config.stable_decimals())
    }

    /// Escrow the slot token with the credit engine and open an empty loan.
    pub fn lock_collateral(&mut self, caller: Address, slot: SlotId) -> Result<(), ProtocolError> {
        self.credit.check_lock(slot)?;
        self.tokens.ensure_owner(slot, caller)?;
        // a close already in flight would pay out past the escrow
        if self.router.has_pending_decrease(slot) {
            return Err(ProtocolError::CloseInFlight(slot));
        }

        self.tokens.transfer(caller, Address::CREDIT_ENGINE, slot)?;
        self.credit.open_loan(caller, slot, self.current_time);
        self.emit_event(EventPayload::CollateralLocked(CollateralEvent { slot, owner: caller }));
        Ok(())
    }

    pub fn unlock_collateral(&mut self, caller: Address, slot: SlotId) -> Result<(), ProtocolError> {
        self.credit.check_unlock(caller, slot, self.current_time)?;
        self.tokens.transfer(Address::CREDIT_ENGINE, caller, slot)?;
        self.credit.close_loan(slot);
        self.emit_event(EventPayload::CollateralUnlocked(CollateralEvent { slot, owner: caller }));
        Ok(())
    }

    // maxBorrowLimit: share of the slot's unrealized profit at the live price
    pub fn max_borrow_limit(&self, slot: SlotId) -> Result<Quote, ProtocolError> {
        let delta = self.router.slot_delta(&self.venue, slot)?;
        Ok(self.credit.max_borrow_limit(&delta))
    }

    pub fn borrow(&mut self, caller: Address, slot: SlotId, amount: Quote) -> Result<BorrowResult, ProtocolError> {
        let now = self.current_time;
        let delta = self.router.slot_delta(&self.venue, slot)?;
        let amount = self.credit.check_borrow(caller, slot, amount, &delta)?;
        self.pool.check_disburse(&self.ledger, Address::CREDIT_ENGINE, amount)?;

        self.pool.disburse(&mut self.ledger, Address::CREDIT_ENGINE, caller, amount)?;
        let principal = self.credit.record_borrow(slot, amount, now)?.principal;
        let max_borrow = self.credit.max_borrow_limit(&delta);

        self.emit_event(EventPayload::Borrowed(BorrowedEvent {
            slot,
            owner: caller,
            amount,
            principal,
            max_borrow,
        }));
        Ok(BorrowResult { slot, amount, principal, max_borrow })
    }

    /// Interest first, then principal. Anything above what is owed is not taken.
    pub fn repay(&mut self, caller: Address, slot: SlotId, amount: Quote) -> Result<RepayResult, ProtocolError> {
        let now = self.current_time;
        let plan = self.credit.plan_repay(slot, amount, now)?;
        self.ledger.ensure_balance(caller, self.pool.asset(), plan.total())?;

        self.pool.receive_repayment(&mut self.ledger, caller, plan.principal, plan.interest)?;
        let remaining_principal = self.credit.record_repay(slot, &plan, now)?.principal;

        self.emit_event(EventPayload::Repaid(RepaidEvent {
            slot,
            payer: caller,
            interest: plan.interest,
            principal: plan.principal,
            remaining_principal,
        }));
        Ok(RepayResult {
            slot,
            interest_paid: plan.interest,
            principal_paid: plan.principal,
            remaining_principal,
        })
    }

    pub fn liq_price(&self, slot: SlotId) -> Option<Price> {
        let position = self.router.slot_position(&self.venue, slot)?;
        self.credit.liq_price(slot, &position, self.current_time)
    }

    pub fn border_price(&self, slot: SlotId) -> Option<Price> {
        let position = self.router.slot_position(&self.venue, slot)?;
        self.credit.border_price(slot, &position, self.current_time)
    }

    pub fn current_trigger_price(&self, slot: SlotId) -> Option<Price> {
        let position = self.router.slot_position(&self.venue, slot)?;
        self.credit.current_trigger_price(slot, &position, self.current_time)
    }

    pub fn slot_info(&self, slot: SlotId) -> Result<SlotInfo, ProtocolError> {
        let price = self.current_price(slot)?;
        Ok(SlotInfo {
            slot,
            holder: self.tokens.owner_of(slot).ok(),
            position: self.router.slot_position(&self.venue, slot),
            price,
            owed: self.owed(slot),
            max_borrow: self.max_borrow_limit(slot)?,
            liq_price: self.liq_price(slot),
            border_price: self.border_price(slot),
            trigger_price: self.current_trigger_price(slot),
        })
    }

    /// Permissionless. Claims the slot and requests a full close once the live price
    /// has crossed liqPrice.
    pub fn liquidate(&mut self, caller: Address, slot: SlotId, execution_fee: Quote) -> Result<LiquidationRequest, ProtocolError> {
        self.request_liquidation(caller, slot, LiquidationKind::Hard, execution_fee)
    }

    pub fn liquidate_by_border_price(
        &mut self,
        caller: Address,
        slot: SlotId,
        execution_fee: Quote,
    ) -> Result<LiquidationRequest, ProtocolError> {
        self.request_liquidation(caller, slot, LiquidationKind::Border, execution_fee)
    }

    fn request_liquidation(
        &mut self,
        caller: Address,
        slot: SlotId,
        kind: LiquidationKind,
        execution_fee: Quote,
    ) -> Result<LiquidationRequest, ProtocolError> {
        let now = self.current_time;
        if self.credit.loan(slot).is_none() {
            return Err(CreditError::NotLocked(slot).into());
        }
        let position = self.router.slot_position(&self.venue, slot).ok_or(ProtocolError::NoPosition(slot))?;
        let price = self.venue.price(slot.index_asset())?;
        let trigger = self.credit.check_liquidation(slot, kind, &position, price, now)?;
        let owed = self.owed(slot);

        // closing a short buys, so the bound sits above the live price
        let slippage = self.credit.params().liquidation_slippage_bps;
        let acceptable = price.shifted(slippage, !position.side.is_long());

        let key = self.router.close_for_credit(
            &mut self.venue,
            &mut self.ledger,
            Address::CREDIT_ENGINE,
            caller,
            slot,
            acceptable,
            execution_fee,
            now,
        )?;
        self.credit.claim(slot, key, kind, caller)?;

        info!(%slot, %key, ?kind, %price, %trigger, %owed, liquidator = %caller, "liquidation requested");
        self.emit_event(EventPayload::LiquidationRequested(LiquidationRequestedEvent {
            slot,
            key,
            kind,
            liquidator: caller,
            price,
            trigger,
            owed,
        }));
        Ok(LiquidationRequest { slot, key, kind, price, trigger, owed })
    }

    pub fn set_interest_rate(&mut self, caller: Address, rate: Decimal) -> Result<(), ProtocolError> {
        self.credit.set_interest_rate(caller, rate)?;
        self.emit_event(EventPayload::InterestRateSet(InterestRateSetEvent { rate }));
        Ok(())
    }

    pub fn set_border_price_coef(&mut self, caller: Address, asset: AssetId, coef: Decimal) -> Result<(), ProtocolError> {
        self.credit.set_border_price_coef(caller, asset, coef)?;
        self.emit_event(EventPayload::BorderCoefSet(BorderCoefSetEvent { asset, coef }));
        Ok(())
    }
}
