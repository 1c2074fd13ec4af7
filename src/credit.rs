// 4.0 credit.rs: credit engine state. loans keyed by slot, rates, border coefficients
// and the set of liquidation closes in flight.
// checks and state transitions live here. token and ledger movements are driven by
// the protocol so every step can be validated before anything moves.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{BorderCoef, CreditParams};
use crate::loan::{
    border_price, border_split, crossed, hard_split, liquidation_price, max_borrow, trigger_price, LiquidationKind,
    LiquidationSplit, LoanRecord, LoanStatus,
};
use crate::position::{PositionDelta, VenuePosition};
use crate::types::{Address, AssetId, Price, Quote, RequestKey, SlotId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreditError {
    #[error("position {0} is already locked")]
    AlreadyLocked(SlotId),
    #[error("position {0} is not locked")]
    NotLocked(SlotId),
    #[error("not the owner of the position")]
    NotLoanOwner { slot: SlotId, caller: Address },
    #[error("amount less minBorrowLimit")]
    BelowMinBorrow { amount: Quote, minimum: Quote },
    #[error("borrow is too big")]
    BorrowTooBig { requested: Quote, limit: Quote },
    #[error("repay amount must be positive")]
    ZeroRepay,
    #[error("nothing to repay")]
    NothingOwed(SlotId),
    #[error("loan must be repaid before unlock")]
    OutstandingDebt { slot: SlotId, owed: Quote },
    #[error("already closing")]
    AlreadyClosing(SlotId),
    #[error("liquidation not eligible: price {price}, trigger {trigger:?}")]
    NotEligible { price: Price, trigger: Option<Price> },
    #[error("border liquidation unavailable for {0}")]
    BorderUnavailable(AssetId),
    #[error("no open position for {0}")]
    NoPosition(SlotId),
    #[error("request {0} is not a pending liquidation")]
    UnknownSettlement(RequestKey),
    #[error("caller {0} is not the admin")]
    NotAdmin(Address),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// How a repayment is applied. Interest is always cleared before principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepayPlan {
    pub interest: Quote,
    pub principal: Quote,
}

impl RepayPlan {
    pub fn total(&self) -> Quote {
        self.interest.add(self.principal)
    }
}

/// Liquidation outcome for a claimed slot, computed from what the venue reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub slot: SlotId,
    pub owner: Address,
    pub liquidator: Address,
    pub kind: LiquidationKind,
    pub principal: Quote,
    pub interest: Quote,
    pub split: LiquidationSplit,
}

#[derive(Debug, Clone)]
pub struct CreditEngine {
    admin: Address,
    params: CreditParams,
    stable_decimals: u32,
    interest_rate: Decimal,
    border_coefs: HashMap<AssetId, Decimal>,
    loans: HashMap<SlotId, LoanRecord>,
    // liquidation close request -> slot. an entry is consumed by settle or release,
    // so a key can only be settled once.
    closing: HashMap<RequestKey, SlotId>,
}

impl CreditEngine {
    pub fn new(params: CreditParams, border_coefs: &[BorderCoef], stable_decimals: u32, admin: Address) -> Self {
        Self {
            admin,
            interest_rate: params.interest_rate,
            params,
            stable_decimals,
            border_coefs: border_coefs.iter().map(|c| (c.asset, c.coef)).collect(),
            loans: HashMap::new(),
            closing: HashMap::new(),
        }
    }

    pub fn params(&self) -> &CreditParams {
        &self.params
    }

    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate
    }

    pub fn border_coef(&self, asset: AssetId) -> Decimal {
        self.border_coefs.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn loan(&self, slot: SlotId) -> Option<&LoanRecord> {
        self.loans.get(&slot)
    }

    pub fn closing_slot(&self, key: RequestKey) -> Option<SlotId> {
        self.closing.get(&key).copied()
    }

    pub fn owed(&self, slot: SlotId, now: Timestamp) -> Quote {
        self.loans.get(&slot).map(|l| l.owed(now)).unwrap_or_default()
    }

    fn require_loan(&self, slot: SlotId) -> Result<&LoanRecord, CreditError> {
        self.loans.get(&slot).ok_or(CreditError::NotLocked(slot))
    }

    fn require_owner(&self, slot: SlotId, caller: Address) -> Result<&LoanRecord, CreditError> {
        let loan = self.require_loan(slot)?;
        if loan.owner != caller {
            return Err(CreditError::NotLoanOwner { slot, caller });
        }
        Ok(loan)
    }

    // --- admin ---

    pub fn set_interest_rate(&mut self, caller: Address, rate: Decimal) -> Result<(), CreditError> {
        if caller != self.admin {
            return Err(CreditError::NotAdmin(caller));
        }
        if rate < Decimal::ZERO {
            return Err(CreditError::InvalidParameter("interest rate cannot be negative".to_string()));
        }
        self.interest_rate = rate;
        Ok(())
    }

    pub fn set_border_price_coef(&mut self, caller: Address, asset: AssetId, coef: Decimal) -> Result<(), CreditError> {
        if caller != self.admin {
            return Err(CreditError::NotAdmin(caller));
        }
        if coef < Decimal::ZERO {
            return Err(CreditError::InvalidParameter("border coefficient cannot be negative".to_string()));
        }
        self.border_coefs.insert(asset, coef);
        Ok(())
    }

    // --- lock / unlock ---

    pub fn check_lock(&self, slot: SlotId) -> Result<(), CreditError> {
        if self.loans.contains_key(&slot) {
            return Err(CreditError::AlreadyLocked(slot));
        }
        Ok(())
    }

    pub fn open_loan(&mut self, owner: Address, slot: SlotId, now: Timestamp) {
        self.loans.insert(slot, LoanRecord::new(owner, slot, self.interest_rate, now));
    }

    pub fn check_unlock(&self, caller: Address, slot: SlotId, now: Timestamp) -> Result<(), CreditError> {
        let loan = self.require_owner(slot, caller)?;
        if loan.is_closing() {
            return Err(CreditError::AlreadyClosing(slot));
        }
        let owed = loan.owed(now).truncate(self.stable_decimals);
        if owed.is_positive() {
            return Err(CreditError::OutstandingDebt { slot, owed });
        }
        Ok(())
    }

    pub fn close_loan(&mut self, slot: SlotId) -> Option<LoanRecord> {
        self.loans.remove(&slot)
    }

    // --- borrow / repay ---

    pub fn max_borrow_limit(&self, delta: &PositionDelta) -> Quote {
        max_borrow(delta, self.params.max_borrow_bps, self.stable_decimals)
    }

    /// Returns the amount cut to token precision, which is what gets lent.
    pub fn check_borrow(&self, caller: Address, slot: SlotId, amount: Quote, delta: &PositionDelta) -> Result<Quote, CreditError> {
        let amount = amount.truncate(self.stable_decimals);
        let loan = self.require_owner(slot, caller)?;
        if loan.is_closing() {
            return Err(CreditError::AlreadyClosing(slot));
        }
        if amount < self.params.min_borrow || !amount.is_positive() {
            return Err(CreditError::BelowMinBorrow { amount, minimum: self.params.min_borrow });
        }
        let limit = self.max_borrow_limit(delta);
        let requested = loan.principal.add(amount);
        if requested > limit {
            return Err(CreditError::BorrowTooBig { requested, limit });
        }
        Ok(amount)
    }

    // checkpoint at the old rate, then new money runs at the current rate
    pub fn record_borrow(&mut self, slot: SlotId, amount: Quote, now: Timestamp) -> Result<&LoanRecord, CreditError> {
        let rate = self.interest_rate;
        let loan = self.loans.get_mut(&slot).ok_or(CreditError::NotLocked(slot))?;
        loan.accrue(now);
        loan.principal = loan.principal.add(amount);
        loan.rate = rate;
        Ok(&*loan)
    }

    // interest first, then principal. overpayment is capped at what is owed.
    pub fn plan_repay(&self, slot: SlotId, amount: Quote, now: Timestamp) -> Result<RepayPlan, CreditError> {
        let amount = amount.truncate(self.stable_decimals);
        if !amount.is_positive() {
            return Err(CreditError::ZeroRepay);
        }
        let loan = self.require_loan(slot)?;
        if loan.is_closing() {
            return Err(CreditError::AlreadyClosing(slot));
        }
        let interest_due = loan.interest_owed(now).truncate(self.stable_decimals);
        if interest_due.is_zero() && loan.principal.is_zero() {
            return Err(CreditError::NothingOwed(slot));
        }
        let interest = amount.min(interest_due);
        let principal = amount.sub(interest).min(loan.principal);
        Ok(RepayPlan { interest, principal })
    }

    pub fn record_repay(&mut self, slot: SlotId, plan: &RepayPlan, now: Timestamp) -> Result<&LoanRecord, CreditError> {
        let decimals = self.stable_decimals;
        let loan = self.loans.get_mut(&slot).ok_or(CreditError::NotLocked(slot))?;
        loan.accrue(now);
        // sub-unit interest dust below token precision is forgiven with the last payment
        loan.accrued_interest = loan.accrued_interest.sub(plan.interest).max(Quote::zero());
        if loan.accrued_interest.truncate(decimals).is_zero() {
            loan.accrued_interest = Quote::zero();
        }
        loan.principal = loan.principal.sub(plan.principal);
        Ok(&*loan)
    }

    // --- liquidation ---

    pub fn liq_price(&self, slot: SlotId, position: &VenuePosition, now: Timestamp) -> Option<Price> {
        let owed = self.owed(slot, now);
        liquidation_price(position.side, position.size, position.average_price, owed, self.params.liquidation_ratio)
    }

    pub fn border_price(&self, slot: SlotId, position: &VenuePosition, now: Timestamp) -> Option<Price> {
        let owed = self.owed(slot, now);
        border_price(
            position.side,
            position.size,
            position.average_price,
            owed,
            self.border_coef(slot.index_asset()),
            self.params.border_multiplier,
        )
    }

    pub fn current_trigger_price(&self, slot: SlotId, position: &VenuePosition, now: Timestamp) -> Option<Price> {
        trigger_price(position.side, self.liq_price(slot, position, now), self.border_price(slot, position, now))
    }

    /// Eligibility check for a liquidation claim. Returns the trigger that was crossed.
    pub fn check_liquidation(
        &self,
        slot: SlotId,
        kind: LiquidationKind,
        position: &VenuePosition,
        price: Price,
        now: Timestamp,
    ) -> Result<Price, CreditError> {
        let loan = self.require_loan(slot)?;
        if loan.is_closing() {
            return Err(CreditError::AlreadyClosing(slot));
        }
        let trigger = match kind {
            LiquidationKind::Hard => self.liq_price(slot, position, now),
            LiquidationKind::Border => {
                if self.border_coef(slot.index_asset()).is_zero() {
                    return Err(CreditError::BorderUnavailable(slot.index_asset()));
                }
                self.border_price(slot, position, now)
            }
        };
        match trigger {
            Some(t) if crossed(position.side, price, t) => Ok(t),
            _ => Err(CreditError::NotEligible { price, trigger }),
        }
    }

    // atomic claim. the second caller sees Closing and fails.
    pub fn claim(&mut self, slot: SlotId, key: RequestKey, kind: LiquidationKind, liquidator: Address) -> Result<(), CreditError> {
        let loan = self.loans.get_mut(&slot).ok_or(CreditError::NotLocked(slot))?;
        if loan.is_closing() {
            return Err(CreditError::AlreadyClosing(slot));
        }
        loan.status = LoanStatus::Closing { request_key: key, kind, liquidator };
        self.closing.insert(key, slot);
        Ok(())
    }

    // venue cancelled the close. slot is liquidatable again.
    pub fn release(&mut self, key: RequestKey) -> Result<SlotId, CreditError> {
        let slot = self.closing.remove(&key).ok_or(CreditError::UnknownSettlement(key))?;
        if let Some(loan) = self.loans.get_mut(&slot) {
            loan.status = LoanStatus::Active;
        }
        Ok(slot)
    }

    /// Compute the split for an executed liquidation close, from the venue's own
    /// numbers. Does not mutate; `finish_settlement` removes the loan.
    pub fn plan_settlement(
        &self,
        key: RequestKey,
        amount_out: Quote,
        realized_pnl: Quote,
        now: Timestamp,
    ) -> Result<Settlement, CreditError> {
        let slot = *self.closing.get(&key).ok_or(CreditError::UnknownSettlement(key))?;
        let loan = self.require_loan(slot)?;
        let (kind, liquidator) = match loan.status {
            LoanStatus::Closing { kind, liquidator, .. } => (kind, liquidator),
            LoanStatus::Active => return Err(CreditError::UnknownSettlement(key)),
        };
        let interest = loan.interest_owed(now).truncate(self.stable_decimals);
        let owed = loan.principal.add(interest);
        let split = match kind {
            LiquidationKind::Hard => {
                hard_split(amount_out, realized_pnl, owed, self.params.liquidator_fee_bps, self.stable_decimals)
            }
            LiquidationKind::Border => border_split(amount_out, owed, self.params.liquidator_fee_bps, self.stable_decimals),
        };
        Ok(Settlement {
            slot,
            owner: loan.owner,
            liquidator,
            kind,
            principal: loan.principal,
            interest,
            split,
        })
    }

    pub fn finish_settlement(&mut self, key: RequestKey, slot: SlotId) {
        self.closing.remove(&key);
        self.loans.remove(&slot);
    }
}
