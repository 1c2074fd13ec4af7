// 8.1 timelock.rs: two-step admin change. queue a target, commit it once the delay
// has matured and before the grace window runs out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelockError {
    #[error("function is timelocked: nothing queued")]
    NotQueued,
    #[error("function is timelocked: queued for {queued}, not {requested}")]
    TargetMismatch { queued: Address, requested: Address },
    #[error("function is timelocked until {eligible_at}")]
    NotMatured { eligible_at: Timestamp },
    #[error("function is timelocked: window expired at {expires_at}")]
    Expired { expires_at: Timestamp },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelockState {
    Idle,
    Queued {
        target: Address,
        eligible_at: Timestamp,
        expires_at: Timestamp,
    },
    Committed {
        target: Address,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timelock {
    state: TimelockState,
    delay_ms: i64,
    grace_ms: i64,
}

impl Timelock {
    pub fn new(delay_ms: i64, grace_ms: i64) -> Self {
        Self {
            state: TimelockState::Idle,
            delay_ms,
            grace_ms,
        }
    }

    pub fn state(&self) -> TimelockState {
        self.state
    }

    // queuing again replaces any earlier entry and restarts the delay
    pub fn queue(&mut self, target: Address, now: Timestamp) -> TimelockState {
        let eligible_at = now.plus(self.delay_ms);
        self.state = TimelockState::Queued {
            target,
            eligible_at,
            expires_at: eligible_at.plus(self.grace_ms),
        };
        self.state
    }

    pub fn check(&self, target: Address, now: Timestamp) -> Result<(), TimelockError> {
        match self.state {
            TimelockState::Queued { target: queued, eligible_at, expires_at } => {
                if queued != target {
                    return Err(TimelockError::TargetMismatch { queued, requested: target });
                }
                if now < eligible_at {
                    return Err(TimelockError::NotMatured { eligible_at });
                }
                if now > expires_at {
                    return Err(TimelockError::Expired { expires_at });
                }
                Ok(())
            }
            _ => Err(TimelockError::NotQueued),
        }
    }

    pub fn commit(&mut self, target: Address, now: Timestamp) -> Result<(), TimelockError> {
        self.check(target, now)?;
        self.state = TimelockState::Committed { target };
        Ok(())
    }

    pub fn cancel(&mut self) {
        if let TimelockState::Queued { .. } = self.state {
            self.state = TimelockState::Idle;
        }
    }
}
