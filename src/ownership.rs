// 10.0 ownership.rs: non-fungible ownership tokens, one per position slot.
// tokens are never burned. custody moves between the user and the credit engine escrow.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{Address, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    #[error("token {0} already minted")]
    AlreadyMinted(SlotId),
    #[error("token {0} does not exist")]
    NonexistentToken(SlotId),
    #[error("not the owner of the position")]
    NotOwner { slot: SlotId, caller: Address },
    #[error("cannot transfer to the zero address")]
    ZeroAddress,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipRegistry {
    owners: HashMap<SlotId, Address>,
    balances: HashMap<Address, u64>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, slot: SlotId) -> bool {
        self.owners.contains_key(&slot)
    }

    pub fn owner_of(&self, slot: SlotId) -> Result<Address, OwnershipError> {
        self.owners
            .get(&slot)
            .copied()
            .ok_or(OwnershipError::NonexistentToken(slot))
    }

    pub fn balance_of(&self, holder: Address) -> u64 {
        self.balances.get(&holder).copied().unwrap_or(0)
    }

    pub fn tokens_of(&self, holder: Address) -> Vec<SlotId> {
        let mut slots: Vec<SlotId> = self
            .owners
            .iter()
            .filter(|(_, owner)| **owner == holder)
            .map(|(slot, _)| *slot)
            .collect();
        slots.sort();
        slots
    }

    pub fn mint(&mut self, to: Address, slot: SlotId) -> Result<(), OwnershipError> {
        if to == Address::ZERO {
            return Err(OwnershipError::ZeroAddress);
        }
        if self.owners.contains_key(&slot) {
            return Err(OwnershipError::AlreadyMinted(slot));
        }
        self.owners.insert(slot, to);
        *self.balances.entry(to).or_insert(0) += 1;
        Ok(())
    }

    pub fn ensure_owner(&self, slot: SlotId, caller: Address) -> Result<(), OwnershipError> {
        if self.owner_of(slot)? != caller {
            return Err(OwnershipError::NotOwner { slot, caller });
        }
        Ok(())
    }

    // caller must hold the token
    pub fn transfer(&mut self, caller: Address, to: Address, slot: SlotId) -> Result<(), OwnershipError> {
        if to == Address::ZERO {
            return Err(OwnershipError::ZeroAddress);
        }
        self.ensure_owner(slot, caller)?;

        self.owners.insert(slot, to);
        if let Some(count) = self.balances.get_mut(&caller) {
            *count -= 1;
        }
        *self.balances.entry(to).or_insert(0) += 1;
        Ok(())
    }
}
