//! Tombstone written when an epoch's state account closes. While it exists
//! the epoch cannot be initialized again.

use {
    crate::account::{discriminators, AccountState},
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EpochMarker {
    ncn: Pubkey,
    epoch: u64,
    slot_closed: u64,
    reserved: [u8; 64],
}

impl AccountState for EpochMarker {
    const DISCRIMINATOR: u8 = discriminators::EPOCH_MARKER;
}

impl EpochMarker {
    pub fn new(ncn: Pubkey, epoch: u64, slot_closed: u64) -> Self {
        Self {
            ncn,
            epoch,
            slot_closed,
            reserved: [0; 64],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn slot_closed(&self) -> u64 {
        self.slot_closed
    }
}
