//! Record of a paid Merkle claim. Its existence at the claimant's address is
//! what makes a second claim for the same epoch fail.

use {
    crate::account::{discriminators, AccountState},
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ClaimStatus {
    ncn: Pubkey,
    epoch: u64,
    claimant: Pubkey,
    amount: u64,
    slot_claimed: u64,
    bump: u8,
    reserved: [u8; 64],
}

impl AccountState for ClaimStatus {
    const DISCRIMINATOR: u8 = discriminators::CLAIM_STATUS;
}

impl ClaimStatus {
    pub fn new(
        ncn: Pubkey,
        epoch: u64,
        claimant: Pubkey,
        amount: u64,
        slot_claimed: u64,
        bump: u8,
    ) -> Self {
        Self {
            ncn,
            epoch,
            claimant,
            amount,
            slot_claimed,
            bump,
            reserved: [0; 64],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn claimant(&self) -> &Pubkey {
        &self.claimant
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn slot_claimed(&self) -> u64 {
        self.slot_claimed
    }
}
