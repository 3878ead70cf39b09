//! Per-epoch stake-weight multipliers, one per tracked collateral mint.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::MAX_MINTS,
        error::TipRouterError,
        fee_group::NcnFeeGroup,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct WeightEntry {
    mint: Pubkey,
    ncn_fee_group: NcnFeeGroup,
    weight: u128,
    weight_set: bool,
    slot_set: u64,
    reserved: [u8; 16],
}

impl WeightEntry {
    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn ncn_fee_group(&self) -> NcnFeeGroup {
        self.ncn_fee_group
    }

    pub fn weight(&self) -> Option<u128> {
        self.weight_set.then_some(self.weight)
    }

    pub fn is_empty(&self) -> bool {
        self.mint == Pubkey::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct WeightTable {
    ncn: Pubkey,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    finalized: bool,
    reserved: [u8; 64],
    table: [WeightEntry; MAX_MINTS],
}

impl AccountState for WeightTable {
    const DISCRIMINATOR: u8 = discriminators::WEIGHT_TABLE;
}

impl WeightTable {
    /// Creates a table tracking exactly `mints`, all without weights.
    pub fn new<I>(
        ncn: Pubkey,
        epoch: u64,
        slot_created: u64,
        bump: u8,
        mints: I,
    ) -> Result<Self, TipRouterError>
    where
        I: IntoIterator<Item = (Pubkey, NcnFeeGroup)>,
    {
        let mut table = Self {
            ncn,
            epoch,
            bump,
            slot_created,
            finalized: false,
            reserved: [0; 64],
            table: [WeightEntry::default(); MAX_MINTS],
        };

        let mut count = 0usize;
        for (mint, ncn_fee_group) in mints {
            if table.entry(&mint).is_some() {
                return Err(TipRouterError::DuplicateMintsInTable);
            }
            let slot = table
                .table
                .get_mut(count)
                .ok_or(TipRouterError::TooManyMintsForTable)?;
            *slot = WeightEntry {
                mint,
                ncn_fee_group,
                ..WeightEntry::default()
            };
            count = count.saturating_add(1);
        }

        if count == 0 {
            return Err(TipRouterError::NoMintsInTable);
        }
        Ok(table)
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn finalized(&self) -> bool {
        self.finalized
    }

    pub fn entries(&self) -> impl Iterator<Item = &WeightEntry> {
        self.table.iter().filter(|entry| !entry.is_empty())
    }

    pub fn entry(&self, mint: &Pubkey) -> Option<&WeightEntry> {
        self.entries().find(|entry| entry.mint == *mint)
    }

    pub fn mint_count(&self) -> u64 {
        self.entries().count() as u64
    }

    pub fn weights_set(&self) -> u64 {
        self.entries().filter(|entry| entry.weight_set).count() as u64
    }

    pub fn set_weight(
        &mut self,
        mint: &Pubkey,
        weight: u128,
        current_slot: u64,
    ) -> Result<(), TipRouterError> {
        if self.finalized {
            return Err(TipRouterError::WeightTableAlreadyFinalized);
        }
        let entry = self
            .table
            .iter_mut()
            .find(|entry| !entry.is_empty() && entry.mint == *mint)
            .ok_or(TipRouterError::InvalidMintForWeightTable)?;
        entry.weight = weight;
        entry.weight_set = true;
        entry.slot_set = current_slot;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), TipRouterError> {
        if self.finalized {
            return Err(TipRouterError::WeightTableAlreadyFinalized);
        }
        if self.entries().any(|entry| !entry.weight_set) {
            return Err(TipRouterError::WeightNotFound);
        }
        self.finalized = true;
        Ok(())
    }

    /// Weight and fee group of `mint` in a finalized table.
    pub fn get_weight(&self, mint: &Pubkey) -> Result<(u128, NcnFeeGroup), TipRouterError> {
        if !self.finalized {
            return Err(TipRouterError::WeightTableNotFinalized);
        }
        let entry = self
            .entry(mint)
            .ok_or(TipRouterError::InvalidMintForWeightTable)?;
        let weight = entry.weight().ok_or(TipRouterError::WeightNotFound)?;
        Ok((weight, entry.ncn_fee_group))
    }
}
