//! Epoch and operator snapshots: delegated stake frozen into stake weight.
//!
//! An operator snapshot expects one delegation record per registry vault and
//! finalizes the moment the last one is registered. Each finalized operator
//! snapshot is folded into the epoch snapshot, which finalizes once every
//! operator has been folded in.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::MAX_VAULT_OPERATOR_DELEGATIONS,
        error::TipRouterError,
        fee_group::NcnFeeGroup,
        fees::Fees,
        stake_weight::StakeWeights,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EpochSnapshot {
    ncn: Pubkey,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    slot_finalized: u64,
    finalized: bool,
    operator_count: u64,
    vault_count: u64,
    operators_registered: u64,
    valid_operator_vault_delegations: u64,
    fees: Fees,
    stake_weights: StakeWeights,
    reserved: [u8; 128],
}

impl AccountState for EpochSnapshot {
    const DISCRIMINATOR: u8 = discriminators::EPOCH_SNAPSHOT;
}

impl EpochSnapshot {
    pub fn new(
        ncn: Pubkey,
        epoch: u64,
        bump: u8,
        current_slot: u64,
        operator_count: u64,
        vault_count: u64,
        fees: Fees,
    ) -> Result<Self, TipRouterError> {
        if operator_count == 0 {
            return Err(TipRouterError::NoOperators);
        }
        Ok(Self {
            ncn,
            epoch,
            bump,
            slot_created: current_slot,
            slot_finalized: 0,
            finalized: false,
            operator_count,
            vault_count,
            operators_registered: 0,
            valid_operator_vault_delegations: 0,
            fees,
            stake_weights: StakeWeights::default(),
            reserved: [0; 128],
        })
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn operator_count(&self) -> u64 {
        self.operator_count
    }

    pub fn vault_count(&self) -> u64 {
        self.vault_count
    }

    pub fn operators_registered(&self) -> u64 {
        self.operators_registered
    }

    pub fn valid_operator_vault_delegations(&self) -> u64 {
        self.valid_operator_vault_delegations
    }

    pub fn fees(&self) -> &Fees {
        &self.fees
    }

    pub fn stake_weights(&self) -> &StakeWeights {
        &self.stake_weights
    }

    pub fn finalized(&self) -> bool {
        self.finalized
    }

    pub fn slot_finalized(&self) -> u64 {
        self.slot_finalized
    }

    /// Folds a finalized operator snapshot into the epoch totals.
    pub fn register_operator(
        &mut self,
        operator_snapshot: &OperatorSnapshot,
        current_slot: u64,
    ) -> Result<(), TipRouterError> {
        if self.finalized {
            return Err(TipRouterError::EpochSnapshotAlreadyFinalized);
        }
        if !operator_snapshot.finalized() {
            return Err(TipRouterError::OperatorSnapshotNotFinalized);
        }
        if operator_snapshot.operator_index() >= self.operator_count {
            return Err(TipRouterError::OperatorIsNotInSnapshot);
        }

        self.stake_weights
            .increment(operator_snapshot.stake_weights())?;
        self.valid_operator_vault_delegations = self
            .valid_operator_vault_delegations
            .checked_add(operator_snapshot.valid_operator_vault_delegations())
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        self.operators_registered = self
            .operators_registered
            .checked_add(1)
            .ok_or(TipRouterError::ArithmeticOverflow)?;

        if self.operators_registered == self.operator_count {
            self.finalized = true;
            self.slot_finalized = current_slot;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VaultOperatorDelegationSnapshot {
    vault: Pubkey,
    mint: Pubkey,
    vault_index: u64,
    total_security: u64,
    stake_weights: StakeWeights,
    slot_set: u64,
    is_set: bool,
}

impl VaultOperatorDelegationSnapshot {
    pub fn vault(&self) -> &Pubkey {
        &self.vault
    }

    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn total_security(&self) -> u64 {
        self.total_security
    }

    pub fn stake_weights(&self) -> &StakeWeights {
        &self.stake_weights
    }

    pub fn is_set(&self) -> bool {
        self.is_set
    }
}

/// One delegation to register into an [`OperatorSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegationRecord {
    pub vault: Pubkey,
    pub vault_index: u64,
    pub mint: Pubkey,
    pub ncn_fee_group: NcnFeeGroup,
    pub security: u64,
    pub weight: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OperatorSnapshot {
    operator: Pubkey,
    ncn: Pubkey,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    slot_finalized: u64,
    finalized: bool,
    is_active: bool,
    operator_index: u64,
    operator_fee_bps: u16,
    vault_operator_delegation_count: u64,
    vault_operator_delegations_registered: u64,
    valid_operator_vault_delegations: u64,
    stake_weights: StakeWeights,
    reserved: [u8; 64],
    delegations: [VaultOperatorDelegationSnapshot; MAX_VAULT_OPERATOR_DELEGATIONS],
}

impl AccountState for OperatorSnapshot {
    const DISCRIMINATOR: u8 = discriminators::OPERATOR_SNAPSHOT;
}

impl OperatorSnapshot {
    /// An inactive operator, or one with nothing to register, is finalized
    /// immediately with zero stake weight.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operator: Pubkey,
        ncn: Pubkey,
        epoch: u64,
        bump: u8,
        current_slot: u64,
        is_active: bool,
        operator_index: u64,
        operator_fee_bps: u16,
        vault_count: u64,
    ) -> Result<Self, TipRouterError> {
        let expected = if is_active { vault_count } else { 0 };
        if expected > MAX_VAULT_OPERATOR_DELEGATIONS as u64 {
            return Err(TipRouterError::TooManyVaultOperatorDelegations);
        }

        let finalized = expected == 0;
        Ok(Self {
            operator,
            ncn,
            epoch,
            bump,
            slot_created: current_slot,
            slot_finalized: if finalized { current_slot } else { 0 },
            finalized,
            is_active,
            operator_index,
            operator_fee_bps,
            vault_operator_delegation_count: expected,
            vault_operator_delegations_registered: 0,
            valid_operator_vault_delegations: 0,
            stake_weights: StakeWeights::default(),
            reserved: [0; 64],
            delegations: [VaultOperatorDelegationSnapshot::default(); MAX_VAULT_OPERATOR_DELEGATIONS],
        })
    }

    pub fn operator(&self) -> &Pubkey {
        &self.operator
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn operator_index(&self) -> u64 {
        self.operator_index
    }

    pub fn operator_fee_bps(&self) -> u16 {
        self.operator_fee_bps
    }

    pub fn finalized(&self) -> bool {
        self.finalized
    }

    pub fn slot_finalized(&self) -> u64 {
        self.slot_finalized
    }

    pub fn stake_weights(&self) -> &StakeWeights {
        &self.stake_weights
    }

    pub fn vault_operator_delegation_count(&self) -> u64 {
        self.vault_operator_delegation_count
    }

    pub fn vault_operator_delegations_registered(&self) -> u64 {
        self.vault_operator_delegations_registered
    }

    pub fn valid_operator_vault_delegations(&self) -> u64 {
        self.valid_operator_vault_delegations
    }

    pub fn delegations(&self) -> impl Iterator<Item = &VaultOperatorDelegationSnapshot> {
        self.delegations.iter().filter(|delegation| delegation.is_set)
    }

    pub fn delegation(&self, vault: &Pubkey) -> Option<&VaultOperatorDelegationSnapshot> {
        self.delegations().find(|delegation| delegation.vault == *vault)
    }

    /// Records one vault's delegation. Its stake weight is computed here, once,
    /// from the weight passed in and never revisited.
    pub fn register_delegation(
        &mut self,
        record: &DelegationRecord,
        current_slot: u64,
    ) -> Result<(), TipRouterError> {
        if self.finalized {
            return Err(TipRouterError::VaultOperatorDelegationFinalized);
        }
        if self.delegation(&record.vault).is_some() {
            return Err(TipRouterError::DuplicateVaultOperatorDelegation);
        }

        let index = usize::try_from(self.vault_operator_delegations_registered)
            .map_err(|_| TipRouterError::ArithmeticOverflow)?;
        let stake_weights =
            StakeWeights::snapshot(record.ncn_fee_group, record.security, record.weight)?;

        let slot = self
            .delegations
            .get_mut(index)
            .ok_or(TipRouterError::TooManyVaultOperatorDelegations)?;
        *slot = VaultOperatorDelegationSnapshot {
            vault: record.vault,
            mint: record.mint,
            vault_index: record.vault_index,
            total_security: record.security,
            stake_weights,
            slot_set: current_slot,
            is_set: true,
        };

        self.stake_weights.increment(&stake_weights)?;
        if stake_weights.stake_weight() > 0 {
            self.valid_operator_vault_delegations = self
                .valid_operator_vault_delegations
                .checked_add(1)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }
        self.vault_operator_delegations_registered = self
            .vault_operator_delegations_registered
            .checked_add(1)
            .ok_or(TipRouterError::ArithmeticOverflow)?;

        if self.vault_operator_delegations_registered == self.vault_operator_delegation_count {
            self.finalized = true;
            self.slot_finalized = current_slot;
        }
        Ok(())
    }
}
