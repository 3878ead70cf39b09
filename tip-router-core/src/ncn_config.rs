//! Per-NCN configuration: admin roles, consensus windows and fees.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::*,
        error::TipRouterError,
        fees::FeeConfig,
        math::exceeds_fraction,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    serde::{Deserialize, Serialize},
    solana_pubkey::Pubkey,
};

/// Fraction of total stake weight a ballot must strictly exceed to win.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct ConsensusThreshold {
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for ConsensusThreshold {
    fn default() -> Self {
        Self {
            numerator: DEFAULT_CONSENSUS_NUMERATOR,
            denominator: DEFAULT_CONSENSUS_DENOMINATOR,
        }
    }
}

impl ConsensusThreshold {
    /// Accepts fractions in `[1/2, 1)`.
    pub fn validate(&self) -> Result<(), TipRouterError> {
        let at_least_half = self
            .numerator
            .checked_mul(2)
            .is_some_and(|doubled| doubled >= self.denominator);
        if self.numerator == 0 || self.numerator >= self.denominator || !at_least_half {
            return Err(TipRouterError::InvalidConsensusThreshold);
        }
        Ok(())
    }

    pub fn is_reached(&self, stake_weight: u128, total_stake_weight: u128) -> bool {
        exceeds_fraction(
            stake_weight,
            total_stake_weight,
            self.numerator,
            self.denominator,
        )
    }
}

/// Admin roles that can be rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigAdminRole {
    Admin,
    TieBreakerAdmin,
    FeeAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NcnConfig {
    pub ncn: Pubkey,
    pub admin: Pubkey,
    pub tie_breaker_admin: Pubkey,
    pub fee_admin: Pubkey,
    pub valid_slots_after_consensus: u64,
    pub epochs_before_stall: u64,
    pub epochs_after_consensus_before_close: u64,
    pub consensus_threshold: ConsensusThreshold,
    pub fee_config: FeeConfig,
    pub bump: u8,
    pub reserved: [u8; 127],
}

impl AccountState for NcnConfig {
    const DISCRIMINATOR: u8 = discriminators::NCN_CONFIG;
}

impl NcnConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ncn: Pubkey,
        admin: Pubkey,
        tie_breaker_admin: Pubkey,
        fee_admin: Pubkey,
        valid_slots_after_consensus: u64,
        epochs_before_stall: u64,
        epochs_after_consensus_before_close: u64,
        consensus_threshold: ConsensusThreshold,
        fee_config: FeeConfig,
        bump: u8,
    ) -> Result<Self, TipRouterError> {
        let config = Self {
            ncn,
            admin,
            tie_breaker_admin,
            fee_admin,
            valid_slots_after_consensus,
            epochs_before_stall,
            epochs_after_consensus_before_close,
            consensus_threshold,
            fee_config,
            bump,
            reserved: [0; 127],
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TipRouterError> {
        if !(MIN_VALID_SLOTS_AFTER_CONSENSUS..=MAX_VALID_SLOTS_AFTER_CONSENSUS)
            .contains(&self.valid_slots_after_consensus)
        {
            return Err(TipRouterError::InvalidSlotsAfterConsensus);
        }
        if !(MIN_EPOCHS_BEFORE_STALL..=MAX_EPOCHS_BEFORE_STALL).contains(&self.epochs_before_stall)
        {
            return Err(TipRouterError::InvalidEpochsBeforeStall);
        }
        if !(MIN_EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE..=MAX_EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE)
            .contains(&self.epochs_after_consensus_before_close)
        {
            return Err(TipRouterError::InvalidEpochsBeforeClose);
        }
        self.consensus_threshold.validate()
    }

    /// Updates the consensus windows; `None` keeps the current value. Nothing
    /// changes unless the resulting configuration is valid.
    pub fn set_parameters(
        &mut self,
        epochs_before_stall: Option<u64>,
        epochs_after_consensus_before_close: Option<u64>,
        valid_slots_after_consensus: Option<u64>,
    ) -> Result<(), TipRouterError> {
        let mut next = *self;
        if let Some(epochs) = epochs_before_stall {
            next.epochs_before_stall = epochs;
        }
        if let Some(epochs) = epochs_after_consensus_before_close {
            next.epochs_after_consensus_before_close = epochs;
        }
        if let Some(slots) = valid_slots_after_consensus {
            next.valid_slots_after_consensus = slots;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn set_admin(&mut self, role: ConfigAdminRole, new_admin: Pubkey) {
        match role {
            ConfigAdminRole::Admin => self.admin = new_admin,
            ConfigAdminRole::TieBreakerAdmin => self.tie_breaker_admin = new_admin,
            ConfigAdminRole::FeeAdmin => self.fee_admin = new_admin,
        }
    }
}
