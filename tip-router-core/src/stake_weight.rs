use {
    crate::{
        error::TipRouterError,
        fee_group::{NcnFeeGroup, FEE_GROUP_COUNT},
    },
    borsh::{BorshDeserialize, BorshSerialize},
};

/// `security * weight`, floored. Integer inputs make the floor exact; the
/// product is never rounded up.
pub fn compute_delegation_weight(security: u64, weight: u128) -> Result<u128, TipRouterError> {
    u128::from(security)
        .checked_mul(weight)
        .ok_or(TipRouterError::ArithmeticOverflow)
}

/// Stake weight in total and broken down by NCN fee group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StakeWeights {
    stake_weight: u128,
    ncn_fee_group_stake_weights: [u128; FEE_GROUP_COUNT],
}

impl StakeWeights {
    /// Weights contributed by one delegation of `security` units of a mint in
    /// `ncn_fee_group` with the given multiplier.
    pub fn snapshot(
        ncn_fee_group: NcnFeeGroup,
        security: u64,
        weight: u128,
    ) -> Result<Self, TipRouterError> {
        let stake_weight = compute_delegation_weight(security, weight)?;
        let mut weights = Self::default();
        weights.stake_weight = stake_weight;
        weights.ncn_fee_group_stake_weights[ncn_fee_group.group_index()] = stake_weight;
        Ok(weights)
    }

    pub fn stake_weight(&self) -> u128 {
        self.stake_weight
    }

    pub fn ncn_fee_group_stake_weight(&self, group: NcnFeeGroup) -> u128 {
        self.ncn_fee_group_stake_weights[group.group_index()]
    }

    pub fn increment(&mut self, other: &Self) -> Result<(), TipRouterError> {
        self.stake_weight = self
            .stake_weight
            .checked_add(other.stake_weight)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        for (mine, theirs) in self
            .ncn_fee_group_stake_weights
            .iter_mut()
            .zip(other.ncn_fee_group_stake_weights.iter())
        {
            *mine = mine
                .checked_add(*theirs)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }
        Ok(())
    }
}
