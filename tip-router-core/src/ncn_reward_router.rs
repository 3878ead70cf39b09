//! Second reward tier: one router per (operator, NCN fee group).
//!
//! The router receives the operator's route from the base tier, takes the
//! operator's fee off the top and splits what is left across the operator's
//! vault delegations by their stake weight in this router's fee group.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::{MAX_FEE_BPS, MAX_VAULT_OPERATOR_DELEGATIONS, MAX_VAULT_REWARD_ROUTES},
        epoch_snapshot::OperatorSnapshot,
        error::TipRouterError,
        fee_group::NcnFeeGroup,
        math::{proportional_share, split_with_remainder_to_last},
    },
    borsh::{BorshDeserialize, BorshSerialize},
    log::*,
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VaultRewardRoute {
    vault: Pubkey,
    rewards: u64,
}

impl VaultRewardRoute {
    pub fn vault(&self) -> &Pubkey {
        &self.vault
    }

    pub fn rewards(&self) -> u64 {
        self.rewards
    }

    pub fn is_empty(&self) -> bool {
        self.vault == Pubkey::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NcnRewardRouter {
    ncn: Pubkey,
    operator: Pubkey,
    ncn_fee_group: NcnFeeGroup,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    total_rewards: u64,
    reward_pool: u64,
    rewards_processed: u64,
    operator_rewards: u64,
    reserved: [u8; 128],
    vault_reward_routes: [VaultRewardRoute; MAX_VAULT_REWARD_ROUTES],
}

impl AccountState for NcnRewardRouter {
    const DISCRIMINATOR: u8 = discriminators::NCN_REWARD_ROUTER;
}

impl NcnRewardRouter {
    pub fn new(
        ncn: Pubkey,
        operator: Pubkey,
        ncn_fee_group: NcnFeeGroup,
        epoch: u64,
        bump: u8,
        current_slot: u64,
    ) -> Self {
        Self {
            ncn,
            operator,
            ncn_fee_group,
            epoch,
            bump,
            slot_created: current_slot,
            total_rewards: 0,
            reward_pool: 0,
            rewards_processed: 0,
            operator_rewards: 0,
            reserved: [0; 128],
            vault_reward_routes: [VaultRewardRoute::default(); MAX_VAULT_REWARD_ROUTES],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn operator(&self) -> &Pubkey {
        &self.operator
    }

    pub fn ncn_fee_group(&self) -> NcnFeeGroup {
        self.ncn_fee_group
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn total_rewards(&self) -> u64 {
        self.total_rewards
    }

    pub fn reward_pool(&self) -> u64 {
        self.reward_pool
    }

    pub fn rewards_processed(&self) -> u64 {
        self.rewards_processed
    }

    pub fn operator_rewards(&self) -> u64 {
        self.operator_rewards
    }

    pub fn vault_reward_routes(&self) -> impl Iterator<Item = &VaultRewardRoute> {
        self.vault_reward_routes
            .iter()
            .filter(|route| !route.is_empty())
    }

    pub fn vault_reward_route(&self, vault: &Pubkey) -> Result<&VaultRewardRoute, TipRouterError> {
        self.vault_reward_routes()
            .find(|route| route.vault == *vault)
            .ok_or(TipRouterError::VaultRewardNotFound)
    }

    pub fn rewards_in_transit(&self) -> Result<u64, TipRouterError> {
        let mut total = self
            .reward_pool
            .checked_add(self.operator_rewards)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        for route in self.vault_reward_routes() {
            total = total
                .checked_add(route.rewards)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }
        Ok(total)
    }

    pub fn is_conserved(&self) -> Result<bool, TipRouterError> {
        let accounted = self
            .rewards_processed
            .checked_add(self.rewards_in_transit()?)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        Ok(accounted == self.total_rewards)
    }

    pub fn route_incoming_rewards(&mut self, account_balance: u64) -> Result<u64, TipRouterError> {
        let incoming = account_balance
            .checked_sub(self.rewards_in_transit()?)
            .ok_or(TipRouterError::ArithmeticUnderflowError)?;
        if incoming == 0 {
            return Ok(0);
        }

        let total_rewards = self
            .total_rewards
            .checked_add(incoming)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        let reward_pool = self
            .reward_pool
            .checked_add(incoming)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        self.total_rewards = total_rewards;
        self.reward_pool = reward_pool;
        Ok(incoming)
    }

    /// Routes the pool into the operator fee and the vault routes. With no
    /// vault weight in this fee group the whole pool goes to the operator.
    pub fn route_reward_pool(
        &mut self,
        operator_snapshot: &OperatorSnapshot,
    ) -> Result<(), TipRouterError> {
        if operator_snapshot.operator() != &self.operator {
            return Err(TipRouterError::OperatorNotFound);
        }
        let pool = self.reward_pool;
        if pool == 0 {
            return Ok(());
        }

        let operator_fee = proportional_share(
            pool,
            u128::from(operator_snapshot.operator_fee_bps()),
            u128::from(MAX_FEE_BPS),
        )?;
        let vault_pool = pool
            .checked_sub(operator_fee)
            .ok_or(TipRouterError::ArithmeticUnderflowError)?;

        let delegations: Vec<_> = operator_snapshot.delegations().collect();
        let mut weights = [0u128; MAX_VAULT_OPERATOR_DELEGATIONS];
        for (weight, delegation) in weights.iter_mut().zip(delegations.iter()) {
            *weight = delegation
                .stake_weights()
                .ncn_fee_group_stake_weight(self.ncn_fee_group);
        }

        let mut operator_rewards = self
            .operator_rewards
            .checked_add(operator_fee)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        let mut routes = self.vault_reward_routes;

        if vault_pool > 0 && weights.iter().any(|weight| *weight > 0) {
            let shares = split_with_remainder_to_last(vault_pool, &weights)?;
            for ((delegation, share), weight) in delegations.iter().zip(shares).zip(weights) {
                if weight == 0 {
                    continue;
                }
                let route = Self::route_entry(&mut routes, delegation.vault())?;
                route.rewards = route
                    .rewards
                    .checked_add(share)
                    .ok_or(TipRouterError::ArithmeticOverflow)?;
            }
        } else {
            operator_rewards = operator_rewards
                .checked_add(vault_pool)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }

        debug!(
            "operator {} fee group {} routed {pool}: operator fee {operator_fee}",
            self.operator,
            self.ncn_fee_group.group()
        );
        self.operator_rewards = operator_rewards;
        self.vault_reward_routes = routes;
        self.reward_pool = 0;
        Ok(())
    }

    fn route_entry<'a>(
        routes: &'a mut [VaultRewardRoute; MAX_VAULT_REWARD_ROUTES],
        vault: &Pubkey,
    ) -> Result<&'a mut VaultRewardRoute, TipRouterError> {
        let index = match routes.iter().position(|route| route.vault == *vault) {
            Some(index) => index,
            None => {
                let index = routes
                    .iter()
                    .position(|route| route.is_empty())
                    .ok_or(TipRouterError::VaultRewardListFull)?;
                routes[index].vault = *vault;
                index
            }
        };
        Ok(&mut routes[index])
    }

    /// Drains the operator's fee, returning the amount to transfer.
    pub fn distribute_operator_rewards(&mut self) -> Result<u64, TipRouterError> {
        let amount = self.operator_rewards;
        self.rewards_processed = self
            .rewards_processed
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        self.operator_rewards = 0;
        Ok(amount)
    }

    /// Drains one vault's route, returning the amount to transfer.
    pub fn distribute_vault_rewards(&mut self, vault: &Pubkey) -> Result<u64, TipRouterError> {
        let route = self
            .vault_reward_routes
            .iter_mut()
            .find(|route| !route.is_empty() && route.vault == *vault)
            .ok_or(TipRouterError::VaultRewardNotFound)?;
        let amount = route.rewards;
        let rewards_processed = self
            .rewards_processed
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        route.rewards = 0;
        self.rewards_processed = rewards_processed;
        Ok(amount)
    }

    pub fn sweep_remaining(&mut self) -> Result<u64, TipRouterError> {
        let remaining = self.rewards_in_transit()?;
        let rewards_processed = self
            .rewards_processed
            .checked_add(remaining)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        self.reward_pool = 0;
        self.operator_rewards = 0;
        for route in self.vault_reward_routes.iter_mut() {
            route.rewards = 0;
        }
        self.rewards_processed = rewards_processed;
        Ok(remaining)
    }
}
