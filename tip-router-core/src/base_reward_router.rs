//! First reward tier: the epoch's incoming balance split into fee groups.
//!
//! Routing is pure accounting. Incoming balance lands in the reward pool, the
//! pool is split into the base fee group and NCN fee group buckets, and the
//! NCN buckets are then fanned out to the operators that voted for the
//! winning ballot. Distribution drains one bucket or route at a time and
//! returns the amount the caller must transfer out of the router account.
//!
//! `total_rewards == rewards_processed + reward_pool + Σ buckets + Σ routes`
//! holds after every call.

use {
    crate::{
        account::{discriminators, AccountState},
        ballot_box::BallotBox,
        constants::{MAX_NCN_REWARD_ROUTES, MAX_OPERATOR_VOTES},
        error::TipRouterError,
        fee_group::{BaseFeeGroup, NcnFeeGroup, FEE_GROUP_COUNT},
        fees::Fees,
        math::split_with_remainder_to_last,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    log::*,
    solana_pubkey::Pubkey,
};

fn checked_sum<'a>(values: impl IntoIterator<Item = &'a u64>) -> Result<u64, TipRouterError> {
    values
        .into_iter()
        .try_fold(0u64, |acc, value| acc.checked_add(*value))
        .ok_or(TipRouterError::ArithmeticOverflow)
}

/// An operator's share of each NCN fee group bucket, waiting to be moved to
/// that operator's NCN reward router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NcnRewardRoute {
    operator: Pubkey,
    ncn_fee_group_rewards: [u64; FEE_GROUP_COUNT],
}

impl NcnRewardRoute {
    pub fn operator(&self) -> &Pubkey {
        &self.operator
    }

    pub fn rewards(&self, group: NcnFeeGroup) -> u64 {
        self.ncn_fee_group_rewards[group.group_index()]
    }

    pub fn total_rewards(&self) -> Result<u64, TipRouterError> {
        checked_sum(self.ncn_fee_group_rewards.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.operator == Pubkey::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BaseRewardRouter {
    ncn: Pubkey,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    total_rewards: u64,
    reward_pool: u64,
    rewards_processed: u64,
    reserved: [u8; 128],
    base_fee_group_rewards: [u64; FEE_GROUP_COUNT],
    ncn_fee_group_rewards: [u64; FEE_GROUP_COUNT],
    ncn_reward_routes: [NcnRewardRoute; MAX_NCN_REWARD_ROUTES],
}

impl AccountState for BaseRewardRouter {
    const DISCRIMINATOR: u8 = discriminators::BASE_REWARD_ROUTER;
}

impl BaseRewardRouter {
    pub fn new(ncn: Pubkey, epoch: u64, bump: u8, current_slot: u64) -> Self {
        Self {
            ncn,
            epoch,
            bump,
            slot_created: current_slot,
            total_rewards: 0,
            reward_pool: 0,
            rewards_processed: 0,
            reserved: [0; 128],
            base_fee_group_rewards: [0; FEE_GROUP_COUNT],
            ncn_fee_group_rewards: [0; FEE_GROUP_COUNT],
            ncn_reward_routes: [NcnRewardRoute::default(); MAX_NCN_REWARD_ROUTES],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
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

    pub fn base_fee_group_rewards(&self, group: BaseFeeGroup) -> u64 {
        self.base_fee_group_rewards[group.group_index()]
    }

    pub fn ncn_fee_group_rewards(&self, group: NcnFeeGroup) -> u64 {
        self.ncn_fee_group_rewards[group.group_index()]
    }

    pub fn ncn_reward_routes(&self) -> impl Iterator<Item = &NcnRewardRoute> {
        self.ncn_reward_routes.iter().filter(|route| !route.is_empty())
    }

    pub fn ncn_reward_route(&self, operator: &Pubkey) -> Result<&NcnRewardRoute, TipRouterError> {
        self.ncn_reward_routes()
            .find(|route| route.operator == *operator)
            .ok_or(TipRouterError::NcnRewardRouteNotFound)
    }

    /// Rewards routed but not yet distributed. Matches the router account's
    /// balance when nothing new has arrived.
    pub fn rewards_in_transit(&self) -> Result<u64, TipRouterError> {
        let mut routes = 0u64;
        for route in self.ncn_reward_routes() {
            routes = routes
                .checked_add(route.total_rewards()?)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }
        checked_sum(
            [
                self.reward_pool,
                checked_sum(self.base_fee_group_rewards.iter())?,
                checked_sum(self.ncn_fee_group_rewards.iter())?,
                routes,
            ]
            .iter(),
        )
    }

    /// Whether every unit ever received is either processed or still held.
    pub fn is_conserved(&self) -> Result<bool, TipRouterError> {
        let accounted = self
            .rewards_processed
            .checked_add(self.rewards_in_transit()?)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        Ok(accounted == self.total_rewards)
    }

    /// Pulls balance that arrived since the last call into the reward pool.
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

    /// Splits the reward pool over the base fee groups then the NCN fee groups
    /// by their bps in `fees`.
    pub fn route_reward_pool(&mut self, fees: &Fees) -> Result<(), TipRouterError> {
        if self.reward_pool == 0 {
            return Ok(());
        }

        let shares = split_with_remainder_to_last(self.reward_pool, &fees.routing_weights())?;
        let (base_shares, ncn_shares) = shares.split_at(FEE_GROUP_COUNT);

        let mut base_fee_group_rewards = self.base_fee_group_rewards;
        for (bucket, share) in base_fee_group_rewards.iter_mut().zip(base_shares) {
            *bucket = bucket
                .checked_add(*share)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }
        let mut ncn_fee_group_rewards = self.ncn_fee_group_rewards;
        for (bucket, share) in ncn_fee_group_rewards.iter_mut().zip(ncn_shares) {
            *bucket = bucket
                .checked_add(*share)
                .ok_or(TipRouterError::ArithmeticOverflow)?;
        }

        debug!(
            "epoch {} routed {} into fee groups: base {base_shares:?} ncn {ncn_shares:?}",
            self.epoch, self.reward_pool
        );
        self.base_fee_group_rewards = base_fee_group_rewards;
        self.ncn_fee_group_rewards = ncn_fee_group_rewards;
        self.reward_pool = 0;
        Ok(())
    }

    /// Fans each NCN fee group bucket out to the operators that voted for the
    /// winning ballot, by their stake weight in that group. A group nobody in
    /// the winning set has weight in keeps its bucket.
    pub fn route_ncn_fee_group_rewards(
        &mut self,
        ballot_box: &BallotBox,
    ) -> Result<(), TipRouterError> {
        let winners: Vec<_> = ballot_box.winning_votes()?.copied().collect();
        if winners.len() > MAX_OPERATOR_VOTES {
            return Err(TipRouterError::OperatorVotesFull);
        }

        let mut routes = self.ncn_reward_routes;
        let mut ncn_fee_group_rewards = self.ncn_fee_group_rewards;

        for group in NcnFeeGroup::all_groups() {
            let bucket = ncn_fee_group_rewards[group.group_index()];
            if bucket == 0 {
                continue;
            }

            let mut weights = [0u128; MAX_OPERATOR_VOTES];
            for (weight, vote) in weights.iter_mut().zip(winners.iter()) {
                *weight = vote.stake_weights().ncn_fee_group_stake_weight(group);
            }
            if weights.iter().all(|weight| *weight == 0) {
                continue;
            }

            let shares = split_with_remainder_to_last(bucket, &weights)?;
            for (vote, share) in winners.iter().zip(shares) {
                let route = Self::route_entry(&mut routes, vote.operator())?;
                let slot = &mut route.ncn_fee_group_rewards[group.group_index()];
                *slot = slot
                    .checked_add(share)
                    .ok_or(TipRouterError::ArithmeticOverflow)?;
            }
            ncn_fee_group_rewards[group.group_index()] = 0;
            debug!(
                "epoch {} routed {bucket} from ncn fee group {} to {} operators",
                self.epoch,
                group.group(),
                winners.len()
            );
        }

        self.ncn_reward_routes = routes;
        self.ncn_fee_group_rewards = ncn_fee_group_rewards;
        Ok(())
    }

    fn route_entry<'a>(
        routes: &'a mut [NcnRewardRoute; MAX_NCN_REWARD_ROUTES],
        operator: &Pubkey,
    ) -> Result<&'a mut NcnRewardRoute, TipRouterError> {
        let index = match routes.iter().position(|route| route.operator == *operator) {
            Some(index) => index,
            None => {
                let index = routes
                    .iter()
                    .position(|route| route.is_empty())
                    .ok_or(TipRouterError::OperatorRewardListFull)?;
                routes[index].operator = *operator;
                index
            }
        };
        Ok(&mut routes[index])
    }

    /// Drains a base fee group bucket, returning the amount to transfer to the
    /// group's wallet. An empty bucket drains to zero.
    pub fn distribute_base_fee_group_rewards(
        &mut self,
        group: BaseFeeGroup,
    ) -> Result<u64, TipRouterError> {
        let amount = self.base_fee_group_rewards[group.group_index()];
        self.rewards_processed = self
            .rewards_processed
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        self.base_fee_group_rewards[group.group_index()] = 0;
        Ok(amount)
    }

    /// Drains one operator's route for `group`, returning the amount to move
    /// into that operator's NCN reward router.
    pub fn distribute_ncn_fee_group_reward_route(
        &mut self,
        group: NcnFeeGroup,
        operator: &Pubkey,
    ) -> Result<u64, TipRouterError> {
        let route = self
            .ncn_reward_routes
            .iter_mut()
            .find(|route| !route.is_empty() && route.operator == *operator)
            .ok_or(TipRouterError::NcnRewardRouteNotFound)?;
        let amount = route.ncn_fee_group_rewards[group.group_index()];
        let rewards_processed = self
            .rewards_processed
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        route.ncn_fee_group_rewards[group.group_index()] = 0;
        self.rewards_processed = rewards_processed;
        Ok(amount)
    }

    /// Empties every open balance into `rewards_processed`, returning the
    /// amount swept. Used when closing the account.
    pub fn sweep_remaining(&mut self) -> Result<u64, TipRouterError> {
        let remaining = self.rewards_in_transit()?;
        let rewards_processed = self
            .rewards_processed
            .checked_add(remaining)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        self.reward_pool = 0;
        self.base_fee_group_rewards = [0; FEE_GROUP_COUNT];
        self.ncn_fee_group_rewards = [0; FEE_GROUP_COUNT];
        for route in self.ncn_reward_routes.iter_mut() {
            route.ncn_fee_group_rewards = [0; FEE_GROUP_COUNT];
        }
        self.rewards_processed = rewards_processed;
        Ok(remaining)
    }
}
