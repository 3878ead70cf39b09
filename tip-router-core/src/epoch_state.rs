//! Per-epoch progress tracking and account bookkeeping.
//!
//! `EpochState` mirrors every other per-epoch account: it records which ones
//! exist, how far each stage has progressed, and when consensus was reached.
//! The processor consults it to gate each instruction and to decide when the
//! epoch's accounts may be closed.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::MAX_OPERATORS,
        error::TipRouterError,
        fee_group::{NcnFeeGroup, FEE_GROUP_COUNT},
    },
    borsh::{BorshDeserialize, BorshSerialize},
    serde::{Deserialize, Serialize},
    solana_epoch_schedule::EpochSchedule,
    solana_pubkey::Pubkey,
};

const CONSENSUS_NOT_REACHED_SLOT: u64 = u64::MAX;

const NCN_REWARD_ROUTER_COUNT: usize = MAX_OPERATORS * FEE_GROUP_COUNT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum AccountStatus {
    #[default]
    DNE = 0,
    Created = 1,
    /// Created and able to receive rewards, so closing may sweep a balance.
    CreatedWithReceiver = 2,
    Closed = 3,
}

impl AccountStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Created | Self::CreatedWithReceiver)
    }
}

/// A closable per-epoch account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochAccount {
    WeightTable,
    EpochSnapshot,
    OperatorSnapshot { operator_index: u64 },
    BallotBox,
    BaseRewardRouter,
    NcnRewardRouter { operator_index: u64, ncn_fee_group: u8 },
    EpochState,
}

impl EpochAccount {
    pub fn discriminator(&self) -> u8 {
        match self {
            Self::WeightTable => discriminators::WEIGHT_TABLE,
            Self::EpochSnapshot => discriminators::EPOCH_SNAPSHOT,
            Self::OperatorSnapshot { .. } => discriminators::OPERATOR_SNAPSHOT,
            Self::BallotBox => discriminators::BALLOT_BOX,
            Self::BaseRewardRouter => discriminators::BASE_REWARD_ROUTER,
            Self::NcnRewardRouter { .. } => discriminators::NCN_REWARD_ROUTER,
            Self::EpochState => discriminators::EPOCH_STATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EpochAccountStatus {
    epoch_state: AccountStatus,
    weight_table: AccountStatus,
    epoch_snapshot: AccountStatus,
    operator_snapshot: [AccountStatus; MAX_OPERATORS],
    ballot_box: AccountStatus,
    base_reward_router: AccountStatus,
    ncn_reward_router: [AccountStatus; NCN_REWARD_ROUTER_COUNT],
}

impl Default for EpochAccountStatus {
    fn default() -> Self {
        Self {
            epoch_state: AccountStatus::DNE,
            weight_table: AccountStatus::DNE,
            epoch_snapshot: AccountStatus::DNE,
            operator_snapshot: [AccountStatus::DNE; MAX_OPERATORS],
            ballot_box: AccountStatus::DNE,
            base_reward_router: AccountStatus::DNE,
            ncn_reward_router: [AccountStatus::DNE; NCN_REWARD_ROUTER_COUNT],
        }
    }
}

impl EpochAccountStatus {
    pub fn status(&self, account: &EpochAccount) -> Result<AccountStatus, TipRouterError> {
        Ok(match account {
            EpochAccount::WeightTable => self.weight_table,
            EpochAccount::EpochSnapshot => self.epoch_snapshot,
            EpochAccount::OperatorSnapshot { operator_index } => {
                self.operator_snapshot[operator_slot(*operator_index)?]
            }
            EpochAccount::BallotBox => self.ballot_box,
            EpochAccount::BaseRewardRouter => self.base_reward_router,
            EpochAccount::NcnRewardRouter {
                operator_index,
                ncn_fee_group,
            } => self.ncn_reward_router[ncn_reward_router_slot(*operator_index, *ncn_fee_group)?],
            EpochAccount::EpochState => self.epoch_state,
        })
    }

    fn set_status(
        &mut self,
        account: &EpochAccount,
        status: AccountStatus,
    ) -> Result<(), TipRouterError> {
        let slot = match account {
            EpochAccount::WeightTable => &mut self.weight_table,
            EpochAccount::EpochSnapshot => &mut self.epoch_snapshot,
            EpochAccount::OperatorSnapshot { operator_index } => {
                &mut self.operator_snapshot[operator_slot(*operator_index)?]
            }
            EpochAccount::BallotBox => &mut self.ballot_box,
            EpochAccount::BaseRewardRouter => &mut self.base_reward_router,
            EpochAccount::NcnRewardRouter {
                operator_index,
                ncn_fee_group,
            } => {
                &mut self.ncn_reward_router
                    [ncn_reward_router_slot(*operator_index, *ncn_fee_group)?]
            }
            EpochAccount::EpochState => &mut self.epoch_state,
        };
        *slot = status;
        Ok(())
    }

    /// Whether every account other than the epoch state is closed or was
    /// never created.
    pub fn are_all_closed(&self) -> bool {
        [
            self.weight_table,
            self.epoch_snapshot,
            self.ballot_box,
            self.base_reward_router,
        ]
        .iter()
        .chain(self.operator_snapshot.iter())
        .chain(self.ncn_reward_router.iter())
        .all(|status| !status.is_open())
    }
}

fn operator_slot(operator_index: u64) -> Result<usize, TipRouterError> {
    usize::try_from(operator_index)
        .ok()
        .filter(|index| *index < MAX_OPERATORS)
        .ok_or(TipRouterError::OperatorNotFound)
}

fn ncn_reward_router_slot(operator_index: u64, ncn_fee_group: u8) -> Result<usize, TipRouterError> {
    let group = NcnFeeGroup::try_from(ncn_fee_group)?;
    operator_slot(operator_index)?
        .checked_mul(FEE_GROUP_COUNT)
        .and_then(|index| index.checked_add(group.group_index()))
        .ok_or(TipRouterError::ArithmeticOverflow)
}

/// `tally` of `total` work items. Both are [`Progress::INVALID`] until the
/// stage starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Progress {
    tally: u64,
    total: u64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            tally: Self::INVALID,
            total: Self::INVALID,
        }
    }
}

impl Progress {
    pub const INVALID: u64 = u64::MAX;

    pub fn new(total: u64) -> Self {
        Self { tally: 0, total }
    }

    pub fn tally(&self) -> u64 {
        self.tally
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_invalid(&self) -> bool {
        self.tally == Self::INVALID || self.total == Self::INVALID
    }

    pub fn is_complete(&self) -> bool {
        !self.is_invalid() && self.tally == self.total
    }

    pub fn increment(&mut self, amount: u64) -> Result<(), TipRouterError> {
        if self.is_invalid() {
            return Err(TipRouterError::InvalidAccountStatus);
        }
        self.tally = self
            .tally
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        Ok(())
    }

    fn set_tally(&mut self, tally: u64) {
        self.tally = tally;
    }

    fn set_total(&mut self, total: u64) {
        self.total = total;
    }
}

/// Phase an epoch is in, derived from its progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    SetWeight,
    Snapshot,
    Vote,
    SetupRouter,
    Distribute,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EpochState {
    ncn: Pubkey,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    was_tie_breaker_set: bool,
    slot_consensus_reached: u64,
    operator_count: u64,
    vault_count: u64,
    account_status: EpochAccountStatus,
    set_weight_progress: Progress,
    epoch_snapshot_progress: Progress,
    operator_snapshot_progress: [Progress; MAX_OPERATORS],
    voting_progress: Progress,
    validation_progress: Progress,
    upload_progress: Progress,
    total_distribution_progress: Progress,
    base_distribution_progress: Progress,
    ncn_distribution_progress: [Progress; NCN_REWARD_ROUTER_COUNT],
    is_closing: bool,
    reserved: [u8; 256],
}

impl AccountState for EpochState {
    const DISCRIMINATOR: u8 = discriminators::EPOCH_STATE;
}

impl EpochState {
    pub fn new(ncn: Pubkey, epoch: u64, bump: u8, current_slot: u64) -> Self {
        let mut account_status = EpochAccountStatus::default();
        account_status.epoch_state = AccountStatus::Created;
        Self {
            ncn,
            epoch,
            bump,
            slot_created: current_slot,
            was_tie_breaker_set: false,
            slot_consensus_reached: CONSENSUS_NOT_REACHED_SLOT,
            operator_count: 0,
            vault_count: 0,
            account_status,
            set_weight_progress: Progress::default(),
            epoch_snapshot_progress: Progress::default(),
            operator_snapshot_progress: [Progress::default(); MAX_OPERATORS],
            voting_progress: Progress::default(),
            validation_progress: Progress::default(),
            upload_progress: Progress::default(),
            total_distribution_progress: Progress::default(),
            base_distribution_progress: Progress::default(),
            ncn_distribution_progress: [Progress::default(); NCN_REWARD_ROUTER_COUNT],
            is_closing: false,
            reserved: [0; 256],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn was_tie_breaker_set(&self) -> bool {
        self.was_tie_breaker_set
    }

    pub fn is_consensus_reached(&self) -> bool {
        self.slot_consensus_reached != CONSENSUS_NOT_REACHED_SLOT
    }

    pub fn slot_consensus_reached(&self) -> Result<u64, TipRouterError> {
        if !self.is_consensus_reached() {
            return Err(TipRouterError::ConsensusNotReached);
        }
        Ok(self.slot_consensus_reached)
    }

    pub fn operator_count(&self) -> u64 {
        self.operator_count
    }

    pub fn vault_count(&self) -> u64 {
        self.vault_count
    }

    pub fn is_closing(&self) -> bool {
        self.is_closing
    }

    pub fn account_status(&self) -> &EpochAccountStatus {
        &self.account_status
    }

    pub fn set_weight_progress(&self) -> Progress {
        self.set_weight_progress
    }

    pub fn epoch_snapshot_progress(&self) -> Progress {
        self.epoch_snapshot_progress
    }

    pub fn operator_snapshot_progress(&self, operator_index: u64) -> Result<Progress, TipRouterError> {
        Ok(self.operator_snapshot_progress[operator_slot(operator_index)?])
    }

    pub fn voting_progress(&self) -> Progress {
        self.voting_progress
    }

    pub fn validation_progress(&self) -> Progress {
        self.validation_progress
    }

    pub fn upload_progress(&self) -> Progress {
        self.upload_progress
    }

    pub fn total_distribution_progress(&self) -> Progress {
        self.total_distribution_progress
    }

    pub fn base_distribution_progress(&self) -> Progress {
        self.base_distribution_progress
    }

    pub fn ncn_distribution_progress(
        &self,
        operator_index: u64,
        ncn_fee_group: NcnFeeGroup,
    ) -> Result<Progress, TipRouterError> {
        Ok(self.ncn_distribution_progress
            [ncn_reward_router_slot(operator_index, ncn_fee_group.group())?])
    }

    /// No instruction may make progress in an epoch once any of its
    /// accounts has closed.
    pub fn check_not_closing(&self) -> Result<(), TipRouterError> {
        if self.is_closing {
            return Err(TipRouterError::EpochIsClosingDown);
        }
        Ok(())
    }

    /// Routing needs the winning ballot and an open base reward router.
    pub fn check_ready_to_route(
        &self,
        epoch_schedule: &EpochSchedule,
        epochs_after_consensus_before_close: u64,
        current_epoch: u64,
    ) -> Result<(), TipRouterError> {
        self.check_not_closing()?;
        match self.current_state(
            epoch_schedule,
            epochs_after_consensus_before_close,
            current_epoch,
        )? {
            State::Distribute | State::Close => Ok(()),
            State::Vote => Err(TipRouterError::ConsensusNotReached),
            State::SetWeight | State::Snapshot | State::SetupRouter => {
                Err(TipRouterError::InvalidAccountStatus)
            }
        }
    }

    /// Marks a never-created account as created. Accounts are created once
    /// per epoch: a closed account stays closed.
    fn initialize_account(
        &mut self,
        account: &EpochAccount,
        status: AccountStatus,
    ) -> Result<(), TipRouterError> {
        self.check_not_closing()?;
        if self.account_status.status(account)? != AccountStatus::DNE {
            return Err(TipRouterError::InvalidAccountStatus);
        }
        self.account_status.set_status(account, status)
    }

    // ---------------------------------------------------------------------
    // Updaters, one per instruction that touches the epoch
    // ---------------------------------------------------------------------

    pub fn update_initialize_weight_table(
        &mut self,
        mint_count: u64,
    ) -> Result<(), TipRouterError> {
        self.initialize_account(&EpochAccount::WeightTable, AccountStatus::Created)?;
        self.set_weight_progress = Progress::new(mint_count);
        Ok(())
    }

    pub fn update_set_weight(&mut self, weights_set: u64) {
        self.set_weight_progress.set_tally(weights_set);
    }

    pub fn update_initialize_epoch_snapshot(
        &mut self,
        operator_count: u64,
        vault_count: u64,
    ) -> Result<(), TipRouterError> {
        self.initialize_account(&EpochAccount::EpochSnapshot, AccountStatus::Created)?;
        self.operator_count = operator_count;
        self.vault_count = vault_count;
        self.epoch_snapshot_progress = Progress::new(operator_count);
        Ok(())
    }

    pub fn update_initialize_operator_snapshot(
        &mut self,
        operator_index: u64,
        expected_delegations: u64,
    ) -> Result<(), TipRouterError> {
        self.initialize_account(
            &EpochAccount::OperatorSnapshot { operator_index },
            AccountStatus::Created,
        )?;
        self.operator_snapshot_progress[operator_slot(operator_index)?] =
            Progress::new(expected_delegations);
        Ok(())
    }

    /// Mirrors an operator snapshot's registered delegations and the epoch
    /// snapshot's registered operators.
    pub fn update_snapshot_progress(
        &mut self,
        operator_index: u64,
        delegations_registered: u64,
        operators_registered: u64,
    ) -> Result<(), TipRouterError> {
        self.operator_snapshot_progress[operator_slot(operator_index)?]
            .set_tally(delegations_registered);
        self.epoch_snapshot_progress.set_tally(operators_registered);
        Ok(())
    }

    pub fn update_initialize_ballot_box(&mut self) -> Result<(), TipRouterError> {
        self.initialize_account(&EpochAccount::BallotBox, AccountStatus::Created)?;
        self.voting_progress = Progress::new(self.operator_count);
        self.validation_progress = Progress::new(1);
        self.upload_progress = Progress::new(0);
        Ok(())
    }

    pub fn update_cast_vote(
        &mut self,
        operators_voted: u64,
        is_consensus_reached: bool,
        slot_consensus_reached: u64,
    ) {
        self.voting_progress.set_tally(operators_voted);
        if is_consensus_reached && !self.is_consensus_reached() {
            self.slot_consensus_reached = slot_consensus_reached;
            self.validation_progress.set_tally(1);
        }
    }

    pub fn update_set_tie_breaker(&mut self, slot_consensus_reached: u64) {
        if !self.is_consensus_reached() {
            self.slot_consensus_reached = slot_consensus_reached;
            self.was_tie_breaker_set = true;
            self.validation_progress.set_tally(1);
        }
    }

    /// Counts a processed claim. Upload progress is open ended, so the total
    /// tracks the tally.
    pub fn update_claim(&mut self) -> Result<(), TipRouterError> {
        self.upload_progress.increment(1)?;
        self.upload_progress.set_total(self.upload_progress.tally());
        Ok(())
    }

    pub fn update_initialize_base_reward_router(&mut self) -> Result<(), TipRouterError> {
        self.initialize_account(
            &EpochAccount::BaseRewardRouter,
            AccountStatus::CreatedWithReceiver,
        )?;
        self.base_distribution_progress = Progress::new(0);
        self.total_distribution_progress = Progress::new(0);
        Ok(())
    }

    pub fn update_initialize_ncn_reward_router(
        &mut self,
        operator_index: u64,
        ncn_fee_group: NcnFeeGroup,
    ) -> Result<(), TipRouterError> {
        let account = EpochAccount::NcnRewardRouter {
            operator_index,
            ncn_fee_group: ncn_fee_group.group(),
        };
        self.initialize_account(&account, AccountStatus::CreatedWithReceiver)?;
        self.ncn_distribution_progress
            [ncn_reward_router_slot(operator_index, ncn_fee_group.group())?] = Progress::new(0);
        Ok(())
    }

    pub fn update_route_base_rewards(&mut self, total_rewards: u64) {
        self.total_distribution_progress.set_total(total_rewards);
        self.base_distribution_progress.set_total(total_rewards);
    }

    pub fn update_route_ncn_rewards(
        &mut self,
        operator_index: u64,
        ncn_fee_group: NcnFeeGroup,
        total_rewards: u64,
    ) -> Result<(), TipRouterError> {
        self.ncn_distribution_progress
            [ncn_reward_router_slot(operator_index, ncn_fee_group.group())?]
        .set_total(total_rewards);
        Ok(())
    }

    /// Base fee group payouts leave the system.
    pub fn update_distribute_base_rewards(&mut self, amount: u64) -> Result<(), TipRouterError> {
        self.total_distribution_progress.increment(amount)?;
        self.base_distribution_progress.increment(amount)
    }

    /// Routes moved to an NCN reward router are still in the system.
    pub fn update_distribute_base_ncn_rewards(&mut self, amount: u64) -> Result<(), TipRouterError> {
        self.base_distribution_progress.increment(amount)
    }

    pub fn update_distribute_ncn_rewards(
        &mut self,
        operator_index: u64,
        ncn_fee_group: NcnFeeGroup,
        amount: u64,
    ) -> Result<(), TipRouterError> {
        self.total_distribution_progress.increment(amount)?;
        self.ncn_distribution_progress
            [ncn_reward_router_slot(operator_index, ncn_fee_group.group())?]
        .increment(amount)
    }

    // ---------------------------------------------------------------------
    // Closing
    // ---------------------------------------------------------------------

    /// Epochs elapsed since consensus, floored at zero.
    pub fn epochs_since_consensus(
        &self,
        epoch_schedule: &EpochSchedule,
        current_epoch: u64,
    ) -> Result<u64, TipRouterError> {
        let epoch_consensus_reached = epoch_schedule.get_epoch(self.slot_consensus_reached()?);
        Ok(current_epoch.saturating_sub(epoch_consensus_reached))
    }

    pub fn can_close_epoch_accounts(
        &self,
        epoch_schedule: &EpochSchedule,
        epochs_after_consensus_before_close: u64,
        current_epoch: u64,
    ) -> Result<bool, TipRouterError> {
        Ok(self.epochs_since_consensus(epoch_schedule, current_epoch)?
            >= epochs_after_consensus_before_close)
    }

    /// Marks `account` closed. The epoch state itself can only close once
    /// every other account is closed.
    pub fn close_account(&mut self, account: &EpochAccount) -> Result<(), TipRouterError> {
        if !self.account_status.status(account)?.is_open() {
            return Err(TipRouterError::InvalidAccountStatus);
        }
        if *account == EpochAccount::EpochState && !self.account_status.are_all_closed() {
            return Err(TipRouterError::CannotCloseEpochStateAccount);
        }
        self.account_status
            .set_status(account, AccountStatus::Closed)?;
        self.is_closing = true;
        Ok(())
    }

    pub fn current_state(
        &self,
        epoch_schedule: &EpochSchedule,
        epochs_after_consensus_before_close: u64,
        current_epoch: u64,
    ) -> Result<State, TipRouterError> {
        if self.account_status.weight_table == AccountStatus::DNE
            || !self.set_weight_progress.is_complete()
        {
            return Ok(State::SetWeight);
        }
        if self.account_status.epoch_snapshot == AccountStatus::DNE
            || !self.epoch_snapshot_progress.is_complete()
        {
            return Ok(State::Snapshot);
        }
        if self.account_status.ballot_box == AccountStatus::DNE || !self.is_consensus_reached() {
            return Ok(State::Vote);
        }
        if self.account_status.base_reward_router == AccountStatus::DNE {
            return Ok(State::SetupRouter);
        }
        if self.can_close_epoch_accounts(
            epoch_schedule,
            epochs_after_consensus_before_close,
            current_epoch,
        )? {
            return Ok(State::Close);
        }
        Ok(State::Distribute)
    }
}
