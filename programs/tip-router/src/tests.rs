//! Epoch lifecycle scenarios driven through `invoke`.

use {
    crate::{
        external_state::MemoryExternalState,
        instruction,
        invoke_context::{invoke, AccountStore, Sysvars},
        ledger::{MemoryLedger, TokenLedger},
    },
    solana_clock::Clock,
    solana_epoch_schedule::EpochSchedule,
    solana_instruction::{error::InstructionError, Instruction},
    solana_pubkey::Pubkey,
    test_case::test_case,
    tip_router_core::{
        account::AccountState,
        address::*,
        ballot_box::BallotBox,
        claim_status::ClaimStatus,
        epoch_marker::EpochMarker,
        epoch_snapshot::EpochSnapshot,
        epoch_state::{EpochAccount, EpochState},
        error::TipRouterError,
        merkle::MerkleTree,
        ncn_config::{ConfigAdminRole, ConsensusThreshold, NcnConfig},
        weight_table::WeightTable,
    },
};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

const EPOCH: u64 = 20;
const OPERATOR_FEE_BPS: u16 = 1_000;
const VALID_SLOTS_AFTER_CONSENSUS: u64 = 1_000;
const EPOCHS_BEFORE_STALL: u64 = 3;
const EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE: u64 = 10;

fn key(byte: u8) -> Pubkey {
    Pubkey::new_from_array([byte; 32])
}

fn ncn() -> Pubkey {
    key(1)
}

fn admin() -> Pubkey {
    key(2)
}

fn tie_breaker_admin() -> Pubkey {
    key(3)
}

fn fee_admin() -> Pubkey {
    key(4)
}

fn dao_wallet() -> Pubkey {
    key(5)
}

fn payer() -> Pubkey {
    key(6)
}

fn mint() -> Pubkey {
    key(50)
}

fn vault() -> Pubkey {
    key(200)
}

fn operator(index: u8) -> Pubkey {
    key(100 + index)
}

fn custom(error: TipRouterError) -> InstructionError {
    InstructionError::Custom(error as u32)
}

struct TestEnv {
    accounts: AccountStore,
    ledger: MemoryLedger,
    external_state: MemoryExternalState,
    sysvars: Sysvars,
}

impl TestEnv {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut env = Self {
            accounts: AccountStore::new(),
            ledger: MemoryLedger::new(),
            external_state: MemoryExternalState::new(),
            sysvars: Sysvars {
                clock: Clock::default(),
                epoch_schedule: EpochSchedule::without_warmup(),
            },
        };
        env.warp_to_epoch(EPOCH);
        env
    }

    /// Config, registry, one mint with a fixed weight of 1 and one vault.
    fn with_config() -> Self {
        let mut env = Self::new();
        env.process(instruction::initialize_config(
            &admin(),
            &ncn(),
            &tie_breaker_admin(),
            &fee_admin(),
            &dao_wallet(),
            300,
            1_000,
            1_000,
            VALID_SLOTS_AFTER_CONSENSUS,
            EPOCHS_BEFORE_STALL,
            EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE,
            ConsensusThreshold::default(),
        ))
        .unwrap();
        env.process(instruction::initialize_registry(&admin(), &ncn()))
            .unwrap();
        env.process(instruction::register_mint(&admin(), &ncn(), &mint(), 0, Some(1)))
            .unwrap();
        env.process(instruction::register_vault(&admin(), &ncn(), &vault(), &mint()))
            .unwrap();
        env
    }

    fn warp_to_epoch(&mut self, epoch: u64) {
        self.sysvars.clock.slot = self.sysvars.epoch_schedule.get_first_slot_in_epoch(epoch) + 10;
        self.sysvars.clock.epoch = epoch;
    }

    /// Moves past the voting window of a consensus reached at the current
    /// slot, staying in the same epoch.
    fn warp_past_voting_window(&mut self) {
        self.sysvars.clock.slot += VALID_SLOTS_AFTER_CONSENSUS + 1;
    }

    fn process(&mut self, instruction: Instruction) -> Result<(), InstructionError> {
        invoke(
            &mut self.accounts,
            &self.sysvars,
            &mut self.ledger,
            &self.external_state,
            &instruction,
        )
    }

    fn load<T: AccountState>(&self, address: &Pubkey) -> T {
        self.accounts.load(address).unwrap()
    }

    fn epoch_state(&self) -> EpochState {
        self.load(&epoch_state_address(&crate::id(), &ncn(), EPOCH))
    }

    /// Registers one operator per entry in `stakes`, each delegated that much
    /// security by the vault.
    fn register_operators(&mut self, stakes: &[u64]) {
        for (index, stake) in stakes.iter().enumerate() {
            let operator_key = operator(index as u8);
            self.process(instruction::register_operator(
                &admin(),
                &ncn(),
                &operator_key,
                OPERATOR_FEE_BPS,
                true,
            ))
            .unwrap();
            self.external_state
                .set_delegated_security(vault(), operator_key, *stake);
        }
    }

    /// Weight table, epoch snapshot and ballot box for `EPOCH`, with the
    /// first `snapshotted` operators fully snapshotted.
    fn snapshot_epoch(&mut self, snapshotted: u8) {
        self.process(instruction::initialize_epoch_state(&payer(), &ncn(), EPOCH))
            .unwrap();
        self.process(instruction::initialize_weight_table(&payer(), &ncn(), EPOCH))
            .unwrap();
        self.process(instruction::set_weight(&ncn(), EPOCH, &mint()))
            .unwrap();
        self.process(instruction::finalize_weight_table(&ncn(), EPOCH))
            .unwrap();
        self.process(instruction::initialize_epoch_snapshot(&payer(), &ncn(), EPOCH))
            .unwrap();
        for index in 0..snapshotted {
            let operator_key = operator(index);
            self.process(instruction::initialize_operator_snapshot(
                &payer(),
                &ncn(),
                &operator_key,
                EPOCH,
            ))
            .unwrap();
            self.process(instruction::snapshot_vault_operator_delegation(
                &ncn(),
                &vault(),
                &operator_key,
                EPOCH,
            ))
            .unwrap();
        }
        self.process(instruction::initialize_ballot_box(&payer(), &ncn(), EPOCH))
            .unwrap();
    }

    fn vote(&mut self, index: u8, root: [u8; 32]) -> Result<(), InstructionError> {
        self.process(instruction::cast_vote(&operator(index), &ncn(), root, EPOCH))
    }

    /// Funds the base router with `rewards`, then routes and distributes
    /// every share to its final recipient.
    fn route_and_distribute(&mut self, operators: u8, rewards: u64) {
        self.process(instruction::initialize_base_reward_router(&payer(), &ncn(), EPOCH))
            .unwrap();
        let base_router = base_reward_router_address(&crate::id(), &ncn(), EPOCH);
        self.ledger.deposit(&base_router, rewards).unwrap();

        self.process(instruction::route_base_rewards(&ncn(), EPOCH))
            .unwrap();
        self.warp_past_voting_window();
        self.process(instruction::route_ncn_rewards(&ncn(), EPOCH))
            .unwrap();
        self.process(instruction::distribute_base_rewards(
            &ncn(),
            0,
            &dao_wallet(),
            EPOCH,
        ))
        .unwrap();

        for index in 0..operators {
            let operator_key = operator(index);
            self.process(instruction::initialize_ncn_reward_router(
                &payer(),
                &ncn(),
                &operator_key,
                0,
                EPOCH,
            ))
            .unwrap();
            self.process(instruction::distribute_base_ncn_reward_route(
                &ncn(),
                &operator_key,
                0,
                EPOCH,
            ))
            .unwrap();
            self.process(instruction::route_ncn_reward_router(&ncn(), &operator_key, 0, EPOCH))
                .unwrap();
            self.process(instruction::distribute_ncn_operator_rewards(
                &ncn(),
                &operator_key,
                0,
                EPOCH,
            ))
            .unwrap();
            self.process(instruction::distribute_ncn_vault_rewards(
                &ncn(),
                &operator_key,
                &vault(),
                0,
                EPOCH,
            ))
            .unwrap();
        }
    }

    fn close(&mut self, epoch_account: EpochAccount, address: &Pubkey) -> Result<(), InstructionError> {
        self.process(instruction::close_epoch_account(
            &ncn(),
            epoch_account,
            address,
            &dao_wallet(),
            EPOCH,
        ))
    }
}

/// Every per-epoch account other than the epoch state, for operators
/// `0..operators` in NCN fee group 0.
fn closable_accounts(operators: u8) -> Vec<(EpochAccount, Pubkey)> {
    let program_id = crate::id();
    let mut accounts = vec![
        (
            EpochAccount::WeightTable,
            weight_table_address(&program_id, &ncn(), EPOCH),
        ),
        (
            EpochAccount::EpochSnapshot,
            epoch_snapshot_address(&program_id, &ncn(), EPOCH),
        ),
        (
            EpochAccount::BallotBox,
            ballot_box_address(&program_id, &ncn(), EPOCH),
        ),
        (
            EpochAccount::BaseRewardRouter,
            base_reward_router_address(&program_id, &ncn(), EPOCH),
        ),
    ];
    for index in 0..operators {
        let operator_index = u64::from(index);
        accounts.push((
            EpochAccount::OperatorSnapshot { operator_index },
            operator_snapshot_address(&program_id, &operator(index), &ncn(), EPOCH),
        ));
        accounts.push((
            EpochAccount::NcnRewardRouter {
                operator_index,
                ncn_fee_group: 0,
            },
            ncn_reward_router_address(&program_id, 0, &operator(index), &ncn(), EPOCH),
        ));
    }
    accounts
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_full_epoch_lifecycle() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[50, 30, 20]);
    env.snapshot_epoch(3);

    let claims = [(key(60), 300), (key(61), 200)];
    let tree = MerkleTree::from_claims(&claims);
    let root = tree.root().unwrap();

    // 50 of 100 is not above two thirds, 80 of 100 is.
    env.vote(0, root).unwrap();
    assert!(!env.epoch_state().is_consensus_reached());
    env.vote(1, root).unwrap();
    assert!(env.epoch_state().is_consensus_reached());
    env.vote(2, root).unwrap();

    let ballot_box: BallotBox = env.load(&ballot_box_address(&crate::id(), &ncn(), EPOCH));
    assert_eq!(ballot_box.get_winning_ballot().unwrap().root(), &root);
    assert_eq!(ballot_box.operators_voted(), 3);

    let claim_pool = claim_pool_address(&crate::id(), &ncn(), EPOCH);
    env.ledger.deposit(&claim_pool, 500).unwrap();
    env.route_and_distribute(3, 1_000);

    // DAO and NCN group 0 carry equal bps: 500 each. The NCN half splits
    // 250/150/100 by stake, then 10% operator fee and the rest to the vault.
    assert_eq!(env.ledger.balance(&dao_wallet()), 500);
    assert_eq!(env.ledger.balance(&operator(0)), 25);
    assert_eq!(env.ledger.balance(&operator(1)), 15);
    assert_eq!(env.ledger.balance(&operator(2)), 10);
    assert_eq!(env.ledger.balance(&vault()), 450);

    for (index, (claimant, amount)) in claims.iter().enumerate() {
        env.process(instruction::claim_with_payer(
            &payer(),
            &ncn(),
            claimant,
            *amount,
            tree.proof(index).unwrap(),
            EPOCH,
        ))
        .unwrap();
        assert_eq!(env.ledger.balance(claimant), *amount);
        let status: ClaimStatus =
            env.load(&claim_status_address(&crate::id(), claimant, &ncn(), EPOCH));
        assert_eq!(status.amount(), *amount);
    }
    assert_eq!(env.ledger.balance(&claim_pool), 0);
    assert_eq!(env.ledger.total_supply().unwrap(), 1_500);

    let state = env.epoch_state();
    assert!(state.total_distribution_progress().is_complete());
    assert!(state.base_distribution_progress().is_complete());
    assert_eq!(state.upload_progress().tally(), 2);

    // Closing opens `EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE` epochs after consensus.
    let (first, first_address) = closable_accounts(3)[0];
    assert_eq!(
        env.close(first, &first_address),
        Err(custom(TipRouterError::CannotCloseAccount))
    );
    env.warp_to_epoch(EPOCH + EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE - 1);
    assert_eq!(
        env.close(first, &first_address),
        Err(custom(TipRouterError::CannotCloseAccount))
    );
    env.warp_to_epoch(EPOCH + EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE);

    let epoch_state_key = epoch_state_address(&crate::id(), &ncn(), EPOCH);
    assert_eq!(
        env.close(EpochAccount::EpochState, &epoch_state_key),
        Err(custom(TipRouterError::CannotCloseEpochStateAccount))
    );

    for (epoch_account, address) in closable_accounts(3) {
        env.close(epoch_account, &address).unwrap();
        assert!(!env.accounts.contains(&address));
    }
    env.close(EpochAccount::EpochState, &epoch_state_key)
        .unwrap();

    // Config, registry, the two claim statuses and the epoch marker outlive
    // the epoch.
    assert_eq!(env.accounts.len(), 5);
    assert!(env
        .accounts
        .contains(&config_address(&crate::id(), &ncn())));
    let marker: EpochMarker = env.load(&epoch_marker_address(&crate::id(), &ncn(), EPOCH));
    assert_eq!(marker.epoch(), EPOCH);
    assert_eq!(env.ledger.total_supply().unwrap(), 1_500);

    // The epoch cannot be run a second time.
    assert_eq!(
        env.process(instruction::initialize_epoch_state(&payer(), &ncn(), EPOCH)),
        Err(custom(TipRouterError::EpochIsClosingDown))
    );
    assert!(!env.accounts.contains(&epoch_state_key));
}

#[test]
fn test_vote_requires_finalized_snapshots() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[50, 50]);
    env.snapshot_epoch(1);

    assert_eq!(
        env.vote(0, [7; 32]),
        Err(custom(TipRouterError::EpochSnapshotNotFinalized))
    );

    env.process(instruction::initialize_operator_snapshot(
        &payer(),
        &ncn(),
        &operator(1),
        EPOCH,
    ))
    .unwrap();
    env.process(instruction::snapshot_vault_operator_delegation(
        &ncn(),
        &vault(),
        &operator(1),
        EPOCH,
    ))
    .unwrap();
    env.vote(0, [7; 32]).unwrap();

    // Half the stake is not strictly above two thirds.
    assert!(!env.epoch_state().is_consensus_reached());
}

#[test]
fn test_operator_registered_after_snapshot_is_rejected() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[50, 50]);
    env.snapshot_epoch(1);

    let late = operator(2);
    env.process(instruction::register_operator(
        &admin(),
        &ncn(),
        &late,
        OPERATOR_FEE_BPS,
        true,
    ))
    .unwrap();
    env.external_state
        .set_delegated_security(vault(), late, 1_000);

    assert_eq!(
        env.process(instruction::initialize_operator_snapshot(
            &payer(),
            &ncn(),
            &late,
            EPOCH,
        )),
        Err(custom(TipRouterError::OperatorIsNotInSnapshot))
    );
    assert!(!env
        .accounts
        .contains(&operator_snapshot_address(&crate::id(), &late, &ncn(), EPOCH)));

    // The epoch still waits for the operator it was taken with.
    let epoch_snapshot: EpochSnapshot =
        env.load(&epoch_snapshot_address(&crate::id(), &ncn(), EPOCH));
    assert!(!epoch_snapshot.finalized());
    assert_eq!(
        env.vote(0, [7; 32]),
        Err(custom(TipRouterError::EpochSnapshotNotFinalized))
    );
}

#[test]
fn test_repeated_vote_after_window_is_accepted() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);
    env.vote(0, [7; 32]).unwrap();
    env.warp_past_voting_window();

    let before = env.accounts.clone();
    env.vote(0, [7; 32]).unwrap();
    assert_eq!(env.accounts, before);
    assert_eq!(
        env.vote(0, [8; 32]),
        Err(custom(TipRouterError::VotingNotValid))
    );
}

#[test]
fn test_vote_requires_operator_signature() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);

    let mut vote = instruction::cast_vote(&operator(0), &ncn(), [7; 32], EPOCH);
    vote.accounts[0].is_signer = false;
    assert_eq!(
        env.process(vote),
        Err(custom(TipRouterError::MissingRequiredSignature))
    );
}

#[test]
fn test_tie_breaker_resolves_stalled_vote() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[40, 35, 25]);
    env.snapshot_epoch(3);

    env.vote(0, [1; 32]).unwrap();
    env.vote(1, [2; 32]).unwrap();
    env.vote(2, [3; 32]).unwrap();
    assert!(!env.epoch_state().is_consensus_reached());

    let tie_break = |root| instruction::set_tie_breaker(&tie_breaker_admin(), &ncn(), root, EPOCH);
    assert_eq!(
        env.process(tie_break([2; 32])),
        Err(custom(TipRouterError::VotingNotFinalized))
    );
    assert_eq!(
        env.process(instruction::set_tie_breaker(&admin(), &ncn(), [2; 32], EPOCH)),
        Err(custom(TipRouterError::TieBreakerAdminInvalid))
    );

    env.warp_to_epoch(EPOCH + EPOCHS_BEFORE_STALL);
    assert_eq!(
        env.process(tie_break([9; 32])),
        Err(custom(TipRouterError::TieBreakerNotInPriorVotes))
    );
    env.process(tie_break([2; 32])).unwrap();

    let ballot_box: BallotBox = env.load(&ballot_box_address(&crate::id(), &ncn(), EPOCH));
    assert_eq!(ballot_box.get_winning_ballot().unwrap().root(), &[2; 32]);
    let state = env.epoch_state();
    assert!(state.is_consensus_reached());
    assert!(state.was_tie_breaker_set());

    assert_eq!(
        env.process(tie_break([1; 32])),
        Err(custom(TipRouterError::ConsensusAlreadyReached))
    );
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

#[test]
fn test_set_weight_falls_back_to_oracle() {
    let mut env = TestEnv::with_config();
    let oracle_mint = key(51);
    env.process(instruction::register_mint(&admin(), &ncn(), &oracle_mint, 1, None))
        .unwrap();
    env.process(instruction::initialize_epoch_state(&payer(), &ncn(), EPOCH))
        .unwrap();
    env.process(instruction::initialize_weight_table(&payer(), &ncn(), EPOCH))
        .unwrap();

    assert_eq!(
        env.process(instruction::set_weight(&ncn(), EPOCH, &oracle_mint)),
        Err(custom(TipRouterError::WeightNotFound))
    );
    assert_eq!(
        env.process(instruction::set_weight(&ncn(), EPOCH, &key(52))),
        Err(custom(TipRouterError::MintEntryNotFound))
    );
    assert_eq!(
        env.process(instruction::finalize_weight_table(&ncn(), EPOCH)),
        Err(custom(TipRouterError::WeightNotFound))
    );

    env.external_state.set_mint_weight(oracle_mint, 7);
    env.process(instruction::set_weight(&ncn(), EPOCH, &oracle_mint))
        .unwrap();
    env.process(instruction::admin_set_weight(&admin(), &ncn(), EPOCH, &mint(), 3))
        .unwrap();
    env.process(instruction::finalize_weight_table(&ncn(), EPOCH))
        .unwrap();

    let table: WeightTable = env.load(&weight_table_address(&crate::id(), &ncn(), EPOCH));
    assert_eq!(table.get_weight(&oracle_mint).unwrap().0, 7);
    assert_eq!(table.get_weight(&mint()).unwrap().0, 3);
    assert!(env.epoch_state().set_weight_progress().is_complete());
}

#[test]
fn test_future_weight_table_rejected() {
    let mut env = TestEnv::with_config();
    env.process(instruction::initialize_epoch_state(&payer(), &ncn(), EPOCH + 1))
        .unwrap();
    assert_eq!(
        env.process(instruction::initialize_weight_table(&payer(), &ncn(), EPOCH + 1)),
        Err(custom(TipRouterError::CannotCreateFutureWeightTables))
    );
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

#[test_case(instruction::initialize_registry(&key(9), &ncn()) ; "initialize registry")]
#[test_case(instruction::register_mint(&key(9), &ncn(), &key(51), 0, None) ; "register mint")]
#[test_case(instruction::register_operator(&key(9), &ncn(), &operator(0), 0, true) ; "register operator")]
#[test_case(instruction::admin_set_parameters(&key(9), &ncn(), Some(5), None, None) ; "set parameters")]
#[test_case(instruction::admin_set_new_admin(&key(9), &ncn(), ConfigAdminRole::Admin, &key(9)) ; "set new admin")]
#[test_case(instruction::admin_set_weight(&key(9), &ncn(), EPOCH, &mint(), 1) ; "set weight")]
fn test_admin_instruction_rejects_other_signer(instruction: Instruction) {
    let mut env = TestEnv::with_config();
    let before = env.accounts.clone();

    assert_eq!(
        env.process(instruction),
        Err(custom(TipRouterError::IncorrectNcnAdmin))
    );
    assert_eq!(env.accounts, before);
}

#[test]
fn test_fee_changes_require_fee_admin() {
    let mut env = TestEnv::with_config();
    let config_key = config_address(&crate::id(), &ncn());

    assert_eq!(
        env.process(instruction::admin_set_config_fees(
            &admin(),
            &ncn(),
            None,
            Some(0),
            None,
            Some(2_000),
            None,
            None,
        )),
        Err(custom(TipRouterError::IncorrectFeeAdmin))
    );
    env.process(instruction::admin_set_config_fees(
        &fee_admin(),
        &ncn(),
        None,
        Some(0),
        None,
        Some(2_000),
        None,
        None,
    ))
    .unwrap();

    // New fees activate next epoch.
    let config: NcnConfig = env.load(&config_key);
    let dao = tip_router_core::fee_group::BaseFeeGroup::DAO;
    assert_eq!(config.fee_config.current_fees(EPOCH).base_fee_bps(dao), 1_000);
    assert_eq!(config.fee_config.current_fees(EPOCH + 1).base_fee_bps(dao), 2_000);

    env.process(instruction::admin_set_new_admin(
        &admin(),
        &ncn(),
        ConfigAdminRole::FeeAdmin,
        &key(9),
    ))
    .unwrap();
    let config: NcnConfig = env.load(&config_key);
    assert_eq!(config.fee_admin, key(9));
    assert_eq!(config.admin, admin());
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[test]
fn test_failed_claim_is_rolled_back() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);

    let claimant = key(60);
    let claims = [(claimant, 300), (key(61), 200)];
    let tree = MerkleTree::from_claims(&claims);
    let root = tree.root().unwrap();
    env.vote(0, root).unwrap();

    let claim_pool = claim_pool_address(&crate::id(), &ncn(), EPOCH);
    let status_key = claim_status_address(&crate::id(), &claimant, &ncn(), EPOCH);
    let claim = |amount| {
        instruction::claim_with_payer(
            &payer(),
            &ncn(),
            &claimant,
            amount,
            tree.proof(0).unwrap(),
            EPOCH,
        )
    };

    assert_eq!(
        env.process(claim(301)),
        Err(custom(TipRouterError::InvalidMerkleProof))
    );

    // Underfunded pool: the claim status write must not survive the failed
    // transfer.
    env.ledger.deposit(&claim_pool, 100).unwrap();
    let before = env.accounts.clone();
    assert_eq!(
        env.process(claim(300)),
        Err(custom(TipRouterError::InsufficientFunds))
    );
    assert_eq!(env.accounts, before);
    assert!(!env.accounts.contains(&status_key));

    env.ledger.deposit(&claim_pool, 200).unwrap();
    env.process(claim(300)).unwrap();
    assert_eq!(env.ledger.balance(&claimant), 300);

    assert_eq!(
        env.process(claim(300)),
        Err(custom(TipRouterError::ClaimAlreadyProcessed))
    );
    assert_eq!(env.ledger.balance(&claimant), 300);
    assert_eq!(env.epoch_state().upload_progress().tally(), 1);
}

#[test]
fn test_claim_requires_consensus() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[50, 50]);
    env.snapshot_epoch(2);
    env.vote(0, [7; 32]).unwrap();

    assert_eq!(
        env.process(instruction::claim_with_payer(
            &payer(),
            &ncn(),
            &key(60),
            1,
            vec![],
            EPOCH,
        )),
        Err(custom(TipRouterError::ConsensusNotReached))
    );
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[test]
fn test_route_requires_consensus() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[50, 50]);
    env.snapshot_epoch(2);
    env.vote(0, [7; 32]).unwrap();

    env.process(instruction::initialize_base_reward_router(&payer(), &ncn(), EPOCH))
        .unwrap();
    assert_eq!(
        env.process(instruction::route_base_rewards(&ncn(), EPOCH)),
        Err(custom(TipRouterError::ConsensusNotReached))
    );
}

#[test_case(0, 500 ; "dao wallet")]
#[test_case(1, 0 ; "unfunded group")]
fn test_distribute_base_rewards_pays_group_wallet(group: u8, expected: u64) {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);
    env.vote(0, [7; 32]).unwrap();
    env.process(instruction::initialize_base_reward_router(&payer(), &ncn(), EPOCH))
        .unwrap();
    let base_router = base_reward_router_address(&crate::id(), &ncn(), EPOCH);
    env.ledger.deposit(&base_router, 1_000).unwrap();
    env.process(instruction::route_base_rewards(&ncn(), EPOCH))
        .unwrap();

    let config: NcnConfig = env.load(&config_address(&crate::id(), &ncn()));
    let group_key = tip_router_core::fee_group::BaseFeeGroup::try_from(group).unwrap();
    let wallet = *config.fee_config.base_fee_wallet(group_key);

    assert_eq!(
        env.process(instruction::distribute_base_rewards(&ncn(), group, &key(9), EPOCH)),
        Err(custom(TipRouterError::InvalidAccountAddress))
    );
    env.process(instruction::distribute_base_rewards(&ncn(), group, &wallet, EPOCH))
        .unwrap();
    assert_eq!(env.ledger.balance(&wallet), expected);
    assert_eq!(env.ledger.balance(&base_router), 1_000 - expected);
}

#[test]
fn test_distribute_base_rewards_rejects_unknown_group() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);
    env.process(instruction::initialize_base_reward_router(&payer(), &ncn(), EPOCH))
        .unwrap();

    assert_eq!(
        env.process(instruction::distribute_base_rewards(&ncn(), 8, &dao_wallet(), EPOCH)),
        Err(custom(TipRouterError::InvalidNcnFeeGroup))
    );
}

#[test]
fn test_route_ncn_rewards_waits_for_voting_window() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);
    env.vote(0, [7; 32]).unwrap();

    assert_eq!(
        env.process(instruction::route_base_rewards(&ncn(), EPOCH)),
        Err(custom(TipRouterError::AccountNotInitialized))
    );
    env.process(instruction::initialize_base_reward_router(&payer(), &ncn(), EPOCH))
        .unwrap();
    let base_router = base_reward_router_address(&crate::id(), &ncn(), EPOCH);
    env.ledger.deposit(&base_router, 1_000).unwrap();
    env.process(instruction::route_base_rewards(&ncn(), EPOCH))
        .unwrap();

    assert_eq!(
        env.process(instruction::route_ncn_rewards(&ncn(), EPOCH)),
        Err(custom(TipRouterError::VotingIsNotOver))
    );
    env.warp_past_voting_window();
    env.process(instruction::route_ncn_rewards(&ncn(), EPOCH))
        .unwrap();
}

#[test]
fn test_closing_stops_the_epoch() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);
    env.vote(0, [7; 32]).unwrap();
    env.route_and_distribute(1, 1_000);

    env.warp_to_epoch(EPOCH + EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE);
    let ballot_box_key = ballot_box_address(&crate::id(), &ncn(), EPOCH);
    env.close(EpochAccount::BallotBox, &ballot_box_key)
        .unwrap();
    assert!(env.epoch_state().is_closing());

    // A closed ballot box cannot be reopened to latch a second winner.
    assert_eq!(
        env.process(instruction::initialize_ballot_box(&payer(), &ncn(), EPOCH)),
        Err(custom(TipRouterError::EpochIsClosingDown))
    );
    assert!(!env.accounts.contains(&ballot_box_key));
    assert_eq!(
        env.vote(0, [9; 32]),
        Err(custom(TipRouterError::EpochIsClosingDown))
    );

    let base_router = base_reward_router_address(&crate::id(), &ncn(), EPOCH);
    env.ledger.deposit(&base_router, 100).unwrap();
    assert_eq!(
        env.process(instruction::route_base_rewards(&ncn(), EPOCH)),
        Err(custom(TipRouterError::EpochIsClosingDown))
    );
    assert_eq!(
        env.process(instruction::distribute_base_rewards(&ncn(), 0, &dao_wallet(), EPOCH)),
        Err(custom(TipRouterError::EpochIsClosingDown))
    );

    // Closing carries on regardless.
    env.close(EpochAccount::BaseRewardRouter, &base_router)
        .unwrap();
    assert_eq!(env.ledger.balance(&base_router), 0);
}

#[test]
fn test_close_before_consensus_reports_why() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[50, 50]);
    env.snapshot_epoch(2);
    env.vote(0, [7; 32]).unwrap();

    env.warp_to_epoch(EPOCH + EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE);
    assert_eq!(
        env.close(
            EpochAccount::WeightTable,
            &weight_table_address(&crate::id(), &ncn(), EPOCH),
        ),
        Err(custom(TipRouterError::ConsensusNotReached))
    );
}

#[test]
fn test_close_sweeps_router_leftovers_to_dao() {
    let mut env = TestEnv::with_config();
    env.register_operators(&[100]);
    env.snapshot_epoch(1);
    env.vote(0, [7; 32]).unwrap();
    env.route_and_distribute(1, 1_000);
    assert_eq!(env.ledger.balance(&dao_wallet()), 500);

    // Late arrivals that were never routed.
    let base_router = base_reward_router_address(&crate::id(), &ncn(), EPOCH);
    let ncn_router = ncn_reward_router_address(&crate::id(), 0, &operator(0), &ncn(), EPOCH);
    env.ledger.deposit(&base_router, 7).unwrap();
    env.ledger.deposit(&ncn_router, 3).unwrap();
    let supply = env.ledger.total_supply().unwrap();

    env.warp_to_epoch(EPOCH + EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE);
    assert_eq!(
        env.process(instruction::close_epoch_account(
            &ncn(),
            EpochAccount::BaseRewardRouter,
            &base_router,
            &key(9),
            EPOCH,
        )),
        Err(custom(TipRouterError::InvalidDaoWallet))
    );
    assert_eq!(
        env.close(EpochAccount::WeightTable, &base_router),
        Err(custom(TipRouterError::InvalidAccountToCloseDiscriminator))
    );

    env.close(EpochAccount::BaseRewardRouter, &base_router)
        .unwrap();
    assert_eq!(env.ledger.balance(&dao_wallet()), 507);
    env.close(
        EpochAccount::NcnRewardRouter {
            operator_index: 0,
            ncn_fee_group: 0,
        },
        &ncn_router,
    )
    .unwrap();
    assert_eq!(env.ledger.balance(&dao_wallet()), 510);
    assert_eq!(env.ledger.balance(&base_router), 0);
    assert_eq!(env.ledger.total_supply().unwrap(), supply);

    assert_eq!(
        env.close(EpochAccount::BaseRewardRouter, &base_router),
        Err(custom(TipRouterError::InvalidAccountStatus))
    );
}
