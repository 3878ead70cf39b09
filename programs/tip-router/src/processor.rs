//! Instruction processing logic for the Tip Router program.

use {
    crate::{instruction::TipRouterInstruction, invoke_context::InvokeContext},
    log::*,
    solana_bincode::limited_deserialize,
    solana_instruction::error::InstructionError,
    solana_pubkey::Pubkey,
    tip_router_core::{
        account::discriminator_of,
        address::*,
        ballot_box::{Ballot, BallotBox, BallotBoxState},
        base_reward_router::BaseRewardRouter,
        claim_status::ClaimStatus,
        epoch_marker::EpochMarker,
        epoch_snapshot::{DelegationRecord, EpochSnapshot, OperatorSnapshot},
        epoch_state::{EpochAccount, EpochState},
        error::TipRouterError,
        fee_group::{BaseFeeGroup, NcnFeeGroup},
        fees::{FeeConfig, FeeUpdate},
        merkle,
        ncn_config::{ConfigAdminRole, ConsensusThreshold, NcnConfig},
        ncn_reward_router::NcnRewardRouter,
        registry::NcnRegistry,
        weight_table::WeightTable,
    },
};

// ---------------------------------------------------------------------------
// Program ID
// ---------------------------------------------------------------------------

solana_pubkey::declare_id!("TipRouter1111111111111111111111111111111111");

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

pub fn process_instruction(
    invoke_context: &mut InvokeContext,
    instruction_data: &[u8],
) -> Result<(), InstructionError> {
    let instruction: TipRouterInstruction =
        limited_deserialize(instruction_data, solana_packet::PACKET_DATA_SIZE as u64)?;

    trace!("tip-router process_instruction: {instruction:?}");

    match instruction {
        TipRouterInstruction::InitializeConfig {
            tie_breaker_admin,
            fee_admin,
            dao_fee_wallet,
            block_engine_fee_bps,
            dao_fee_bps,
            default_ncn_fee_bps,
            valid_slots_after_consensus,
            epochs_before_stall,
            epochs_after_consensus_before_close,
            consensus_threshold,
        } => process_initialize_config(
            invoke_context,
            tie_breaker_admin,
            fee_admin,
            dao_fee_wallet,
            block_engine_fee_bps,
            dao_fee_bps,
            default_ncn_fee_bps,
            valid_slots_after_consensus,
            epochs_before_stall,
            epochs_after_consensus_before_close,
            consensus_threshold,
        ),
        TipRouterInstruction::InitializeRegistry => process_initialize_registry(invoke_context),
        TipRouterInstruction::RegisterMint {
            ncn_fee_group,
            fixed_weight,
        } => process_register_mint(invoke_context, ncn_fee_group, fixed_weight),
        TipRouterInstruction::RegisterVault => process_register_vault(invoke_context),
        TipRouterInstruction::RegisterOperator {
            operator_fee_bps,
            is_active,
        } => process_register_operator(invoke_context, operator_fee_bps, is_active),
        TipRouterInstruction::AdminSetParameters {
            epochs_before_stall,
            epochs_after_consensus_before_close,
            valid_slots_after_consensus,
        } => process_admin_set_parameters(
            invoke_context,
            epochs_before_stall,
            epochs_after_consensus_before_close,
            valid_slots_after_consensus,
        ),
        TipRouterInstruction::AdminSetConfigFees {
            new_block_engine_fee_bps,
            base_fee_group,
            new_base_fee_wallet,
            new_base_fee_bps,
            ncn_fee_group,
            new_ncn_fee_bps,
        } => process_admin_set_config_fees(
            invoke_context,
            new_block_engine_fee_bps,
            base_fee_group,
            new_base_fee_wallet,
            new_base_fee_bps,
            ncn_fee_group,
            new_ncn_fee_bps,
        ),
        TipRouterInstruction::AdminSetNewAdmin { role, new_admin } => {
            process_admin_set_new_admin(invoke_context, role, new_admin)
        }
        TipRouterInstruction::InitializeEpochState { epoch } => {
            process_initialize_epoch_state(invoke_context, epoch)
        }
        TipRouterInstruction::InitializeWeightTable { epoch } => {
            process_initialize_weight_table(invoke_context, epoch)
        }
        TipRouterInstruction::AdminSetWeight {
            epoch,
            mint,
            weight,
        } => process_admin_set_weight(invoke_context, epoch, mint, weight),
        TipRouterInstruction::SetWeight { epoch, mint } => {
            process_set_weight(invoke_context, epoch, mint)
        }
        TipRouterInstruction::FinalizeWeightTable { epoch } => {
            process_finalize_weight_table(invoke_context, epoch)
        }
        TipRouterInstruction::InitializeEpochSnapshot { epoch } => {
            process_initialize_epoch_snapshot(invoke_context, epoch)
        }
        TipRouterInstruction::InitializeOperatorSnapshot { epoch } => {
            process_initialize_operator_snapshot(invoke_context, epoch)
        }
        TipRouterInstruction::SnapshotVaultOperatorDelegation { epoch } => {
            process_snapshot_vault_operator_delegation(invoke_context, epoch)
        }
        TipRouterInstruction::InitializeBallotBox { epoch } => {
            process_initialize_ballot_box(invoke_context, epoch)
        }
        TipRouterInstruction::CastVote {
            meta_merkle_root,
            epoch,
        } => process_cast_vote(invoke_context, meta_merkle_root, epoch),
        TipRouterInstruction::SetTieBreaker {
            meta_merkle_root,
            epoch,
        } => process_set_tie_breaker(invoke_context, meta_merkle_root, epoch),
        TipRouterInstruction::InitializeBaseRewardRouter { epoch } => {
            process_initialize_base_reward_router(invoke_context, epoch)
        }
        TipRouterInstruction::RouteBaseRewards { epoch } => {
            process_route_base_rewards(invoke_context, epoch)
        }
        TipRouterInstruction::RouteNcnRewards { epoch } => {
            process_route_ncn_rewards(invoke_context, epoch)
        }
        TipRouterInstruction::DistributeBaseRewards {
            base_fee_group,
            epoch,
        } => process_distribute_base_rewards(invoke_context, base_fee_group, epoch),
        TipRouterInstruction::DistributeBaseNcnRewardRoute {
            ncn_fee_group,
            epoch,
        } => process_distribute_base_ncn_reward_route(invoke_context, ncn_fee_group, epoch),
        TipRouterInstruction::InitializeNcnRewardRouter {
            ncn_fee_group,
            epoch,
        } => process_initialize_ncn_reward_router(invoke_context, ncn_fee_group, epoch),
        TipRouterInstruction::RouteNcnRewardRouter {
            ncn_fee_group,
            epoch,
        } => process_route_ncn_reward_router(invoke_context, ncn_fee_group, epoch),
        TipRouterInstruction::DistributeNcnOperatorRewards {
            ncn_fee_group,
            epoch,
        } => process_distribute_ncn_operator_rewards(invoke_context, ncn_fee_group, epoch),
        TipRouterInstruction::DistributeNcnVaultRewards {
            ncn_fee_group,
            epoch,
        } => process_distribute_ncn_vault_rewards(invoke_context, ncn_fee_group, epoch),
        TipRouterInstruction::ClaimWithPayer {
            amount,
            proof,
            epoch,
        } => process_claim_with_payer(invoke_context, amount, proof, epoch),
        TipRouterInstruction::CloseEpochAccount {
            epoch_account,
            epoch,
        } => process_close_epoch_account(invoke_context, epoch_account, epoch),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load the `NcnConfig` at `index`, which must live at the config address of
/// the NCN it names.
fn load_config(
    invoke_context: &InvokeContext,
    index: usize,
) -> Result<NcnConfig, InstructionError> {
    let config: NcnConfig = invoke_context.load_instruction_account(index)?;
    let expected = config_address(invoke_context.program_id(), &config.ncn);
    if invoke_context.get_key_of_instruction_account(index)? != &expected {
        return Err(TipRouterError::InvalidAccountAddress.into());
    }
    Ok(config)
}

/// The account at `index` must have signed and be `expected`.
fn check_authority(
    invoke_context: &InvokeContext,
    index: usize,
    expected: &Pubkey,
    error: TipRouterError,
) -> Result<Pubkey, InstructionError> {
    let signer = invoke_context.get_signer(index)?;
    if signer != *expected {
        return Err(error.into());
    }
    Ok(signer)
}

fn load_registry(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
) -> Result<NcnRegistry, InstructionError> {
    let address = registry_address(invoke_context.program_id(), ncn);
    invoke_context.load_account(index, &address)
}

fn load_epoch_state(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<EpochState, InstructionError> {
    let address = epoch_state_address(invoke_context.program_id(), ncn, epoch);
    invoke_context.load_account(index, &address)
}

/// Loads the epoch state for an instruction that makes progress in the
/// epoch.
fn load_active_epoch_state(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<EpochState, InstructionError> {
    let epoch_state = load_epoch_state(invoke_context, index, ncn, epoch)?;
    epoch_state.check_not_closing()?;
    Ok(epoch_state)
}

fn load_weight_table(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<WeightTable, InstructionError> {
    let address = weight_table_address(invoke_context.program_id(), ncn, epoch);
    invoke_context.load_account(index, &address)
}

fn load_epoch_snapshot(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<EpochSnapshot, InstructionError> {
    let address = epoch_snapshot_address(invoke_context.program_id(), ncn, epoch);
    invoke_context.load_account(index, &address)
}

fn load_operator_snapshot(
    invoke_context: &InvokeContext,
    index: usize,
    operator: &Pubkey,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<OperatorSnapshot, InstructionError> {
    let address = operator_snapshot_address(invoke_context.program_id(), operator, ncn, epoch);
    invoke_context.load_account(index, &address)
}

fn load_ballot_box(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<BallotBox, InstructionError> {
    let address = ballot_box_address(invoke_context.program_id(), ncn, epoch);
    invoke_context.load_account(index, &address)
}

fn load_base_reward_router(
    invoke_context: &InvokeContext,
    index: usize,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<BaseRewardRouter, InstructionError> {
    let address = base_reward_router_address(invoke_context.program_id(), ncn, epoch);
    invoke_context.load_account(index, &address)
}

fn load_ncn_reward_router(
    invoke_context: &InvokeContext,
    index: usize,
    ncn_fee_group: NcnFeeGroup,
    operator: &Pubkey,
    ncn: &Pubkey,
    epoch: u64,
) -> Result<NcnRewardRouter, InstructionError> {
    let address = ncn_reward_router_address(
        invoke_context.program_id(),
        ncn_fee_group.group(),
        operator,
        ncn,
        epoch,
    );
    invoke_context.load_account(index, &address)
}

/// Address of a closable per-epoch account. Operator-indexed accounts are
/// resolved through the registry.
fn epoch_account_address(
    program_id: &Pubkey,
    registry: &NcnRegistry,
    ncn: &Pubkey,
    epoch: u64,
    epoch_account: &EpochAccount,
) -> Result<Pubkey, TipRouterError> {
    let operator_at = |operator_index: u64| {
        registry
            .operator_entries()
            .find(|entry| entry.operator_index() == operator_index)
            .map(|entry| *entry.operator())
            .ok_or(TipRouterError::OperatorNotFound)
    };

    Ok(match epoch_account {
        EpochAccount::WeightTable => weight_table_address(program_id, ncn, epoch),
        EpochAccount::EpochSnapshot => epoch_snapshot_address(program_id, ncn, epoch),
        EpochAccount::OperatorSnapshot { operator_index } => {
            operator_snapshot_address(program_id, &operator_at(*operator_index)?, ncn, epoch)
        }
        EpochAccount::BallotBox => ballot_box_address(program_id, ncn, epoch),
        EpochAccount::BaseRewardRouter => base_reward_router_address(program_id, ncn, epoch),
        EpochAccount::NcnRewardRouter {
            operator_index,
            ncn_fee_group,
        } => ncn_reward_router_address(
            program_id,
            *ncn_fee_group,
            &operator_at(*operator_index)?,
            ncn,
            epoch,
        ),
        EpochAccount::EpochState => epoch_state_address(program_id, ncn, epoch),
    })
}

fn is_router(epoch_account: &EpochAccount) -> bool {
    matches!(
        epoch_account,
        EpochAccount::BaseRewardRouter | EpochAccount::NcnRewardRouter { .. }
    )
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// `InitializeConfig`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[]`         — NCN.
///   2. `[writable]` — Config account.
#[allow(clippy::too_many_arguments)]
fn process_initialize_config(
    invoke_context: &mut InvokeContext,
    tie_breaker_admin: Pubkey,
    fee_admin: Pubkey,
    dao_fee_wallet: Pubkey,
    block_engine_fee_bps: u16,
    dao_fee_bps: u16,
    default_ncn_fee_bps: u16,
    valid_slots_after_consensus: u64,
    epochs_before_stall: u64,
    epochs_after_consensus_before_close: u64,
    consensus_threshold: ConsensusThreshold,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(3)?;
    let admin = invoke_context.get_signer(0)?;
    let ncn = *invoke_context.get_key_of_instruction_account(1)?;

    let fee_config = FeeConfig::new(
        dao_fee_wallet,
        block_engine_fee_bps,
        dao_fee_bps,
        default_ncn_fee_bps,
        invoke_context.clock().epoch,
    )?;
    let config = NcnConfig::new(
        ncn,
        admin,
        tie_breaker_admin,
        fee_admin,
        valid_slots_after_consensus,
        epochs_before_stall,
        epochs_after_consensus_before_close,
        consensus_threshold,
        fee_config,
        0,
    )?;

    let address = config_address(invoke_context.program_id(), &ncn);
    invoke_context.create_account(2, &address, &config)?;

    info!("InitializeConfig: ncn={ncn}, admin={admin}");
    Ok(())
}

/// `InitializeRegistry`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[]`         — Config account.
///   2. `[writable]` — Registry account.
fn process_initialize_registry(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(3)?;
    let config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;

    let address = registry_address(invoke_context.program_id(), &config.ncn);
    invoke_context.create_account(2, &address, &NcnRegistry::new(config.ncn, 0))
}

/// `RegisterMint`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[]`         — Config account.
///   2. `[writable]` — Registry account.
///   3. `[]`         — Mint.
fn process_register_mint(
    invoke_context: &mut InvokeContext,
    ncn_fee_group: u8,
    fixed_weight: Option<u128>,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;
    let mut registry = load_registry(invoke_context, 2, &config.ncn)?;
    let mint = *invoke_context.get_key_of_instruction_account(3)?;

    registry.register_mint(mint, NcnFeeGroup::try_from(ncn_fee_group)?, fixed_weight)?;
    invoke_context.save_account(2, &registry)?;

    debug!("RegisterMint: mint={mint}, ncn_fee_group={ncn_fee_group}");
    Ok(())
}

/// `RegisterVault`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[]`         — Config account.
///   2. `[writable]` — Registry account.
///   3. `[]`         — Vault.
///   4. `[]`         — Mint.
fn process_register_vault(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(5)?;
    let config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;
    let mut registry = load_registry(invoke_context, 2, &config.ncn)?;
    let vault = *invoke_context.get_key_of_instruction_account(3)?;
    let mint = *invoke_context.get_key_of_instruction_account(4)?;

    registry.register_vault(vault, mint, invoke_context.clock().slot)?;
    invoke_context.save_account(2, &registry)?;

    debug!("RegisterVault: vault={vault}, mint={mint}");
    Ok(())
}

/// `RegisterOperator`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[]`         — Config account.
///   2. `[writable]` — Registry account.
///   3. `[]`         — Operator.
fn process_register_operator(
    invoke_context: &mut InvokeContext,
    operator_fee_bps: u16,
    is_active: bool,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;
    let mut registry = load_registry(invoke_context, 2, &config.ncn)?;
    let operator = *invoke_context.get_key_of_instruction_account(3)?;

    registry.register_operator(
        operator,
        operator_fee_bps,
        is_active,
        invoke_context.clock().slot,
    )?;
    invoke_context.save_account(2, &registry)?;

    debug!("RegisterOperator: operator={operator}, fee_bps={operator_fee_bps}, active={is_active}");
    Ok(())
}

/// `AdminSetParameters`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[writable]` — Config account.
fn process_admin_set_parameters(
    invoke_context: &mut InvokeContext,
    epochs_before_stall: Option<u64>,
    epochs_after_consensus_before_close: Option<u64>,
    valid_slots_after_consensus: Option<u64>,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(2)?;
    let mut config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;

    config.set_parameters(
        epochs_before_stall,
        epochs_after_consensus_before_close,
        valid_slots_after_consensus,
    )?;
    invoke_context.save_account(1, &config)
}

/// `AdminSetConfigFees`
///
/// Accounts:
///   0. `[signer]`   — Fee admin.
///   1. `[writable]` — Config account.
#[allow(clippy::too_many_arguments)]
fn process_admin_set_config_fees(
    invoke_context: &mut InvokeContext,
    new_block_engine_fee_bps: Option<u16>,
    base_fee_group: Option<u8>,
    new_base_fee_wallet: Option<Pubkey>,
    new_base_fee_bps: Option<u16>,
    ncn_fee_group: Option<u8>,
    new_ncn_fee_bps: Option<u16>,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(2)?;
    let mut config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.fee_admin, TipRouterError::IncorrectFeeAdmin)?;

    let update = FeeUpdate {
        new_block_engine_fee_bps,
        base_fee_group: base_fee_group.map(BaseFeeGroup::try_from).transpose()?,
        new_base_fee_wallet,
        new_base_fee_bps,
        ncn_fee_group: ncn_fee_group.map(NcnFeeGroup::try_from).transpose()?,
        new_ncn_fee_bps,
    };
    let current_epoch = invoke_context.clock().epoch;
    config.fee_config.update(&update, current_epoch)?;
    invoke_context.save_account(1, &config)?;

    info!("AdminSetConfigFees: {update:?} at epoch {current_epoch}");
    Ok(())
}

/// `AdminSetNewAdmin`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[writable]` — Config account.
fn process_admin_set_new_admin(
    invoke_context: &mut InvokeContext,
    role: ConfigAdminRole,
    new_admin: Pubkey,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(2)?;
    let mut config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;

    config.set_admin(role, new_admin);
    invoke_context.save_account(1, &config)?;

    info!("AdminSetNewAdmin: {role:?} is now {new_admin}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Epoch setup
// ---------------------------------------------------------------------------

/// `InitializeEpochState`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[]`         — Epoch marker account.
fn process_initialize_epoch_state(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;

    let marker = epoch_marker_address(invoke_context.program_id(), &config.ncn, epoch);
    if invoke_context.get_key_of_instruction_account(3)? != &marker {
        return Err(TipRouterError::InvalidAccountAddress.into());
    }
    if invoke_context.is_instruction_account_initialized(3)? {
        return Err(TipRouterError::EpochIsClosingDown.into());
    }

    let epoch_state = EpochState::new(config.ncn, epoch, 0, invoke_context.clock().slot);
    let address = epoch_state_address(invoke_context.program_id(), &config.ncn, epoch);
    invoke_context.create_account(2, &address, &epoch_state)
}

/// `InitializeWeightTable`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[]`         — Registry account.
///   3. `[writable]` — Epoch state account.
///   4. `[writable]` — Weight table account.
fn process_initialize_weight_table(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(5)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let ncn = config.ncn;
    let registry = load_registry(invoke_context, 2, &ncn)?;
    let mut epoch_state = load_epoch_state(invoke_context, 3, &ncn, epoch)?;

    if epoch > invoke_context.clock().epoch {
        return Err(TipRouterError::CannotCreateFutureWeightTables.into());
    }

    let weight_table = WeightTable::new(
        ncn,
        epoch,
        invoke_context.clock().slot,
        0,
        registry
            .mint_entries()
            .map(|entry| (*entry.mint(), entry.ncn_fee_group())),
    )?;
    let address = weight_table_address(invoke_context.program_id(), &ncn, epoch);
    invoke_context.create_account(4, &address, &weight_table)?;

    epoch_state.update_initialize_weight_table(weight_table.mint_count())?;
    invoke_context.save_account(3, &epoch_state)
}

fn set_mint_weight(
    invoke_context: &mut InvokeContext,
    epoch_state_index: usize,
    weight_table_index: usize,
    ncn: &Pubkey,
    epoch: u64,
    mint: &Pubkey,
    weight: u128,
) -> Result<(), InstructionError> {
    let mut epoch_state = load_active_epoch_state(invoke_context, epoch_state_index, ncn, epoch)?;
    let mut weight_table = load_weight_table(invoke_context, weight_table_index, ncn, epoch)?;

    weight_table.set_weight(mint, weight, invoke_context.clock().slot)?;
    epoch_state.update_set_weight(weight_table.weights_set());

    invoke_context.save_account(weight_table_index, &weight_table)?;
    invoke_context.save_account(epoch_state_index, &epoch_state)?;

    debug!("weight for mint {mint} in epoch {epoch} set to {weight}");
    Ok(())
}

/// `AdminSetWeight`
///
/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[writable]` — Weight table account.
fn process_admin_set_weight(
    invoke_context: &mut InvokeContext,
    epoch: u64,
    mint: Pubkey,
    weight: u128,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 1)?;
    check_authority(invoke_context, 0, &config.admin, TipRouterError::IncorrectNcnAdmin)?;

    set_mint_weight(invoke_context, 2, 3, &config.ncn, epoch, &mint, weight)
}

/// `SetWeight`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[]`         — Registry account.
///   2. `[writable]` — Epoch state account.
///   3. `[writable]` — Weight table account.
fn process_set_weight(
    invoke_context: &mut InvokeContext,
    epoch: u64,
    mint: Pubkey,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 0)?;
    let registry = load_registry(invoke_context, 1, &config.ncn)?;

    let entry = registry
        .mint_entry(&mint)
        .ok_or(TipRouterError::MintEntryNotFound)?;
    let weight = entry
        .fixed_weight()
        .or_else(|| invoke_context.external_state().mint_weight(&mint))
        .ok_or(TipRouterError::WeightNotFound)?;

    set_mint_weight(invoke_context, 2, 3, &config.ncn, epoch, &mint, weight)
}

/// `FinalizeWeightTable`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Weight table account.
fn process_finalize_weight_table(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(2)?;
    let config = load_config(invoke_context, 0)?;
    let mut weight_table = load_weight_table(invoke_context, 1, &config.ncn, epoch)?;

    weight_table.finalize()?;
    invoke_context.save_account(1, &weight_table)?;

    info!("weight table for epoch {epoch} finalized with {} mints", weight_table.mint_count());
    Ok(())
}

/// `InitializeEpochSnapshot`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[]`         — Registry account.
///   3. `[writable]` — Epoch state account.
///   4. `[]`         — Weight table account.
///   5. `[writable]` — Epoch snapshot account.
fn process_initialize_epoch_snapshot(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(6)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let ncn = config.ncn;
    let registry = load_registry(invoke_context, 2, &ncn)?;
    let mut epoch_state = load_epoch_state(invoke_context, 3, &ncn, epoch)?;
    let weight_table = load_weight_table(invoke_context, 4, &ncn, epoch)?;

    if !weight_table.finalized() {
        return Err(TipRouterError::WeightTableNotFinalized.into());
    }

    let operator_count = registry.operator_count();
    let vault_count = registry.vault_count();
    let epoch_snapshot = EpochSnapshot::new(
        ncn,
        epoch,
        0,
        invoke_context.clock().slot,
        operator_count,
        vault_count,
        *config.fee_config.current_fees(epoch),
    )?;
    let address = epoch_snapshot_address(invoke_context.program_id(), &ncn, epoch);
    invoke_context.create_account(5, &address, &epoch_snapshot)?;

    epoch_state.update_initialize_epoch_snapshot(operator_count, vault_count)?;
    invoke_context.save_account(3, &epoch_state)
}

/// `InitializeOperatorSnapshot`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[]`         — Registry account.
///   3. `[writable]` — Epoch state account.
///   4. `[]`         — Operator.
///   5. `[writable]` — Epoch snapshot account.
///   6. `[writable]` — Operator snapshot account.
fn process_initialize_operator_snapshot(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(7)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let ncn = config.ncn;
    let registry = load_registry(invoke_context, 2, &ncn)?;
    let mut epoch_state = load_epoch_state(invoke_context, 3, &ncn, epoch)?;
    let operator = *invoke_context.get_key_of_instruction_account(4)?;
    let mut epoch_snapshot = load_epoch_snapshot(invoke_context, 5, &ncn, epoch)?;

    let entry = registry
        .operator_entry(&operator)
        .ok_or(TipRouterError::OperatorNotFound)?;
    if entry.operator_index() >= epoch_snapshot.operator_count() {
        return Err(TipRouterError::OperatorIsNotInSnapshot.into());
    }
    let current_slot = invoke_context.clock().slot;
    let operator_snapshot = OperatorSnapshot::new(
        operator,
        ncn,
        epoch,
        0,
        current_slot,
        entry.is_active(),
        entry.operator_index(),
        entry.operator_fee_bps(),
        registry.vault_count(),
    )?;
    let address = operator_snapshot_address(invoke_context.program_id(), &operator, &ncn, epoch);
    invoke_context.create_account(6, &address, &operator_snapshot)?;

    // Nothing to register: the operator counts towards the epoch right away.
    if operator_snapshot.finalized() {
        epoch_snapshot.register_operator(&operator_snapshot, current_slot)?;
        invoke_context.save_account(5, &epoch_snapshot)?;
    }

    epoch_state.update_initialize_operator_snapshot(
        entry.operator_index(),
        operator_snapshot.vault_operator_delegation_count(),
    )?;
    epoch_state.update_snapshot_progress(
        entry.operator_index(),
        operator_snapshot.vault_operator_delegations_registered(),
        epoch_snapshot.operators_registered(),
    )?;
    invoke_context.save_account(3, &epoch_state)
}

/// `SnapshotVaultOperatorDelegation`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[]`         — Registry account.
///   2. `[writable]` — Epoch state account.
///   3. `[]`         — Vault.
///   4. `[]`         — Operator.
///   5. `[]`         — Weight table account.
///   6. `[writable]` — Epoch snapshot account.
///   7. `[writable]` — Operator snapshot account.
fn process_snapshot_vault_operator_delegation(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(8)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let registry = load_registry(invoke_context, 1, &ncn)?;
    let mut epoch_state = load_active_epoch_state(invoke_context, 2, &ncn, epoch)?;
    let vault = *invoke_context.get_key_of_instruction_account(3)?;
    let operator = *invoke_context.get_key_of_instruction_account(4)?;
    let weight_table = load_weight_table(invoke_context, 5, &ncn, epoch)?;
    let mut epoch_snapshot = load_epoch_snapshot(invoke_context, 6, &ncn, epoch)?;
    let mut operator_snapshot = load_operator_snapshot(invoke_context, 7, &operator, &ncn, epoch)?;

    let vault_entry = registry
        .vault_entry(&vault)
        .ok_or(TipRouterError::VaultNotFound)?;
    let (weight, ncn_fee_group) = weight_table.get_weight(vault_entry.mint())?;
    let security = invoke_context
        .external_state()
        .delegated_security(&vault, &operator);

    let current_slot = invoke_context.clock().slot;
    operator_snapshot.register_delegation(
        &DelegationRecord {
            vault,
            vault_index: vault_entry.vault_index(),
            mint: *vault_entry.mint(),
            ncn_fee_group,
            security,
            weight,
        },
        current_slot,
    )?;
    if operator_snapshot.finalized() {
        epoch_snapshot.register_operator(&operator_snapshot, current_slot)?;
        invoke_context.save_account(6, &epoch_snapshot)?;
        debug!(
            "operator {operator} snapshot finalized with stake weight {}",
            operator_snapshot.stake_weights().stake_weight()
        );
    }
    invoke_context.save_account(7, &operator_snapshot)?;

    epoch_state.update_snapshot_progress(
        operator_snapshot.operator_index(),
        operator_snapshot.vault_operator_delegations_registered(),
        epoch_snapshot.operators_registered(),
    )?;
    invoke_context.save_account(2, &epoch_state)
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

/// `InitializeBallotBox`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[writable]` — Ballot box account.
fn process_initialize_ballot_box(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let mut epoch_state = load_epoch_state(invoke_context, 2, &config.ncn, epoch)?;

    let ballot_box = BallotBox::new(config.ncn, epoch, 0, invoke_context.clock().slot);
    let address = ballot_box_address(invoke_context.program_id(), &config.ncn, epoch);
    invoke_context.create_account(3, &address, &ballot_box)?;

    epoch_state.update_initialize_ballot_box()?;
    invoke_context.save_account(2, &epoch_state)
}

/// `CastVote`
///
/// Accounts:
///   0. `[signer]`   — Operator.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[]`         — Epoch snapshot account.
///   4. `[]`         — Operator snapshot account.
///   5. `[writable]` — Ballot box account.
fn process_cast_vote(
    invoke_context: &mut InvokeContext,
    meta_merkle_root: [u8; 32],
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(6)?;
    let operator = invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 2, &ncn, epoch)?;
    let epoch_snapshot = load_epoch_snapshot(invoke_context, 3, &ncn, epoch)?;
    let operator_snapshot = load_operator_snapshot(invoke_context, 4, &operator, &ncn, epoch)?;
    let mut ballot_box = load_ballot_box(invoke_context, 5, &ncn, epoch)?;

    if ballot_box.ncn() != &ncn {
        return Err(TipRouterError::IncorrectNcn.into());
    }
    if !epoch_snapshot.finalized() {
        return Err(TipRouterError::EpochSnapshotNotFinalized.into());
    }
    if !operator_snapshot.finalized() {
        return Err(TipRouterError::OperatorSnapshotNotFinalized.into());
    }

    let current_slot = invoke_context.clock().slot;
    let ballot = Ballot::new(meta_merkle_root);
    let counted = ballot_box
        .cast_vote(
            &operator,
            &ballot,
            operator_snapshot.stake_weights(),
            current_slot,
            config.valid_slots_after_consensus,
        )
        .inspect_err(|err| warn!("CastVote: vote by {operator} in epoch {epoch} rejected: {err}"))?;
    if !counted {
        debug!("CastVote: {operator} repeated its vote in epoch {epoch}");
    }

    let consensus_reached = ballot_box.tally_votes(
        epoch_snapshot.stake_weights().stake_weight(),
        &config.consensus_threshold,
        current_slot,
    );
    epoch_state.update_cast_vote(
        ballot_box.operators_voted(),
        consensus_reached,
        ballot_box.slot_consensus_reached(),
    );

    invoke_context.save_account(5, &ballot_box)?;
    invoke_context.save_account(2, &epoch_state)
}

/// `SetTieBreaker`
///
/// Accounts:
///   0. `[signer]`   — Tie breaker admin.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[writable]` — Ballot box account.
fn process_set_tie_breaker(
    invoke_context: &mut InvokeContext,
    meta_merkle_root: [u8; 32],
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 1)?;
    check_authority(
        invoke_context,
        0,
        &config.tie_breaker_admin,
        TipRouterError::TieBreakerAdminInvalid,
    )?;
    let mut epoch_state = load_active_epoch_state(invoke_context, 2, &config.ncn, epoch)?;
    let mut ballot_box = load_ballot_box(invoke_context, 3, &config.ncn, epoch)?;

    let current_slot = invoke_context.clock().slot;
    ballot_box.set_tie_breaker_ballot(
        &Ballot::new(meta_merkle_root),
        invoke_context.clock().epoch,
        config.epochs_before_stall,
        current_slot,
    )?;
    epoch_state.update_set_tie_breaker(current_slot);

    invoke_context.save_account(3, &ballot_box)?;
    invoke_context.save_account(2, &epoch_state)
}

// ---------------------------------------------------------------------------
// Base reward routing
// ---------------------------------------------------------------------------

/// `InitializeBaseRewardRouter`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[writable]` — Base reward router account.
fn process_initialize_base_reward_router(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let mut epoch_state = load_epoch_state(invoke_context, 2, &config.ncn, epoch)?;

    let router = BaseRewardRouter::new(config.ncn, epoch, 0, invoke_context.clock().slot);
    let address = base_reward_router_address(invoke_context.program_id(), &config.ncn, epoch);
    invoke_context.create_account(3, &address, &router)?;

    epoch_state.update_initialize_base_reward_router()?;
    invoke_context.save_account(2, &epoch_state)
}

/// `RouteBaseRewards`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Epoch state account.
///   2. `[]`         — Epoch snapshot account.
///   3. `[]`         — Ballot box account.
///   4. `[writable]` — Base reward router account.
fn process_route_base_rewards(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(5)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 1, &ncn, epoch)?;
    let epoch_snapshot = load_epoch_snapshot(invoke_context, 2, &ncn, epoch)?;
    let ballot_box = load_ballot_box(invoke_context, 3, &ncn, epoch)?;
    let mut router = load_base_reward_router(invoke_context, 4, &ncn, epoch)?;

    if !ballot_box.is_consensus_reached() {
        return Err(TipRouterError::ConsensusNotReached.into());
    }
    epoch_state.check_ready_to_route(
        invoke_context.epoch_schedule(),
        config.epochs_after_consensus_before_close,
        invoke_context.clock().epoch,
    )?;

    let balance = invoke_context.get_balance_of_instruction_account(4)?;
    let incoming = router.route_incoming_rewards(balance)?;
    router.route_reward_pool(epoch_snapshot.fees())?;
    debug!(
        "RouteBaseRewards: epoch {epoch} routed {incoming} new rewards, {} total",
        router.total_rewards()
    );

    epoch_state.update_route_base_rewards(router.total_rewards());
    invoke_context.save_account(4, &router)?;
    invoke_context.save_account(1, &epoch_state)
}

/// `RouteNcnRewards`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[]`         — Epoch state account.
///   2. `[]`         — Ballot box account.
///   3. `[writable]` — Base reward router account.
fn process_route_ncn_rewards(
    invoke_context: &mut InvokeContext,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let epoch_state = load_epoch_state(invoke_context, 1, &ncn, epoch)?;
    let ballot_box = load_ballot_box(invoke_context, 2, &ncn, epoch)?;
    let mut router = load_base_reward_router(invoke_context, 3, &ncn, epoch)?;

    epoch_state.check_ready_to_route(
        invoke_context.epoch_schedule(),
        config.epochs_after_consensus_before_close,
        invoke_context.clock().epoch,
    )?;
    // Late votes for the winner earn a route too: the winners are only known
    // once the voting window has passed.
    match ballot_box.state(invoke_context.clock().slot, config.valid_slots_after_consensus)? {
        BallotBoxState::Finalized => {}
        BallotBoxState::ConsensusReached => return Err(TipRouterError::VotingIsNotOver.into()),
        BallotBoxState::Empty | BallotBoxState::Voting => {
            return Err(TipRouterError::ConsensusNotReached.into())
        }
    }

    router.route_ncn_fee_group_rewards(&ballot_box)?;
    debug!(
        "RouteNcnRewards: epoch {epoch} has {} operator routes",
        router.ncn_reward_routes().count()
    );
    invoke_context.save_account(3, &router)
}

/// `DistributeBaseRewards`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Epoch state account.
///   2. `[writable]` — Base reward router account.
///   3. `[writable]` — Base fee group wallet.
fn process_distribute_base_rewards(
    invoke_context: &mut InvokeContext,
    base_fee_group: u8,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(4)?;
    let config = load_config(invoke_context, 0)?;
    let mut epoch_state = load_active_epoch_state(invoke_context, 1, &config.ncn, epoch)?;
    let mut router = load_base_reward_router(invoke_context, 2, &config.ncn, epoch)?;

    // The routing buckets are indexed as one table, so any group outside it
    // is reported as a missing NCN bucket.
    let group = BaseFeeGroup::try_from(base_fee_group)
        .map_err(|_| TipRouterError::InvalidNcnFeeGroup)?;
    if invoke_context.get_key_of_instruction_account(3)? != config.fee_config.base_fee_wallet(group) {
        return Err(TipRouterError::InvalidAccountAddress.into());
    }

    let amount = router.distribute_base_fee_group_rewards(group)?;
    epoch_state.update_distribute_base_rewards(amount)?;
    invoke_context.save_account(2, &router)?;
    invoke_context.save_account(1, &epoch_state)?;

    debug!("DistributeBaseRewards: {amount} to base fee group {base_fee_group}");
    invoke_context.transfer(2, 3, amount)
}

// ---------------------------------------------------------------------------
// NCN reward routing
// ---------------------------------------------------------------------------

/// `DistributeBaseNcnRewardRoute`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Epoch state account.
///   2. `[]`         — Operator.
///   3. `[writable]` — Base reward router account.
///   4. `[writable]` — NCN reward router account.
fn process_distribute_base_ncn_reward_route(
    invoke_context: &mut InvokeContext,
    ncn_fee_group: u8,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(5)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 1, &ncn, epoch)?;
    let operator = *invoke_context.get_key_of_instruction_account(2)?;
    let mut base_router = load_base_reward_router(invoke_context, 3, &ncn, epoch)?;
    let group = NcnFeeGroup::try_from(ncn_fee_group)?;
    // Only checks the destination exists at its derived address.
    load_ncn_reward_router(invoke_context, 4, group, &operator, &ncn, epoch)?;

    let amount = base_router.distribute_ncn_fee_group_reward_route(group, &operator)?;
    epoch_state.update_distribute_base_ncn_rewards(amount)?;
    invoke_context.save_account(3, &base_router)?;
    invoke_context.save_account(1, &epoch_state)?;

    debug!("DistributeBaseNcnRewardRoute: {amount} to operator {operator} group {ncn_fee_group}");
    invoke_context.transfer(3, 4, amount)
}

/// `InitializeNcnRewardRouter`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[]`         — Operator.
///   4. `[]`         — Operator snapshot account.
///   5. `[writable]` — NCN reward router account.
fn process_initialize_ncn_reward_router(
    invoke_context: &mut InvokeContext,
    ncn_fee_group: u8,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(6)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let ncn = config.ncn;
    let mut epoch_state = load_epoch_state(invoke_context, 2, &ncn, epoch)?;
    let operator = *invoke_context.get_key_of_instruction_account(3)?;
    let operator_snapshot = load_operator_snapshot(invoke_context, 4, &operator, &ncn, epoch)?;
    let group = NcnFeeGroup::try_from(ncn_fee_group)?;

    let router = NcnRewardRouter::new(ncn, operator, group, epoch, 0, invoke_context.clock().slot);
    let address = ncn_reward_router_address(
        invoke_context.program_id(),
        ncn_fee_group,
        &operator,
        &ncn,
        epoch,
    );
    invoke_context.create_account(5, &address, &router)?;

    epoch_state.update_initialize_ncn_reward_router(operator_snapshot.operator_index(), group)?;
    invoke_context.save_account(2, &epoch_state)
}

/// `RouteNcnRewardRouter`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Epoch state account.
///   2. `[]`         — Operator.
///   3. `[]`         — Operator snapshot account.
///   4. `[writable]` — NCN reward router account.
fn process_route_ncn_reward_router(
    invoke_context: &mut InvokeContext,
    ncn_fee_group: u8,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(5)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 1, &ncn, epoch)?;
    let operator = *invoke_context.get_key_of_instruction_account(2)?;
    let operator_snapshot = load_operator_snapshot(invoke_context, 3, &operator, &ncn, epoch)?;
    let group = NcnFeeGroup::try_from(ncn_fee_group)?;
    let mut router = load_ncn_reward_router(invoke_context, 4, group, &operator, &ncn, epoch)?;

    let balance = invoke_context.get_balance_of_instruction_account(4)?;
    let incoming = router.route_incoming_rewards(balance)?;
    router.route_reward_pool(&operator_snapshot)?;
    debug!(
        "RouteNcnRewardRouter: operator {operator} group {ncn_fee_group} routed {incoming}, operator fee {}",
        router.operator_rewards()
    );

    epoch_state.update_route_ncn_rewards(
        operator_snapshot.operator_index(),
        group,
        router.total_rewards(),
    )?;
    invoke_context.save_account(4, &router)?;
    invoke_context.save_account(1, &epoch_state)
}

/// `DistributeNcnOperatorRewards`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Epoch state account.
///   2. `[writable]` — Operator.
///   3. `[]`         — Operator snapshot account.
///   4. `[writable]` — NCN reward router account.
fn process_distribute_ncn_operator_rewards(
    invoke_context: &mut InvokeContext,
    ncn_fee_group: u8,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(5)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 1, &ncn, epoch)?;
    let operator = *invoke_context.get_key_of_instruction_account(2)?;
    let operator_snapshot = load_operator_snapshot(invoke_context, 3, &operator, &ncn, epoch)?;
    let group = NcnFeeGroup::try_from(ncn_fee_group)?;
    let mut router = load_ncn_reward_router(invoke_context, 4, group, &operator, &ncn, epoch)?;

    let amount = router.distribute_operator_rewards()?;
    epoch_state.update_distribute_ncn_rewards(operator_snapshot.operator_index(), group, amount)?;
    invoke_context.save_account(4, &router)?;
    invoke_context.save_account(1, &epoch_state)?;

    debug!("DistributeNcnOperatorRewards: {amount} to operator {operator}");
    invoke_context.transfer(4, 2, amount)
}

/// `DistributeNcnVaultRewards`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[writable]` — Epoch state account.
///   2. `[]`         — Operator.
///   3. `[]`         — Operator snapshot account.
///   4. `[writable]` — Vault.
///   5. `[writable]` — NCN reward router account.
fn process_distribute_ncn_vault_rewards(
    invoke_context: &mut InvokeContext,
    ncn_fee_group: u8,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(6)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 1, &ncn, epoch)?;
    let operator = *invoke_context.get_key_of_instruction_account(2)?;
    let operator_snapshot = load_operator_snapshot(invoke_context, 3, &operator, &ncn, epoch)?;
    let vault = *invoke_context.get_key_of_instruction_account(4)?;
    let group = NcnFeeGroup::try_from(ncn_fee_group)?;
    let mut router = load_ncn_reward_router(invoke_context, 5, group, &operator, &ncn, epoch)?;

    let amount = router.distribute_vault_rewards(&vault)?;
    epoch_state.update_distribute_ncn_rewards(operator_snapshot.operator_index(), group, amount)?;
    invoke_context.save_account(5, &router)?;
    invoke_context.save_account(1, &epoch_state)?;

    debug!("DistributeNcnVaultRewards: {amount} to vault {vault} via operator {operator}");
    invoke_context.transfer(5, 4, amount)
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// `ClaimWithPayer`
///
/// Accounts:
///   0. `[signer]`   — Payer.
///   1. `[]`         — Config account.
///   2. `[writable]` — Epoch state account.
///   3. `[]`         — Ballot box account.
///   4. `[writable]` — Claim status account.
///   5. `[writable]` — Claim pool.
///   6. `[writable]` — Claimant.
fn process_claim_with_payer(
    invoke_context: &mut InvokeContext,
    amount: u64,
    proof: Vec<[u8; 32]>,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(7)?;
    invoke_context.get_signer(0)?;
    let config = load_config(invoke_context, 1)?;
    let ncn = config.ncn;
    let mut epoch_state = load_active_epoch_state(invoke_context, 2, &ncn, epoch)?;
    let ballot_box = load_ballot_box(invoke_context, 3, &ncn, epoch)?;
    let claimant = *invoke_context.get_key_of_instruction_account(6)?;
    let program_id = *invoke_context.program_id();

    if invoke_context.get_key_of_instruction_account(5)? != &claim_pool_address(&program_id, &ncn, epoch)
    {
        return Err(TipRouterError::InvalidAccountAddress.into());
    }
    let status_address = claim_status_address(&program_id, &claimant, &ncn, epoch);
    if invoke_context.get_key_of_instruction_account(4)? != &status_address {
        return Err(TipRouterError::InvalidAccountAddress.into());
    }
    if invoke_context.is_instruction_account_initialized(4)? {
        return Err(TipRouterError::ClaimAlreadyProcessed.into());
    }

    let root = *ballot_box.get_winning_ballot()?.root();
    if !merkle::verify(&proof, &root, merkle::hash_leaf(&claimant, amount)) {
        return Err(TipRouterError::InvalidMerkleProof.into());
    }

    let claim_status = ClaimStatus::new(
        ncn,
        epoch,
        claimant,
        amount,
        invoke_context.clock().slot,
        0,
    );
    invoke_context.create_account(4, &status_address, &claim_status)?;
    epoch_state.update_claim()?;
    invoke_context.save_account(2, &epoch_state)?;

    debug!("ClaimWithPayer: {amount} to {claimant} for epoch {epoch}");
    invoke_context.transfer(5, 6, amount)
}

// ---------------------------------------------------------------------------
// Closing
// ---------------------------------------------------------------------------

/// `CloseEpochAccount`
///
/// Accounts:
///   0. `[]`         — Config account.
///   1. `[]`         — Registry account.
///   2. `[writable]` — Epoch state account.
///   3. `[writable]` — Account to close.
///   4. `[writable]` — DAO fee wallet.
///   5. `[writable]` — Epoch marker account, created when the epoch state
///                     itself closes.
fn process_close_epoch_account(
    invoke_context: &mut InvokeContext,
    epoch_account: EpochAccount,
    epoch: u64,
) -> Result<(), InstructionError> {
    invoke_context.check_number_of_instruction_accounts(6)?;
    let config = load_config(invoke_context, 0)?;
    let ncn = config.ncn;
    let registry = load_registry(invoke_context, 1, &ncn)?;
    let mut epoch_state = load_epoch_state(invoke_context, 2, &ncn, epoch)?;

    if !epoch_state.can_close_epoch_accounts(
        invoke_context.epoch_schedule(),
        config.epochs_after_consensus_before_close,
        invoke_context.clock().epoch,
    )? {
        return Err(TipRouterError::CannotCloseAccount.into());
    }

    epoch_state.close_account(&epoch_account)?;

    let data = invoke_context.get_instruction_account_data(3)?;
    if discriminator_of(data) != Some(epoch_account.discriminator()) {
        return Err(TipRouterError::InvalidAccountToCloseDiscriminator.into());
    }
    let expected = epoch_account_address(
        invoke_context.program_id(),
        &registry,
        &ncn,
        epoch,
        &epoch_account,
    )?;
    if invoke_context.get_key_of_instruction_account(3)? != &expected {
        return Err(TipRouterError::InvalidAccountAddress.into());
    }
    if invoke_context.get_key_of_instruction_account(4)? != config.fee_config.dao_fee_wallet() {
        return Err(TipRouterError::InvalidDaoWallet.into());
    }

    // Whatever a router still holds, routed or not, goes to the DAO.
    let undistributed = match epoch_account {
        EpochAccount::BaseRewardRouter => invoke_context
            .load_instruction_account::<BaseRewardRouter>(3)?
            .sweep_remaining()?,
        EpochAccount::NcnRewardRouter { .. } => invoke_context
            .load_instruction_account::<NcnRewardRouter>(3)?
            .sweep_remaining()?,
        _ => 0,
    };
    let sweep = if is_router(&epoch_account) {
        invoke_context.get_balance_of_instruction_account(3)?
    } else {
        0
    };
    if sweep != undistributed {
        debug!("CloseEpochAccount: {epoch_account:?} held {sweep}, {undistributed} of it routed");
    }

    if epoch_account == EpochAccount::EpochState {
        let marker = EpochMarker::new(ncn, epoch, invoke_context.clock().slot);
        let address = epoch_marker_address(invoke_context.program_id(), &ncn, epoch);
        invoke_context.create_account(5, &address, &marker)?;
    } else {
        invoke_context.save_account(2, &epoch_state)?;
    }
    invoke_context.close_instruction_account(3)?;

    info!("CloseEpochAccount: closed {epoch_account:?} for epoch {epoch}, swept {sweep}");
    invoke_context.transfer(3, 4, sweep)
}
