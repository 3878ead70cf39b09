//! Instruction definitions for the Tip Router program.
//!
//! Instructions are serialised with `bincode`, consistent with the other
//! built-in programs. Every per-epoch account is addressed by
//! `tip_router_core::address`, so the helper constructors below only need the
//! NCN, the epoch and the keys of the participants.

use {
    serde::{Deserialize, Serialize},
    solana_instruction::{AccountMeta, Instruction},
    solana_pubkey::Pubkey,
    tip_router_core::{
        address::*,
        epoch_state::EpochAccount,
        ncn_config::{ConfigAdminRole, ConsensusThreshold},
    },
};

/// Instructions supported by the Tip Router program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipRouterInstruction {
    // ── Configuration ────────────────────────────────────────────────────
    /// Create the NCN's configuration. The signer becomes its admin.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — NCN.
    /// 2. `[writable]` — Config account (uninitialised).
    InitializeConfig {
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
    },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Registry account (uninitialised).
    InitializeRegistry,

    /// Track a mint. `fixed_weight` pins its weight instead of reading the
    /// oracle.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Registry account.
    /// 3. `[]`         — Mint.
    RegisterMint {
        ncn_fee_group: u8,
        fixed_weight: Option<u128>,
    },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Registry account.
    /// 3. `[]`         — Vault.
    /// 4. `[]`         — Mint the vault holds (already registered).
    RegisterVault,

    /// Register an operator, or update the fee and status of a known one.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Registry account.
    /// 3. `[]`         — Operator.
    RegisterOperator {
        operator_fee_bps: u16,
        is_active: bool,
    },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[writable]` — Config account.
    AdminSetParameters {
        epochs_before_stall: Option<u64>,
        epochs_after_consensus_before_close: Option<u64>,
        valid_slots_after_consensus: Option<u64>,
    },

    /// Fee changes in bps take effect from the next epoch. Wallets and the
    /// block engine fee apply immediately.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Fee admin.
    /// 1. `[writable]` — Config account.
    AdminSetConfigFees {
        new_block_engine_fee_bps: Option<u16>,
        base_fee_group: Option<u8>,
        new_base_fee_wallet: Option<Pubkey>,
        new_base_fee_bps: Option<u16>,
        ncn_fee_group: Option<u8>,
        new_ncn_fee_bps: Option<u16>,
    },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[writable]` — Config account.
    AdminSetNewAdmin {
        role: ConfigAdminRole,
        new_admin: Pubkey,
    },

    // ── Epoch setup ──────────────────────────────────────────────────────
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account (uninitialised).
    /// 3. `[]`         — Epoch marker account, which must not exist.
    InitializeEpochState { epoch: u64 },

    /// Create the epoch's weight table from the registry's mints.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[]`         — Registry account.
    /// 3. `[writable]` — Epoch state account.
    /// 4. `[writable]` — Weight table account (uninitialised).
    InitializeWeightTable { epoch: u64 },

    /// Override a mint's weight.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[writable]` — Weight table account.
    AdminSetWeight {
        epoch: u64,
        mint: Pubkey,
        weight: u128,
    },

    /// Set a mint's weight from its registered fixed weight, else the oracle.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[]`         — Registry account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[writable]` — Weight table account.
    SetWeight { epoch: u64, mint: Pubkey },

    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Weight table account.
    FinalizeWeightTable { epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[]`         — Registry account.
    /// 3. `[writable]` — Epoch state account.
    /// 4. `[]`         — Weight table account (finalized).
    /// 5. `[writable]` — Epoch snapshot account (uninitialised).
    InitializeEpochSnapshot { epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[]`         — Registry account.
    /// 3. `[writable]` — Epoch state account.
    /// 4. `[]`         — Operator.
    /// 5. `[writable]` — Epoch snapshot account.
    /// 6. `[writable]` — Operator snapshot account (uninitialised).
    InitializeOperatorSnapshot { epoch: u64 },

    /// Record the security a vault delegates to an operator.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[]`         — Registry account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[]`         — Vault.
    /// 4. `[]`         — Operator.
    /// 5. `[]`         — Weight table account.
    /// 6. `[writable]` — Epoch snapshot account.
    /// 7. `[writable]` — Operator snapshot account.
    SnapshotVaultOperatorDelegation { epoch: u64 },

    // ── Voting ───────────────────────────────────────────────────────────
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[writable]` — Ballot box account (uninitialised).
    InitializeBallotBox { epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Operator.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[]`         — Epoch snapshot account.
    /// 4. `[]`         — Operator snapshot account.
    /// 5. `[writable]` — Ballot box account.
    CastVote {
        meta_merkle_root: [u8; 32],
        epoch: u64,
    },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Tie breaker admin.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[writable]` — Ballot box account.
    SetTieBreaker {
        meta_merkle_root: [u8; 32],
        epoch: u64,
    },

    // ── Rewards ──────────────────────────────────────────────────────────
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[writable]` — Base reward router account (uninitialised).
    InitializeBaseRewardRouter { epoch: u64 },

    /// Pull new rewards into the pool and split it across the fee groups.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Epoch state account.
    /// 2. `[]`         — Epoch snapshot account.
    /// 3. `[]`         — Ballot box account.
    /// 4. `[writable]` — Base reward router account.
    RouteBaseRewards { epoch: u64 },

    /// Split each NCN fee group across the operators that voted for the
    /// winning ballot. Only allowed once the voting window has closed.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[]`         — Epoch state account.
    /// 2. `[]`         — Ballot box account.
    /// 3. `[writable]` — Base reward router account.
    RouteNcnRewards { epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Epoch state account.
    /// 2. `[writable]` — Base reward router account.
    /// 3. `[writable]` — Base fee group wallet.
    DistributeBaseRewards { base_fee_group: u8, epoch: u64 },

    /// Move an operator's route into its NCN reward router.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Epoch state account.
    /// 2. `[]`         — Operator.
    /// 3. `[writable]` — Base reward router account.
    /// 4. `[writable]` — NCN reward router account.
    DistributeBaseNcnRewardRoute { ncn_fee_group: u8, epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[]`         — Operator.
    /// 4. `[]`         — Operator snapshot account.
    /// 5. `[writable]` — NCN reward router account (uninitialised).
    InitializeNcnRewardRouter { ncn_fee_group: u8, epoch: u64 },

    /// Split the router's pool into the operator fee and vault rewards.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Epoch state account.
    /// 2. `[]`         — Operator.
    /// 3. `[]`         — Operator snapshot account.
    /// 4. `[writable]` — NCN reward router account.
    RouteNcnRewardRouter { ncn_fee_group: u8, epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Epoch state account.
    /// 2. `[writable]` — Operator (receives the fee).
    /// 3. `[]`         — Operator snapshot account.
    /// 4. `[writable]` — NCN reward router account.
    DistributeNcnOperatorRewards { ncn_fee_group: u8, epoch: u64 },

    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[writable]` — Epoch state account.
    /// 2. `[]`         — Operator.
    /// 3. `[]`         — Operator snapshot account.
    /// 4. `[writable]` — Vault (receives the rewards).
    /// 5. `[writable]` — NCN reward router account.
    DistributeNcnVaultRewards { ncn_fee_group: u8, epoch: u64 },

    /// Pay a claim proven against the winning meta merkle root.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Payer.
    /// 1. `[]`         — Config account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[]`         — Ballot box account.
    /// 4. `[writable]` — Claim status account (uninitialised).
    /// 5. `[writable]` — Claim pool.
    /// 6. `[writable]` — Claimant.
    ClaimWithPayer {
        amount: u64,
        proof: Vec<[u8; 32]>,
        epoch: u64,
    },

    // ── Closing ──────────────────────────────────────────────────────────
    /// Close a per-epoch account once the retention window has passed. Any
    /// balance left in a router is swept to the DAO wallet. Closing the
    /// epoch state leaves an epoch marker behind so the epoch cannot be
    /// initialized again.
    ///
    /// # Accounts expected
    ///
    /// 0. `[]`         — Config account.
    /// 1. `[]`         — Registry account.
    /// 2. `[writable]` — Epoch state account.
    /// 3. `[writable]` — Account to close (the epoch state itself when
    ///                   closing `EpochAccount::EpochState`).
    /// 4. `[writable]` — DAO fee wallet.
    /// 5. `[writable]` — Epoch marker account.
    CloseEpochAccount {
        epoch_account: EpochAccount,
        epoch: u64,
    },
}

// ---------------------------------------------------------------------------
// Instruction constructors
// ---------------------------------------------------------------------------

fn instruction(data: &TipRouterInstruction, accounts: Vec<AccountMeta>) -> Instruction {
    Instruction::new_with_bincode(crate::id(), data, accounts)
}

fn config(ncn: &Pubkey) -> AccountMeta {
    AccountMeta::new_readonly(config_address(&crate::id(), ncn), false)
}

fn registry(ncn: &Pubkey, is_writable: bool) -> AccountMeta {
    let address = registry_address(&crate::id(), ncn);
    if is_writable {
        AccountMeta::new(address, false)
    } else {
        AccountMeta::new_readonly(address, false)
    }
}

fn epoch_state(ncn: &Pubkey, epoch: u64) -> AccountMeta {
    AccountMeta::new(epoch_state_address(&crate::id(), ncn, epoch), false)
}

#[allow(clippy::too_many_arguments)]
pub fn initialize_config(
    admin: &Pubkey,
    ncn: &Pubkey,
    tie_breaker_admin: &Pubkey,
    fee_admin: &Pubkey,
    dao_fee_wallet: &Pubkey,
    block_engine_fee_bps: u16,
    dao_fee_bps: u16,
    default_ncn_fee_bps: u16,
    valid_slots_after_consensus: u64,
    epochs_before_stall: u64,
    epochs_after_consensus_before_close: u64,
    consensus_threshold: ConsensusThreshold,
) -> Instruction {
    instruction(
        &TipRouterInstruction::InitializeConfig {
            tie_breaker_admin: *tie_breaker_admin,
            fee_admin: *fee_admin,
            dao_fee_wallet: *dao_fee_wallet,
            block_engine_fee_bps,
            dao_fee_bps,
            default_ncn_fee_bps,
            valid_slots_after_consensus,
            epochs_before_stall,
            epochs_after_consensus_before_close,
            consensus_threshold,
        },
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new_readonly(*ncn, false),
            AccountMeta::new(config_address(&crate::id(), ncn), false),
        ],
    )
}

pub fn initialize_registry(admin: &Pubkey, ncn: &Pubkey) -> Instruction {
    instruction(
        &TipRouterInstruction::InitializeRegistry,
        vec![
            AccountMeta::new_readonly(*admin, true),
            config(ncn),
            registry(ncn, true),
        ],
    )
}

pub fn register_mint(
    admin: &Pubkey,
    ncn: &Pubkey,
    mint: &Pubkey,
    ncn_fee_group: u8,
    fixed_weight: Option<u128>,
) -> Instruction {
    instruction(
        &TipRouterInstruction::RegisterMint {
            ncn_fee_group,
            fixed_weight,
        },
        vec![
            AccountMeta::new_readonly(*admin, true),
            config(ncn),
            registry(ncn, true),
            AccountMeta::new_readonly(*mint, false),
        ],
    )
}

pub fn register_vault(admin: &Pubkey, ncn: &Pubkey, vault: &Pubkey, mint: &Pubkey) -> Instruction {
    instruction(
        &TipRouterInstruction::RegisterVault,
        vec![
            AccountMeta::new_readonly(*admin, true),
            config(ncn),
            registry(ncn, true),
            AccountMeta::new_readonly(*vault, false),
            AccountMeta::new_readonly(*mint, false),
        ],
    )
}

pub fn register_operator(
    admin: &Pubkey,
    ncn: &Pubkey,
    operator: &Pubkey,
    operator_fee_bps: u16,
    is_active: bool,
) -> Instruction {
    instruction(
        &TipRouterInstruction::RegisterOperator {
            operator_fee_bps,
            is_active,
        },
        vec![
            AccountMeta::new_readonly(*admin, true),
            config(ncn),
            registry(ncn, true),
            AccountMeta::new_readonly(*operator, false),
        ],
    )
}

pub fn admin_set_parameters(
    admin: &Pubkey,
    ncn: &Pubkey,
    epochs_before_stall: Option<u64>,
    epochs_after_consensus_before_close: Option<u64>,
    valid_slots_after_consensus: Option<u64>,
) -> Instruction {
    instruction(
        &TipRouterInstruction::AdminSetParameters {
            epochs_before_stall,
            epochs_after_consensus_before_close,
            valid_slots_after_consensus,
        },
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(config_address(&crate::id(), ncn), false),
        ],
    )
}

#[allow(clippy::too_many_arguments)]
pub fn admin_set_config_fees(
    fee_admin: &Pubkey,
    ncn: &Pubkey,
    new_block_engine_fee_bps: Option<u16>,
    base_fee_group: Option<u8>,
    new_base_fee_wallet: Option<Pubkey>,
    new_base_fee_bps: Option<u16>,
    ncn_fee_group: Option<u8>,
    new_ncn_fee_bps: Option<u16>,
) -> Instruction {
    instruction(
        &TipRouterInstruction::AdminSetConfigFees {
            new_block_engine_fee_bps,
            base_fee_group,
            new_base_fee_wallet,
            new_base_fee_bps,
            ncn_fee_group,
            new_ncn_fee_bps,
        },
        vec![
            AccountMeta::new_readonly(*fee_admin, true),
            AccountMeta::new(config_address(&crate::id(), ncn), false),
        ],
    )
}

pub fn admin_set_new_admin(
    admin: &Pubkey,
    ncn: &Pubkey,
    role: ConfigAdminRole,
    new_admin: &Pubkey,
) -> Instruction {
    instruction(
        &TipRouterInstruction::AdminSetNewAdmin {
            role,
            new_admin: *new_admin,
        },
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(config_address(&crate::id(), ncn), false),
        ],
    )
}

pub fn initialize_epoch_state(payer: &Pubkey, ncn: &Pubkey, epoch: u64) -> Instruction {
    instruction(
        &TipRouterInstruction::InitializeEpochState { epoch },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(epoch_marker_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn initialize_weight_table(payer: &Pubkey, ncn: &Pubkey, epoch: u64) -> Instruction {
    instruction(
        &TipRouterInstruction::InitializeWeightTable { epoch },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            registry(ncn, false),
            epoch_state(ncn, epoch),
            AccountMeta::new(weight_table_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn admin_set_weight(
    admin: &Pubkey,
    ncn: &Pubkey,
    epoch: u64,
    mint: &Pubkey,
    weight: u128,
) -> Instruction {
    instruction(
        &TipRouterInstruction::AdminSetWeight {
            epoch,
            mint: *mint,
            weight,
        },
        vec![
            AccountMeta::new_readonly(*admin, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new(weight_table_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn set_weight(ncn: &Pubkey, epoch: u64, mint: &Pubkey) -> Instruction {
    instruction(
        &TipRouterInstruction::SetWeight { epoch, mint: *mint },
        vec![
            config(ncn),
            registry(ncn, false),
            epoch_state(ncn, epoch),
            AccountMeta::new(weight_table_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn finalize_weight_table(ncn: &Pubkey, epoch: u64) -> Instruction {
    instruction(
        &TipRouterInstruction::FinalizeWeightTable { epoch },
        vec![
            config(ncn),
            AccountMeta::new(weight_table_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn initialize_epoch_snapshot(payer: &Pubkey, ncn: &Pubkey, epoch: u64) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::InitializeEpochSnapshot { epoch },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            registry(ncn, false),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(weight_table_address(&program_id, ncn, epoch), false),
            AccountMeta::new(epoch_snapshot_address(&program_id, ncn, epoch), false),
        ],
    )
}

pub fn initialize_operator_snapshot(
    payer: &Pubkey,
    ncn: &Pubkey,
    operator: &Pubkey,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::InitializeOperatorSnapshot { epoch },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            registry(ncn, false),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(*operator, false),
            AccountMeta::new(epoch_snapshot_address(&program_id, ncn, epoch), false),
            AccountMeta::new(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn snapshot_vault_operator_delegation(
    ncn: &Pubkey,
    vault: &Pubkey,
    operator: &Pubkey,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::SnapshotVaultOperatorDelegation { epoch },
        vec![
            config(ncn),
            registry(ncn, false),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(*vault, false),
            AccountMeta::new_readonly(*operator, false),
            AccountMeta::new_readonly(weight_table_address(&program_id, ncn, epoch), false),
            AccountMeta::new(epoch_snapshot_address(&program_id, ncn, epoch), false),
            AccountMeta::new(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn initialize_ballot_box(payer: &Pubkey, ncn: &Pubkey, epoch: u64) -> Instruction {
    instruction(
        &TipRouterInstruction::InitializeBallotBox { epoch },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new(ballot_box_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn cast_vote(
    operator: &Pubkey,
    ncn: &Pubkey,
    meta_merkle_root: [u8; 32],
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::CastVote {
            meta_merkle_root,
            epoch,
        },
        vec![
            AccountMeta::new_readonly(*operator, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(epoch_snapshot_address(&program_id, ncn, epoch), false),
            AccountMeta::new_readonly(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
            AccountMeta::new(ballot_box_address(&program_id, ncn, epoch), false),
        ],
    )
}

pub fn set_tie_breaker(
    tie_breaker_admin: &Pubkey,
    ncn: &Pubkey,
    meta_merkle_root: [u8; 32],
    epoch: u64,
) -> Instruction {
    instruction(
        &TipRouterInstruction::SetTieBreaker {
            meta_merkle_root,
            epoch,
        },
        vec![
            AccountMeta::new_readonly(*tie_breaker_admin, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new(ballot_box_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn initialize_base_reward_router(payer: &Pubkey, ncn: &Pubkey, epoch: u64) -> Instruction {
    instruction(
        &TipRouterInstruction::InitializeBaseRewardRouter { epoch },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new(base_reward_router_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

pub fn route_base_rewards(ncn: &Pubkey, epoch: u64) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::RouteBaseRewards { epoch },
        vec![
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(epoch_snapshot_address(&program_id, ncn, epoch), false),
            AccountMeta::new_readonly(ballot_box_address(&program_id, ncn, epoch), false),
            AccountMeta::new(base_reward_router_address(&program_id, ncn, epoch), false),
        ],
    )
}

pub fn route_ncn_rewards(ncn: &Pubkey, epoch: u64) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::RouteNcnRewards { epoch },
        vec![
            config(ncn),
            AccountMeta::new_readonly(epoch_state_address(&program_id, ncn, epoch), false),
            AccountMeta::new_readonly(ballot_box_address(&program_id, ncn, epoch), false),
            AccountMeta::new(base_reward_router_address(&program_id, ncn, epoch), false),
        ],
    )
}

pub fn distribute_base_rewards(
    ncn: &Pubkey,
    base_fee_group: u8,
    base_fee_wallet: &Pubkey,
    epoch: u64,
) -> Instruction {
    instruction(
        &TipRouterInstruction::DistributeBaseRewards {
            base_fee_group,
            epoch,
        },
        vec![
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new(base_reward_router_address(&crate::id(), ncn, epoch), false),
            AccountMeta::new(*base_fee_wallet, false),
        ],
    )
}

pub fn distribute_base_ncn_reward_route(
    ncn: &Pubkey,
    operator: &Pubkey,
    ncn_fee_group: u8,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::DistributeBaseNcnRewardRoute {
            ncn_fee_group,
            epoch,
        },
        vec![
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(*operator, false),
            AccountMeta::new(base_reward_router_address(&program_id, ncn, epoch), false),
            AccountMeta::new(
                ncn_reward_router_address(&program_id, ncn_fee_group, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn initialize_ncn_reward_router(
    payer: &Pubkey,
    ncn: &Pubkey,
    operator: &Pubkey,
    ncn_fee_group: u8,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::InitializeNcnRewardRouter {
            ncn_fee_group,
            epoch,
        },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(*operator, false),
            AccountMeta::new_readonly(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
            AccountMeta::new(
                ncn_reward_router_address(&program_id, ncn_fee_group, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn route_ncn_reward_router(
    ncn: &Pubkey,
    operator: &Pubkey,
    ncn_fee_group: u8,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::RouteNcnRewardRouter {
            ncn_fee_group,
            epoch,
        },
        vec![
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(*operator, false),
            AccountMeta::new_readonly(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
            AccountMeta::new(
                ncn_reward_router_address(&program_id, ncn_fee_group, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn distribute_ncn_operator_rewards(
    ncn: &Pubkey,
    operator: &Pubkey,
    ncn_fee_group: u8,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::DistributeNcnOperatorRewards {
            ncn_fee_group,
            epoch,
        },
        vec![
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new(*operator, false),
            AccountMeta::new_readonly(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
            AccountMeta::new(
                ncn_reward_router_address(&program_id, ncn_fee_group, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn distribute_ncn_vault_rewards(
    ncn: &Pubkey,
    operator: &Pubkey,
    vault: &Pubkey,
    ncn_fee_group: u8,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::DistributeNcnVaultRewards {
            ncn_fee_group,
            epoch,
        },
        vec![
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(*operator, false),
            AccountMeta::new_readonly(
                operator_snapshot_address(&program_id, operator, ncn, epoch),
                false,
            ),
            AccountMeta::new(*vault, false),
            AccountMeta::new(
                ncn_reward_router_address(&program_id, ncn_fee_group, operator, ncn, epoch),
                false,
            ),
        ],
    )
}

pub fn claim_with_payer(
    payer: &Pubkey,
    ncn: &Pubkey,
    claimant: &Pubkey,
    amount: u64,
    proof: Vec<[u8; 32]>,
    epoch: u64,
) -> Instruction {
    let program_id = crate::id();
    instruction(
        &TipRouterInstruction::ClaimWithPayer {
            amount,
            proof,
            epoch,
        },
        vec![
            AccountMeta::new_readonly(*payer, true),
            config(ncn),
            epoch_state(ncn, epoch),
            AccountMeta::new_readonly(ballot_box_address(&program_id, ncn, epoch), false),
            AccountMeta::new(
                claim_status_address(&program_id, claimant, ncn, epoch),
                false,
            ),
            AccountMeta::new(claim_pool_address(&program_id, ncn, epoch), false),
            AccountMeta::new(*claimant, false),
        ],
    )
}

/// `account_to_close` is the epoch state itself when closing
/// `EpochAccount::EpochState`.
pub fn close_epoch_account(
    ncn: &Pubkey,
    epoch_account: EpochAccount,
    account_to_close: &Pubkey,
    dao_fee_wallet: &Pubkey,
    epoch: u64,
) -> Instruction {
    instruction(
        &TipRouterInstruction::CloseEpochAccount {
            epoch_account,
            epoch,
        },
        vec![
            config(ncn),
            registry(ncn, false),
            epoch_state(ncn, epoch),
            AccountMeta::new(*account_to_close, false),
            AccountMeta::new(*dao_fee_wallet, false),
            AccountMeta::new(epoch_marker_address(&crate::id(), ncn, epoch), false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use {super::*, solana_bincode::limited_deserialize};

    #[test]
    fn test_instruction_data_round_trips() {
        let ncn = Pubkey::new_from_array([1; 32]);
        let ix = cast_vote(&Pubkey::new_from_array([2; 32]), &ncn, [7; 32], 12);
        let decoded: TipRouterInstruction =
            limited_deserialize(&ix.data, solana_packet::PACKET_DATA_SIZE as u64).unwrap();
        assert_eq!(
            decoded,
            TipRouterInstruction::CastVote {
                meta_merkle_root: [7; 32],
                epoch: 12,
            }
        );
        assert_eq!(ix.accounts.len(), 6);
        assert!(ix.accounts[0].is_signer);
    }

    #[test]
    fn test_deep_claim_proof_fits_in_a_packet() {
        // 2^20 claimants.
        let ix = claim_with_payer(
            &Pubkey::new_from_array([1; 32]),
            &Pubkey::new_from_array([2; 32]),
            &Pubkey::new_from_array([3; 32]),
            1_000,
            vec![[9; 32]; 20],
            4,
        );
        let size = bincode::serialized_size(&TipRouterInstruction::ClaimWithPayer {
            amount: 1_000,
            proof: vec![[9; 32]; 20],
            epoch: 4,
        })
        .unwrap();
        assert_eq!(size, ix.data.len() as u64);
        assert!(size < solana_packet::PACKET_DATA_SIZE as u64);
    }
}
