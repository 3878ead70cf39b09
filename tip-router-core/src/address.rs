//! Deterministic account addresses.
//!
//! Every Tip Router account lives at `sha256(program_id ‖ seeds...)`. The
//! processor rejects any account that is not at the address derived from its
//! role, which pins each per-epoch account to exactly one (ncn, epoch) pair.

use {
    crate::constants::*,
    solana_pubkey::Pubkey,
    solana_sha256_hasher::hashv,
};

pub fn derive_address(program_id: &Pubkey, seeds: &[&[u8]]) -> Pubkey {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len().saturating_add(1));
    parts.push(program_id.as_ref());
    parts.extend_from_slice(seeds);
    Pubkey::new_from_array(hashv(&parts).to_bytes())
}

pub fn config_address(program_id: &Pubkey, ncn: &Pubkey) -> Pubkey {
    derive_address(program_id, &[CONFIG_SEED, ncn.as_ref()])
}

pub fn registry_address(program_id: &Pubkey, ncn: &Pubkey) -> Pubkey {
    derive_address(program_id, &[REGISTRY_SEED, ncn.as_ref()])
}

pub fn weight_table_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[WEIGHT_TABLE_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}

pub fn epoch_snapshot_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[EPOCH_SNAPSHOT_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}

pub fn operator_snapshot_address(
    program_id: &Pubkey,
    operator: &Pubkey,
    ncn: &Pubkey,
    epoch: u64,
) -> Pubkey {
    derive_address(
        program_id,
        &[
            OPERATOR_SNAPSHOT_SEED,
            operator.as_ref(),
            ncn.as_ref(),
            &epoch.to_le_bytes(),
        ],
    )
}

pub fn ballot_box_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[BALLOT_BOX_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}

pub fn base_reward_router_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[BASE_REWARD_ROUTER_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}

pub fn ncn_reward_router_address(
    program_id: &Pubkey,
    ncn_fee_group: u8,
    operator: &Pubkey,
    ncn: &Pubkey,
    epoch: u64,
) -> Pubkey {
    derive_address(
        program_id,
        &[
            NCN_REWARD_ROUTER_SEED,
            &[ncn_fee_group],
            operator.as_ref(),
            ncn.as_ref(),
            &epoch.to_le_bytes(),
        ],
    )
}

pub fn epoch_state_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[EPOCH_STATE_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}

pub fn claim_status_address(
    program_id: &Pubkey,
    claimant: &Pubkey,
    ncn: &Pubkey,
    epoch: u64,
) -> Pubkey {
    derive_address(
        program_id,
        &[
            CLAIM_STATUS_SEED,
            claimant.as_ref(),
            ncn.as_ref(),
            &epoch.to_le_bytes(),
        ],
    )
}

/// Token account the epoch's Merkle claims are paid from. Funded externally.
pub fn claim_pool_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[CLAIM_POOL_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}

/// Left behind when an epoch's state account closes.
pub fn epoch_marker_address(program_id: &Pubkey, ncn: &Pubkey, epoch: u64) -> Pubkey {
    derive_address(
        program_id,
        &[EPOCH_MARKER_SEED, ncn.as_ref(), &epoch.to_le_bytes()],
    )
}
