//! Protocol constants for the Tip Router.
//!
//! Capacities are part of the account layout: changing any of them changes
//! the serialized size of the accounts that embed the corresponding array.

use static_assertions::const_assert;

/// Basis-point denominator (10_000 = 100%).
pub const MAX_FEE_BPS: u64 = 10_000;

/// Mints tracked by a registry and therefore by a weight table.
pub const MAX_MINTS: usize = 64;

/// Vaults tracked by a registry.
pub const MAX_VAULTS: usize = 64;

/// Operators tracked by a registry, and the number of per-operator progress
/// counters in `EpochState`.
pub const MAX_OPERATORS: usize = 256;

/// Vault delegations a single operator snapshot can hold.
pub const MAX_VAULT_OPERATOR_DELEGATIONS: usize = 64;

/// Operator votes a ballot box can hold.
pub const MAX_OPERATOR_VOTES: usize = 32;

/// Distinct ballots a ballot box can tally.
pub const MAX_BALLOT_TALLIES: usize = 32;

/// NCN reward routes a base reward router can hold (one per operator).
pub const MAX_NCN_REWARD_ROUTES: usize = 256;

/// Vault reward routes an NCN reward router can hold.
pub const MAX_VAULT_REWARD_ROUTES: usize = 32;

// Every winning voter gets a route.
const_assert!(MAX_OPERATOR_VOTES <= MAX_NCN_REWARD_ROUTES);
const_assert!(MAX_VAULT_OPERATOR_DELEGATIONS <= MAX_VAULTS);
const_assert!(MAX_BALLOT_TALLIES <= MAX_OPERATOR_VOTES);

/// Default supermajority, expressed as a fraction: a ballot wins when its
/// stake weight is strictly greater than `numerator / denominator` of the
/// total.
pub const DEFAULT_CONSENSUS_NUMERATOR: u64 = 2;
pub const DEFAULT_CONSENSUS_DENOMINATOR: u64 = 3;

// ── Parameter bounds ─────────────────────────────────────────────────────────

pub const MIN_VALID_SLOTS_AFTER_CONSENSUS: u64 = 100;
pub const MAX_VALID_SLOTS_AFTER_CONSENSUS: u64 = 50_000;

pub const MIN_EPOCHS_BEFORE_STALL: u64 = 1;
pub const MAX_EPOCHS_BEFORE_STALL: u64 = 50;

pub const MIN_EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE: u64 = 10;
pub const MAX_EPOCHS_AFTER_CONSENSUS_BEFORE_CLOSE: u64 = 100;

// ── Merkle tree domain separation ────────────────────────────────────────────

pub const LEAF_PREFIX: &[u8] = &[0];
pub const INTERMEDIATE_PREFIX: &[u8] = &[1];

// ── Address seeds ────────────────────────────────────────────────────────────

pub const CONFIG_SEED: &[u8] = b"config";
pub const REGISTRY_SEED: &[u8] = b"ncn_registry";
pub const WEIGHT_TABLE_SEED: &[u8] = b"weight_table";
pub const EPOCH_SNAPSHOT_SEED: &[u8] = b"epoch_snapshot";
pub const OPERATOR_SNAPSHOT_SEED: &[u8] = b"operator_snapshot";
pub const BALLOT_BOX_SEED: &[u8] = b"ballot_box";
pub const BASE_REWARD_ROUTER_SEED: &[u8] = b"base_reward_router";
pub const NCN_REWARD_ROUTER_SEED: &[u8] = b"ncn_reward_router";
pub const EPOCH_STATE_SEED: &[u8] = b"epoch_state";
pub const CLAIM_STATUS_SEED: &[u8] = b"claim_status";
pub const CLAIM_POOL_SEED: &[u8] = b"claim_pool";
pub const EPOCH_MARKER_SEED: &[u8] = b"epoch_marker";
