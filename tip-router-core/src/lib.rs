//! # Tip Router core
//!
//! Account state and algorithms for a **stake-weighted ballot consensus
//! engine** and the **reward routing engine** that pays out against its
//! result. Operators vote on a 32-byte Merkle root once per epoch; their
//! votes are weighted by the stake delegated to them, frozen into snapshots
//! through a per-epoch weight table. Once a ballot wins, the epoch's fee
//! revenue is split into fee groups and fanned out to operators and vaults
//! without ever creating or losing a unit.
//!
//! Everything here is pure: no I/O, no clock, no token transfers. The
//! program crate feeds in slots, epochs and balances and performs the
//! transfers these types tell it to.
//!
//! ## Quick start
//!
//! ```rust
//! use solana_pubkey::Pubkey;
//! use tip_router_core::{
//!     Ballot, BallotBox, ConsensusThreshold, NcnFeeGroup, StakeWeights,
//! };
//!
//! let ncn = Pubkey::new_from_array([1; 32]);
//! let mut ballot_box = BallotBox::new(ncn, 42, 0, 1_000);
//! let ballot = Ballot::new([7; 32]);
//!
//! // 70 of 100 stake weight votes for the same root: strictly above 2/3.
//! let weights = StakeWeights::snapshot(NcnFeeGroup::default(), 70, 1).unwrap();
//! ballot_box
//!     .cast_vote(&Pubkey::new_from_array([2; 32]), &ballot, &weights, 1_001, 100)
//!     .unwrap();
//! assert!(ballot_box.tally_votes(100, &ConsensusThreshold::default(), 1_001));
//! assert_eq!(ballot_box.get_winning_ballot().unwrap(), &ballot);
//! ```
//!
//! See [`ballot_box`] for the consensus rules, [`base_reward_router`] and
//! [`ncn_reward_router`] for the two reward tiers and [`epoch_state`] for the
//! per-epoch phase machine.

#![allow(clippy::arithmetic_side_effects)]

pub mod account;
pub mod address;
pub mod ballot_box;
pub mod base_reward_router;
pub mod claim_status;
pub mod constants;
pub mod epoch_marker;
pub mod epoch_snapshot;
pub mod epoch_state;
pub mod error;
pub mod fee_group;
pub mod fees;
pub mod math;
pub mod merkle;
pub mod ncn_config;
pub mod ncn_reward_router;
pub mod registry;
pub mod stake_weight;
pub mod weight_table;


pub use {
    account::AccountState,
    ballot_box::{Ballot, BallotBox, BallotBoxState},
    base_reward_router::BaseRewardRouter,
    claim_status::ClaimStatus,
    epoch_marker::EpochMarker,
    epoch_snapshot::{DelegationRecord, EpochSnapshot, OperatorSnapshot},
    epoch_state::{AccountStatus, EpochAccount, EpochState, Progress, State},
    error::TipRouterError,
    fee_group::{BaseFeeGroup, NcnFeeGroup, NcnFeeGroupType},
    fees::{FeeConfig, FeeUpdate, Fees},
    ncn_config::{ConfigAdminRole, ConsensusThreshold, NcnConfig},
    ncn_reward_router::NcnRewardRouter,
    registry::NcnRegistry,
    stake_weight::StakeWeights,
    weight_table::WeightTable,
};
