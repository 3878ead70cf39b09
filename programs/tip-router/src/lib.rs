//! Tip Router Program
//!
//! Instruction interface and processor for the Tip Router: per-epoch ballot
//! consensus among an NCN's operators, followed by routing the epoch's fee
//! revenue out to fee wallets, operators and vaults.
//!
//! ## Epoch lifecycle
//!
//! 1. `InitializeEpochState`, then `InitializeWeightTable`, `SetWeight` /
//!    `AdminSetWeight` for every registered mint and `FinalizeWeightTable`.
//! 2. `InitializeEpochSnapshot`, one `InitializeOperatorSnapshot` per
//!    operator and one `SnapshotVaultOperatorDelegation` per vault and
//!    operator. The snapshot finalizes when the last operator does.
//! 3. `InitializeBallotBox` and `CastVote` until a ballot holds more than the
//!    consensus threshold of the snapshotted stake weight. A stalled vote can
//!    be resolved with `SetTieBreaker`.
//! 4. `RouteBaseRewards` splits the base router's balance into fee groups,
//!    `RouteNcnRewards` fans the NCN groups out to winning operators, and the
//!    `Distribute*` instructions move each share. `ClaimWithPayer` pays Merkle
//!    claims against the winning root.
//! 5. After `epochs_after_consensus_before_close` epochs every per-epoch
//!    account can be closed with `CloseEpochAccount`, the epoch state last.
//!
//! ## Execution model
//!
//! [`invoke_context::invoke`] runs one instruction against an
//! [`invoke_context::AccountStore`], a [`ledger::TokenLedger`] and a
//! read-only [`external_state::ExternalState`]. Account writes are committed
//! only when the instruction succeeds.

#![allow(clippy::arithmetic_side_effects)]

pub mod external_state;
pub mod instruction;
pub mod invoke_context;
pub mod ledger;
pub mod processor;

#[cfg(test)]
mod tests;

/// Re-export the program ID.
pub use processor::id;
