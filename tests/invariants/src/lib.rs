//! Tip Router Property-Based Invariant Tests
//!
//! Uses proptest to verify critical invariants across:
//! - Ballot consensus threshold and vote handling
//! - Reward routing conservation and split determinism

pub mod consensus_invariants;
pub mod reward_invariants;
