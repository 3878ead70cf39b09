//! Property-based tests for ballot consensus invariants.
//!
//! Properties tested:
//! 1. Threshold: a ballot wins exactly when `weight * d > total * n`.
//! 2. Safety: at most one ballot wins, and it holds more than the threshold.
//! 3. Idempotence: repeating a vote changes nothing.
//! 4. Order independence: the winner does not depend on vote order.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        solana_pubkey::Pubkey,
        tip_router_core::{
            ballot_box::{Ballot, BallotBox},
            error::TipRouterError,
            fee_group::NcnFeeGroup,
            ncn_config::ConsensusThreshold,
            stake_weight::StakeWeights,
        },
    };

    // ── Helpers ──

    const EPOCH: u64 = 7;
    const SLOT: u64 = 1_000;
    const VALID_SLOTS: u64 = 100;

    fn operator(index: usize) -> Pubkey {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&(index as u64).to_le_bytes());
        bytes[31] = 0xAA;
        Pubkey::new_from_array(bytes)
    }

    fn ballot(choice: u8) -> Ballot {
        Ballot::new([choice.wrapping_add(1); 32])
    }

    fn weights(stake: u64) -> StakeWeights {
        StakeWeights::snapshot(NcnFeeGroup::default(), stake, 1).unwrap()
    }

    /// Casts `votes` in order, tallying after each one.
    fn run_votes(votes: &[(usize, u64, u8)], total: u128) -> BallotBox {
        let mut ballot_box = BallotBox::new(Pubkey::new_from_array([1; 32]), EPOCH, 0, 0);
        let threshold = ConsensusThreshold::default();
        for (index, stake, choice) in votes {
            ballot_box
                .cast_vote(
                    &operator(*index),
                    &ballot(*choice),
                    &weights(*stake),
                    SLOT,
                    VALID_SLOTS,
                )
                .unwrap();
            ballot_box.tally_votes(total, &threshold, SLOT);
        }
        ballot_box
    }

    /// Operators with a stake and a choice among three ballots.
    fn arb_votes() -> impl Strategy<Value = Vec<(usize, u64, u8)>> {
        prop::collection::vec((1..=1_000_000u64, 0..3u8), 1..=16).prop_map(|votes| {
            votes
                .into_iter()
                .enumerate()
                .map(|(index, (stake, choice))| (index, stake, choice))
                .collect()
        })
    }

    fn total_stake(votes: &[(usize, u64, u8)]) -> u128 {
        votes.iter().map(|(_, stake, _)| u128::from(*stake)).sum()
    }

    // ── Threshold ──

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn default_threshold_is_strictly_two_thirds(
            (total, part) in (1..=u64::MAX).prop_flat_map(|total| (Just(total), 0..=total)),
        ) {
            let reached = ConsensusThreshold::default()
                .is_reached(u128::from(part), u128::from(total));
            prop_assert_eq!(reached, u128::from(part) * 3 > u128::from(total) * 2);
        }

        #[test]
        fn any_threshold_is_exact(
            (denominator, numerator) in (2..=10_000u64)
                .prop_flat_map(|d| (Just(d), d.div_ceil(2)..d)),
            total in 1..=u64::MAX,
            part in any::<u64>(),
        ) {
            let threshold = ConsensusThreshold { numerator, denominator };
            prop_assert!(threshold.validate().is_ok());

            let part = part % total.saturating_add(1);
            let reached = threshold.is_reached(u128::from(part), u128::from(total));
            let expected = u128::from(part) * u128::from(denominator)
                > u128::from(total) * u128::from(numerator);
            prop_assert_eq!(reached, expected);
        }
    }

    // ── Voting ──

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn winner_holds_more_than_threshold(votes in arb_votes()) {
            let total = total_stake(&votes);
            let ballot_box = run_votes(&votes, total);

            if let Ok(winner) = ballot_box.get_winning_ballot() {
                let winning_stake = ballot_box
                    .tally_of(winner)
                    .unwrap()
                    .stake_weights()
                    .stake_weight();
                prop_assert!(winning_stake * 3 > total * 2);

                // No other ballot could also have crossed.
                for tally in ballot_box.ballot_tallies() {
                    if tally.ballot() != winner {
                        prop_assert!(tally.stake_weights().stake_weight() * 3 <= total * 2);
                    }
                }
            } else {
                for tally in ballot_box.ballot_tallies() {
                    prop_assert!(tally.stake_weights().stake_weight() * 3 <= total * 2);
                }
            }
        }

        #[test]
        fn repeated_votes_change_nothing(votes in arb_votes()) {
            let total = total_stake(&votes);
            let mut ballot_box = run_votes(&votes, total);
            let before = ballot_box.clone();

            for (index, stake, choice) in &votes {
                let counted = ballot_box
                    .cast_vote(&operator(*index), &ballot(*choice), &weights(*stake), SLOT, VALID_SLOTS)
                    .unwrap();
                prop_assert!(!counted);
                ballot_box.tally_votes(total, &ConsensusThreshold::default(), SLOT);
            }
            prop_assert_eq!(ballot_box, before);
        }

        #[test]
        fn changed_vote_is_rejected(votes in arb_votes()) {
            let total = total_stake(&votes);
            let mut ballot_box = run_votes(&votes, total);
            let before = ballot_box.clone();

            let (index, stake, choice) = votes[0];
            prop_assert_eq!(
                ballot_box.cast_vote(
                    &operator(index),
                    &ballot(choice.wrapping_add(1)),
                    &weights(stake),
                    SLOT,
                    VALID_SLOTS,
                ),
                Err(TipRouterError::DuplicateVoteCast)
            );
            prop_assert_eq!(ballot_box, before);
        }

        #[test]
        fn winner_is_independent_of_vote_order(votes in arb_votes()) {
            let total = total_stake(&votes);
            let forward = run_votes(&votes, total);
            let reversed: Vec<_> = votes.iter().rev().copied().collect();
            let backward = run_votes(&reversed, total);

            prop_assert_eq!(
                forward.get_winning_ballot().ok(),
                backward.get_winning_ballot().ok()
            );
            prop_assert_eq!(forward.operators_voted(), backward.operators_voted());
            prop_assert_eq!(forward.unique_ballots(), backward.unique_ballots());
        }
    }
}
