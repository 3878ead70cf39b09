//! Property-based tests for reward routing invariants.
//!
//! Properties tested:
//! 1. Splits hand out exactly the input amount, nothing to zero weights.
//! 2. Every split share but the last is the floor of its proportion.
//! 3. Base router conservation: total == processed + in transit, always.
//! 4. Routing then distributing every bucket drains the router exactly.
//! 5. NCN router conservation across operator fee and vault routes.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        solana_pubkey::Pubkey,
        tip_router_core::{
            ballot_box::{Ballot, BallotBox},
            base_reward_router::BaseRewardRouter,
            epoch_snapshot::{DelegationRecord, OperatorSnapshot},
            fee_group::{BaseFeeGroup, NcnFeeGroup, FEE_GROUP_COUNT},
            fees::Fees,
            math::split_with_remainder_to_last,
            ncn_config::ConsensusThreshold,
            ncn_reward_router::NcnRewardRouter,
            stake_weight::StakeWeights,
        },
    };

    // ── Helpers ──

    const EPOCH: u64 = 7;
    const SLOT: u64 = 1_000;

    fn key(prefix: u8, index: usize) -> Pubkey {
        let mut bytes = [prefix; 32];
        bytes[..8].copy_from_slice(&(index as u64).to_le_bytes());
        Pubkey::new_from_array(bytes)
    }

    fn ncn() -> Pubkey {
        key(1, 0)
    }

    fn arb_weights() -> impl Strategy<Value = [u128; FEE_GROUP_COUNT]> {
        prop::array::uniform8(prop_oneof![Just(0u128), 1..=1_000_000u128])
            .prop_filter("at least one weight", |weights| {
                weights.iter().any(|weight| *weight > 0)
            })
    }

    /// DAO and default NCN group bps, not both zero.
    fn arb_fees() -> impl Strategy<Value = Fees> {
        (0..=5_000u16, 0..=5_000u16)
            .prop_filter("some fee", |(dao, ncn)| dao + ncn > 0)
            .prop_map(|(dao, ncn)| Fees::new(dao, ncn, EPOCH).unwrap())
    }

    /// Ballot box where every operator in `stakes` voted for the winner.
    fn unanimous_ballot_box(stakes: &[u64]) -> BallotBox {
        let mut ballot_box = BallotBox::new(ncn(), EPOCH, 0, 0);
        let ballot = Ballot::new([9; 32]);
        for (index, stake) in stakes.iter().enumerate() {
            let weights = StakeWeights::snapshot(NcnFeeGroup::default(), *stake, 1).unwrap();
            ballot_box
                .cast_vote(&key(2, index), &ballot, &weights, SLOT, 100)
                .unwrap();
        }
        let total = stakes.iter().map(|stake| u128::from(*stake)).sum();
        assert!(ballot_box.tally_votes(total, &ConsensusThreshold::default(), SLOT));
        ballot_box
    }

    // ── Splits ──

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn split_hands_out_exact_amount(amount in any::<u64>(), weights in arb_weights()) {
            let shares = split_with_remainder_to_last(amount, &weights).unwrap();

            let distributed: u128 = shares.iter().map(|share| u128::from(*share)).sum();
            prop_assert_eq!(distributed, u128::from(amount));
            for (share, weight) in shares.iter().zip(weights) {
                if weight == 0 {
                    prop_assert_eq!(*share, 0);
                }
            }
        }

        #[test]
        fn split_floors_all_but_last(amount in any::<u64>(), weights in arb_weights()) {
            let shares = split_with_remainder_to_last(amount, &weights).unwrap();
            let total: u128 = weights.iter().sum();
            let last = weights.iter().rposition(|weight| *weight > 0).unwrap();

            for (index, (share, weight)) in shares.iter().zip(weights).enumerate() {
                let floor = u128::from(amount) * weight / total;
                if index == last {
                    prop_assert!(u128::from(*share) >= floor);
                } else {
                    prop_assert_eq!(u128::from(*share), floor);
                }
            }

            // Same input, same output.
            prop_assert_eq!(split_with_remainder_to_last(amount, &weights).unwrap(), shares);
        }
    }

    // ── Base router ──

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn base_router_conserves_rewards(
            fees in arb_fees(),
            deposits in prop::collection::vec(0..=1_000_000_000_000u64, 1..=5),
            stakes in prop::collection::vec(1..=1_000_000u64, 1..=8),
        ) {
            let ballot_box = unanimous_ballot_box(&stakes);
            let mut router = BaseRewardRouter::new(ncn(), EPOCH, 0, SLOT);
            let mut balance = 0u64;
            let mut paid_out = 0u64;

            for deposit in &deposits {
                balance += deposit;
                router.route_incoming_rewards(balance).unwrap();
                prop_assert!(router.is_conserved().unwrap());
                router.route_reward_pool(&fees).unwrap();
                prop_assert!(router.is_conserved().unwrap());
                router.route_ncn_fee_group_rewards(&ballot_box).unwrap();
                prop_assert!(router.is_conserved().unwrap());

                for group in BaseFeeGroup::all_groups() {
                    let amount = router.distribute_base_fee_group_rewards(group).unwrap();
                    balance -= amount;
                    paid_out += amount;
                }
                let operators: Vec<Pubkey> =
                    router.ncn_reward_routes().map(|route| *route.operator()).collect();
                for operator in &operators {
                    for group in NcnFeeGroup::all_groups() {
                        let amount = router
                            .distribute_ncn_fee_group_reward_route(group, operator)
                            .unwrap();
                        balance -= amount;
                        paid_out += amount;
                    }
                }
                prop_assert!(router.is_conserved().unwrap());
                prop_assert_eq!(router.rewards_in_transit().unwrap(), balance);
            }

            let deposited: u64 = deposits.iter().sum();
            prop_assert_eq!(router.total_rewards(), deposited);
            prop_assert_eq!(paid_out, deposited);
            prop_assert_eq!(balance, 0);
        }
    }

    // ── NCN router ──

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn ncn_router_conserves_rewards(
            operator_fee_bps in 0..=10_000u16,
            securities in prop::collection::vec(0..=1_000_000u64, 1..=8),
            pool in 0..=1_000_000_000_000u64,
        ) {
            let operator = key(3, 0);
            let mut snapshot = OperatorSnapshot::new(
                operator,
                ncn(),
                EPOCH,
                0,
                SLOT,
                true,
                0,
                operator_fee_bps,
                securities.len() as u64,
            )
            .unwrap();
            for (index, security) in securities.iter().enumerate() {
                snapshot
                    .register_delegation(
                        &DelegationRecord {
                            vault: key(4, index),
                            vault_index: index as u64,
                            mint: key(5, 0),
                            ncn_fee_group: NcnFeeGroup::default(),
                            security: *security,
                            weight: 1,
                        },
                        SLOT,
                    )
                    .unwrap();
            }
            prop_assert!(snapshot.finalized());

            let mut router =
                NcnRewardRouter::new(ncn(), operator, NcnFeeGroup::default(), EPOCH, 0, SLOT);
            router.route_incoming_rewards(pool).unwrap();
            router.route_reward_pool(&snapshot).unwrap();
            prop_assert!(router.is_conserved().unwrap());

            let mut paid_out = router.distribute_operator_rewards().unwrap();
            for index in 0..securities.len() {
                if let Ok(amount) = router.distribute_vault_rewards(&key(4, index)) {
                    paid_out += amount;
                }
            }
            prop_assert_eq!(paid_out, pool);
            prop_assert_eq!(router.rewards_in_transit().unwrap(), 0);
            prop_assert!(router.is_conserved().unwrap());
        }
    }
}
