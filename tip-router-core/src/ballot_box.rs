//! The ballot box: stake-weighted consensus on a single Merkle root per epoch.
//!
//! Each operator casts at most one vote. Votes for byte-identical ballots are
//! tallied together, and the first tally whose stake weight strictly exceeds
//! the consensus threshold becomes the winning ballot. The winner is latched:
//! later votes are still tallied until the post-consensus window closes, but
//! nothing can replace it.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::{MAX_BALLOT_TALLIES, MAX_OPERATOR_VOTES},
        error::TipRouterError,
        ncn_config::ConsensusThreshold,
        stake_weight::StakeWeights,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    log::*,
    serde::{Deserialize, Serialize},
    solana_pubkey::Pubkey,
};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Ballot {
    meta_merkle_root: [u8; 32],
    is_initialized: bool,
}

impl Ballot {
    pub fn new(meta_merkle_root: [u8; 32]) -> Self {
        Self {
            meta_merkle_root,
            is_initialized: true,
        }
    }

    pub fn root(&self) -> &[u8; 32] {
        &self.meta_merkle_root
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BallotTally {
    index: u16,
    ballot: Ballot,
    stake_weights: StakeWeights,
    tally: u64,
}

impl BallotTally {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    pub fn stake_weights(&self) -> &StakeWeights {
        &self.stake_weights
    }

    pub fn tally(&self) -> u64 {
        self.tally
    }

    pub fn is_empty(&self) -> bool {
        !self.ballot.is_initialized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OperatorVote {
    operator: Pubkey,
    slot_voted: u64,
    stake_weights: StakeWeights,
    ballot_index: u16,
    reserved: [u8; 64],
}

impl Default for OperatorVote {
    fn default() -> Self {
        Self {
            operator: Pubkey::default(),
            slot_voted: 0,
            stake_weights: StakeWeights::default(),
            ballot_index: 0,
            reserved: [0; 64],
        }
    }
}

impl OperatorVote {
    pub fn operator(&self) -> &Pubkey {
        &self.operator
    }

    pub fn slot_voted(&self) -> u64 {
        self.slot_voted
    }

    pub fn stake_weights(&self) -> &StakeWeights {
        &self.stake_weights
    }

    pub fn ballot_index(&self) -> u16 {
        self.ballot_index
    }

    pub fn is_empty(&self) -> bool {
        self.operator == Pubkey::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotBoxState {
    Empty,
    Voting,
    ConsensusReached,
    /// Consensus reached and the straggler window has closed.
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BallotBox {
    ncn: Pubkey,
    epoch: u64,
    bump: u8,
    slot_created: u64,
    slot_consensus_reached: u64,
    reserved: [u8; 128],
    operators_voted: u64,
    unique_ballots: u64,
    winning_ballot: Ballot,
    operator_votes: [OperatorVote; MAX_OPERATOR_VOTES],
    ballot_tallies: [BallotTally; MAX_BALLOT_TALLIES],
}

impl AccountState for BallotBox {
    const DISCRIMINATOR: u8 = discriminators::BALLOT_BOX;
}

impl BallotBox {
    pub fn new(ncn: Pubkey, epoch: u64, bump: u8, current_slot: u64) -> Self {
        Self {
            ncn,
            epoch,
            bump,
            slot_created: current_slot,
            slot_consensus_reached: 0,
            reserved: [0; 128],
            operators_voted: 0,
            unique_ballots: 0,
            winning_ballot: Ballot::default(),
            operator_votes: [OperatorVote::default(); MAX_OPERATOR_VOTES],
            ballot_tallies: [BallotTally::default(); MAX_BALLOT_TALLIES],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn slot_created(&self) -> u64 {
        self.slot_created
    }

    pub fn slot_consensus_reached(&self) -> u64 {
        self.slot_consensus_reached
    }

    pub fn operators_voted(&self) -> u64 {
        self.operators_voted
    }

    pub fn unique_ballots(&self) -> u64 {
        self.unique_ballots
    }

    pub fn operator_votes(&self) -> impl Iterator<Item = &OperatorVote> {
        self.operator_votes.iter().filter(|vote| !vote.is_empty())
    }

    pub fn ballot_tallies(&self) -> impl Iterator<Item = &BallotTally> {
        self.ballot_tallies.iter().filter(|tally| !tally.is_empty())
    }

    pub fn operator_vote(&self, operator: &Pubkey) -> Option<&OperatorVote> {
        self.operator_votes().find(|vote| vote.operator == *operator)
    }

    pub fn tally_of(&self, ballot: &Ballot) -> Option<&BallotTally> {
        self.ballot_tallies().find(|tally| tally.ballot == *ballot)
    }

    pub fn is_consensus_reached(&self) -> bool {
        self.winning_ballot.is_initialized()
    }

    pub fn get_winning_ballot(&self) -> Result<&Ballot, TipRouterError> {
        if !self.is_consensus_reached() {
            return Err(TipRouterError::ConsensusNotReached);
        }
        Ok(&self.winning_ballot)
    }

    pub fn get_winning_ballot_tally(&self) -> Result<&BallotTally, TipRouterError> {
        let winning_ballot = self.get_winning_ballot()?;
        self.tally_of(winning_ballot)
            .ok_or(TipRouterError::BallotTallyNotFound)
    }

    /// Votes cast for the winning ballot, in vote order.
    pub fn winning_votes(&self) -> Result<impl Iterator<Item = &OperatorVote>, TipRouterError> {
        let winning_index = self.get_winning_ballot_tally()?.index;
        Ok(self
            .operator_votes()
            .filter(move |vote| vote.ballot_index == winning_index))
    }

    /// Votes are accepted until `valid_slots_after_consensus` slots after
    /// consensus, inclusive.
    pub fn is_voting_valid(
        &self,
        current_slot: u64,
        valid_slots_after_consensus: u64,
    ) -> Result<bool, TipRouterError> {
        if !self.is_consensus_reached() {
            return Ok(true);
        }
        let last_valid_slot = self
            .slot_consensus_reached
            .checked_add(valid_slots_after_consensus)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        Ok(current_slot <= last_valid_slot)
    }

    pub fn state(
        &self,
        current_slot: u64,
        valid_slots_after_consensus: u64,
    ) -> Result<BallotBoxState, TipRouterError> {
        if self.is_consensus_reached() {
            if self.is_voting_valid(current_slot, valid_slots_after_consensus)? {
                Ok(BallotBoxState::ConsensusReached)
            } else {
                Ok(BallotBoxState::Finalized)
            }
        } else if self.operators_voted == 0 {
            Ok(BallotBoxState::Empty)
        } else {
            Ok(BallotBoxState::Voting)
        }
    }

    /// Records `operator`'s vote. Returns `false` when the identical vote was
    /// already recorded, in which case nothing changes, even once voting is
    /// over.
    pub fn cast_vote(
        &mut self,
        operator: &Pubkey,
        ballot: &Ballot,
        stake_weights: &StakeWeights,
        current_slot: u64,
        valid_slots_after_consensus: u64,
    ) -> Result<bool, TipRouterError> {
        if !ballot.is_initialized() {
            return Err(TipRouterError::InvalidInstructionData);
        }

        let existing_ballot = self.operator_vote(operator).map(|existing| {
            self.ballot_tallies
                .get(usize::from(existing.ballot_index))
                .map(|tally| tally.ballot)
        });
        if existing_ballot == Some(Some(*ballot)) {
            return Ok(false);
        }

        if self.state(current_slot, valid_slots_after_consensus)? == BallotBoxState::Finalized {
            return Err(TipRouterError::VotingNotValid);
        }

        if existing_ballot.is_some() {
            warn!(
                "operator {operator} already voted in epoch {}, rejecting different ballot",
                self.epoch
            );
            return Err(TipRouterError::DuplicateVoteCast);
        }

        if stake_weights.stake_weight() == 0 {
            return Err(TipRouterError::CannotVoteWithZeroStake);
        }

        let vote_index = self
            .operator_votes
            .iter()
            .position(|vote| vote.is_empty())
            .ok_or(TipRouterError::OperatorVotesFull)?;
        let (tally_index, is_new_ballot) = match self
            .ballot_tallies
            .iter()
            .position(|tally| !tally.is_empty() && tally.ballot == *ballot)
        {
            Some(index) => (index, false),
            None => (
                self.ballot_tallies
                    .iter()
                    .position(|tally| tally.is_empty())
                    .ok_or(TipRouterError::BallotTallyFull)?,
                true,
            ),
        };

        let mut tally = self.ballot_tallies[tally_index];
        if is_new_ballot {
            tally = BallotTally {
                index: u16::try_from(tally_index).map_err(|_| TipRouterError::BallotTallyFull)?,
                ballot: *ballot,
                stake_weights: StakeWeights::default(),
                tally: 0,
            };
        }
        tally.stake_weights.increment(stake_weights)?;
        tally.tally = tally
            .tally
            .checked_add(1)
            .ok_or(TipRouterError::ArithmeticOverflow)?;

        let operators_voted = self
            .operators_voted
            .checked_add(1)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        let unique_ballots = if is_new_ballot {
            self.unique_ballots
                .checked_add(1)
                .ok_or(TipRouterError::ArithmeticOverflow)?
        } else {
            self.unique_ballots
        };

        self.ballot_tallies[tally_index] = tally;
        self.operator_votes[vote_index] = OperatorVote {
            operator: *operator,
            slot_voted: current_slot,
            stake_weights: *stake_weights,
            ballot_index: tally.index,
            reserved: [0; 64],
        };
        self.operators_voted = operators_voted;
        self.unique_ballots = unique_ballots;
        Ok(true)
    }

    /// Latches the leading ballot as the winner if it strictly exceeds the
    /// threshold. Returns whether consensus has been reached.
    pub fn tally_votes(
        &mut self,
        total_stake_weight: u128,
        threshold: &ConsensusThreshold,
        current_slot: u64,
    ) -> bool {
        if self.is_consensus_reached() {
            return true;
        }

        let leader = self
            .ballot_tallies()
            .fold(None::<&BallotTally>, |best, tally| match best {
                Some(best) if best.stake_weights.stake_weight() >= tally.stake_weights.stake_weight() => {
                    Some(best)
                }
                _ => Some(tally),
            })
            .copied();

        if let Some(leader) = leader {
            if threshold.is_reached(leader.stake_weights.stake_weight(), total_stake_weight) {
                self.winning_ballot = leader.ballot;
                self.slot_consensus_reached = current_slot;
                info!(
                    "consensus reached for epoch {} at slot {current_slot} with {} of {total_stake_weight} stake weight",
                    self.epoch,
                    leader.stake_weights.stake_weight()
                );
            }
        }
        self.is_consensus_reached()
    }

    /// Forces the winner after a stall. Only a ballot that already received a
    /// vote can be chosen.
    pub fn set_tie_breaker_ballot(
        &mut self,
        ballot: &Ballot,
        current_epoch: u64,
        epochs_before_stall: u64,
        current_slot: u64,
    ) -> Result<(), TipRouterError> {
        if self.is_consensus_reached() {
            return Err(TipRouterError::ConsensusAlreadyReached);
        }

        let stall_epoch = self
            .epoch
            .checked_add(epochs_before_stall)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        if current_epoch < stall_epoch {
            return Err(TipRouterError::VotingNotFinalized);
        }

        let tally = self
            .tally_of(ballot)
            .ok_or(TipRouterError::TieBreakerNotInPriorVotes)?;
        self.winning_ballot = tally.ballot;
        self.slot_consensus_reached = current_slot;
        info!(
            "tie breaker set for epoch {} at slot {current_slot}",
            self.epoch
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::fee_group::NcnFeeGroup,
        assert_matches::assert_matches,
    };

    const VALID_SLOTS: u64 = 10;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    fn weight(amount: u128) -> StakeWeights {
        StakeWeights::snapshot(NcnFeeGroup::default(), 1, amount).unwrap()
    }

    fn ballot(byte: u8) -> Ballot {
        Ballot::new([byte; 32])
    }

    fn ballot_box() -> BallotBox {
        BallotBox::new(key(1), 5, 0, 100)
    }

    fn assert_tally_invariants(ballot_box: &BallotBox) {
        let tally_sum: u64 = ballot_box.ballot_tallies().map(|t| t.tally()).sum();
        assert_eq!(tally_sum, ballot_box.operators_voted());
        assert_eq!(
            ballot_box.ballot_tallies().count() as u64,
            ballot_box.unique_ballots()
        );
    }

    #[test]
    fn test_identical_vote_is_idempotent() {
        let mut ballot_box = ballot_box();
        assert!(ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(10), 101, VALID_SLOTS)
            .unwrap());
        let snapshot = ballot_box.clone();
        assert!(!ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(10), 102, VALID_SLOTS)
            .unwrap());
        assert_eq!(ballot_box, snapshot);
    }

    #[test]
    fn test_conflicting_vote_is_rejected_without_mutation() {
        let mut ballot_box = ballot_box();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(10), 101, VALID_SLOTS)
            .unwrap();
        let snapshot = ballot_box.clone();
        assert_matches!(
            ballot_box.cast_vote(&key(2), &ballot(8), &weight(10), 102, VALID_SLOTS),
            Err(TipRouterError::DuplicateVoteCast)
        );
        assert_eq!(ballot_box, snapshot);
    }

    #[test]
    fn test_consensus_boundary() {
        let threshold = ConsensusThreshold::default();

        // exactly two thirds
        let mut ballot_box = ballot_box();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(200), 101, VALID_SLOTS)
            .unwrap();
        assert!(!ballot_box.tally_votes(300, &threshold, 101));
        assert_matches!(
            ballot_box.get_winning_ballot(),
            Err(TipRouterError::ConsensusNotReached)
        );

        // one unit above two thirds
        let mut ballot_box = self::ballot_box();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(201), 101, VALID_SLOTS)
            .unwrap();
        assert!(ballot_box.tally_votes(300, &threshold, 101));
        assert_eq!(ballot_box.get_winning_ballot().unwrap(), &ballot(9));
        assert_eq!(ballot_box.slot_consensus_reached(), 101);
    }

    #[test]
    fn test_consensus_is_latched_and_window_enforced() {
        let threshold = ConsensusThreshold::default();
        let mut ballot_box = ballot_box();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(80), 101, VALID_SLOTS)
            .unwrap();
        assert!(ballot_box.tally_votes(100, &threshold, 101));

        // a late vote inside the window is tallied but cannot change the winner
        ballot_box
            .cast_vote(&key(3), &ballot(7), &weight(20), 111, VALID_SLOTS)
            .unwrap();
        assert!(ballot_box.tally_votes(100, &threshold, 111));
        assert_eq!(ballot_box.get_winning_ballot().unwrap(), &ballot(9));
        assert_eq!(ballot_box.slot_consensus_reached(), 101);
        assert_eq!(ballot_box.unique_ballots(), 2);

        assert_matches!(
            ballot_box.cast_vote(&key(4), &ballot(9), &weight(5), 112, VALID_SLOTS),
            Err(TipRouterError::VotingNotValid)
        );
        assert_eq!(
            ballot_box.state(112, VALID_SLOTS).unwrap(),
            BallotBoxState::Finalized
        );
        assert_tally_invariants(&ballot_box);
    }

    #[test]
    fn test_repeated_vote_after_window_is_a_no_op() {
        let threshold = ConsensusThreshold::default();
        let mut ballot_box = ballot_box();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(80), 101, VALID_SLOTS)
            .unwrap();
        assert!(ballot_box.tally_votes(100, &threshold, 101));
        let finalized = ballot_box.clone();

        assert!(!ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(80), 200, VALID_SLOTS)
            .unwrap());
        assert_eq!(ballot_box, finalized);
        assert_matches!(
            ballot_box.cast_vote(&key(2), &ballot(8), &weight(80), 200, VALID_SLOTS),
            Err(TipRouterError::VotingNotValid)
        );
    }

    #[test]
    fn test_zero_stake_cannot_vote() {
        let mut ballot_box = ballot_box();
        assert_matches!(
            ballot_box.cast_vote(
                &key(2),
                &ballot(9),
                &StakeWeights::default(),
                101,
                VALID_SLOTS
            ),
            Err(TipRouterError::CannotVoteWithZeroStake)
        );
        assert_eq!(ballot_box.state(101, VALID_SLOTS).unwrap(), BallotBoxState::Empty);
    }

    #[test]
    fn test_ballot_tally_capacity() {
        let mut ballot_box = ballot_box();
        for i in 0..MAX_BALLOT_TALLIES {
            ballot_box
                .cast_vote(&key(i as u8 + 2), &ballot(i as u8 + 1), &weight(1), 101, VALID_SLOTS)
                .unwrap();
        }
        assert_eq!(ballot_box.unique_ballots(), MAX_BALLOT_TALLIES as u64);
        assert_matches!(
            ballot_box.cast_vote(&key(200), &ballot(200), &weight(1), 101, VALID_SLOTS),
            Err(TipRouterError::OperatorVotesFull)
        );
        assert_tally_invariants(&ballot_box);
    }

    #[test]
    fn test_tie_breaker_rules() {
        let mut ballot_box = ballot_box();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(50), 101, VALID_SLOTS)
            .unwrap();
        ballot_box
            .cast_vote(&key(3), &ballot(8), &weight(50), 101, VALID_SLOTS)
            .unwrap();

        // epoch 5, stall after 3 epochs
        assert_matches!(
            ballot_box.set_tie_breaker_ballot(&ballot(9), 7, 3, 500),
            Err(TipRouterError::VotingNotFinalized)
        );
        assert_matches!(
            ballot_box.set_tie_breaker_ballot(&ballot(1), 8, 3, 500),
            Err(TipRouterError::TieBreakerNotInPriorVotes)
        );
        ballot_box
            .set_tie_breaker_ballot(&ballot(8), 8, 3, 500)
            .unwrap();
        assert_eq!(ballot_box.get_winning_ballot().unwrap(), &ballot(8));
        assert_matches!(
            ballot_box.set_tie_breaker_ballot(&ballot(9), 8, 3, 501),
            Err(TipRouterError::ConsensusAlreadyReached)
        );
        let winners: Vec<_> = ballot_box.winning_votes().unwrap().map(|v| *v.operator()).collect();
        assert_eq!(winners, vec![key(3)]);
    }

    #[test]
    fn test_account_round_trip_preserves_layout() {
        let mut ballot_box = ballot_box();
        let empty_len = ballot_box.to_account_data().unwrap().len();
        ballot_box
            .cast_vote(&key(2), &ballot(9), &weight(50), 101, VALID_SLOTS)
            .unwrap();
        let data = ballot_box.to_account_data().unwrap();
        assert_eq!(data.len(), empty_len);
        assert_eq!(BallotBox::from_account_data(&data).unwrap(), ballot_box);
    }
}
