//! Error types for the Tip Router.
//!
//! Codes are grouped in blocks: `0x2100` arithmetic, `0x2200` protocol and
//! `0x2300` account handling. Codes are part of the client contract and must
//! not be reordered.

use {
    num_derive::{FromPrimitive, ToPrimitive},
    thiserror::Error,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum TipRouterError {
    // ── Arithmetic ───────────────────────────────────────────────────────
    #[error("Zero in the denominator")]
    DenominatorIsZero = 0x2100,
    #[error("Overflow")]
    ArithmeticOverflow,
    #[error("Underflow")]
    ArithmeticUnderflowError,
    #[error("Cast to u64 error")]
    CastToU64Error,

    // ── Authorization ────────────────────────────────────────────────────
    #[error("Incorrect NCN admin")]
    IncorrectNcnAdmin = 0x2200,
    #[error("Incorrect NCN")]
    IncorrectNcn,
    #[error("Incorrect fee admin")]
    IncorrectFeeAdmin,
    #[error("Tie breaker admin invalid")]
    TieBreakerAdminInvalid,

    // ── Registry & weight table ──────────────────────────────────────────
    #[error("Duplicate mints in table")]
    DuplicateMintsInTable,
    #[error("There are no mints in the table")]
    NoMintsInTable,
    #[error("Too many mints for table")]
    TooManyMintsForTable,
    #[error("Cannot create future weight tables")]
    CannotCreateFutureWeightTables,
    #[error("Invalid mint for weight table")]
    InvalidMintForWeightTable,
    #[error("Weight table already finalized")]
    WeightTableAlreadyFinalized,
    #[error("Weight table not finalized")]
    WeightTableNotFinalized,
    #[error("Weight not found")]
    WeightNotFound,
    #[error("Registry mint list is full")]
    ConfigMintListFull,
    #[error("Mint entry not found")]
    MintEntryNotFound,
    #[error("Vault already registered")]
    VaultIndexAlreadyInUse,
    #[error("Vault registry is full")]
    VaultRegistryFull,
    #[error("Vault not found in registry")]
    VaultNotFound,
    #[error("Operator registry is full")]
    OperatorRegistryFull,
    #[error("Operator not found in registry")]
    OperatorNotFound,

    // ── Fees & parameters ────────────────────────────────────────────────
    #[error("Fee cap exceeded")]
    FeeCapExceeded,
    #[error("Invalid base fee group")]
    InvalidBaseFeeGroup,
    #[error("Invalid NCN fee group")]
    InvalidNcnFeeGroup,
    #[error("Invalid DAO wallet")]
    InvalidDaoWallet,
    #[error("Invalid valid slots after consensus")]
    InvalidSlotsAfterConsensus,
    #[error("Invalid epochs before stall")]
    InvalidEpochsBeforeStall,
    #[error("Invalid epochs after consensus before close")]
    InvalidEpochsBeforeClose,
    #[error("Consensus threshold must be at least one half and below one")]
    InvalidConsensusThreshold,

    // ── Snapshots ────────────────────────────────────────────────────────
    #[error("No operators in NCN")]
    NoOperators,
    #[error("Vault operator delegation is already finalized")]
    VaultOperatorDelegationFinalized,
    #[error("Duplicate vault operator delegation")]
    DuplicateVaultOperatorDelegation,
    #[error("Too many vault operator delegations")]
    TooManyVaultOperatorDelegations,
    #[error("Operator is already finalized")]
    OperatorFinalized,
    #[error("Operator snapshot is not finalized")]
    OperatorSnapshotNotFinalized,
    #[error("Epoch snapshot is already finalized")]
    EpochSnapshotAlreadyFinalized,
    #[error("Epoch snapshot not finalized")]
    EpochSnapshotNotFinalized,
    #[error("Operator was registered after the epoch snapshot was taken")]
    OperatorIsNotInSnapshot,

    // ── Consensus ────────────────────────────────────────────────────────
    #[error("Operator has no stake weight to vote with")]
    CannotVoteWithZeroStake,
    #[error("Duplicate vote cast")]
    DuplicateVoteCast,
    #[error("Operator votes full")]
    OperatorVotesFull,
    #[error("Ballot tally full")]
    BallotTallyFull,
    #[error("Ballot tally not found")]
    BallotTallyNotFound,
    #[error("Consensus already reached")]
    ConsensusAlreadyReached,
    #[error("Consensus not reached")]
    ConsensusNotReached,
    #[error("Voting not valid, too many slots after consensus reached")]
    VotingNotValid,
    #[error("Voting not finalized")]
    VotingNotFinalized,
    #[error("Tie breaker not in prior votes")]
    TieBreakerNotInPriorVotes,
    #[error("Voting is not over, the valid slots after consensus have not passed")]
    VotingIsNotOver,

    // ── Rewards ──────────────────────────────────────────────────────────
    #[error("NCN reward route list is full")]
    OperatorRewardListFull,
    #[error("NCN reward route not found")]
    NcnRewardRouteNotFound,
    #[error("Vault reward list is full")]
    VaultRewardListFull,
    #[error("Vault reward not found")]
    VaultRewardNotFound,
    #[error("Insufficient funds for transfer")]
    InsufficientFunds,
    #[error("Invalid merkle proof")]
    InvalidMerkleProof,
    #[error("Claim already processed")]
    ClaimAlreadyProcessed,

    // ── Closing ──────────────────────────────────────────────────────────
    #[error("Cannot close account")]
    CannotCloseAccount,
    #[error("Cannot close epoch state account while other epoch accounts are open")]
    CannotCloseEpochStateAccount,
    #[error("Invalid account status")]
    InvalidAccountStatus,
    #[error("Invalid account to close discriminator")]
    InvalidAccountToCloseDiscriminator,
    #[error("Epoch is closing down")]
    EpochIsClosingDown,

    // ── Accounts ─────────────────────────────────────────────────────────
    #[error("Account data is invalid or corrupted")]
    InvalidAccountData = 0x2300,
    #[error("Account discriminator does not match the expected account type")]
    InvalidAccountDiscriminator,
    #[error("Account is already initialized")]
    AccountAlreadyInitialized,
    #[error("Account is not initialized")]
    AccountNotInitialized,
    #[error("Account is not at the expected address")]
    InvalidAccountAddress,
    #[error("Required signature is missing")]
    MissingRequiredSignature,
    #[error("Not enough account keys for instruction")]
    NotEnoughAccountKeys,
    #[error("Instruction data is invalid")]
    InvalidInstructionData,
}

impl From<TipRouterError> for solana_program_error::ProgramError {
    fn from(e: TipRouterError) -> Self {
        solana_program_error::ProgramError::Custom(e as u32)
    }
}
