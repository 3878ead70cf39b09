//! Fixed-layout account encoding shared by every Tip Router account.
//!
//! Layout: `[discriminator: u8][borsh body]`. Bodies contain only fixed-size
//! fields (arrays, integers, pubkeys), so an account's encoded length never
//! changes after creation.

use {
    crate::error::TipRouterError,
    borsh::{BorshDeserialize, BorshSerialize},
};

/// Account discriminators. Released values must never be reordered.
pub mod discriminators {
    pub const NCN_CONFIG: u8 = 1;
    pub const NCN_REGISTRY: u8 = 2;
    pub const WEIGHT_TABLE: u8 = 3;
    pub const EPOCH_SNAPSHOT: u8 = 4;
    pub const OPERATOR_SNAPSHOT: u8 = 5;
    pub const BALLOT_BOX: u8 = 6;
    pub const BASE_REWARD_ROUTER: u8 = 7;
    pub const NCN_REWARD_ROUTER: u8 = 8;
    pub const EPOCH_STATE: u8 = 9;
    pub const CLAIM_STATUS: u8 = 10;
    pub const EPOCH_MARKER: u8 = 11;
}

pub trait AccountState: BorshSerialize + BorshDeserialize + Sized {
    const DISCRIMINATOR: u8;

    /// Deserialize from account data, checking the discriminator byte.
    fn from_account_data(data: &[u8]) -> Result<Self, TipRouterError> {
        match data.first() {
            None | Some(0) => Err(TipRouterError::AccountNotInitialized),
            Some(d) if *d != Self::DISCRIMINATOR => {
                Err(TipRouterError::InvalidAccountDiscriminator)
            }
            Some(_) => BorshDeserialize::deserialize_reader(&mut &data[1..])
                .map_err(|_| TipRouterError::InvalidAccountData),
        }
    }

    /// Encode into a fresh buffer, discriminator first.
    fn to_account_data(&self) -> Result<Vec<u8>, TipRouterError> {
        let mut data = vec![Self::DISCRIMINATOR];
        borsh::to_writer(&mut data, self).map_err(|_| TipRouterError::InvalidAccountData)?;
        Ok(data)
    }
}

/// Reads the discriminator of raw account data, `None` when uninitialized.
pub fn discriminator_of(data: &[u8]) -> Option<u8> {
    data.first().copied().filter(|d| *d != 0)
}
