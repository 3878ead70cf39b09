//! Fee groups: the named buckets a reward pool is split into.
//!
//! Base fee groups pay a fixed wallet each (group 0 is the DAO). NCN fee groups
//! are paid to operators and their vaults, keyed by the fee group of the
//! collateral mint that produced their stake weight.

use {
    crate::error::TipRouterError,
    borsh::{BorshDeserialize, BorshSerialize},
    serde::{Deserialize, Serialize},
};

pub const FEE_GROUP_COUNT: usize = 8;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct BaseFeeGroup {
    group: u8,
}

impl BaseFeeGroup {
    pub const DAO: Self = Self { group: 0 };

    pub fn group(&self) -> u8 {
        self.group
    }

    pub fn group_index(&self) -> usize {
        usize::from(self.group)
    }

    pub fn all_groups() -> [Self; FEE_GROUP_COUNT] {
        std::array::from_fn(|index| Self { group: index as u8 })
    }
}

impl TryFrom<u8> for BaseFeeGroup {
    type Error = TipRouterError;

    fn try_from(group: u8) -> Result<Self, Self::Error> {
        if usize::from(group) < FEE_GROUP_COUNT {
            Ok(Self { group })
        } else {
            Err(TipRouterError::InvalidBaseFeeGroup)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NcnFeeGroupType {
    Default = 0x0,
    Jto = 0x1,
    Reserved2 = 0x2,
    Reserved3 = 0x3,
    Reserved4 = 0x4,
    Reserved5 = 0x5,
    Reserved6 = 0x6,
    Reserved7 = 0x7,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct NcnFeeGroup {
    group: u8,
}

impl NcnFeeGroup {
    pub const fn new(group: NcnFeeGroupType) -> Self {
        Self { group: group as u8 }
    }

    pub fn group(&self) -> u8 {
        self.group
    }

    pub fn group_index(&self) -> usize {
        usize::from(self.group)
    }

    pub fn all_groups() -> [Self; FEE_GROUP_COUNT] {
        std::array::from_fn(|index| Self { group: index as u8 })
    }
}

impl TryFrom<u8> for NcnFeeGroup {
    type Error = TipRouterError;

    fn try_from(group: u8) -> Result<Self, Self::Error> {
        if usize::from(group) < FEE_GROUP_COUNT {
            Ok(Self { group })
        } else {
            Err(TipRouterError::InvalidNcnFeeGroup)
        }
    }
}
