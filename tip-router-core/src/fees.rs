//! Fee configuration with a two-slot activation buffer.
//!
//! A fee change never applies to the epoch in which it is made: it is written
//! into whichever slot is not currently active and stamped with the next
//! epoch as its activation epoch. Reads pick the slot that is active at the
//! epoch being asked about, so every participant computes the same split for
//! a given epoch regardless of when they compute it.

use {
    crate::{
        constants::MAX_FEE_BPS,
        error::TipRouterError,
        fee_group::{BaseFeeGroup, NcnFeeGroup, FEE_GROUP_COUNT},
    },
    borsh::{BorshDeserialize, BorshSerialize},
    serde::{Deserialize, Serialize},
    solana_pubkey::Pubkey,
};

/// Routing weights: the base fee groups followed by the NCN fee groups.
pub const ROUTING_BUCKET_COUNT: usize = FEE_GROUP_COUNT * 2;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Fees {
    activation_epoch: u64,
    base_fee_groups_bps: [u16; FEE_GROUP_COUNT],
    ncn_fee_groups_bps: [u16; FEE_GROUP_COUNT],
    reserved: [u8; 32],
}

impl Fees {
    pub fn new(
        dao_fee_bps: u16,
        default_ncn_fee_bps: u16,
        activation_epoch: u64,
    ) -> Result<Self, TipRouterError> {
        let mut fees = Self {
            activation_epoch,
            base_fee_groups_bps: [0; FEE_GROUP_COUNT],
            ncn_fee_groups_bps: [0; FEE_GROUP_COUNT],
            reserved: [0; 32],
        };
        fees.set_base_fee_bps(BaseFeeGroup::DAO, dao_fee_bps)?;
        fees.set_ncn_fee_bps(NcnFeeGroup::default(), default_ncn_fee_bps)?;
        fees.check_total()?;
        Ok(fees)
    }

    pub fn activation_epoch(&self) -> u64 {
        self.activation_epoch
    }

    pub fn base_fee_bps(&self, group: BaseFeeGroup) -> u16 {
        self.base_fee_groups_bps[group.group_index()]
    }

    pub fn ncn_fee_bps(&self, group: NcnFeeGroup) -> u16 {
        self.ncn_fee_groups_bps[group.group_index()]
    }

    pub fn total_fees_bps(&self) -> u64 {
        self.base_fee_groups_bps
            .iter()
            .chain(self.ncn_fee_groups_bps.iter())
            .map(|bps| u64::from(*bps))
            .sum()
    }

    /// Weights used to route a reward pool, base groups first.
    pub fn routing_weights(&self) -> [u128; ROUTING_BUCKET_COUNT] {
        std::array::from_fn(|index| {
            let bps = if index < FEE_GROUP_COUNT {
                self.base_fee_groups_bps[index]
            } else {
                self.ncn_fee_groups_bps[index.saturating_sub(FEE_GROUP_COUNT)]
            };
            u128::from(bps)
        })
    }

    fn set_base_fee_bps(&mut self, group: BaseFeeGroup, bps: u16) -> Result<(), TipRouterError> {
        if u64::from(bps) > MAX_FEE_BPS {
            return Err(TipRouterError::FeeCapExceeded);
        }
        self.base_fee_groups_bps[group.group_index()] = bps;
        Ok(())
    }

    fn set_ncn_fee_bps(&mut self, group: NcnFeeGroup, bps: u16) -> Result<(), TipRouterError> {
        if u64::from(bps) > MAX_FEE_BPS {
            return Err(TipRouterError::FeeCapExceeded);
        }
        self.ncn_fee_groups_bps[group.group_index()] = bps;
        Ok(())
    }

    fn check_total(&self) -> Result<(), TipRouterError> {
        if self.total_fees_bps() > MAX_FEE_BPS {
            return Err(TipRouterError::FeeCapExceeded);
        }
        Ok(())
    }
}

/// Requested change to a [`FeeConfig`]. `None` leaves a value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeUpdate {
    pub new_block_engine_fee_bps: Option<u16>,
    pub base_fee_group: Option<BaseFeeGroup>,
    pub new_base_fee_wallet: Option<Pubkey>,
    pub new_base_fee_bps: Option<u16>,
    pub ncn_fee_group: Option<NcnFeeGroup>,
    pub new_ncn_fee_bps: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FeeConfig {
    block_engine_fee_bps: u16,
    base_fee_wallets: [Pubkey; FEE_GROUP_COUNT],
    fee_1: Fees,
    fee_2: Fees,
    reserved: [u8; 64],
}

impl FeeConfig {
    pub fn new(
        dao_fee_wallet: Pubkey,
        block_engine_fee_bps: u16,
        dao_fee_bps: u16,
        default_ncn_fee_bps: u16,
        current_epoch: u64,
    ) -> Result<Self, TipRouterError> {
        if dao_fee_wallet == Pubkey::default() {
            return Err(TipRouterError::InvalidDaoWallet);
        }
        Self::check_block_engine_fee(block_engine_fee_bps)?;

        let fees = Fees::new(dao_fee_bps, default_ncn_fee_bps, current_epoch)?;
        let mut base_fee_wallets = [Pubkey::default(); FEE_GROUP_COUNT];
        base_fee_wallets[BaseFeeGroup::DAO.group_index()] = dao_fee_wallet;

        Ok(Self {
            block_engine_fee_bps,
            base_fee_wallets,
            fee_1: fees,
            fee_2: fees,
            reserved: [0; 64],
        })
    }

    /// Fees in force at `epoch`.
    pub fn current_fees(&self, epoch: u64) -> &Fees {
        if self.fee_1.activation_epoch > epoch {
            return &self.fee_2;
        }
        if self.fee_2.activation_epoch > epoch {
            return &self.fee_1;
        }
        if self.fee_1.activation_epoch >= self.fee_2.activation_epoch {
            &self.fee_1
        } else {
            &self.fee_2
        }
    }

    fn updatable_fees_mut(&mut self, current_epoch: u64) -> &mut Fees {
        if self.fee_1.activation_epoch > current_epoch {
            return &mut self.fee_1;
        }
        if self.fee_2.activation_epoch > current_epoch {
            return &mut self.fee_2;
        }
        if self.fee_1.activation_epoch <= self.fee_2.activation_epoch {
            &mut self.fee_1
        } else {
            &mut self.fee_2
        }
    }

    pub fn block_engine_fee_bps(&self) -> u16 {
        self.block_engine_fee_bps
    }

    pub fn base_fee_wallet(&self, group: BaseFeeGroup) -> &Pubkey {
        &self.base_fee_wallets[group.group_index()]
    }

    pub fn dao_fee_wallet(&self) -> &Pubkey {
        self.base_fee_wallet(BaseFeeGroup::DAO)
    }

    /// Applies `update` atomically. Wallets and the block engine fee take
    /// effect immediately; bps changes activate at `current_epoch + 1`.
    pub fn update(&mut self, update: &FeeUpdate, current_epoch: u64) -> Result<(), TipRouterError> {
        let mut next = *self;

        if let Some(block_engine_fee_bps) = update.new_block_engine_fee_bps {
            Self::check_block_engine_fee(block_engine_fee_bps)?;
            next.block_engine_fee_bps = block_engine_fee_bps;
        }

        let base_group = update.base_fee_group.unwrap_or_default();
        if let Some(wallet) = update.new_base_fee_wallet {
            if base_group == BaseFeeGroup::DAO && wallet == Pubkey::default() {
                return Err(TipRouterError::InvalidDaoWallet);
            }
            next.base_fee_wallets[base_group.group_index()] = wallet;
        }

        if update.new_base_fee_bps.is_some() || update.new_ncn_fee_bps.is_some() {
            let current = *next.current_fees(current_epoch);
            let activation_epoch = current_epoch
                .checked_add(1)
                .ok_or(TipRouterError::ArithmeticOverflow)?;

            let fees = next.updatable_fees_mut(current_epoch);
            *fees = current;
            if let Some(bps) = update.new_base_fee_bps {
                fees.set_base_fee_bps(base_group, bps)?;
            }
            if let Some(bps) = update.new_ncn_fee_bps {
                fees.set_ncn_fee_bps(update.ncn_fee_group.unwrap_or_default(), bps)?;
            }
            fees.activation_epoch = activation_epoch;
            fees.check_total()?;
        }

        *self = next;
        Ok(())
    }

    fn check_block_engine_fee(block_engine_fee_bps: u16) -> Result<(), TipRouterError> {
        if u64::from(block_engine_fee_bps) >= MAX_FEE_BPS {
            return Err(TipRouterError::FeeCapExceeded);
        }
        Ok(())
    }
}
