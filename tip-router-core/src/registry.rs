//! The NCN registry: collateral mints, vaults and operators participating in
//! the NCN. Weight tables and snapshots are built from it.

use {
    crate::{
        account::{discriminators, AccountState},
        constants::{MAX_FEE_BPS, MAX_MINTS, MAX_OPERATORS, MAX_VAULTS},
        error::TipRouterError,
        fee_group::NcnFeeGroup,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MintEntry {
    mint: Pubkey,
    ncn_fee_group: NcnFeeGroup,
    /// Weight used when no oracle feed is consulted; 0 means "ask the oracle".
    fixed_weight: u128,
    reserved: [u8; 32],
}

impl MintEntry {
    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn ncn_fee_group(&self) -> NcnFeeGroup {
        self.ncn_fee_group
    }

    pub fn fixed_weight(&self) -> Option<u128> {
        (self.fixed_weight != 0).then_some(self.fixed_weight)
    }

    pub fn is_empty(&self) -> bool {
        self.mint == Pubkey::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VaultEntry {
    vault: Pubkey,
    mint: Pubkey,
    vault_index: u64,
    slot_registered: u64,
}

impl VaultEntry {
    pub fn vault(&self) -> &Pubkey {
        &self.vault
    }

    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn vault_index(&self) -> u64 {
        self.vault_index
    }

    pub fn is_empty(&self) -> bool {
        self.vault == Pubkey::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OperatorEntry {
    operator: Pubkey,
    operator_index: u64,
    operator_fee_bps: u16,
    is_active: bool,
    slot_registered: u64,
}

impl OperatorEntry {
    pub fn operator(&self) -> &Pubkey {
        &self.operator
    }

    pub fn operator_index(&self) -> u64 {
        self.operator_index
    }

    pub fn operator_fee_bps(&self) -> u16 {
        self.operator_fee_bps
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_empty(&self) -> bool {
        self.operator == Pubkey::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NcnRegistry {
    ncn: Pubkey,
    bump: u8,
    mints: [MintEntry; MAX_MINTS],
    vaults: [VaultEntry; MAX_VAULTS],
    operators: [OperatorEntry; MAX_OPERATORS],
    reserved: [u8; 128],
}

impl AccountState for NcnRegistry {
    const DISCRIMINATOR: u8 = discriminators::NCN_REGISTRY;
}

impl NcnRegistry {
    pub fn new(ncn: Pubkey, bump: u8) -> Self {
        Self {
            ncn,
            bump,
            mints: [MintEntry::default(); MAX_MINTS],
            vaults: [VaultEntry::default(); MAX_VAULTS],
            operators: [OperatorEntry::default(); MAX_OPERATORS],
            reserved: [0; 128],
        }
    }

    pub fn ncn(&self) -> &Pubkey {
        &self.ncn
    }

    // ------------------------------------------------------------------
    // Mints
    // ------------------------------------------------------------------

    pub fn register_mint(
        &mut self,
        mint: Pubkey,
        ncn_fee_group: NcnFeeGroup,
        fixed_weight: Option<u128>,
    ) -> Result<(), TipRouterError> {
        if self.mint_entry(&mint).is_some() {
            return Err(TipRouterError::DuplicateMintsInTable);
        }
        let slot = self
            .mints
            .iter_mut()
            .find(|entry| entry.is_empty())
            .ok_or(TipRouterError::ConfigMintListFull)?;
        *slot = MintEntry {
            mint,
            ncn_fee_group,
            fixed_weight: fixed_weight.unwrap_or(0),
            reserved: [0; 32],
        };
        Ok(())
    }

    pub fn mint_entry(&self, mint: &Pubkey) -> Option<&MintEntry> {
        self.mints
            .iter()
            .find(|entry| !entry.is_empty() && entry.mint == *mint)
    }

    pub fn mint_entries(&self) -> impl Iterator<Item = &MintEntry> {
        self.mints.iter().filter(|entry| !entry.is_empty())
    }

    pub fn mint_count(&self) -> u64 {
        self.mint_entries().count() as u64
    }

    // ------------------------------------------------------------------
    // Vaults
    // ------------------------------------------------------------------

    pub fn register_vault(
        &mut self,
        vault: Pubkey,
        mint: Pubkey,
        current_slot: u64,
    ) -> Result<(), TipRouterError> {
        if self.mint_entry(&mint).is_none() {
            return Err(TipRouterError::MintEntryNotFound);
        }
        if self.vault_entry(&vault).is_some() {
            return Err(TipRouterError::VaultIndexAlreadyInUse);
        }
        let (index, slot) = self
            .vaults
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.is_empty())
            .ok_or(TipRouterError::VaultRegistryFull)?;
        *slot = VaultEntry {
            vault,
            mint,
            vault_index: index as u64,
            slot_registered: current_slot,
        };
        Ok(())
    }

    pub fn vault_entry(&self, vault: &Pubkey) -> Option<&VaultEntry> {
        self.vaults
            .iter()
            .find(|entry| !entry.is_empty() && entry.vault == *vault)
    }

    pub fn vault_entries(&self) -> impl Iterator<Item = &VaultEntry> {
        self.vaults.iter().filter(|entry| !entry.is_empty())
    }

    pub fn vault_count(&self) -> u64 {
        self.vault_entries().count() as u64
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    /// Registers an operator, or updates its fee and status if already known.
    pub fn register_operator(
        &mut self,
        operator: Pubkey,
        operator_fee_bps: u16,
        is_active: bool,
        current_slot: u64,
    ) -> Result<(), TipRouterError> {
        if u64::from(operator_fee_bps) > MAX_FEE_BPS {
            return Err(TipRouterError::FeeCapExceeded);
        }

        if let Some(entry) = self
            .operators
            .iter_mut()
            .find(|entry| !entry.is_empty() && entry.operator == operator)
        {
            entry.operator_fee_bps = operator_fee_bps;
            entry.is_active = is_active;
            return Ok(());
        }

        let (index, slot) = self
            .operators
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.is_empty())
            .ok_or(TipRouterError::OperatorRegistryFull)?;
        *slot = OperatorEntry {
            operator,
            operator_index: index as u64,
            operator_fee_bps,
            is_active,
            slot_registered: current_slot,
        };
        Ok(())
    }

    pub fn operator_entry(&self, operator: &Pubkey) -> Option<&OperatorEntry> {
        self.operators
            .iter()
            .find(|entry| !entry.is_empty() && entry.operator == *operator)
    }

    pub fn operator_entries(&self) -> impl Iterator<Item = &OperatorEntry> {
        self.operators.iter().filter(|entry| !entry.is_empty())
    }

    pub fn operator_count(&self) -> u64 {
        self.operator_entries().count() as u64
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::fee_group::NcnFeeGroupType, assert_matches::assert_matches};

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn test_register_mint_rejects_duplicates() {
        let mut registry = NcnRegistry::new(key(1), 0);
        registry
            .register_mint(key(10), NcnFeeGroup::default(), None)
            .unwrap();
        assert_matches!(
            registry.register_mint(key(10), NcnFeeGroup::default(), Some(5)),
            Err(TipRouterError::DuplicateMintsInTable)
        );
        assert_eq!(registry.mint_count(), 1);
        assert_eq!(registry.mint_entry(&key(10)).unwrap().fixed_weight(), None);
    }

    #[test]
    fn test_mint_list_capacity() {
        let mut registry = NcnRegistry::new(key(1), 0);
        for i in 0..MAX_MINTS {
            let mut bytes = [0u8; 32];
            bytes[0] = 1;
            bytes[1] = i as u8;
            registry
                .register_mint(Pubkey::new_from_array(bytes), NcnFeeGroup::default(), None)
                .unwrap();
        }
        assert_matches!(
            registry.register_mint(key(200), NcnFeeGroup::default(), None),
            Err(TipRouterError::ConfigMintListFull)
        );
    }

    #[test]
    fn test_register_vault_requires_mint() {
        let mut registry = NcnRegistry::new(key(1), 0);
        assert_matches!(
            registry.register_vault(key(20), key(10), 5),
            Err(TipRouterError::MintEntryNotFound)
        );
        registry
            .register_mint(key(10), NcnFeeGroup::new(NcnFeeGroupType::Jto), Some(2))
            .unwrap();
        registry.register_vault(key(20), key(10), 5).unwrap();
        registry.register_vault(key(21), key(10), 6).unwrap();
        assert_matches!(
            registry.register_vault(key(20), key(10), 7),
            Err(TipRouterError::VaultIndexAlreadyInUse)
        );
        assert_eq!(registry.vault_count(), 2);
        assert_eq!(registry.vault_entry(&key(21)).unwrap().vault_index(), 1);
    }

    #[test]
    fn test_register_operator_upserts() {
        let mut registry = NcnRegistry::new(key(1), 0);
        registry.register_operator(key(30), 500, true, 1).unwrap();
        registry.register_operator(key(31), 100, true, 1).unwrap();
        registry.register_operator(key(30), 900, false, 2).unwrap();

        let entry = registry.operator_entry(&key(30)).unwrap();
        assert_eq!(entry.operator_fee_bps(), 900);
        assert!(!entry.is_active());
        assert_eq!(entry.operator_index(), 0);
        assert_eq!(registry.operator_count(), 2);
        assert_matches!(
            registry.register_operator(key(32), 10_001, true, 3),
            Err(TipRouterError::FeeCapExceeded)
        );
    }
}
