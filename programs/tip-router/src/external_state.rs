//! Read-only view of state owned by other systems: the price oracle that
//! supplies mint weights and the restaking program that tracks delegations.

use {solana_pubkey::Pubkey, std::collections::BTreeMap};

pub trait ExternalState {
    /// Oracle weight of `mint`, `None` when no feed exists.
    fn mint_weight(&self, mint: &Pubkey) -> Option<u128>;

    /// Security `vault` currently delegates to `operator` for this NCN.
    fn delegated_security(&self, vault: &Pubkey, operator: &Pubkey) -> u64;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryExternalState {
    mint_weights: BTreeMap<Pubkey, u128>,
    delegations: BTreeMap<(Pubkey, Pubkey), u64>,
}

impl MemoryExternalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mint_weight(&mut self, mint: Pubkey, weight: u128) {
        self.mint_weights.insert(mint, weight);
    }

    pub fn set_delegated_security(&mut self, vault: Pubkey, operator: Pubkey, security: u64) {
        self.delegations.insert((vault, operator), security);
    }
}

impl ExternalState for MemoryExternalState {
    fn mint_weight(&self, mint: &Pubkey) -> Option<u128> {
        self.mint_weights.get(mint).copied()
    }

    fn delegated_security(&self, vault: &Pubkey, operator: &Pubkey) -> u64 {
        self.delegations
            .get(&(*vault, *operator))
            .copied()
            .unwrap_or(0)
    }
}
