//! Token balances the routers pay out of.
//!
//! The processor only ever reads a balance or moves an amount between two
//! accounts. A transfer either moves the whole amount or nothing.

use {
    solana_pubkey::Pubkey,
    std::collections::BTreeMap,
    tip_router_core::error::TipRouterError,
};

pub trait TokenLedger {
    fn balance(&self, account: &Pubkey) -> u64;

    /// Moves `amount` from `source` to `destination`. Fails with
    /// `InsufficientFunds` without touching either balance when `source`
    /// holds less than `amount`.
    fn transfer(
        &mut self,
        source: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<(), TipRouterError>;
}

/// In-process ledger keyed by token account address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLedger {
    balances: BTreeMap<Pubkey, u64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` from outside the system, e.g. tips landing in a
    /// router or a claim pool being funded.
    pub fn deposit(&mut self, account: &Pubkey, amount: u64) -> Result<(), TipRouterError> {
        let balance = self.balances.entry(*account).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Sum of every balance held in the ledger.
    pub fn total_supply(&self) -> Result<u64, TipRouterError> {
        self.balances.values().try_fold(0u64, |total, balance| {
            total
                .checked_add(*balance)
                .ok_or(TipRouterError::ArithmeticOverflow)
        })
    }
}

impl TokenLedger for MemoryLedger {
    fn balance(&self, account: &Pubkey) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        source: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<(), TipRouterError> {
        if amount == 0 || source == destination {
            return if self.balance(source) >= amount {
                Ok(())
            } else {
                Err(TipRouterError::InsufficientFunds)
            };
        }

        let source_balance = self
            .balance(source)
            .checked_sub(amount)
            .ok_or(TipRouterError::InsufficientFunds)?;
        let destination_balance = self
            .balance(destination)
            .checked_add(amount)
            .ok_or(TipRouterError::ArithmeticOverflow)?;

        self.balances.insert(*source, source_balance);
        self.balances.insert(*destination, destination_balance);
        Ok(())
    }
}
