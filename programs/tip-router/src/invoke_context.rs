//! Execution environment for a single Tip Router instruction.
//!
//! Handlers never write to the [`AccountStore`] directly. Every write and
//! close goes into the context's overlay, and [`invoke`] commits the overlay
//! only when the handler returns `Ok`. Token transfers are not overlaid: a
//! handler issues at most one transfer, as its final step.

use {
    crate::{external_state::ExternalState, ledger::TokenLedger},
    log::*,
    solana_clock::Clock,
    solana_epoch_schedule::EpochSchedule,
    solana_instruction::{error::InstructionError, AccountMeta, Instruction},
    solana_pubkey::Pubkey,
    std::collections::BTreeMap,
    tip_router_core::{account::AccountState, error::TipRouterError},
};

// ---------------------------------------------------------------------------
// Account store
// ---------------------------------------------------------------------------

/// Committed account data, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStore {
    accounts: BTreeMap<Pubkey, Vec<u8>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &Pubkey) -> Option<&[u8]> {
        self.accounts.get(address).map(Vec::as_slice)
    }

    pub fn contains(&self, address: &Pubkey) -> bool {
        self.accounts.contains_key(address)
    }

    /// Decodes the account at `address`.
    pub fn load<T: AccountState>(&self, address: &Pubkey) -> Result<T, TipRouterError> {
        let data = self
            .get(address)
            .ok_or(TipRouterError::AccountNotInitialized)?;
        T::from_account_data(data)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn commit(&mut self, writes: BTreeMap<Pubkey, Option<Vec<u8>>>) {
        for (address, data) in writes {
            match data {
                Some(data) => {
                    self.accounts.insert(address, data);
                }
                None => {
                    self.accounts.remove(&address);
                }
            }
        }
    }
}

/// Clock and epoch schedule the handlers read.
#[derive(Debug, Clone)]
pub struct Sysvars {
    pub clock: Clock,
    pub epoch_schedule: EpochSchedule,
}

// ---------------------------------------------------------------------------
// Invoke context
// ---------------------------------------------------------------------------

pub struct InvokeContext<'a> {
    program_id: Pubkey,
    accounts: &'a AccountStore,
    writes: BTreeMap<Pubkey, Option<Vec<u8>>>,
    instruction_accounts: &'a [AccountMeta],
    sysvars: &'a Sysvars,
    ledger: &'a mut dyn TokenLedger,
    external_state: &'a dyn ExternalState,
}

impl<'a> InvokeContext<'a> {
    pub fn new(
        program_id: Pubkey,
        accounts: &'a AccountStore,
        instruction_accounts: &'a [AccountMeta],
        sysvars: &'a Sysvars,
        ledger: &'a mut dyn TokenLedger,
        external_state: &'a dyn ExternalState,
    ) -> Self {
        Self {
            program_id,
            accounts,
            writes: BTreeMap::new(),
            instruction_accounts,
            sysvars,
            ledger,
            external_state,
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn clock(&self) -> &Clock {
        &self.sysvars.clock
    }

    pub fn epoch_schedule(&self) -> &EpochSchedule {
        &self.sysvars.epoch_schedule
    }

    pub fn external_state(&self) -> &dyn ExternalState {
        self.external_state
    }

    // ── Instruction accounts ──────────────────────────────────────────────

    pub fn check_number_of_instruction_accounts(
        &self,
        expected: usize,
    ) -> Result<(), InstructionError> {
        if self.instruction_accounts.len() < expected {
            return Err(InstructionError::NotEnoughAccountKeys);
        }
        Ok(())
    }

    fn instruction_account(&self, index: usize) -> Result<&AccountMeta, InstructionError> {
        self.instruction_accounts
            .get(index)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    pub fn get_key_of_instruction_account(&self, index: usize) -> Result<&Pubkey, InstructionError> {
        Ok(&self.instruction_account(index)?.pubkey)
    }

    pub fn is_instruction_account_signer(&self, index: usize) -> Result<bool, InstructionError> {
        Ok(self.instruction_account(index)?.is_signer)
    }

    pub fn is_instruction_account_writable(&self, index: usize) -> Result<bool, InstructionError> {
        Ok(self.instruction_account(index)?.is_writable)
    }

    /// Key of the instruction account at `index`, which must have signed.
    pub fn get_signer(&self, index: usize) -> Result<Pubkey, InstructionError> {
        if !self.is_instruction_account_signer(index)? {
            return Err(TipRouterError::MissingRequiredSignature.into());
        }
        Ok(*self.get_key_of_instruction_account(index)?)
    }

    fn check_writable(&self, index: usize) -> Result<Pubkey, InstructionError> {
        if !self.is_instruction_account_writable(index)? {
            return Err(InstructionError::ReadonlyDataModified);
        }
        Ok(*self.get_key_of_instruction_account(index)?)
    }

    // ── Account data ──────────────────────────────────────────────────────

    fn account_data(&self, address: &Pubkey) -> Option<&[u8]> {
        match self.writes.get(address) {
            Some(Some(data)) => Some(data.as_slice()),
            Some(None) => None,
            None => self.accounts.get(address),
        }
    }

    pub fn is_instruction_account_initialized(
        &self,
        index: usize,
    ) -> Result<bool, InstructionError> {
        let address = self.get_key_of_instruction_account(index)?;
        Ok(self.account_data(address).is_some())
    }

    /// Raw data of the instruction account at `index`.
    pub fn get_instruction_account_data(&self, index: usize) -> Result<&[u8], InstructionError> {
        let address = self.get_key_of_instruction_account(index)?;
        Ok(self
            .account_data(address)
            .ok_or(TipRouterError::AccountNotInitialized)?)
    }

    /// Decodes the instruction account at `index` without checking its
    /// address. Callers must check the address against the decoded state.
    pub fn load_instruction_account<T: AccountState>(
        &self,
        index: usize,
    ) -> Result<T, InstructionError> {
        Ok(T::from_account_data(
            self.get_instruction_account_data(index)?,
        )?)
    }

    /// Decodes the instruction account at `index`, which must live at
    /// `expected_address`.
    pub fn load_account<T: AccountState>(
        &self,
        index: usize,
        expected_address: &Pubkey,
    ) -> Result<T, InstructionError> {
        if self.get_key_of_instruction_account(index)? != expected_address {
            return Err(TipRouterError::InvalidAccountAddress.into());
        }
        self.load_instruction_account(index)
    }

    /// Writes a new account at `expected_address`.
    pub fn create_account<T: AccountState>(
        &mut self,
        index: usize,
        expected_address: &Pubkey,
        state: &T,
    ) -> Result<(), InstructionError> {
        let address = self.check_writable(index)?;
        if address != *expected_address {
            return Err(TipRouterError::InvalidAccountAddress.into());
        }
        if self.account_data(&address).is_some() {
            return Err(TipRouterError::AccountAlreadyInitialized.into());
        }
        self.writes.insert(address, Some(state.to_account_data()?));
        Ok(())
    }

    /// Overwrites the existing account at `index`.
    pub fn save_account<T: AccountState>(
        &mut self,
        index: usize,
        state: &T,
    ) -> Result<(), InstructionError> {
        let address = self.check_writable(index)?;
        if self.account_data(&address).is_none() {
            return Err(TipRouterError::AccountNotInitialized.into());
        }
        self.writes.insert(address, Some(state.to_account_data()?));
        Ok(())
    }

    pub fn close_instruction_account(&mut self, index: usize) -> Result<(), InstructionError> {
        let address = self.check_writable(index)?;
        if self.account_data(&address).is_none() {
            return Err(TipRouterError::AccountNotInitialized.into());
        }
        self.writes.insert(address, None);
        Ok(())
    }

    // ── Tokens ────────────────────────────────────────────────────────────

    pub fn get_balance_of_instruction_account(&self, index: usize) -> Result<u64, InstructionError> {
        Ok(self
            .ledger
            .balance(self.get_key_of_instruction_account(index)?))
    }

    /// Moves `amount` between two writable instruction accounts.
    pub fn transfer(
        &mut self,
        source_index: usize,
        destination_index: usize,
        amount: u64,
    ) -> Result<(), InstructionError> {
        let source = self.check_writable(source_index)?;
        let destination = self.check_writable(destination_index)?;
        self.ledger.transfer(&source, &destination, amount)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Runs `instruction` against `accounts`, committing its account writes only
/// when it succeeds.
pub fn invoke(
    accounts: &mut AccountStore,
    sysvars: &Sysvars,
    ledger: &mut dyn TokenLedger,
    external_state: &dyn ExternalState,
    instruction: &Instruction,
) -> Result<(), InstructionError> {
    if instruction.program_id != crate::id() {
        return Err(InstructionError::IncorrectProgramId);
    }

    let writes = {
        let mut invoke_context = InvokeContext::new(
            instruction.program_id,
            accounts,
            &instruction.accounts,
            sysvars,
            ledger,
            external_state,
        );
        crate::processor::process_instruction(&mut invoke_context, &instruction.data)?;
        invoke_context.writes
    };

    trace!("tip-router committing {} account writes", writes.len());
    accounts.commit(writes);
    Ok(())
}
