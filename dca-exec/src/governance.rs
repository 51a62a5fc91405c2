//! Governor operations on a vault.
//!
//! Every operation is restricted to the governor, mutates the settings and
//! records its event in the same step.

use std::sync::Arc;

use tracing::info;

use dca_domain::{Address, Event};
use dca_engine::{EngineError, EngineResult, VaultSettings};
use dca_store::{LedgerStore, Transaction};

use crate::error::ExecResult;
use crate::ports::PriceFeed;
use crate::vault::Vault;

impl<S: LedgerStore> Vault<S> {
    fn govern<F>(&self, action: &'static str, caller: Address, update: F) -> ExecResult<Event>
    where
        F: FnOnce(&mut VaultSettings) -> EngineResult<Event>,
    {
        let mut guard = self.write_state()?;
        let state = &mut *guard;

        let event = update(&mut state.settings)?;
        let mut tx = Transaction::begin(&mut state.store);
        let seq = tx.emit(event.clone());
        tx.commit();

        info!(action, governor = %caller, seq, "Governance update");
        Ok(event)
    }

    /// Block position creation and increases
    pub fn pause(&self, caller: Address) -> ExecResult<Event> {
        self.govern("pause", caller, |settings| settings.pause(&caller))
    }

    /// Lift the pause
    pub fn unpause(&self, caller: Address) -> ExecResult<Event> {
        self.govern("unpause", caller, |settings| settings.unpause(&caller))
    }

    /// Allow tokens, reading their decimals from the token gateway
    pub fn add_allowed_tokens(&self, caller: Address, tokens: &[Address]) -> ExecResult<Event> {
        {
            let state = self.read_state()?;
            if caller != state.settings.governor() {
                return Err(EngineError::UnauthorizedCaller.into());
            }
        }
        if tokens.iter().any(Address::is_zero) {
            return Err(EngineError::ZeroAddress.into());
        }

        let listings = tokens
            .iter()
            .map(|token| -> ExecResult<(Address, u8)> { Ok((*token, self.tokens.decimals(token)?)) })
            .collect::<ExecResult<Vec<_>>>()?;

        self.govern("add_allowed_tokens", caller, |settings| {
            settings.add_allowed_tokens(&caller, &listings)
        })
    }

    /// Disallow tokens
    pub fn remove_allowed_tokens(&self, caller: Address, tokens: &[Address]) -> ExecResult<Event> {
        self.govern("remove_allowed_tokens", caller, |settings| {
            settings.remove_allowed_tokens(&caller, tokens)
        })
    }

    /// Allow cadences given as lengths in seconds
    pub fn add_allowed_cadences(&self, caller: Address, seconds: &[u64]) -> ExecResult<Event> {
        self.govern("add_allowed_cadences", caller, |settings| {
            settings.add_allowed_cadences(&caller, seconds)
        })
    }

    /// Disallow cadences given as lengths in seconds
    pub fn remove_allowed_cadences(&self, caller: Address, seconds: &[u64]) -> ExecResult<Event> {
        self.govern("remove_allowed_cadences", caller, |settings| {
            settings.remove_allowed_cadences(&caller, seconds)
        })
    }

    /// Replace the fee vault
    pub fn set_fee_vault(&self, caller: Address, fee_vault: Address) -> ExecResult<Event> {
        self.govern("set_fee_vault", caller, |settings| settings.set_fee_vault(&caller, fee_vault))
    }

    /// Change the swap fee (bps, max 1000)
    pub fn set_swap_fee(&self, caller: Address, bps: u32) -> ExecResult<Event> {
        self.govern("set_swap_fee", caller, |settings| settings.set_swap_fee(&caller, bps))
    }

    /// Change the platform share of the fee (bps, max 10000)
    pub fn set_platform_fee_ratio(&self, caller: Address, bps: u32) -> ExecResult<Event> {
        self.govern("set_platform_fee_ratio", caller, |settings| {
            settings.set_platform_fee_ratio(&caller, bps)
        })
    }

    /// Change the oracle slippage tolerance (bps, max 500)
    pub fn set_slippage(&self, caller: Address, bps: u32) -> ExecResult<Event> {
        self.govern("set_slippage", caller, |settings| settings.set_slippage(&caller, bps))
    }

    /// Switch the price feed used by the return check
    pub fn set_oracle(&self, caller: Address, feed: Arc<dyn PriceFeed>) -> ExecResult<Event> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;

        let event = state.settings.set_oracle(&caller, feed.id())?;
        state.oracle = feed;
        let mut tx = Transaction::begin(&mut state.store);
        let seq = tx.emit(event.clone());
        tx.commit();

        info!(action = "set_oracle", governor = %caller, seq, "Governance update");
        Ok(event)
    }
}
