//! Governance-owned vault configuration.
//!
//! A single configuration object guarded by a governor check. Every
//! mutation validates first, then applies, and returns the event to emit.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fees::FeeEngine;
use crate::math::magnitude;
use dca_domain::{Address, Bps, Cadence, CadenceSet, Event};

/// Maximum swap fee (10%)
pub const MAX_SWAP_FEE_BPS: u32 = 1_000;

/// Maximum platform share of the fee (100%)
pub const MAX_PLATFORM_FEE_RATIO_BPS: u32 = 10_000;

/// Maximum oracle slippage tolerance (5%)
pub const MAX_SLIPPAGE_BPS: u32 = 500;

/// Allow-list entry of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenListing {
    /// Whether new positions / increases may use the token
    pub allowed: bool,
    /// `10^decimals`, kept after the token is disallowed
    pub magnitude: u128,
}

/// Initial values for [`VaultSettings`]
#[derive(Debug, Clone)]
pub struct SettingsInit {
    /// Governor account
    pub governor: Address,
    /// Address of the vault itself (exchange output must land here)
    pub vault_address: Address,
    /// Wrapped form of the native asset
    pub wrapped_native: Address,
    /// Receiver of the platform fee share
    pub fee_vault: Address,
    /// Identifier of the price feed
    pub oracle: Address,
    /// Swap fee in bps
    pub swap_fee_bps: u32,
    /// Platform share of the fee in bps
    pub platform_fee_ratio_bps: u32,
    /// Oracle slippage tolerance in bps
    pub slippage_bps: u32,
    /// Maximum accepted age of a price quote
    pub max_price_age: Duration,
    /// Cadences allowed from the start
    pub allowed_cadences: CadenceSet,
}

/// Vault configuration and allow lists
#[derive(Debug, Clone)]
pub struct VaultSettings {
    governor: Address,
    vault_address: Address,
    wrapped_native: Address,
    fee_vault: Address,
    oracle: Address,
    swap_fee: Bps,
    platform_fee_ratio: Bps,
    slippage: Bps,
    max_price_age: Duration,
    tokens: HashMap<Address, TokenListing>,
    allowed_cadences: CadenceSet,
    paused: bool,
}

impl VaultSettings {
    /// Validate and build the initial configuration
    pub fn new(init: SettingsInit) -> EngineResult<Self> {
        for address in [init.governor, init.vault_address, init.wrapped_native, init.fee_vault, init.oracle] {
            if address.is_zero() {
                return Err(EngineError::ZeroAddress);
            }
        }

        Ok(Self {
            governor: init.governor,
            vault_address: init.vault_address,
            wrapped_native: init.wrapped_native,
            fee_vault: init.fee_vault,
            oracle: init.oracle,
            swap_fee: checked_swap_fee(init.swap_fee_bps)?,
            platform_fee_ratio: checked_platform_fee_ratio(init.platform_fee_ratio_bps)?,
            slippage: checked_slippage(init.slippage_bps)?,
            max_price_age: init.max_price_age,
            tokens: HashMap::new(),
            allowed_cadences: init.allowed_cadences,
            paused: false,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Governor account
    pub fn governor(&self) -> Address {
        self.governor
    }

    /// Address of the vault
    pub fn vault_address(&self) -> Address {
        self.vault_address
    }

    /// Wrapped native token
    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// Fee vault
    pub fn fee_vault(&self) -> Address {
        self.fee_vault
    }

    /// Price feed identifier
    pub fn oracle(&self) -> Address {
        self.oracle
    }

    /// Swap fee
    pub fn swap_fee(&self) -> Bps {
        self.swap_fee
    }

    /// Platform share of the fee
    pub fn platform_fee_ratio(&self) -> Bps {
        self.platform_fee_ratio
    }

    /// Oracle slippage tolerance
    pub fn slippage(&self) -> Bps {
        self.slippage
    }

    /// Maximum accepted price quote age
    pub fn max_price_age(&self) -> Duration {
        self.max_price_age
    }

    /// Whether creation and increases are blocked
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Allowed cadences
    pub fn allowed_cadences(&self) -> CadenceSet {
        self.allowed_cadences
    }

    /// Fee engine for the current parameters
    pub fn fee_engine(&self) -> FeeEngine {
        FeeEngine::new(self.swap_fee, self.platform_fee_ratio)
    }

    /// Whether `token` is on the allow list
    pub fn is_token_allowed(&self, token: &Address) -> bool {
        self.tokens.get(token).is_some_and(|listing| listing.allowed)
    }

    /// `10^decimals` of a token that was listed at some point
    pub fn magnitude(&self, token: &Address) -> EngineResult<u128> {
        self.tokens
            .get(token)
            .map(|listing| listing.magnitude)
            .ok_or(EngineError::UnallowedToken)
    }

    /// Map the native sentinel to the wrapped native token
    pub fn resolve_token(&self, token: Address) -> Address {
        if token.is_native() {
            self.wrapped_native
        } else {
            token
        }
    }

    // =========================================================================
    // Governance
    // =========================================================================

    fn ensure_governor(&self, caller: &Address) -> EngineResult<()> {
        if *caller != self.governor {
            return Err(EngineError::UnauthorizedCaller);
        }
        Ok(())
    }

    /// Block creation and increases
    pub fn pause(&mut self, caller: &Address) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        if self.paused {
            return Err(EngineError::Paused);
        }
        self.paused = true;
        Ok(Event::Paused { by: *caller })
    }

    /// Lift the pause
    pub fn unpause(&mut self, caller: &Address) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        if !self.paused {
            return Err(EngineError::NotPaused);
        }
        self.paused = false;
        Ok(Event::Unpaused { by: *caller })
    }

    /// Allow tokens, recording their magnitude from `decimals`
    pub fn add_allowed_tokens(
        &mut self,
        caller: &Address,
        tokens: &[(Address, u8)],
    ) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        let mut listings = Vec::with_capacity(tokens.len());
        for (token, decimals) in tokens {
            if token.is_zero() {
                return Err(EngineError::ZeroAddress);
            }
            listings.push((*token, magnitude(*decimals)?));
        }

        for (token, magnitude) in &listings {
            debug!(token = %token, magnitude, "Token allowed");
            self.tokens.insert(*token, TokenListing { allowed: true, magnitude: *magnitude });
        }

        Ok(Event::TokensAllowedUpdated {
            tokens: listings.into_iter().map(|(token, _)| token).collect(),
            allowed: true,
        })
    }

    /// Disallow tokens (existing positions may still reduce and exit)
    pub fn remove_allowed_tokens(
        &mut self,
        caller: &Address,
        tokens: &[Address],
    ) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        if tokens.iter().any(Address::is_zero) {
            return Err(EngineError::ZeroAddress);
        }

        for token in tokens {
            if let Some(listing) = self.tokens.get_mut(token) {
                listing.allowed = false;
            }
        }

        Ok(Event::TokensAllowedUpdated { tokens: tokens.to_vec(), allowed: false })
    }

    /// Allow cadences given as lengths in seconds
    pub fn add_allowed_cadences(&mut self, caller: &Address, seconds: &[u64]) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        let cadences = parse_cadences(seconds)?;
        for cadence in cadences.iter() {
            self.allowed_cadences.insert(cadence);
        }
        Ok(Event::CadencesUpdated { cadences, allowed: true })
    }

    /// Disallow cadences given as lengths in seconds
    pub fn remove_allowed_cadences(
        &mut self,
        caller: &Address,
        seconds: &[u64],
    ) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        let cadences = parse_cadences(seconds)?;
        for cadence in cadences.iter() {
            self.allowed_cadences.remove(cadence);
        }
        Ok(Event::CadencesUpdated { cadences, allowed: false })
    }

    /// Replace the fee vault
    pub fn set_fee_vault(&mut self, caller: &Address, fee_vault: Address) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        if fee_vault.is_zero() {
            return Err(EngineError::ZeroAddress);
        }
        self.fee_vault = fee_vault;
        Ok(Event::FeeVaultUpdated { fee_vault })
    }

    /// Change the swap fee
    pub fn set_swap_fee(&mut self, caller: &Address, bps: u32) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        self.swap_fee = checked_swap_fee(bps)?;
        Ok(Event::SwapFeeUpdated { swap_fee: self.swap_fee })
    }

    /// Change the platform share of the fee
    pub fn set_platform_fee_ratio(&mut self, caller: &Address, bps: u32) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        self.platform_fee_ratio = checked_platform_fee_ratio(bps)?;
        Ok(Event::PlatformFeeRatioUpdated { platform_fee_ratio: self.platform_fee_ratio })
    }

    /// Record a new price feed identifier
    pub fn set_oracle(&mut self, caller: &Address, oracle: Address) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        if oracle.is_zero() {
            return Err(EngineError::ZeroAddress);
        }
        self.oracle = oracle;
        Ok(Event::OracleUpdated { oracle })
    }

    /// Change the oracle slippage tolerance
    pub fn set_slippage(&mut self, caller: &Address, bps: u32) -> EngineResult<Event> {
        self.ensure_governor(caller)?;
        self.slippage = checked_slippage(bps)?;
        Ok(Event::SlippageUpdated { slippage: self.slippage })
    }
}

fn checked_swap_fee(bps: u32) -> EngineResult<Bps> {
    if bps > MAX_SWAP_FEE_BPS {
        return Err(EngineError::HighFee);
    }
    Ok(Bps::new(bps)?)
}

fn checked_platform_fee_ratio(bps: u32) -> EngineResult<Bps> {
    if bps > MAX_PLATFORM_FEE_RATIO_BPS {
        return Err(EngineError::HighPlatformFeeRatio);
    }
    Ok(Bps::new(bps)?)
}

fn checked_slippage(bps: u32) -> EngineResult<Bps> {
    if bps > MAX_SLIPPAGE_BPS {
        return Err(EngineError::InvalidSlippage);
    }
    Ok(Bps::new(bps)?)
}

fn parse_cadences(seconds: &[u64]) -> EngineResult<CadenceSet> {
    seconds
        .iter()
        .map(|secs| Cadence::from_seconds(*secs).map_err(EngineError::from))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
