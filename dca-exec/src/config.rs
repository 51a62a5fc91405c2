//! Vault configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

use chrono::Duration;

use dca_domain::{Address, Cadence, CadenceSet};
use dca_engine::SettingsInit;

use crate::error::{ExecError, ExecResult};

// =============================================================================
// Configuration
// =============================================================================

/// Vault configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Governor account
    pub governor: Address,
    /// Receiver of the platform fee share
    pub fee_vault: Address,
    /// Address of the vault (exchange output must land here)
    pub vault_address: Address,
    /// Wrapped form of the native asset
    pub wrapped_native: Address,
    /// Swap fee in bps (max 1000)
    pub swap_fee_bps: u32,
    /// Platform share of the fee in bps (max 10000)
    pub platform_fee_ratio_bps: u32,
    /// Oracle slippage tolerance in bps (max 500)
    pub slippage_bps: u32,
    /// Maximum accepted age of a price quote, in seconds
    pub max_price_age_secs: u64,
    /// Cadences allowed from the start
    pub allowed_cadences: CadenceSet,
}

impl VaultConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> ExecResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Ok(Self {
            governor: Self::load_address_env("DCA_GOVERNOR", defaults.governor)?,
            fee_vault: Self::load_address_env("DCA_FEE_VAULT", defaults.fee_vault)?,
            vault_address: Self::load_address_env("DCA_VAULT_ADDRESS", defaults.vault_address)?,
            wrapped_native: Self::load_address_env("DCA_WRAPPED_NATIVE", defaults.wrapped_native)?,
            swap_fee_bps: Self::load_number_env("DCA_SWAP_FEE_BPS", defaults.swap_fee_bps)?,
            platform_fee_ratio_bps: Self::load_number_env(
                "DCA_PLATFORM_FEE_RATIO_BPS",
                defaults.platform_fee_ratio_bps,
            )?,
            slippage_bps: Self::load_number_env("DCA_SLIPPAGE_BPS", defaults.slippage_bps)?,
            max_price_age_secs: Self::load_number_env(
                "DCA_MAX_PRICE_AGE_SECS",
                defaults.max_price_age_secs,
            )?,
            allowed_cadences: match env::var("DCA_ALLOWED_CADENCES") {
                Ok(val) => Self::parse_cadences(&val)?,
                Err(_) => defaults.allowed_cadences,
            },
        })
    }

    /// Create test configuration.
    ///
    /// 5% swap fee, 20% platform share, 1% slippage, daily and weekly
    /// cadences allowed.
    pub fn test() -> Self {
        Self {
            governor: Address::from_low_u64(0x60),
            fee_vault: Address::from_low_u64(0xfee),
            vault_address: Address::from_low_u64(0xdca),
            wrapped_native: Address::from_low_u64(0xeeee),
            swap_fee_bps: 500,
            platform_fee_ratio_bps: 2_000,
            slippage_bps: 100,
            max_price_age_secs: 3_600,
            allowed_cadences: [Cadence::OneDay, Cadence::OneWeek].into_iter().collect(),
        }
    }

    /// Settings seed for a price feed identified by `oracle`
    pub fn settings_init(&self, oracle: Address) -> ExecResult<SettingsInit> {
        let max_age = i64::try_from(self.max_price_age_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ExecError::Config(format!("Invalid max price age: {}", self.max_price_age_secs)))?;
        Ok(SettingsInit {
            governor: self.governor,
            vault_address: self.vault_address,
            wrapped_native: self.wrapped_native,
            fee_vault: self.fee_vault,
            oracle,
            swap_fee_bps: self.swap_fee_bps,
            platform_fee_ratio_bps: self.platform_fee_ratio_bps,
            slippage_bps: self.slippage_bps,
            max_price_age: max_age,
            allowed_cadences: self.allowed_cadences,
        })
    }

    fn load_address_env(key: &str, default: Address) -> ExecResult<Address> {
        match env::var(key) {
            Ok(val) => Address::from_hex(&val)
                .map_err(|_| ExecError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_number_env<T: std::str::FromStr>(key: &str, default: T) -> ExecResult<T> {
        match env::var(key) {
            Ok(val) => val
                .trim()
                .parse::<T>()
                .map_err(|_| ExecError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn parse_cadences(val: &str) -> ExecResult<CadenceSet> {
        val.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>()
                    .ok()
                    .and_then(|secs| Cadence::from_seconds(secs).ok())
                    .ok_or_else(|| ExecError::Config(format!("Invalid DCA_ALLOWED_CADENCES entry: {}", part)))
            })
            .collect()
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            governor: Address::ZERO,
            fee_vault: Address::ZERO,
            vault_address: Address::ZERO,
            wrapped_native: Address::ZERO,
            swap_fee_bps: 0,
            platform_fee_ratio_bps: 0,
            slippage_bps: 100,
            max_price_age_secs: 3_600,
            allowed_cadences: CadenceSet::EMPTY,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
