//! Batch fee split.
//!
//! ```text
//! fee          = total × swap_fee / 10000
//! swap_amount  = total − fee
//! platform_fee = fee × platform_fee_ratio / 10000
//! reward       = fee − platform_fee
//! ```
//!
//! Both fee shares are paid in the batch's input token.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::math::{apply_bps, sub};
use dca_domain::Bps;

/// Fee parameters in force for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEngine {
    swap_fee: Bps,
    platform_fee_ratio: Bps,
}

/// Result of splitting a batch's due amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Due amount before fees
    pub total: u128,
    /// Whole fee
    pub fee: u128,
    /// Amount handed to the exchange
    pub swap_amount: u128,
    /// Share paid to the fee vault
    pub platform_fee: u128,
    /// Share paid to the reward recipient
    pub reward: u128,
}

impl FeeEngine {
    /// Create a fee engine
    pub fn new(swap_fee: Bps, platform_fee_ratio: Bps) -> Self {
        Self { swap_fee, platform_fee_ratio }
    }

    /// Swap fee
    pub fn swap_fee(&self) -> Bps {
        self.swap_fee
    }

    /// Split `total` into swap amount, platform fee and reward
    pub fn split(&self, total: u128) -> EngineResult<FeeBreakdown> {
        let fee = apply_bps(total, self.swap_fee)?;
        let platform_fee = apply_bps(fee, self.platform_fee_ratio)?;
        Ok(FeeBreakdown {
            total,
            fee,
            swap_amount: sub(total, fee)?,
            platform_fee,
            reward: sub(fee, platform_fee)?,
        })
    }
}
