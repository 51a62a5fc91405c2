//! DCA Vault Engine Layer
//!
//! Pure planning logic, deterministic, no I/O.
//! Takes a ledger view and a request, returns the writes, token movements
//! and events to apply.

#![warn(clippy::all)]

pub mod error;
pub mod fees;
pub mod math;
pub mod positions;
pub mod schedule;
pub mod settings;
pub mod swap;

#[cfg(test)]
mod properties;
#[cfg(test)]
mod testing;

pub use error::{EngineError, EngineResult};
pub use fees::{FeeBreakdown, FeeEngine};
pub use positions::{
    Accrual, CreatePosition, Funding, ModifyPosition, PositionDetails, PositionLedger,
    PositionPlan, TerminatePosition, Transfer, WithdrawSwapped,
};
pub use schedule::{ratio_delta, DueBatch, DueLedger, IntervalScheduleLedger, ReturnCheck};
pub use settings::{
    SettingsInit, TokenListing, VaultSettings, MAX_PLATFORM_FEE_RATIO_BPS, MAX_SLIPPAGE_BPS,
    MAX_SWAP_FEE_BPS,
};
pub use swap::{next_swap_info, BatchPlan, NextSwapInfo, SwapDescriptor, FLAG_PARTIAL_FILL};
