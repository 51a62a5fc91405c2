//! Engine error taxonomy.
//!
//! Every failure aborts the triggering operation; nothing is retried.

use dca_domain::{DomainError, PositionId};
use thiserror::Error;

/// Errors produced while validating or planning an operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------
    /// A required address is the zero address
    #[error("ZeroAddress")]
    ZeroAddress,

    /// Amount must be positive
    #[error("ZeroAmount")]
    ZeroAmount,

    /// Number of swaps must be positive
    #[error("ZeroSwaps")]
    ZeroSwaps,

    /// Token pair is degenerate (same token on both sides)
    #[error("InvalidToken")]
    InvalidToken,

    /// Per-batch rate floors to zero
    #[error("InvalidRate")]
    InvalidRate,

    /// Cadence length is not supported
    #[error("InvalidInterval: {0} seconds")]
    InvalidInterval(u64),

    /// Cadence is supported but not allowed
    #[error("IntervalNotAllowed")]
    IntervalNotAllowed,

    /// Token is not on the allow list
    #[error("UnallowedToken")]
    UnallowedToken,

    /// Amount does not match (native value, or reduction above the remainder)
    #[error("InvalidAmount")]
    InvalidAmount,

    // -------------------------------------------------------------------------
    // Authorization
    // -------------------------------------------------------------------------
    /// Caller is not the position owner / governor
    #[error("UnauthorizedCaller")]
    UnauthorizedCaller,

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------
    /// Unknown or terminated position
    #[error("InvalidPosition: {0}")]
    InvalidPosition(PositionId),

    /// Approval proof rejected (bad, expired or replayed)
    #[error("InvalidPermit")]
    InvalidPermit,

    /// Native flag used on a position without a wrapped-native leg
    #[error("NotWNativeToken")]
    NotWNativeToken,

    /// Nothing accrued to withdraw
    #[error("ZeroSwappedAmount")]
    ZeroSwappedAmount,

    // -------------------------------------------------------------------------
    // Swap validation
    // -------------------------------------------------------------------------
    /// Exchange output would not land in the vault
    #[error("InvalidDstReceiver")]
    InvalidDstReceiver,

    /// Descriptor allows partial fills
    #[error("PartialFillNotAllowed")]
    PartialFillNotAllowed,

    /// Descriptor amount differs from the computed swap amount
    #[error("InvalidSwapAmount: expected {expected}, got {supplied}")]
    InvalidSwapAmount {
        /// Computed net swap amount
        expected: u128,
        /// Amount in the descriptor
        supplied: u128,
    },

    /// Exchange returned less than allowed
    #[error("InvalidReturnAmount: returned {returned}, required {required}")]
    InvalidReturnAmount {
        /// Amount returned by the exchange
        returned: u128,
        /// Minimum that would have been accepted
        required: u128,
    },

    /// No due cadence for the pair
    #[error("NoAvailableSwap")]
    NoAvailableSwap,

    /// Price quote older than the configured maximum age
    #[error("StalePrice: {token}")]
    StalePrice {
        /// Token whose quote is stale
        token: dca_domain::Address,
    },

    // -------------------------------------------------------------------------
    // Operational / governance
    // -------------------------------------------------------------------------
    /// Operation blocked while paused (or pause requested twice)
    #[error("Paused")]
    Paused,

    /// Unpause requested while not paused
    #[error("NotPaused")]
    NotPaused,

    /// Swap fee above the maximum
    #[error("HighFee")]
    HighFee,

    /// Platform fee ratio above 100%
    #[error("HighPlatformFeeRatio")]
    HighPlatformFeeRatio,

    /// Slippage tolerance above the maximum
    #[error("InvalidSlippage")]
    InvalidSlippage,

    /// Arithmetic overflow / underflow
    #[error("MathOverflow")]
    MathOverflow,

    /// Other domain validation failure
    #[error("Domain error: {0}")]
    Domain(DomainError),
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidInterval(seconds) => EngineError::InvalidInterval(seconds),
            other => EngineError::Domain(other),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
