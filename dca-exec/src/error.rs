//! Execution layer error types.

use thiserror::Error;

use dca_domain::Address;
use dca_engine::EngineError;

/// Failures reported by the external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Token was never registered with the gateway
    #[error("Unknown token: {0}")]
    UnknownToken(Address),

    /// Holder does not have enough of the token
    #[error("Insufficient balance of {token} for {holder}: needed {needed}, available {available}")]
    InsufficientBalance {
        /// Token
        token: Address,
        /// Account debited
        holder: Address,
        /// Amount requested
        needed: u128,
        /// Amount held
        available: u128,
    },

    /// Standing allowance too small
    #[error("Insufficient allowance of {token} from {owner}: needed {needed}, available {available}")]
    InsufficientAllowance {
        /// Token
        token: Address,
        /// Account debited
        owner: Address,
        /// Amount requested
        needed: u128,
        /// Allowance granted
        available: u128,
    },

    /// Exchange call failed
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// No quote for the token
    #[error("Price unavailable for {0}")]
    PriceUnavailable(Address),
}

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Validation, authorization or state failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] dca_store::StoreError),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] dca_domain::DomainError),

    /// External collaborator error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A previous operation panicked while holding the state lock
    #[error("Vault state lock poisoned")]
    StatePoisoned,
}

impl ExecError {
    /// Engine error carried by this error, if any
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            ExecError::Engine(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
