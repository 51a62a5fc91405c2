//! DCA Vault Execution Layer
//!
//! Applies engine plans atomically against a ledger store and the external
//! collaborators (token custody, exchange, price feed).
//!
//! # Architecture
//!
//! ```text
//! Request → Engine Plan → Transaction (ledger writes) → Gateways → Event → Commit
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for token custody, exchange, price feed, approvals and time
//! - **Vault**: Serialized position, swap and governance operations
//! - **Config**: Environment-driven vault configuration
//! - **Stub**: In-memory gateways for development and tests
//!
//! # Example
//!
//! ```rust,ignore
//! use dca_exec::{Gateways, Vault, VaultConfig};
//! use dca_store::MemoryStore;
//!
//! let vault = Vault::new(&VaultConfig::from_env()?, MemoryStore::new(), gateways)?;
//! let id = vault.create_position(owner, request)?;
//! vault.swap(keeper, &[descriptor], keeper)?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod governance;
pub mod ports;
pub mod stub;
pub mod vault;

// Re-exports for convenience
pub use config::VaultConfig;
pub use error::{ExecError, ExecResult, GatewayError};
pub use ports::{
    ApprovalRequest, ApprovalVerifier, Clock, ExchangeGateway, ExchangeRequest, PriceFeed,
    PriceQuote, PullAuthorization, TokenGateway,
};
pub use stub::{
    ManualClock, StubApprovals, StubExchange, StubPriceFeed, StubTokens, SystemClock,
};
pub use vault::{Gateways, Vault};
