//! Execution layer port definitions.
//!
//! Ports define the interfaces for the vault's external collaborators
//! (token escrow, exchange, price feed, approval verification, time).
//! Adapters implement these ports; `stub` provides in-memory ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dca_domain::{Address, ApprovalProof, Price};
use dca_engine::SwapDescriptor;

use crate::error::GatewayError;

// =============================================================================
// Token Port
// =============================================================================

/// How an inbound transfer is authorized at the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullAuthorization {
    /// Spend the standing allowance `from` granted to `to`
    Allowance,
    /// Signed approval, already verified by the vault
    Permit,
}

/// Port for token custody.
///
/// Implementations:
/// - `StubTokens` - For testing (balances in memory)
///
/// The vault calls `begin` before an operation touches balances and
/// `commit` / `rollback` once it knows the outcome; gateways that cannot
/// stage movements keep the no-op defaults.
pub trait TokenGateway: Send + Sync {
    /// Decimals of a token
    fn decimals(&self, token: &Address) -> Result<u8, GatewayError>;

    /// Token balance of `holder`
    fn balance_of(&self, token: &Address, holder: &Address) -> u128;

    /// Move `amount` of `token` from `from` to `to` on `from`'s authorization
    fn transfer_from(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
        authorization: PullAuthorization,
    ) -> Result<(), GatewayError>;

    /// Move `amount` of `token` held by `from` (the vault) to `to`
    fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), GatewayError>;

    /// Take `amount` of native asset from `from` and credit `to` the wrapped token
    fn wrap_native(&self, from: &Address, to: &Address, amount: u128) -> Result<(), GatewayError>;

    /// Burn `amount` of wrapped token held by `from` and pay `to` in native asset
    fn unwrap_native(&self, from: &Address, to: &Address, amount: u128) -> Result<(), GatewayError>;

    /// Open a checkpoint
    fn begin(&self) {}

    /// Keep every movement since `begin`
    fn commit(&self) {}

    /// Undo every movement since `begin`
    fn rollback(&self) {}
}

// =============================================================================
// Exchange Port
// =============================================================================

/// One batched exchange call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Keeper's descriptor, forwarded untouched
    pub descriptor: SwapDescriptor,
    /// Account selling and receiving (the vault)
    pub vault: Address,
}

/// Port for the external exchange.
///
/// The exchange pulls `descriptor.amount` of `src_token` from the vault and
/// delivers `dst_token` to the vault. The vault measures what arrived.
pub trait ExchangeGateway: Send + Sync {
    /// Execute the call
    fn execute(&self, request: &ExchangeRequest) -> Result<(), GatewayError>;
}

// =============================================================================
// Price Port
// =============================================================================

/// A price with its publication time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Price in the feed's quote unit
    pub price: Price,
    /// When the price was published
    pub updated_at: DateTime<Utc>,
}

/// Port for the price feed
pub trait PriceFeed: Send + Sync {
    /// Identifier of the feed (recorded by `set_oracle`)
    fn id(&self) -> Address;

    /// Latest quote for `token`
    fn latest_price(&self, token: &Address) -> Result<PriceQuote, GatewayError>;
}

// =============================================================================
// Approval Port
// =============================================================================

/// Everything a signed approval commits to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Token owner (signer)
    pub owner: Address,
    /// Account allowed to spend (the vault)
    pub spender: Address,
    /// Token
    pub token: Address,
    /// Amount approved
    pub amount: u128,
    /// Proof supplied by the caller
    pub proof: ApprovalProof,
    /// Verification time
    pub now: DateTime<Utc>,
}

/// Port for signed approval verification
pub trait ApprovalVerifier: Send + Sync {
    /// Whether the proof is valid, unexpired and unused
    fn verify(&self, request: &ApprovalRequest) -> bool;

    /// Open a checkpoint
    fn begin(&self) {}

    /// Keep every nonce spent since `begin`
    fn commit(&self) {}

    /// Release every nonce spent since `begin`
    fn rollback(&self) {}
}

// =============================================================================
// Clock Port
// =============================================================================

/// Port for the current time
pub trait Clock: Send + Sync {
    /// Now
    fn now(&self) -> DateTime<Utc>;
}
