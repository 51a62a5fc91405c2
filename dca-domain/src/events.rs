//! Domain Events for the DCA Vault
//!
//! Events are immutable records of committed state changes.
//! They are appended to the store's log inside the operation that caused
//! them and disappear with it if the operation rolls back.

use crate::entities::PositionId;
use crate::value_objects::{Address, Bps, Cadence, CadenceSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one pair's batch inside a `Swapped` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Token sold
    pub token_in: Address,
    /// Token bought
    pub token_out: Address,
    /// Net amount handed to the exchange
    pub swap_amount: u128,
    /// Amount of `token_out` received
    pub received_amount: u128,
    /// Fee share paid to the reward recipient
    pub reward: u128,
    /// Fee share paid to the fee vault
    pub platform_fee: u128,
    /// Cadences combined in the batch
    pub cadences: CadenceSet,
}

/// Domain events emitted by position, swap and governance operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Position created
    Created {
        /// Position owner
        owner: Address,
        /// New position id
        position_id: PositionId,
        /// Token committed
        token_in: Address,
        /// Token received
        token_out: Address,
        /// Position cadence
        cadence: Cadence,
        /// Amount per batch
        rate: u128,
        /// First batch number
        starting_swap: u64,
        /// Last batch number
        final_swap: u64,
        /// Whether the deposit was made in the native asset
        is_native: bool,
        /// When the position was created
        timestamp: DateTime<Utc>,
    },

    /// Position rate or length changed
    Modified {
        /// Position owner
        owner: Address,
        /// Position id
        position_id: PositionId,
        /// New amount per batch
        rate: u128,
        /// First batch number of the new window
        starting_swap: u64,
        /// Last batch number of the new window
        final_swap: u64,
        /// Whether funds were added
        is_increase: bool,
        /// Whether funds moved in the native asset
        is_native: bool,
        /// When the modification happened
        timestamp: DateTime<Utc>,
    },

    /// Position closed and fully paid out
    Terminated {
        /// Position owner
        owner: Address,
        /// Position id
        position_id: PositionId,
        /// Recipient of the swapped proceeds
        swapped_recipient: Address,
        /// Recipient of the unswapped remainder
        unswapped_recipient: Address,
        /// Proceeds paid in `token_out`
        swapped: u128,
        /// Remainder paid in `token_in`
        unswapped: u128,
        /// Whether a native leg was unwrapped
        is_native: bool,
        /// When the position was terminated
        timestamp: DateTime<Utc>,
    },

    /// Swapped proceeds withdrawn
    Withdrew {
        /// Position owner
        owner: Address,
        /// Position id
        position_id: PositionId,
        /// Recipient of the proceeds
        recipient: Address,
        /// Token paid
        token: Address,
        /// Amount paid
        amount: u128,
        /// Whether the proceeds were unwrapped to native
        is_native: bool,
        /// When the withdrawal happened
        timestamp: DateTime<Utc>,
    },

    /// One or more pair batches executed
    Swapped {
        /// Keeper that submitted the batch
        sender: Address,
        /// Recipient of the reward share
        reward_recipient: Address,
        /// Swap fee in force
        swap_fee: Bps,
        /// Per-pair outcomes, in submission order
        batches: Vec<BatchSummary>,
        /// When the batch executed
        timestamp: DateTime<Utc>,
    },

    /// Position creation and increases blocked
    Paused {
        /// Governor
        by: Address,
    },

    /// Position creation and increases allowed again
    Unpaused {
        /// Governor
        by: Address,
    },

    /// Tokens added to or removed from the allow list
    TokensAllowedUpdated {
        /// Tokens changed
        tokens: Vec<Address>,
        /// New allow state
        allowed: bool,
    },

    /// Cadences added to or removed from the allow list
    CadencesUpdated {
        /// Cadences changed
        cadences: CadenceSet,
        /// New allow state
        allowed: bool,
    },

    /// Fee vault replaced
    FeeVaultUpdated {
        /// New fee vault
        fee_vault: Address,
    },

    /// Swap fee changed
    SwapFeeUpdated {
        /// New swap fee
        swap_fee: Bps,
    },

    /// Platform share of the fee changed
    PlatformFeeRatioUpdated {
        /// New platform share
        platform_fee_ratio: Bps,
    },

    /// Price feed replaced
    OracleUpdated {
        /// New feed identifier
        oracle: Address,
    },

    /// Oracle slippage tolerance changed
    SlippageUpdated {
        /// New tolerance
        slippage: Bps,
    },
}

impl Event {
    /// Position this event refers to, if any
    pub fn position_id(&self) -> Option<PositionId> {
        match self {
            Event::Created { position_id, .. }
            | Event::Modified { position_id, .. }
            | Event::Terminated { position_id, .. }
            | Event::Withdrew { position_id, .. } => Some(*position_id),
            _ => None,
        }
    }

    /// Event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Created { .. } => "created",
            Event::Modified { .. } => "modified",
            Event::Terminated { .. } => "terminated",
            Event::Withdrew { .. } => "withdrew",
            Event::Swapped { .. } => "swapped",
            Event::Paused { .. } => "paused",
            Event::Unpaused { .. } => "unpaused",
            Event::TokensAllowedUpdated { .. } => "tokens_allowed_updated",
            Event::CadencesUpdated { .. } => "cadences_updated",
            Event::FeeVaultUpdated { .. } => "fee_vault_updated",
            Event::SwapFeeUpdated { .. } => "swap_fee_updated",
            Event::PlatformFeeRatioUpdated { .. } => "platform_fee_ratio_updated",
            Event::OracleUpdated { .. } => "oracle_updated",
            Event::SlippageUpdated { .. } => "slippage_updated",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
