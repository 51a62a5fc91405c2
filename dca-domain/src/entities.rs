//! Domain Entities for the DCA Vault
//!
//! Positions and the per-(pair, cadence) schedule header.

use crate::value_objects::{Address, Cadence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Sequential, 1-based position identifier
pub type PositionId = u64;

/// Ordered token pair a ledger swaps across
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    /// Token committed by positions
    pub token_in: Address,
    /// Token received by positions
    pub token_out: Address,
}

impl PairKey {
    /// Create a pair key
    pub fn new(token_in: Address, token_out: Address) -> Self {
        Self { token_in, token_out }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.token_in, self.token_out)
    }
}

/// Key of one schedule ledger: a pair plus a cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleKey {
    /// Token pair
    pub pair: PairKey,
    /// Cadence of the ledger
    pub cadence: Cadence,
}

impl ScheduleKey {
    /// Create a schedule key
    pub fn new(pair: PairKey, cadence: Cadence) -> Self {
        Self { pair, cadence }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pair, self.cadence)
    }
}

// =============================================================================
// Schedule header
// =============================================================================

/// Rolling state of one (pair, cadence) ledger.
///
/// Delta buckets and the cumulative ratio index live beside the header,
/// keyed additionally by swap number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleState {
    /// Number of batches executed so far
    pub performed_swaps: u64,
    /// Sum of the rates of every position covering the next batch
    pub next_amount_to_swap: u128,
    /// When the last batch executed (None before the first one)
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl ScheduleState {
    /// Whether a batch is due at `now`
    pub fn is_due(&self, cadence: Cadence, now: DateTime<Utc>) -> bool {
        self.seconds_until_due(cadence, now) == 0
    }

    /// Seconds left until a batch is due (0 when already due)
    pub fn seconds_until_due(&self, cadence: Cadence, now: DateTime<Utc>) -> u64 {
        match self.last_executed_at {
            None => 0,
            Some(last) => {
                let due_at = last + cadence.duration();
                let remaining = (due_at - now).num_seconds();
                u64::try_from(remaining).unwrap_or(0)
            },
        }
    }
}

// =============================================================================
// Position
// =============================================================================

/// A user's recurring-swap commitment on one pair and cadence.
///
/// The position contributes `rate` to its ledger's due amount for every
/// batch number in `(last_updated_swap, final_swap]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Sequential identifier
    pub id: PositionId,
    /// Account allowed to modify, withdraw and terminate
    pub owner: Address,
    /// Token committed per batch
    pub token_in: Address,
    /// Token received
    pub token_out: Address,
    /// Cadence of the position; `None` once terminated
    pub cadence: Option<Cadence>,
    /// Amount of `token_in` swapped per batch
    pub rate: u128,
    /// First batch number the current rate applies to
    pub starting_swap: u64,
    /// Last batch number the current rate applies to
    pub final_swap: u64,
    /// Batch number proceeds were last settled at
    pub last_updated_swap: u64,
    /// Proceeds accrued before the last modification, not yet withdrawn
    pub swapped_carry: u128,

    // Audit
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Whether the position has not been terminated
    pub fn is_live(&self) -> bool {
        self.cadence.is_some()
    }

    /// Pair this position swaps across
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.token_in, self.token_out)
    }

    /// Schedule ledger this position contributes to (None once terminated)
    pub fn schedule_key(&self) -> Option<ScheduleKey> {
        self.cadence.map(|cadence| ScheduleKey::new(self.pair(), cadence))
    }
}

// =============================================================================
// Tests
// =============================================================================
