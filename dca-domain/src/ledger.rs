//! Ledger read/write vocabulary.
//!
//! The engine reads ledger state through [`LedgerView`] and expresses every
//! mutation as a [`LedgerWrite`]. The store applies writes one by one and
//! journals them so a whole operation can be rolled back.

use crate::entities::{PairKey, Position, PositionId, ScheduleKey, ScheduleState};
use crate::value_objects::CadenceSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read access to positions and schedule ledgers
pub trait LedgerView {
    /// Position by id (terminated positions are still returned)
    fn position(&self, id: PositionId) -> Option<&Position>;

    /// Number of positions ever created
    fn total_positions(&self) -> u64;

    /// Schedule header (default when never touched)
    fn schedule(&self, key: &ScheduleKey) -> ScheduleState;

    /// Amount retracted from the due amount once `swap - 1` batches executed
    fn delta_bucket(&self, key: &ScheduleKey, swap: u64) -> u128;

    /// Cumulative fee-adjusted proceeds per whole `token_in` after `swap` batches
    fn accum_ratio(&self, key: &ScheduleKey, swap: u64) -> u128;

    /// Cadences of `pair` currently carrying a non-zero due amount
    fn active_cadences(&self, pair: &PairKey) -> CadenceSet;
}

/// A single, journaled ledger mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerWrite {
    /// Store a new position and bump the position counter
    InsertPosition(Position),

    /// Replace an existing position
    UpdatePosition(Position),

    /// `next_amount_to_swap += amount`
    CreditDueAmount {
        /// Ledger
        key: ScheduleKey,
        /// Amount added
        amount: u128,
    },

    /// `next_amount_to_swap -= amount`
    DebitDueAmount {
        /// Ledger
        key: ScheduleKey,
        /// Amount removed
        amount: u128,
    },

    /// `delta_bucket[swap] += amount`
    CreditDeltaBucket {
        /// Ledger
        key: ScheduleKey,
        /// Swap number
        swap: u64,
        /// Amount added
        amount: u128,
    },

    /// `delta_bucket[swap] -= amount`
    DebitDeltaBucket {
        /// Ledger
        key: ScheduleKey,
        /// Swap number
        swap: u64,
        /// Amount removed
        amount: u128,
    },

    /// `performed_swaps += 1`, `last_executed_at = executed_at`
    AdvanceBatch {
        /// Ledger
        key: ScheduleKey,
        /// Execution time
        executed_at: DateTime<Utc>,
    },

    /// `accum_ratio[swap] = value`
    SetAccumRatio {
        /// Ledger
        key: ScheduleKey,
        /// Swap number
        swap: u64,
        /// Cumulative ratio
        value: u128,
    },

    /// Replace the active-cadence set of a pair
    SetActiveCadences {
        /// Pair
        pair: PairKey,
        /// New set
        cadences: CadenceSet,
    },
}
