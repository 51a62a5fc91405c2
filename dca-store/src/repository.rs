//! Ledger store trait and transactions (Ports)
//!
//! A store applies [`LedgerWrite`]s one at a time and hands back an
//! [`UndoEntry`] for each. [`Transaction`] keeps those entries in a journal
//! and replays them in reverse when dropped without a commit, so an
//! operation either lands completely or not at all.

use crate::error::StoreError;
use dca_domain::{
    CadenceSet, Event, LedgerView, LedgerWrite, PairKey, Position, PositionId, ScheduleKey,
    ScheduleState,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Event with sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// 1-based position in the log
    pub seq: u64,
    /// The event
    pub event: Event,
}

/// Previous value of a slot touched by one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEntry {
    /// Position slot (and the counter, for inserts)
    Position {
        /// Position id
        id: PositionId,
        /// Previous record, None if inserted
        previous: Option<Position>,
        /// Position counter before the write
        total_positions: u64,
    },
    /// Schedule header
    Schedule {
        /// Ledger
        key: ScheduleKey,
        /// Previous header
        previous: ScheduleState,
    },
    /// Delta bucket entry
    DeltaBucket {
        /// Ledger
        key: ScheduleKey,
        /// Swap number
        swap: u64,
        /// Previous amount
        previous: u128,
    },
    /// Cumulative ratio entry
    AccumRatio {
        /// Ledger
        key: ScheduleKey,
        /// Swap number
        swap: u64,
        /// Previous value
        previous: u128,
    },
    /// Active-cadence set of a pair
    ActiveCadences {
        /// Pair
        pair: PairKey,
        /// Previous set
        previous: CadenceSet,
    },
    /// Event appended to the log
    Event {
        /// Log length before the append
        len: usize,
    },
}

/// Storage for positions, schedule ledgers and the event log
pub trait LedgerStore: LedgerView + Send + Sync {
    /// Apply one write, returning how to undo it
    fn apply(&mut self, write: &LedgerWrite) -> Result<UndoEntry, StoreError>;

    /// Restore the slot described by `undo`
    fn revert(&mut self, undo: UndoEntry);

    /// Append an event, returning its sequence number
    fn append_event(&mut self, event: Event) -> u64;

    /// Events with a sequence number greater than `seq`
    fn events_since(&self, seq: u64) -> Vec<StoredEvent>;

    /// Number of events in the log
    fn event_count(&self) -> usize;
}

/// Journaled unit of work over a [`LedgerStore`].
///
/// Dropping an uncommitted transaction rolls every write and event back in
/// reverse order.
pub struct Transaction<'a, S: LedgerStore + ?Sized> {
    store: &'a mut S,
    journal: Vec<UndoEntry>,
    committed: bool,
}

impl<'a, S: LedgerStore + ?Sized> Transaction<'a, S> {
    /// Open a transaction
    pub fn begin(store: &'a mut S) -> Self {
        Self {
            store,
            journal: Vec::new(),
            committed: false,
        }
    }

    /// Read the store including the writes applied so far
    pub fn view(&self) -> &S {
        self.store
    }

    /// Apply one write
    pub fn apply(&mut self, write: &LedgerWrite) -> Result<(), StoreError> {
        let undo = self.store.apply(write)?;
        self.journal.push(undo);
        Ok(())
    }

    /// Apply writes in order, stopping at the first failure
    pub fn apply_all(&mut self, writes: &[LedgerWrite]) -> Result<(), StoreError> {
        writes.iter().try_for_each(|write| self.apply(write))
    }

    /// Record an event
    pub fn emit(&mut self, event: Event) -> u64 {
        let len = self.store.event_count();
        let seq = self.store.append_event(event);
        self.journal.push(UndoEntry::Event { len });
        seq
    }

    /// Number of journaled entries
    pub fn len(&self) -> usize {
        self.journal.len()
    }

    /// Whether nothing was applied yet
    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Keep every write and event
    pub fn commit(mut self) -> usize {
        self.committed = true;
        self.journal.len()
    }
}

impl<S: LedgerStore + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        trace!(entries = self.journal.len(), "Rolling back transaction");
        while let Some(undo) = self.journal.pop() {
            self.store.revert(undo);
        }
    }
}
