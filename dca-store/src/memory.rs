//! In-memory store implementation
//!
//! Plain maps with no interior locking: the owner serializes access (the
//! vault keeps the store behind its state lock).

use std::collections::HashMap;

use crate::error::StoreError;
use crate::repository::{LedgerStore, StoredEvent, UndoEntry};
use dca_domain::{
    CadenceSet, Event, LedgerView, LedgerWrite, PairKey, Position, PositionId, ScheduleKey,
    ScheduleState,
};

/// In-memory ledger store
#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: HashMap<PositionId, Position>,
    total_positions: u64,
    schedules: HashMap<ScheduleKey, ScheduleState>,
    delta_buckets: HashMap<(ScheduleKey, u64), u128>,
    accum_ratios: HashMap<(ScheduleKey, u64), u128>,
    active: HashMap<PairKey, CadenceSet>,
    events: Vec<StoredEvent>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Full event log
    pub fn event_log(&self) -> &[StoredEvent] {
        &self.events
    }

    /// Event log as a JSON array
    pub fn events_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.events)?)
    }

    fn set_schedule(&mut self, key: ScheduleKey, state: ScheduleState) {
        if state == ScheduleState::default() {
            self.schedules.remove(&key);
        } else {
            self.schedules.insert(key, state);
        }
    }

    fn set_amount(map: &mut HashMap<(ScheduleKey, u64), u128>, key: ScheduleKey, swap: u64, value: u128) {
        if value == 0 {
            map.remove(&(key, swap));
        } else {
            map.insert((key, swap), value);
        }
    }

    fn schedule_undo(&self, key: ScheduleKey) -> UndoEntry {
        UndoEntry::Schedule { key, previous: self.schedule(&key) }
    }
}

impl LedgerView for MemoryStore {
    fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    fn total_positions(&self) -> u64 {
        self.total_positions
    }

    fn schedule(&self, key: &ScheduleKey) -> ScheduleState {
        self.schedules.get(key).copied().unwrap_or_default()
    }

    fn delta_bucket(&self, key: &ScheduleKey, swap: u64) -> u128 {
        self.delta_buckets.get(&(*key, swap)).copied().unwrap_or_default()
    }

    fn accum_ratio(&self, key: &ScheduleKey, swap: u64) -> u128 {
        self.accum_ratios.get(&(*key, swap)).copied().unwrap_or_default()
    }

    fn active_cadences(&self, pair: &PairKey) -> CadenceSet {
        self.active.get(pair).copied().unwrap_or_default()
    }
}

impl LedgerStore for MemoryStore {
    fn apply(&mut self, write: &LedgerWrite) -> Result<UndoEntry, StoreError> {
        match write {
            LedgerWrite::InsertPosition(position) => {
                if position.id != self.total_positions + 1 || self.positions.contains_key(&position.id) {
                    return Err(StoreError::duplicate("position", position.id));
                }
                let undo = UndoEntry::Position {
                    id: position.id,
                    previous: None,
                    total_positions: self.total_positions,
                };
                self.total_positions += 1;
                self.positions.insert(position.id, position.clone());
                Ok(undo)
            },

            LedgerWrite::UpdatePosition(position) => {
                let slot = self
                    .positions
                    .get_mut(&position.id)
                    .ok_or_else(|| StoreError::not_found("position", position.id))?;
                let previous = std::mem::replace(slot, position.clone());
                Ok(UndoEntry::Position {
                    id: position.id,
                    previous: Some(previous),
                    total_positions: self.total_positions,
                })
            },

            LedgerWrite::CreditDueAmount { key, amount } => {
                let undo = self.schedule_undo(*key);
                let mut state = self.schedule(key);
                state.next_amount_to_swap = state
                    .next_amount_to_swap
                    .checked_add(*amount)
                    .ok_or_else(|| StoreError::invalid_state(format!("due amount overflow on {key}")))?;
                self.set_schedule(*key, state);
                Ok(undo)
            },

            LedgerWrite::DebitDueAmount { key, amount } => {
                let undo = self.schedule_undo(*key);
                let mut state = self.schedule(key);
                state.next_amount_to_swap = state
                    .next_amount_to_swap
                    .checked_sub(*amount)
                    .ok_or_else(|| StoreError::invalid_state(format!("due amount underflow on {key}")))?;
                self.set_schedule(*key, state);
                Ok(undo)
            },

            LedgerWrite::CreditDeltaBucket { key, swap, amount } => {
                let previous = self.delta_bucket(key, *swap);
                let value = previous.checked_add(*amount).ok_or_else(|| {
                    StoreError::invalid_state(format!("delta bucket {swap} overflow on {key}"))
                })?;
                Self::set_amount(&mut self.delta_buckets, *key, *swap, value);
                Ok(UndoEntry::DeltaBucket { key: *key, swap: *swap, previous })
            },

            LedgerWrite::DebitDeltaBucket { key, swap, amount } => {
                let previous = self.delta_bucket(key, *swap);
                let value = previous.checked_sub(*amount).ok_or_else(|| {
                    StoreError::invalid_state(format!("delta bucket {swap} underflow on {key}"))
                })?;
                Self::set_amount(&mut self.delta_buckets, *key, *swap, value);
                Ok(UndoEntry::DeltaBucket { key: *key, swap: *swap, previous })
            },

            LedgerWrite::AdvanceBatch { key, executed_at } => {
                let undo = self.schedule_undo(*key);
                let mut state = self.schedule(key);
                state.performed_swaps += 1;
                state.last_executed_at = Some(*executed_at);
                self.set_schedule(*key, state);
                Ok(undo)
            },

            LedgerWrite::SetAccumRatio { key, swap, value } => {
                let floor = swap.checked_sub(1).map_or(0, |prior| self.accum_ratio(key, prior));
                if *value < floor {
                    return Err(StoreError::invalid_state(format!(
                        "accum ratio {swap} on {key} would decrease ({value} < {floor})"
                    )));
                }
                let previous = self.accum_ratio(key, *swap);
                Self::set_amount(&mut self.accum_ratios, *key, *swap, *value);
                Ok(UndoEntry::AccumRatio { key: *key, swap: *swap, previous })
            },

            LedgerWrite::SetActiveCadences { pair, cadences } => {
                let previous = self.active_cadences(pair);
                if cadences.is_empty() {
                    self.active.remove(pair);
                } else {
                    self.active.insert(*pair, *cadences);
                }
                Ok(UndoEntry::ActiveCadences { pair: *pair, previous })
            },
        }
    }

    fn revert(&mut self, undo: UndoEntry) {
        match undo {
            UndoEntry::Position { id, previous, total_positions } => {
                match previous {
                    Some(position) => self.positions.insert(id, position),
                    None => self.positions.remove(&id),
                };
                self.total_positions = total_positions;
            },
            UndoEntry::Schedule { key, previous } => self.set_schedule(key, previous),
            UndoEntry::DeltaBucket { key, swap, previous } => {
                Self::set_amount(&mut self.delta_buckets, key, swap, previous)
            },
            UndoEntry::AccumRatio { key, swap, previous } => {
                Self::set_amount(&mut self.accum_ratios, key, swap, previous)
            },
            UndoEntry::ActiveCadences { pair, previous } => {
                if previous.is_empty() {
                    self.active.remove(&pair);
                } else {
                    self.active.insert(pair, previous);
                }
            },
            UndoEntry::Event { len } => self.events.truncate(len),
        }
    }

    fn append_event(&mut self, event: Event) -> u64 {
        let seq = self.events.len() as u64 + 1;
        self.events.push(StoredEvent { seq, event });
        seq
    }

    fn events_since(&self, seq: u64) -> Vec<StoredEvent> {
        self.events.iter().filter(|stored| stored.seq > seq).cloned().collect()
    }

    fn event_count(&self) -> usize {
        self.events.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
