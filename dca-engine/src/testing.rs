//! In-memory ledger used by the engine's unit and property tests.

use std::collections::HashMap;

use dca_domain::{
    CadenceSet, LedgerView, LedgerWrite, PairKey, Position, PositionId, ScheduleKey, ScheduleState,
};

#[derive(Debug, Default, Clone)]
pub(crate) struct TestLedger {
    positions: HashMap<PositionId, Position>,
    total_positions: u64,
    schedules: HashMap<ScheduleKey, ScheduleState>,
    deltas: HashMap<(ScheduleKey, u64), u128>,
    ratios: HashMap<(ScheduleKey, u64), u128>,
    active: HashMap<PairKey, CadenceSet>,
}

impl TestLedger {
    pub(crate) fn set_schedule(&mut self, key: ScheduleKey, state: ScheduleState) {
        if state.next_amount_to_swap > 0 {
            self.active.entry(key.pair).or_default().insert(key.cadence);
        }
        self.schedules.insert(key, state);
    }

    pub(crate) fn set_delta(&mut self, key: ScheduleKey, swap: u64, amount: u128) {
        self.deltas.insert((key, swap), amount);
    }

    pub(crate) fn set_ratio(&mut self, key: ScheduleKey, swap: u64, value: u128) {
        self.ratios.insert((key, swap), value);
    }

    pub(crate) fn apply_all(&mut self, writes: &[LedgerWrite]) {
        for write in writes {
            self.apply(write);
        }
    }

    pub(crate) fn apply(&mut self, write: &LedgerWrite) {
        match write {
            LedgerWrite::InsertPosition(position) => {
                self.total_positions += 1;
                self.positions.insert(position.id, position.clone());
            },
            LedgerWrite::UpdatePosition(position) => {
                self.positions.insert(position.id, position.clone());
            },
            LedgerWrite::CreditDueAmount { key, amount } => {
                self.schedules.entry(*key).or_default().next_amount_to_swap += amount;
            },
            LedgerWrite::DebitDueAmount { key, amount } => {
                self.schedules.entry(*key).or_default().next_amount_to_swap -= amount;
            },
            LedgerWrite::CreditDeltaBucket { key, swap, amount } => {
                *self.deltas.entry((*key, *swap)).or_default() += amount;
            },
            LedgerWrite::DebitDeltaBucket { key, swap, amount } => {
                *self.deltas.entry((*key, *swap)).or_default() -= amount;
            },
            LedgerWrite::AdvanceBatch { key, executed_at } => {
                let state = self.schedules.entry(*key).or_default();
                state.performed_swaps += 1;
                state.last_executed_at = Some(*executed_at);
            },
            LedgerWrite::SetAccumRatio { key, swap, value } => {
                self.ratios.insert((*key, *swap), *value);
            },
            LedgerWrite::SetActiveCadences { pair, cadences } => {
                self.active.insert(*pair, *cadences);
            },
        }
    }
}

impl LedgerView for TestLedger {
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
        self.deltas.get(&(*key, swap)).copied().unwrap_or_default()
    }

    fn accum_ratio(&self, key: &ScheduleKey, swap: u64) -> u128 {
        self.ratios.get(&(*key, swap)).copied().unwrap_or_default()
    }

    fn active_cadences(&self, pair: &PairKey) -> CadenceSet {
        self.active.get(pair).copied().unwrap_or_default()
    }
}
