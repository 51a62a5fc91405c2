//! Property tests over random position / batch sequences.
//!
//! A naive model replays every batch against every position and is compared
//! with the O(1) ledger after each step. Besides the prefix-sum figure, each
//! position keeps proceeds floored batch by batch and its exact share of
//! every exchange result, which bound the ledger from below and above.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::error::EngineError;
use crate::positions::{CreatePosition, ModifyPosition, PositionLedger, TerminatePosition, WithdrawSwapped};
use crate::schedule::{ratio_delta, IntervalScheduleLedger};
use crate::settings::tests::{governor, init};
use crate::settings::VaultSettings;
use crate::testing::TestLedger;
use dca_domain::{Address, Cadence, LedgerView, PairKey, PositionId, ScheduleKey};

const MAGNITUDE: u128 = 1_000_000;

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Create { amount: u128, num_swaps: u64, weekly: bool },
    Batch { price_bps: u32 },
    Increase { pick: usize, amount: u128, num_swaps: u64 },
    Decrease { pick: usize, percent: u128, num_swaps: u64 },
    Withdraw { pick: usize },
    Terminate { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u128..1_000_000_000, 1u64..30, any::<bool>())
            .prop_map(|(amount, num_swaps, weekly)| Op::Create { amount, num_swaps, weekly }),
        4 => (5_000u32..20_000).prop_map(|price_bps| Op::Batch { price_bps }),
        1 => (any::<usize>(), 0u128..1_000_000_000, 1u64..30)
            .prop_map(|(pick, amount, num_swaps)| Op::Increase { pick, amount, num_swaps }),
        1 => (any::<usize>(), 0u128..=100, 1u64..30)
            .prop_map(|(pick, percent, num_swaps)| Op::Decrease { pick, percent, num_swaps }),
        1 => any::<usize>().prop_map(|pick| Op::Withdraw { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Terminate { pick }),
    ]
}

// ============================================================================
// Model
// ============================================================================

/// Position as a naive replay sees it
#[derive(Debug, Clone)]
struct Replayed {
    cadence: Cadence,
    rate: u128,
    swaps_left: u64,
    ratio_since_settle: u128,
    carry: u128,
    /// Σ floor(delta × rate / MAGNITUDE) since the last settle
    batch_floor: u128,
    /// Σ ceil(returned × rate / total) since the last settle
    share_ceiling: u128,
    batches: u64,
}

impl Replayed {
    fn swapped(&self) -> u128 {
        self.carry + self.ratio_since_settle * self.rate / MAGNITUDE
    }

    fn unswapped(&self) -> u128 {
        self.rate * u128::from(self.swaps_left)
    }

    fn settle(&mut self) {
        self.carry = self.swapped();
        self.ratio_since_settle = 0;
        self.batch_floor = 0;
        self.share_ceiling = 0;
        self.batches = 0;
    }

    fn opened(cadence: Cadence, rate: u128, swaps_left: u64) -> Self {
        Self {
            cadence,
            rate,
            swaps_left,
            ratio_since_settle: 0,
            carry: 0,
            batch_floor: 0,
            share_ceiling: 0,
            batches: 0,
        }
    }
}

struct Harness {
    settings: VaultSettings,
    ledger: TestLedger,
    model: BTreeMap<PositionId, Replayed>,
    now: DateTime<Utc>,
}

fn owner() -> Address {
    Address::from_low_u64(0x0a)
}

fn pair() -> PairKey {
    PairKey::new(Address::from_low_u64(0x1a), Address::from_low_u64(0x1b))
}

impl Harness {
    fn new() -> Self {
        let mut settings = VaultSettings::new(init()).unwrap();
        settings
            .add_allowed_tokens(&governor(), &[(pair().token_in, 6), (pair().token_out, 6)])
            .unwrap();
        Self {
            settings,
            ledger: TestLedger::default(),
            model: BTreeMap::new(),
            now: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn pick(&self, pick: usize) -> Option<PositionId> {
        if self.model.is_empty() {
            return None;
        }
        self.model.keys().nth(pick % self.model.len()).copied()
    }

    fn run(&mut self, op: &Op) {
        match *op {
            Op::Create { amount, num_swaps, weekly } => {
                let cadence = if weekly { Cadence::OneWeek } else { Cadence::OneDay };
                let request = CreatePosition {
                    token_in: pair().token_in,
                    token_out: pair().token_out,
                    amount,
                    num_swaps,
                    interval_secs: cadence.seconds(),
                    approval: None,
                    native_value: 0,
                };
                let planned = PositionLedger::new(&self.ledger, &self.settings)
                    .plan_create(owner(), request, self.now);
                let rate = amount / u128::from(num_swaps);
                match planned {
                    Ok(plan) => {
                        self.ledger.apply_all(&plan.writes);
                        self.model.insert(plan.position_id, Replayed::opened(cadence, rate, num_swaps));
                    },
                    Err(err) => {
                        assert_eq!(rate, 0);
                        assert_eq!(err, EngineError::InvalidRate);
                    },
                }
            },
            Op::Batch { price_bps } => {
                self.now += Duration::days(1);
                let schedules = IntervalScheduleLedger::new(&self.ledger);
                let batch = schedules.due_batch(pair(), self.now).unwrap();
                if batch.is_empty() {
                    return;
                }
                let split = self.settings.fee_engine().split(batch.total).unwrap();
                let returned = split.swap_amount * u128::from(price_bps) / 10_000;
                let delta = ratio_delta(returned, MAGNITUDE, batch.total).unwrap();

                let mut writes = schedules.plan_advance(&batch, self.now).unwrap();
                writes.extend(schedules.plan_ratio(&batch, delta).unwrap());
                self.ledger.apply_all(&writes);

                let due = batch.cadences();
                for position in self.model.values_mut() {
                    if due.contains(position.cadence) && position.rate > 0 && position.swaps_left > 0 {
                        position.ratio_since_settle += delta;
                        position.batch_floor += delta * position.rate / MAGNITUDE;
                        position.share_ceiling += (returned * position.rate).div_ceil(batch.total);
                        position.batches += 1;
                        position.swaps_left -= 1;
                    }
                }
            },
            Op::Increase { pick, amount, num_swaps } => self.modify(pick, amount, num_swaps, true, 0),
            Op::Decrease { pick, percent, num_swaps } => self.modify(pick, 0, num_swaps, false, percent),
            Op::Withdraw { pick } => {
                let Some(id) = self.pick(pick) else { return };
                let request = WithdrawSwapped { position_id: id, recipient: owner(), use_native: false };
                let planned = PositionLedger::new(&self.ledger, &self.settings)
                    .plan_withdraw(owner(), request, self.now);
                let replayed = self.model.get_mut(&id).unwrap();
                match planned {
                    Ok(plan) => {
                        assert_eq!(plan.transfers.len(), 1);
                        replayed.settle();
                        replayed.carry = 0;
                        self.ledger.apply_all(&plan.writes);
                    },
                    Err(err) => {
                        assert_eq!(err, EngineError::ZeroSwappedAmount);
                        assert_eq!(replayed.swapped(), 0);
                    },
                }
            },
            Op::Terminate { pick } => {
                let Some(id) = self.pick(pick) else { return };
                let request = TerminatePosition {
                    position_id: id,
                    swapped_recipient: owner(),
                    unswapped_recipient: owner(),
                    use_native: false,
                };
                let plan = PositionLedger::new(&self.ledger, &self.settings)
                    .plan_terminate(owner(), request, self.now)
                    .unwrap();
                let replayed = self.model.remove(&id).unwrap();
                match plan.event {
                    dca_domain::Event::Terminated { swapped, unswapped, .. } => {
                        assert_eq!(swapped, replayed.swapped());
                        assert_eq!(unswapped, replayed.unswapped());
                    },
                    other => panic!("unexpected event {other:?}"),
                }
                self.ledger.apply_all(&plan.writes);
            },
        }
    }

    fn modify(&mut self, pick: usize, amount: u128, num_swaps: u64, is_increase: bool, percent: u128) {
        let Some(id) = self.pick(pick) else { return };
        let replayed = self.model.get(&id).unwrap().clone();
        let unswapped = replayed.unswapped();
        let delta_amount = if is_increase { amount } else { unswapped * percent / 100 };

        let request = ModifyPosition {
            position_id: id,
            delta_amount,
            new_num_swaps: num_swaps,
            approval: None,
            is_increase,
            use_native: false,
            native_value: 0,
        };
        let planned = PositionLedger::new(&self.ledger, &self.settings)
            .plan_modify(owner(), request, self.now);

        let new_amount = if is_increase { unswapped + delta_amount } else { unswapped - delta_amount };
        let (rate, swaps_left) = if new_amount == 0 {
            (0, 0)
        } else {
            (new_amount / u128::from(num_swaps), num_swaps)
        };

        match planned {
            Ok(plan) => {
                self.ledger.apply_all(&plan.writes);
                let replayed = self.model.get_mut(&id).unwrap();
                replayed.settle();
                replayed.rate = rate;
                replayed.swaps_left = swaps_left;
            },
            Err(err) => {
                assert_eq!(err, EngineError::InvalidRate);
                assert!(new_amount > 0 && rate == 0);
            },
        }
    }

    fn check(&self) {
        let positions = PositionLedger::new(&self.ledger, &self.settings);

        for (id, replayed) in &self.model {
            let details = positions.details(*id).unwrap();
            assert_eq!(details.swapped, replayed.swapped(), "swapped of position {id}");
            assert_eq!(details.unswapped, replayed.unswapped(), "unswapped of position {id}");

            let accrued = details.swapped - replayed.carry;
            assert!(accrued >= replayed.batch_floor, "position {id} below per-batch proceeds");
            assert!(
                accrued <= replayed.batch_floor + u128::from(replayed.batches),
                "position {id} rounding exceeds one unit per batch"
            );
            assert!(accrued <= replayed.share_ceiling, "position {id} paid beyond its share");
        }

        for cadence in [Cadence::OneDay, Cadence::OneWeek] {
            let key = ScheduleKey::new(pair(), cadence);
            let expected: u128 = self
                .model
                .values()
                .filter(|position| position.cadence == cadence && position.swaps_left > 0)
                .map(|position| position.rate)
                .sum();
            let state = self.ledger.schedule(&key);
            assert_eq!(state.next_amount_to_swap, expected, "due amount of {key}");
            assert_eq!(
                self.ledger.active_cadences(&key.pair).contains(cadence),
                expected > 0,
                "active flag of {key}"
            );

            for swap in 1..=state.performed_swaps {
                assert!(self.ledger.accum_ratio(&key, swap) >= self.ledger.accum_ratio(&key, swap - 1));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Ledger proceeds, remainders and due amounts match a naive replay
    #[test]
    fn prop_ledger_matches_replay(ops in prop::collection::vec(op(), 1..80)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.run(op);
            harness.check();
        }
    }

    /// Terminating everything drains every ledger
    #[test]
    fn prop_terminate_all_drains_due_amount(ops in prop::collection::vec(op(), 1..40)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.run(op);
        }
        while !harness.model.is_empty() {
            harness.run(&Op::Terminate { pick: 0 });
        }

        for cadence in [Cadence::OneDay, Cadence::OneWeek] {
            let key = ScheduleKey::new(pair(), cadence);
            prop_assert_eq!(harness.ledger.schedule(&key).next_amount_to_swap, 0);
        }
        prop_assert!(harness.ledger.active_cadences(&pair()).is_empty());
    }
}
