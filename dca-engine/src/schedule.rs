//! Interval schedule ledger planning.
//!
//! One ledger per (token_in, token_out, cadence). The rolling due amount is
//! kept exact with a difference array: a position adds its rate to
//! `next_amount_to_swap` and to `delta_bucket[final_swap + 1]`; once batch
//! `k` executes, `delta_bucket[k + 1]` is swept out of the due amount.
//!
//! `accum_ratio[k]` is the prefix sum of fee-adjusted proceeds per whole
//! `token_in` after `k` batches, so proceeds of any position are a single
//! difference of two entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::math::{add, apply_bps, gcd, magnitude, mul_div, mul_div_many, sub};
use dca_domain::{Bps, Cadence, CadenceSet, LedgerView, LedgerWrite, PairKey, Price, ScheduleKey};

/// A cadence ledger taking part in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueLedger {
    /// Cadence of the ledger
    pub cadence: Cadence,
    /// Batches executed before this one
    pub performed_swaps: u64,
    /// Due amount contributed to the batch
    pub amount: u128,
}

impl DueLedger {
    /// Number the executing batch will carry
    pub fn swap_number(&self) -> u64 {
        self.performed_swaps + 1
    }
}

/// Every due cadence of a pair, combined into one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueBatch {
    /// Pair being swapped
    pub pair: PairKey,
    /// Due ledgers, ascending by cadence
    pub ledgers: Vec<DueLedger>,
    /// Sum of the due amounts before fees
    pub total: u128,
}

impl DueBatch {
    /// Whether nothing is due
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    /// Cadences combined in the batch
    pub fn cadences(&self) -> CadenceSet {
        self.ledgers.iter().map(|ledger| ledger.cadence).collect()
    }
}

/// Read-side planner over the schedule ledgers of a [`LedgerView`]
pub struct IntervalScheduleLedger<'a, V: LedgerView + ?Sized> {
    view: &'a V,
}

impl<'a, V: LedgerView + ?Sized> IntervalScheduleLedger<'a, V> {
    /// Wrap a ledger view
    pub fn new(view: &'a V) -> Self {
        Self { view }
    }

    /// Collect the due cadences of `pair` at `now`.
    ///
    /// Only active cadences are considered; a cadence is due once its length
    /// has elapsed since the last execution (or it never executed).
    pub fn due_batch(&self, pair: PairKey, now: DateTime<Utc>) -> EngineResult<DueBatch> {
        let mut ledgers = Vec::new();
        let mut total = 0u128;

        for cadence in self.view.active_cadences(&pair).iter() {
            let state = self.view.schedule(&ScheduleKey::new(pair, cadence));
            if state.next_amount_to_swap == 0 || !state.is_due(cadence, now) {
                continue;
            }
            total = add(total, state.next_amount_to_swap)?;
            ledgers.push(DueLedger {
                cadence,
                performed_swaps: state.performed_swaps,
                amount: state.next_amount_to_swap,
            });
        }

        Ok(DueBatch { pair, ledgers, total })
    }

    /// Seconds until any active cadence of `pair` is due.
    ///
    /// `Some(0)` when something is due now, `None` when nothing is active.
    pub fn seconds_until_next(&self, pair: PairKey, now: DateTime<Utc>) -> Option<u64> {
        self.view
            .active_cadences(&pair)
            .iter()
            .map(|cadence| {
                self.view
                    .schedule(&ScheduleKey::new(pair, cadence))
                    .seconds_until_due(cadence, now)
            })
            .min()
    }

    /// Writes that advance every ledger of `batch` by one batch.
    ///
    /// Bumps the counter, stamps the execution time and sweeps the delta
    /// bucket of the following batch out of the due amount. Cadences whose
    /// due amount reaches zero leave the active set.
    pub fn plan_advance(
        &self,
        batch: &DueBatch,
        executed_at: DateTime<Utc>,
    ) -> EngineResult<Vec<LedgerWrite>> {
        let mut writes = Vec::with_capacity(batch.ledgers.len() * 2 + 1);
        let mut active = self.view.active_cadences(&batch.pair);

        for ledger in &batch.ledgers {
            let key = ScheduleKey::new(batch.pair, ledger.cadence);
            let executed = ledger.swap_number();
            let ending = self.view.delta_bucket(&key, executed + 1);
            let remaining = sub(ledger.amount, ending)?;

            debug!(
                schedule = %key,
                swap = executed,
                retracted = ending,
                remaining,
                "Advancing schedule"
            );

            writes.push(LedgerWrite::AdvanceBatch { key, executed_at });
            if ending > 0 {
                writes.push(LedgerWrite::DebitDueAmount { key, amount: ending });
            }
            if remaining == 0 {
                active.remove(ledger.cadence);
            }
        }

        if active != self.view.active_cadences(&batch.pair) {
            writes.push(LedgerWrite::SetActiveCadences { pair: batch.pair, cadences: active });
        }

        Ok(writes)
    }

    /// Writes recording `ratio_delta` as the proceeds of the batch for every
    /// combined cadence
    pub fn plan_ratio(&self, batch: &DueBatch, ratio_delta: u128) -> EngineResult<Vec<LedgerWrite>> {
        batch
            .ledgers
            .iter()
            .map(|ledger| {
                let key = ScheduleKey::new(batch.pair, ledger.cadence);
                let previous = self.view.accum_ratio(&key, ledger.performed_swaps);
                Ok(LedgerWrite::SetAccumRatio {
                    key,
                    swap: ledger.swap_number(),
                    value: add(previous, ratio_delta)?,
                })
            })
            .collect()
    }

    /// Writes adding a contribution of `rate` for batches up to `final_swap`
    pub fn plan_contribution(
        &self,
        key: ScheduleKey,
        rate: u128,
        final_swap: u64,
    ) -> EngineResult<Vec<LedgerWrite>> {
        if rate == 0 {
            return Ok(Vec::new());
        }
        let ending = final_swap.checked_add(1).ok_or(EngineError::MathOverflow)?;
        Ok(vec![
            LedgerWrite::CreditDueAmount { key, amount: rate },
            LedgerWrite::CreditDeltaBucket { key, swap: ending, amount: rate },
        ])
    }

    /// Writes retracting a contribution of `rate` ending at `final_swap`.
    ///
    /// Windows that already ended were swept by the batch that closed them
    /// and need no retraction.
    pub fn plan_retraction(
        &self,
        key: ScheduleKey,
        rate: u128,
        final_swap: u64,
    ) -> EngineResult<Vec<LedgerWrite>> {
        let performed = self.view.schedule(&key).performed_swaps;
        if rate == 0 || final_swap <= performed {
            return Ok(Vec::new());
        }
        let ending = final_swap.checked_add(1).ok_or(EngineError::MathOverflow)?;
        Ok(vec![
            LedgerWrite::DebitDueAmount { key, amount: rate },
            LedgerWrite::DebitDeltaBucket { key, swap: ending, amount: rate },
        ])
    }

    /// Active-set write for `key` once its due amount becomes `next_amount`
    pub fn plan_active_flag(&self, key: ScheduleKey, next_amount: u128) -> Option<LedgerWrite> {
        let current = self.view.active_cadences(&key.pair);
        let updated = current.with(key.cadence, next_amount > 0);
        (updated != current).then_some(LedgerWrite::SetActiveCadences {
            pair: key.pair,
            cadences: updated,
        })
    }
}

/// Proceeds per whole `token_in` for a batch: `returned × magnitude_in / total_due`.
///
/// `total_due` is the pre-fee amount, which leaves the fee out of every
/// position's proceeds.
pub fn ratio_delta(returned: u128, magnitude_in: u128, total_due: u128) -> EngineResult<u128> {
    mul_div(returned, magnitude_in, total_due)
}

/// Oracle quotes and limits the exchange result is checked against
#[derive(Debug, Clone, Copy)]
pub struct ReturnCheck {
    /// Price of `token_in`
    pub price_in: Price,
    /// Price of `token_out`
    pub price_out: Price,
    /// `10^decimals` of `token_in`
    pub magnitude_in: u128,
    /// `10^decimals` of `token_out`
    pub magnitude_out: u128,
    /// Tolerated shortfall against the oracle amount
    pub slippage: Bps,
    /// Caller's own floor
    pub min_return: u128,
}

impl ReturnCheck {
    /// `token_out` amount implied by the oracle for `swap_amount`.
    ///
    /// Prices enter as integer mantissas with their decimal scales, so any
    /// ratio whose result fits in `u128` is representable.
    pub fn expected_return(&self, swap_amount: u128) -> EngineResult<u128> {
        let (mantissa_in, scale_in) = fixed_point(self.price_in)?;
        let (mantissa_out, scale_out) = fixed_point(self.price_out)?;

        // price_in / price_out = mantissa_in × 10^scale_out / (mantissa_out × 10^scale_in)
        let (tens_num, tens_den) = if scale_out >= scale_in {
            (power_of_ten(scale_out - scale_in)?, 1)
        } else {
            (1, power_of_ten(scale_in - scale_out)?)
        };
        let prices = gcd(mantissa_in, mantissa_out).max(1);
        let magnitudes = gcd(self.magnitude_out, self.magnitude_in).max(1);

        mul_div_many(
            &[swap_amount, mantissa_in / prices, tens_num, self.magnitude_out / magnitudes],
            &[mantissa_out / prices, tens_den, self.magnitude_in / magnitudes],
        )
    }

    /// Smallest acceptable return for `swap_amount`
    pub fn required_return(&self, swap_amount: u128) -> EngineResult<u128> {
        let oracle_floor = apply_bps(self.expected_return(swap_amount)?, self.slippage.complement())?;
        Ok(oracle_floor.max(self.min_return))
    }

    /// Fail with `InvalidReturnAmount` when `returned` is below the floor
    pub fn verify(&self, swap_amount: u128, returned: u128) -> EngineResult<()> {
        let required = self.required_return(swap_amount)?;
        if returned < required {
            return Err(EngineError::InvalidReturnAmount { returned, required });
        }
        Ok(())
    }
}

fn fixed_point(price: Price) -> EngineResult<(u128, u32)> {
    let value = price.as_decimal().normalize();
    let mantissa = u128::try_from(value.mantissa()).map_err(|_| EngineError::MathOverflow)?;
    Ok((mantissa, value.scale()))
}

fn power_of_ten(exponent: u32) -> EngineResult<u128> {
    magnitude(u8::try_from(exponent).map_err(|_| EngineError::MathOverflow)?)
}

// =============================================================================
// Tests
// =============================================================================
