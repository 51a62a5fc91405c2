//! Batch planning for the keeper-driven swap.
//!
//! A descriptor names one pair. Every due cadence of that pair is folded
//! into a single exchange call; the plan carries the fee split, the writes
//! that advance the ledgers (applied before the exchange is called) and,
//! once the result is known, the ratio writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fees::FeeBreakdown;
use crate::schedule::{ratio_delta, DueBatch, IntervalScheduleLedger};
use crate::settings::VaultSettings;
use dca_domain::{Address, BatchSummary, CadenceSet, LedgerView, LedgerWrite, PairKey};

/// Descriptor flag allowing the exchange to fill only part of the order
pub const FLAG_PARTIAL_FILL: u32 = 0x1;

/// Keeper-supplied description of one exchange call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapDescriptor {
    /// Exchange executor the call is routed through
    pub executor: Address,
    /// Token sold
    pub src_token: Address,
    /// Token bought
    pub dst_token: Address,
    /// Receiver of the output (the vault, or zero for the caller)
    pub dst_receiver: Address,
    /// Amount sold, must equal the net swap amount
    pub amount: u128,
    /// Keeper's own floor on the output
    pub min_return_amount: u128,
    /// Behaviour flags
    pub flags: u32,
    /// Opaque routing payload forwarded to the exchange
    pub route_data: Vec<u8>,
}

impl SwapDescriptor {
    /// Pair the descriptor swaps across
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.src_token, self.dst_token)
    }

    /// Whether the partial-fill flag is set
    pub fn allows_partial_fill(&self) -> bool {
        self.flags & FLAG_PARTIAL_FILL != 0
    }
}

/// Validated batch for one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Due cadences folded into the batch
    pub due: DueBatch,
    /// Fee split of the due total
    pub fees: FeeBreakdown,
    /// Counter advance, delta sweep and active-set writes
    pub advance: Vec<LedgerWrite>,
}

impl BatchPlan {
    /// Validate `descriptor` against what is due for its pair at `now`
    pub fn prepare<V: LedgerView + ?Sized>(
        view: &V,
        settings: &VaultSettings,
        descriptor: &SwapDescriptor,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let schedules = IntervalScheduleLedger::new(view);
        let due = schedules.due_batch(descriptor.pair(), now)?;
        if due.is_empty() {
            return Err(EngineError::NoAvailableSwap);
        }

        if !descriptor.dst_receiver.is_zero() && descriptor.dst_receiver != settings.vault_address() {
            return Err(EngineError::InvalidDstReceiver);
        }
        if descriptor.allows_partial_fill() {
            return Err(EngineError::PartialFillNotAllowed);
        }

        let fees = settings.fee_engine().split(due.total)?;
        if descriptor.amount != fees.swap_amount {
            return Err(EngineError::InvalidSwapAmount {
                expected: fees.swap_amount,
                supplied: descriptor.amount,
            });
        }

        debug!(
            pair = %due.pair,
            cadences = %due.cadences(),
            total = due.total,
            swap_amount = fees.swap_amount,
            "Batch prepared"
        );

        let advance = schedules.plan_advance(&due, now)?;
        Ok(Self { due, fees, advance })
    }

    /// Ratio writes for an exchange result of `returned`, plus the batch summary
    pub fn settle<V: LedgerView + ?Sized>(
        &self,
        view: &V,
        returned: u128,
        magnitude_in: u128,
    ) -> EngineResult<(Vec<LedgerWrite>, BatchSummary)> {
        let delta = ratio_delta(returned, magnitude_in, self.due.total)?;
        let writes = IntervalScheduleLedger::new(view).plan_ratio(&self.due, delta)?;

        let summary = BatchSummary {
            token_in: self.due.pair.token_in,
            token_out: self.due.pair.token_out,
            swap_amount: self.fees.swap_amount,
            received_amount: returned,
            reward: self.fees.reward,
            platform_fee: self.fees.platform_fee,
            cadences: self.due.cadences(),
        };
        Ok((writes, summary))
    }
}

/// Preview of the next batch of a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSwapInfo {
    /// Token sold
    pub token_in: Address,
    /// Token bought
    pub token_out: Address,
    /// Net amount the descriptor must carry
    pub swap_amount: u128,
    /// Reward share
    pub reward: u128,
    /// Platform share
    pub platform_fee: u128,
    /// Due cadences
    pub cadences: CadenceSet,
}

/// What a keeper would have to submit for `pair` at `now`
pub fn next_swap_info<V: LedgerView + ?Sized>(
    view: &V,
    settings: &VaultSettings,
    pair: PairKey,
    now: DateTime<Utc>,
) -> EngineResult<NextSwapInfo> {
    let due = IntervalScheduleLedger::new(view).due_batch(pair, now)?;
    let fees = settings.fee_engine().split(due.total)?;
    Ok(NextSwapInfo {
        token_in: pair.token_in,
        token_out: pair.token_out,
        swap_amount: fees.swap_amount,
        reward: fees.reward,
        platform_fee: fees.platform_fee,
        cadences: due.cadences(),
    })
}
