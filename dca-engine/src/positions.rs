//! Position ledger planning.
//!
//! Every operation validates against the current [`LedgerView`] and the
//! vault settings, then returns a [`PositionPlan`]: the ledger writes to
//! apply, the token movements to perform and the event to record. Nothing
//! here touches balances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::math::{add, mul_div, sub};
use crate::schedule::IntervalScheduleLedger;
use crate::settings::VaultSettings;
use dca_domain::{
    Address, ApprovalProof, Cadence, Event, LedgerView, LedgerWrite, PairKey, Position,
    PositionId, ScheduleKey,
};

// =============================================================================
// Requests
// =============================================================================

/// Open a new position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePosition {
    /// Token committed (`Address::NATIVE` to deposit the native asset)
    pub token_in: Address,
    /// Token received (`Address::NATIVE` maps to the wrapped native token)
    pub token_out: Address,
    /// Total amount committed
    pub amount: u128,
    /// Number of batches the amount is spread over
    pub num_swaps: u64,
    /// Cadence length in seconds
    pub interval_secs: u64,
    /// Signed approval used instead of the standing allowance
    pub approval: Option<ApprovalProof>,
    /// Native value sent along
    pub native_value: u128,
}

/// Add funds to or remove funds from a position and reset its length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyPosition {
    /// Position to modify
    pub position_id: PositionId,
    /// Amount added or removed
    pub delta_amount: u128,
    /// Batches the new remainder is spread over
    pub new_num_swaps: u64,
    /// Signed approval used instead of the standing allowance
    pub approval: Option<ApprovalProof>,
    /// Whether `delta_amount` is added
    pub is_increase: bool,
    /// Whether the native asset is deposited / refunded
    pub use_native: bool,
    /// Native value sent along
    pub native_value: u128,
}

/// Close a position and pay everything out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminatePosition {
    /// Position to close
    pub position_id: PositionId,
    /// Receiver of the swapped proceeds
    pub swapped_recipient: Address,
    /// Receiver of the unswapped remainder
    pub unswapped_recipient: Address,
    /// Whether wrapped-native legs are unwrapped on payout
    pub use_native: bool,
}

/// Pay out the swapped proceeds of a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawSwapped {
    /// Position to withdraw from
    pub position_id: PositionId,
    /// Receiver of the proceeds
    pub recipient: Address,
    /// Whether the proceeds are unwrapped to native
    pub use_native: bool,
}

// =============================================================================
// Plans
// =============================================================================

/// How an inbound transfer is authorized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Funding {
    /// Standing allowance granted to the vault
    Allowance,
    /// Signed approval proof
    Permit(ApprovalProof),
    /// Native asset sent along, wrapped on arrival
    Native,
}

/// Token movement required by a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transfer {
    /// Escrow `amount` of `token` from `from` into the vault
    Pull {
        /// Token escrowed (wrapped form for native deposits)
        token: Address,
        /// Payer
        from: Address,
        /// Amount escrowed
        amount: u128,
        /// Authorization used
        funding: Funding,
    },
    /// Pay `amount` of `token` out of the vault
    Push {
        /// Token paid
        token: Address,
        /// Receiver
        to: Address,
        /// Amount paid
        amount: u128,
        /// Whether the wrapped native token is unwrapped first
        unwrap_native: bool,
    },
}

/// Outcome of planning a position operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPlan {
    /// Position the plan applies to
    pub position_id: PositionId,
    /// Ledger writes, in order
    pub writes: Vec<LedgerWrite>,
    /// Token movements, in order
    pub transfers: Vec<Transfer>,
    /// Event recorded when the plan commits
    pub event: Event,
}

/// Settled amounts of a position as of the current batch counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Accrual {
    /// Proceeds in `token_out` not yet withdrawn
    pub swapped: u128,
    /// Remainder in `token_in` not yet swapped
    pub unswapped: u128,
    /// Batches of the current window already executed
    pub swaps_executed: u64,
    /// Batches of the current window still to run
    pub swaps_left: u64,
    /// `min(performed_swaps, final_swap)` the amounts were settled at
    pub settled_swap: u64,
}

/// Read-only summary of a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDetails {
    /// Position id
    pub id: PositionId,
    /// Owner
    pub owner: Address,
    /// Token committed
    pub token_in: Address,
    /// Token received
    pub token_out: Address,
    /// Cadence (None once terminated)
    pub cadence: Option<Cadence>,
    /// Amount per batch
    pub rate: u128,
    /// Batches of the current window already executed
    pub swaps_executed: u64,
    /// Batches of the current window still to run
    pub swaps_left: u64,
    /// Proceeds available to withdraw
    pub swapped: u128,
    /// Remainder not yet swapped
    pub unswapped: u128,
}

// =============================================================================
// Ledger
// =============================================================================

/// Planner for position operations
pub struct PositionLedger<'a, V: LedgerView + ?Sized> {
    view: &'a V,
    settings: &'a VaultSettings,
}

impl<'a, V: LedgerView + ?Sized> PositionLedger<'a, V> {
    /// Wrap a ledger view and the settings in force
    pub fn new(view: &'a V, settings: &'a VaultSettings) -> Self {
        Self { view, settings }
    }

    fn schedules(&self) -> IntervalScheduleLedger<'a, V> {
        IntervalScheduleLedger::new(self.view)
    }

    /// Live position owned by `caller`
    fn owned_position(&self, id: PositionId, caller: &Address) -> EngineResult<&'a Position> {
        let position = self
            .view
            .position(id)
            .filter(|position| position.is_live())
            .ok_or(EngineError::InvalidPosition(id))?;
        if position.owner != *caller {
            return Err(EngineError::UnauthorizedCaller);
        }
        Ok(position)
    }

    /// Swapped / unswapped amounts of `position` in O(1).
    ///
    /// With `s = min(performed_swaps, final_swap)`:
    /// `swapped = carry + (accum[s] − accum[last_updated]) × rate / magnitude_in`
    /// and `unswapped = rate × (final_swap − s)`.
    pub fn accrual(&self, position: &Position) -> EngineResult<Accrual> {
        let Some(key) = position.schedule_key() else {
            return Ok(Accrual {
                swapped: position.swapped_carry,
                settled_swap: position.last_updated_swap,
                ..Default::default()
            });
        };

        let performed = self.view.schedule(&key).performed_swaps;
        let settled = performed.min(position.final_swap);
        let gained = sub(
            self.view.accum_ratio(&key, settled),
            self.view.accum_ratio(&key, position.last_updated_swap),
        )?;
        let magnitude_in = self.settings.magnitude(&position.token_in)?;

        let swaps_left = position.final_swap - settled;
        let unswapped = position
            .rate
            .checked_mul(u128::from(swaps_left))
            .ok_or(EngineError::MathOverflow)?;

        Ok(Accrual {
            swapped: add(position.swapped_carry, mul_div(gained, position.rate, magnitude_in)?)?,
            unswapped,
            swaps_executed: (settled + 1).saturating_sub(position.starting_swap),
            swaps_left,
            settled_swap: settled,
        })
    }

    /// Summary of position `id`
    pub fn details(&self, id: PositionId) -> EngineResult<PositionDetails> {
        let position = self.view.position(id).ok_or(EngineError::InvalidPosition(id))?;
        let accrual = self.accrual(position)?;
        Ok(PositionDetails {
            id,
            owner: position.owner,
            token_in: position.token_in,
            token_out: position.token_out,
            cadence: position.cadence,
            rate: position.rate,
            swaps_executed: accrual.swaps_executed,
            swaps_left: accrual.swaps_left,
            swapped: accrual.swapped,
            unswapped: accrual.unswapped,
        })
    }

    /// Plan opening a position
    pub fn plan_create(
        &self,
        owner: Address,
        request: CreatePosition,
        now: DateTime<Utc>,
    ) -> EngineResult<PositionPlan> {
        if self.settings.is_paused() {
            return Err(EngineError::Paused);
        }
        if request.token_in.is_zero() || request.token_out.is_zero() {
            return Err(EngineError::ZeroAddress);
        }

        let is_native = request.token_in.is_native();
        if is_native && request.native_value != request.amount {
            return Err(EngineError::InvalidAmount);
        }
        if !is_native && request.native_value != 0 {
            return Err(EngineError::InvalidAmount);
        }

        let token_in = self.settings.resolve_token(request.token_in);
        let token_out = self.settings.resolve_token(request.token_out);
        if token_in == token_out {
            return Err(EngineError::InvalidToken);
        }
        if !self.settings.is_token_allowed(&token_in) || !self.settings.is_token_allowed(&token_out) {
            return Err(EngineError::UnallowedToken);
        }
        if request.amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        if request.num_swaps == 0 {
            return Err(EngineError::ZeroSwaps);
        }

        let cadence = Cadence::from_seconds(request.interval_secs)?;
        if !self.settings.allowed_cadences().contains(cadence) {
            return Err(EngineError::IntervalNotAllowed);
        }

        let rate = request.amount / u128::from(request.num_swaps);
        if rate == 0 {
            return Err(EngineError::InvalidRate);
        }

        let pair = PairKey::new(token_in, token_out);
        let key = ScheduleKey::new(pair, cadence);
        let state = self.view.schedule(&key);
        let performed = state.performed_swaps;
        let final_swap = performed
            .checked_add(request.num_swaps)
            .ok_or(EngineError::MathOverflow)?;
        let position_id = self.view.total_positions() + 1;

        let position = Position {
            id: position_id,
            owner,
            token_in,
            token_out,
            cadence: Some(cadence),
            rate,
            starting_swap: performed + 1,
            final_swap,
            last_updated_swap: performed,
            swapped_carry: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(
            position_id,
            schedule = %key,
            rate,
            final_swap,
            "Planning position creation"
        );

        let schedules = self.schedules();
        let mut writes = vec![LedgerWrite::InsertPosition(position)];
        writes.extend(schedules.plan_contribution(key, rate, final_swap)?);
        writes.extend(schedules.plan_active_flag(key, add(state.next_amount_to_swap, rate)?));

        let funding = if is_native {
            Funding::Native
        } else {
            request.approval.map_or(Funding::Allowance, Funding::Permit)
        };

        Ok(PositionPlan {
            position_id,
            writes,
            transfers: vec![Transfer::Pull {
                token: token_in,
                from: owner,
                amount: request.amount,
                funding,
            }],
            event: Event::Created {
                owner,
                position_id,
                token_in,
                token_out,
                cadence,
                rate,
                starting_swap: performed + 1,
                final_swap,
                is_native,
                timestamp: now,
            },
        })
    }

    /// Plan changing the remainder and length of a position.
    ///
    /// The unswapped remainder is re-spread over `new_num_swaps` batches
    /// starting with the next one. A remainder of zero forces the length to
    /// zero whatever the caller asked for.
    pub fn plan_modify(
        &self,
        caller: Address,
        request: ModifyPosition,
        now: DateTime<Utc>,
    ) -> EngineResult<PositionPlan> {
        let position = self.owned_position(request.position_id, &caller)?;
        let key = position
            .schedule_key()
            .ok_or(EngineError::InvalidPosition(request.position_id))?;

        if request.is_increase {
            if self.settings.is_paused() {
                return Err(EngineError::Paused);
            }
            if !self.settings.is_token_allowed(&position.token_in)
                || !self.settings.is_token_allowed(&position.token_out)
            {
                return Err(EngineError::UnallowedToken);
            }
        }

        if request.use_native && position.token_in != self.settings.wrapped_native() {
            return Err(EngineError::NotWNativeToken);
        }
        let expected_native = if request.use_native && request.is_increase {
            request.delta_amount
        } else {
            0
        };
        if request.native_value != expected_native {
            return Err(EngineError::InvalidAmount);
        }

        let accrual = self.accrual(position)?;
        let new_amount = if request.is_increase {
            add(accrual.unswapped, request.delta_amount)?
        } else {
            accrual
                .unswapped
                .checked_sub(request.delta_amount)
                .ok_or(EngineError::InvalidAmount)?
        };

        let (new_rate, new_num_swaps) = if new_amount == 0 {
            (0, 0)
        } else {
            if request.new_num_swaps == 0 {
                return Err(EngineError::ZeroSwaps);
            }
            let rate = new_amount / u128::from(request.new_num_swaps);
            if rate == 0 {
                return Err(EngineError::InvalidRate);
            }
            (rate, request.new_num_swaps)
        };

        let state = self.view.schedule(&key);
        let performed = state.performed_swaps;
        let new_final_swap = performed
            .checked_add(new_num_swaps)
            .ok_or(EngineError::MathOverflow)?;

        let schedules = self.schedules();
        let retraction = schedules.plan_retraction(key, position.rate, position.final_swap)?;
        let retracted = if retraction.is_empty() { 0 } else { position.rate };
        let next_amount = add(sub(state.next_amount_to_swap, retracted)?, new_rate)?;

        debug!(
            position_id = request.position_id,
            schedule = %key,
            old_rate = position.rate,
            new_rate,
            new_final_swap,
            "Planning position modification"
        );

        let updated = Position {
            rate: new_rate,
            starting_swap: performed + 1,
            final_swap: new_final_swap,
            last_updated_swap: performed,
            swapped_carry: accrual.swapped,
            updated_at: now,
            ..position.clone()
        };

        let mut writes = retraction;
        writes.extend(schedules.plan_contribution(key, new_rate, new_final_swap)?);
        writes.extend(schedules.plan_active_flag(key, next_amount));
        writes.push(LedgerWrite::UpdatePosition(updated));

        let mut transfers = Vec::new();
        if request.delta_amount > 0 {
            if request.is_increase {
                let funding = if request.use_native {
                    Funding::Native
                } else {
                    request.approval.map_or(Funding::Allowance, Funding::Permit)
                };
                transfers.push(Transfer::Pull {
                    token: position.token_in,
                    from: caller,
                    amount: request.delta_amount,
                    funding,
                });
            } else {
                transfers.push(Transfer::Push {
                    token: position.token_in,
                    to: caller,
                    amount: request.delta_amount,
                    unwrap_native: request.use_native,
                });
            }
        }

        Ok(PositionPlan {
            position_id: request.position_id,
            writes,
            transfers,
            event: Event::Modified {
                owner: caller,
                position_id: request.position_id,
                rate: new_rate,
                starting_swap: performed + 1,
                final_swap: new_final_swap,
                is_increase: request.is_increase,
                is_native: request.use_native,
                timestamp: now,
            },
        })
    }

    /// Plan closing a position, paying out both legs
    pub fn plan_terminate(
        &self,
        caller: Address,
        request: TerminatePosition,
        now: DateTime<Utc>,
    ) -> EngineResult<PositionPlan> {
        let position = self.owned_position(request.position_id, &caller)?;
        let key = position
            .schedule_key()
            .ok_or(EngineError::InvalidPosition(request.position_id))?;

        if request.swapped_recipient.is_zero() || request.unswapped_recipient.is_zero() {
            return Err(EngineError::ZeroAddress);
        }

        let wrapped_native = self.settings.wrapped_native();
        let unwrap_in = request.use_native && position.token_in == wrapped_native;
        let unwrap_out = request.use_native && position.token_out == wrapped_native;
        if request.use_native && !unwrap_in && !unwrap_out {
            return Err(EngineError::NotWNativeToken);
        }

        let accrual = self.accrual(position)?;
        let state = self.view.schedule(&key);

        let schedules = self.schedules();
        let retraction = schedules.plan_retraction(key, position.rate, position.final_swap)?;
        let retracted = if retraction.is_empty() { 0 } else { position.rate };
        let next_amount = sub(state.next_amount_to_swap, retracted)?;

        debug!(
            position_id = request.position_id,
            schedule = %key,
            swapped = accrual.swapped,
            unswapped = accrual.unswapped,
            "Planning position termination"
        );

        let closed = Position {
            cadence: None,
            rate: 0,
            final_swap: accrual.settled_swap,
            last_updated_swap: accrual.settled_swap,
            swapped_carry: 0,
            updated_at: now,
            ..position.clone()
        };

        let mut writes = retraction;
        writes.extend(schedules.plan_active_flag(key, next_amount));
        writes.push(LedgerWrite::UpdatePosition(closed));

        let mut transfers = Vec::with_capacity(2);
        if accrual.swapped > 0 {
            transfers.push(Transfer::Push {
                token: position.token_out,
                to: request.swapped_recipient,
                amount: accrual.swapped,
                unwrap_native: unwrap_out,
            });
        }
        if accrual.unswapped > 0 {
            transfers.push(Transfer::Push {
                token: position.token_in,
                to: request.unswapped_recipient,
                amount: accrual.unswapped,
                unwrap_native: unwrap_in,
            });
        }

        Ok(PositionPlan {
            position_id: request.position_id,
            writes,
            transfers,
            event: Event::Terminated {
                owner: caller,
                position_id: request.position_id,
                swapped_recipient: request.swapped_recipient,
                unswapped_recipient: request.unswapped_recipient,
                swapped: accrual.swapped,
                unswapped: accrual.unswapped,
                is_native: request.use_native,
                timestamp: now,
            },
        })
    }

    /// Plan paying out the swapped proceeds of a position
    pub fn plan_withdraw(
        &self,
        caller: Address,
        request: WithdrawSwapped,
        now: DateTime<Utc>,
    ) -> EngineResult<PositionPlan> {
        let position = self.owned_position(request.position_id, &caller)?;

        if request.recipient.is_zero() {
            return Err(EngineError::ZeroAddress);
        }
        if request.use_native && position.token_out != self.settings.wrapped_native() {
            return Err(EngineError::NotWNativeToken);
        }

        let accrual = self.accrual(position)?;
        if accrual.swapped == 0 {
            return Err(EngineError::ZeroSwappedAmount);
        }

        let updated = Position {
            last_updated_swap: accrual.settled_swap,
            swapped_carry: 0,
            updated_at: now,
            ..position.clone()
        };

        Ok(PositionPlan {
            position_id: request.position_id,
            writes: vec![LedgerWrite::UpdatePosition(updated)],
            transfers: vec![Transfer::Push {
                token: position.token_out,
                to: request.recipient,
                amount: accrual.swapped,
                unwrap_native: request.use_native,
            }],
            event: Event::Withdrew {
                owner: caller,
                position_id: request.position_id,
                recipient: request.recipient,
                token: position.token_out,
                amount: accrual.swapped,
                is_native: request.use_native,
                timestamp: now,
            },
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
