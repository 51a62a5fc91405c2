//! Vault service.
//!
//! Serializes every operation behind one state lock. A mutating operation:
//! 1. Plans against the current ledger (pure, may fail without side effects)
//! 2. Opens a store transaction plus token and approval checkpoints
//! 3. Applies the ledger writes before any external call
//! 4. Moves tokens / calls the exchange
//! 5. Records the event and commits, or rolls both back on any error

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use dca_domain::{
    Address, BatchSummary, CadenceSet, Event, LedgerView, PairKey, PositionId, Price, ScheduleKey,
    ScheduleState,
};
use dca_engine::{
    next_swap_info, BatchPlan, CreatePosition, EngineError, Funding, IntervalScheduleLedger,
    ModifyPosition, NextSwapInfo, PositionDetails, PositionLedger, PositionPlan, ReturnCheck,
    SwapDescriptor, TerminatePosition, Transfer, VaultSettings, WithdrawSwapped,
};
use dca_store::{LedgerStore, MemoryStore, StoredEvent, Transaction};

use crate::config::VaultConfig;
use crate::error::{ExecError, ExecResult};
use crate::ports::{
    ApprovalRequest, ApprovalVerifier, Clock, ExchangeGateway, ExchangeRequest, PriceFeed,
    PullAuthorization, TokenGateway,
};

/// External collaborators of a vault
#[derive(Clone)]
pub struct Gateways {
    /// Token custody
    pub tokens: Arc<dyn TokenGateway>,
    /// Exchange used by batches
    pub exchange: Arc<dyn ExchangeGateway>,
    /// Price feed used by the return check
    pub oracle: Arc<dyn PriceFeed>,
    /// Signed approval verifier
    pub approvals: Arc<dyn ApprovalVerifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

pub(crate) struct VaultState<S> {
    pub(crate) store: S,
    pub(crate) settings: VaultSettings,
    pub(crate) oracle: Arc<dyn PriceFeed>,
}

/// Recurring-swap vault
pub struct Vault<S: LedgerStore = MemoryStore> {
    state: RwLock<VaultState<S>>,
    pub(crate) tokens: Arc<dyn TokenGateway>,
    exchange: Arc<dyn ExchangeGateway>,
    approvals: Arc<dyn ApprovalVerifier>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> Vault<S> {
    /// Create a vault over `store`
    pub fn new(config: &VaultConfig, store: S, gateways: Gateways) -> ExecResult<Self> {
        let settings = VaultSettings::new(config.settings_init(gateways.oracle.id())?)?;

        info!(
            governor = %config.governor,
            vault = %config.vault_address,
            swap_fee_bps = config.swap_fee_bps,
            "Vault initialised"
        );

        Ok(Self {
            state: RwLock::new(VaultState {
                store,
                settings,
                oracle: gateways.oracle,
            }),
            tokens: gateways.tokens,
            exchange: gateways.exchange,
            approvals: gateways.approvals,
            clock: gateways.clock,
        })
    }

    pub(crate) fn read_state(&self) -> ExecResult<RwLockReadGuard<'_, VaultState<S>>> {
        self.state.read().map_err(|_| ExecError::StatePoisoned)
    }

    pub(crate) fn write_state(&self) -> ExecResult<RwLockWriteGuard<'_, VaultState<S>>> {
        self.state.write().map_err(|_| ExecError::StatePoisoned)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Position operations
    // =========================================================================

    /// Open a position, escrowing the full amount
    pub fn create_position(&self, caller: Address, request: CreatePosition) -> ExecResult<PositionId> {
        let plan = self.run_position_plan("create_position", |positions, now| {
            positions.plan_create(caller, request, now)
        })?;

        info!(position_id = plan.position_id, owner = %caller, "Position created");
        Ok(plan.position_id)
    }

    /// Change the remainder and length of a position
    pub fn modify_position(&self, caller: Address, request: ModifyPosition) -> ExecResult<()> {
        let plan = self.run_position_plan("modify_position", |positions, now| {
            positions.plan_modify(caller, request, now)
        })?;

        info!(position_id = plan.position_id, owner = %caller, "Position modified");
        Ok(())
    }

    /// Close a position, paying out both legs
    pub fn terminate(&self, caller: Address, request: TerminatePosition) -> ExecResult<()> {
        let plan = self.run_position_plan("terminate", |positions, now| {
            positions.plan_terminate(caller, request, now)
        })?;

        info!(position_id = plan.position_id, owner = %caller, "Position terminated");
        Ok(())
    }

    /// Pay out the swapped proceeds of a position, returning the amount paid
    pub fn withdraw_swapped(&self, caller: Address, request: WithdrawSwapped) -> ExecResult<u128> {
        let plan = self.run_position_plan("withdraw_swapped", |positions, now| {
            positions.plan_withdraw(caller, request, now)
        })?;

        let amount: u128 = plan
            .transfers
            .iter()
            .map(|transfer| match transfer {
                Transfer::Push { amount, .. } | Transfer::Pull { amount, .. } => *amount,
            })
            .sum();

        info!(position_id = plan.position_id, owner = %caller, amount, "Proceeds withdrawn");
        Ok(amount)
    }

    fn run_position_plan<F>(&self, operation: &'static str, plan: F) -> ExecResult<PositionPlan>
    where
        F: FnOnce(&PositionLedger<'_, S>, DateTime<Utc>) -> Result<PositionPlan, EngineError>,
    {
        let now = self.now();
        let mut guard = self.write_state()?;
        let state = &mut *guard;

        let plan = plan(&PositionLedger::new(&state.store, &state.settings), now)?;

        self.tokens.begin();
        self.approvals.begin();
        match self.apply_position_plan(state, &plan, now) {
            Ok(()) => {
                self.tokens.commit();
                self.approvals.commit();
                Ok(plan)
            },
            Err(err) => {
                self.tokens.rollback();
                self.approvals.rollback();
                warn!(operation, position_id = plan.position_id, error = %err, "Operation rolled back");
                Err(err)
            },
        }
    }

    fn apply_position_plan(
        &self,
        state: &mut VaultState<S>,
        plan: &PositionPlan,
        now: DateTime<Utc>,
    ) -> ExecResult<()> {
        let vault = state.settings.vault_address();
        let mut tx = Transaction::begin(&mut state.store);

        tx.apply_all(&plan.writes)?;
        for transfer in &plan.transfers {
            self.perform(vault, transfer, now)?;
        }
        tx.emit(plan.event.clone());

        let entries = tx.commit();
        debug!(position_id = plan.position_id, entries, "Position plan committed");
        Ok(())
    }

    fn perform(&self, vault: Address, transfer: &Transfer, now: DateTime<Utc>) -> ExecResult<()> {
        match transfer {
            Transfer::Pull { token, from, amount, funding } => match funding {
                Funding::Allowance => {
                    self.tokens
                        .transfer_from(token, from, &vault, *amount, PullAuthorization::Allowance)?;
                },
                Funding::Permit(proof) => {
                    let request = ApprovalRequest {
                        owner: *from,
                        spender: vault,
                        token: *token,
                        amount: *amount,
                        proof: proof.clone(),
                        now,
                    };
                    if !self.approvals.verify(&request) {
                        return Err(EngineError::InvalidPermit.into());
                    }
                    self.tokens
                        .transfer_from(token, from, &vault, *amount, PullAuthorization::Permit)?;
                },
                Funding::Native => self.tokens.wrap_native(from, &vault, *amount)?,
            },
            Transfer::Push { token, to, amount, unwrap_native } => {
                if *unwrap_native {
                    self.tokens.unwrap_native(&vault, to, *amount)?;
                } else {
                    self.tokens.transfer(token, &vault, to, *amount)?;
                }
            },
        }
        Ok(())
    }

    // =========================================================================
    // Swap
    // =========================================================================

    /// Execute one batch per descriptor, in order.
    ///
    /// Permissionless. Each descriptor folds every due cadence of its pair
    /// into one exchange call; any failure rolls the whole call back.
    pub fn swap(
        &self,
        caller: Address,
        descriptors: &[SwapDescriptor],
        reward_recipient: Address,
    ) -> ExecResult<Vec<BatchSummary>> {
        if reward_recipient.is_zero() {
            return Err(EngineError::ZeroAddress.into());
        }
        if descriptors.is_empty() {
            return Err(EngineError::NoAvailableSwap.into());
        }

        let now = self.now();
        let mut guard = self.write_state()?;

        self.tokens.begin();
        match self.execute_batches(&mut guard, caller, descriptors, reward_recipient, now) {
            Ok(summaries) => {
                self.tokens.commit();
                info!(
                    sender = %caller,
                    reward_recipient = %reward_recipient,
                    batches = summaries.len(),
                    "Swap executed"
                );
                Ok(summaries)
            },
            Err(err) => {
                self.tokens.rollback();
                warn!(operation = "swap", sender = %caller, error = %err, "Operation rolled back");
                Err(err)
            },
        }
    }

    fn execute_batches(
        &self,
        state: &mut VaultState<S>,
        caller: Address,
        descriptors: &[SwapDescriptor],
        reward_recipient: Address,
        now: DateTime<Utc>,
    ) -> ExecResult<Vec<BatchSummary>> {
        let VaultState { store, settings, oracle } = state;
        let settings: &VaultSettings = settings;
        let vault = settings.vault_address();
        let mut tx = Transaction::begin(store);
        let mut summaries = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let plan = BatchPlan::prepare(tx.view(), settings, descriptor, now)?;
            let pair = plan.due.pair;
            let check = Self::return_check(settings, &**oracle, pair, descriptor.min_return_amount, now)?;

            // Counter, delta sweep and timestamp land before the exchange call
            tx.apply_all(&plan.advance)?;

            let before = self.tokens.balance_of(&pair.token_out, &vault);
            self.exchange.execute(&ExchangeRequest {
                descriptor: descriptor.clone(),
                vault,
            })?;
            let returned = self
                .tokens
                .balance_of(&pair.token_out, &vault)
                .checked_sub(before)
                .ok_or(EngineError::MathOverflow)?;
            check.verify(plan.fees.swap_amount, returned)?;

            let (ratio_writes, summary) =
                plan.settle(tx.view(), returned, settings.magnitude(&pair.token_in)?)?;
            tx.apply_all(&ratio_writes)?;

            if plan.fees.platform_fee > 0 {
                self.tokens
                    .transfer(&pair.token_in, &vault, &settings.fee_vault(), plan.fees.platform_fee)?;
            }
            if plan.fees.reward > 0 {
                self.tokens
                    .transfer(&pair.token_in, &vault, &reward_recipient, plan.fees.reward)?;
            }

            info!(
                pair = %pair,
                cadences = %summary.cadences,
                swap_amount = summary.swap_amount,
                received = returned,
                "Batch executed"
            );
            summaries.push(summary);
        }

        tx.emit(Event::Swapped {
            sender: caller,
            reward_recipient,
            swap_fee: settings.swap_fee(),
            batches: summaries.clone(),
            timestamp: now,
        });
        tx.commit();
        Ok(summaries)
    }

    fn return_check(
        settings: &VaultSettings,
        oracle: &dyn PriceFeed,
        pair: PairKey,
        min_return: u128,
        now: DateTime<Utc>,
    ) -> ExecResult<ReturnCheck> {
        Ok(ReturnCheck {
            price_in: Self::fresh_price(settings, oracle, &pair.token_in, now)?,
            price_out: Self::fresh_price(settings, oracle, &pair.token_out, now)?,
            magnitude_in: settings.magnitude(&pair.token_in)?,
            magnitude_out: settings.magnitude(&pair.token_out)?,
            slippage: settings.slippage(),
            min_return,
        })
    }

    fn fresh_price(
        settings: &VaultSettings,
        oracle: &dyn PriceFeed,
        token: &Address,
        now: DateTime<Utc>,
    ) -> ExecResult<Price> {
        let quote = oracle.latest_price(token)?;
        if now - quote.updated_at > settings.max_price_age() {
            return Err(EngineError::StalePrice { token: *token }.into());
        }
        Ok(quote.price)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Summary of a position (terminated positions included)
    pub fn get_position_details(&self, id: PositionId) -> ExecResult<PositionDetails> {
        let state = self.read_state()?;
        Ok(PositionLedger::new(&state.store, &state.settings).details(id)?)
    }

    /// Per pair: `Some(0)` if a batch is due, `Some(secs)` until the next one,
    /// `None` when no cadence is active
    pub fn seconds_until_next_swap(&self, pairs: &[PairKey]) -> ExecResult<Vec<Option<u64>>> {
        let now = self.now();
        let state = self.read_state()?;
        let schedules = IntervalScheduleLedger::new(&state.store);
        Ok(pairs
            .iter()
            .map(|pair| schedules.seconds_until_next(Self::resolve_pair(&state.settings, *pair), now))
            .collect())
    }

    /// Per pair: what a keeper would have to submit now
    pub fn next_swap_info(&self, pairs: &[PairKey]) -> ExecResult<Vec<NextSwapInfo>> {
        let now = self.now();
        let state = self.read_state()?;
        pairs
            .iter()
            .map(|pair| {
                let pair = Self::resolve_pair(&state.settings, *pair);
                Ok(next_swap_info(&state.store, &state.settings, pair, now)?)
            })
            .collect()
    }

    fn resolve_pair(settings: &VaultSettings, pair: PairKey) -> PairKey {
        PairKey::new(settings.resolve_token(pair.token_in), settings.resolve_token(pair.token_out))
    }

    /// Schedule header of a ledger
    pub fn schedule(&self, key: &ScheduleKey) -> ExecResult<ScheduleState> {
        Ok(self.read_state()?.store.schedule(key))
    }

    /// Delta bucket entry of a ledger
    pub fn delta_bucket(&self, key: &ScheduleKey, swap: u64) -> ExecResult<u128> {
        Ok(self.read_state()?.store.delta_bucket(key, swap))
    }

    /// Cumulative ratio entry of a ledger
    pub fn accum_ratio(&self, key: &ScheduleKey, swap: u64) -> ExecResult<u128> {
        Ok(self.read_state()?.store.accum_ratio(key, swap))
    }

    /// Active cadences of a pair
    pub fn active_cadences(&self, pair: &PairKey) -> ExecResult<CadenceSet> {
        Ok(self.read_state()?.store.active_cadences(pair))
    }

    /// Number of positions ever created
    pub fn total_positions(&self) -> ExecResult<u64> {
        Ok(self.read_state()?.store.total_positions())
    }

    /// Event log
    pub fn events(&self) -> ExecResult<Vec<StoredEvent>> {
        Ok(self.read_state()?.store.events_since(0))
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> ExecResult<VaultSettings> {
        Ok(self.read_state()?.settings.clone())
    }
}
