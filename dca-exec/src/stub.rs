//! Stub implementations for testing.
//!
//! These implementations simulate token custody, an exchange, a price feed,
//! approval signing and time without touching a real chain.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use dca_domain::{Address, ApprovalProof, PairKey, Price};

use crate::error::GatewayError;
use crate::ports::{
    ApprovalRequest, ApprovalVerifier, Clock, ExchangeGateway, ExchangeRequest, PriceFeed,
    PriceQuote, PullAuthorization, TokenGateway,
};

// =============================================================================
// Stub Tokens
// =============================================================================

#[derive(Debug, Clone, Default)]
struct TokenBook {
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
    native: HashMap<Address, u128>,
}

impl TokenBook {
    fn ensure_known(&self, token: &Address) -> Result<(), GatewayError> {
        if self.decimals.contains_key(token) {
            Ok(())
        } else {
            Err(GatewayError::UnknownToken(*token))
        }
    }

    fn debit(&mut self, token: &Address, holder: &Address, amount: u128) -> Result<(), GatewayError> {
        self.ensure_known(token)?;
        let balance = self.balances.entry((*token, *holder)).or_default();
        if *balance < amount {
            return Err(GatewayError::InsufficientBalance {
                token: *token,
                holder: *holder,
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, token: &Address, holder: &Address, amount: u128) {
        *self.balances.entry((*token, *holder)).or_default() += amount;
    }
}

/// Stub token custody.
///
/// Balances, allowances and native balances live in memory. `begin`
/// snapshots the book and `rollback` restores it.
pub struct StubTokens {
    wrapped_native: Address,
    book: RwLock<TokenBook>,
    checkpoint: RwLock<Option<TokenBook>>,
}

impl StubTokens {
    /// Create an empty book; `wrapped_native` is registered with 18 decimals.
    pub fn new(wrapped_native: Address) -> Self {
        let mut book = TokenBook::default();
        book.decimals.insert(wrapped_native, 18);
        Self {
            wrapped_native,
            book: RwLock::new(book),
            checkpoint: RwLock::new(None),
        }
    }

    /// Register a token
    pub fn register(&self, token: Address, decimals: u8) {
        self.book.write().unwrap().decimals.insert(token, decimals);
    }

    /// Credit `holder` with freshly minted tokens
    pub fn mint(&self, token: Address, holder: Address, amount: u128) {
        self.book.write().unwrap().credit(&token, &holder, amount);
    }

    /// Set the allowance `owner` grants `spender`
    pub fn approve(&self, token: Address, owner: Address, spender: Address, amount: u128) {
        self.book
            .write()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
    }

    /// Credit `holder` with native asset
    pub fn fund_native(&self, holder: Address, amount: u128) {
        *self.book.write().unwrap().native.entry(holder).or_default() += amount;
    }

    /// Native balance of `holder`
    pub fn native_balance_of(&self, holder: &Address) -> u128 {
        self.book.read().unwrap().native.get(holder).copied().unwrap_or_default()
    }

    /// Allowance `owner` grants `spender`
    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128 {
        self.book
            .read()
            .unwrap()
            .allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or_default()
    }
}

impl TokenGateway for StubTokens {
    fn decimals(&self, token: &Address) -> Result<u8, GatewayError> {
        self.book
            .read()
            .unwrap()
            .decimals
            .get(token)
            .copied()
            .ok_or(GatewayError::UnknownToken(*token))
    }

    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        self.book
            .read()
            .unwrap()
            .balances
            .get(&(*token, *holder))
            .copied()
            .unwrap_or_default()
    }

    fn transfer_from(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
        authorization: PullAuthorization,
    ) -> Result<(), GatewayError> {
        let mut book = self.book.write().unwrap();
        if authorization == PullAuthorization::Allowance {
            let allowance = book.allowances.get(&(*token, *from, *to)).copied().unwrap_or_default();
            if allowance < amount {
                return Err(GatewayError::InsufficientAllowance {
                    token: *token,
                    owner: *from,
                    needed: amount,
                    available: allowance,
                });
            }
            book.allowances.insert((*token, *from, *to), allowance - amount);
        }
        book.debit(token, from, amount)?;
        book.credit(token, to, amount);
        Ok(())
    }

    fn transfer(
        &self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), GatewayError> {
        let mut book = self.book.write().unwrap();
        book.debit(token, from, amount)?;
        book.credit(token, to, amount);
        Ok(())
    }

    fn wrap_native(&self, from: &Address, to: &Address, amount: u128) -> Result<(), GatewayError> {
        let mut book = self.book.write().unwrap();
        let native = book.native.entry(*from).or_default();
        if *native < amount {
            return Err(GatewayError::InsufficientBalance {
                token: Address::NATIVE,
                holder: *from,
                needed: amount,
                available: *native,
            });
        }
        *native -= amount;
        book.credit(&self.wrapped_native, to, amount);
        Ok(())
    }

    fn unwrap_native(&self, from: &Address, to: &Address, amount: u128) -> Result<(), GatewayError> {
        let mut book = self.book.write().unwrap();
        book.debit(&self.wrapped_native, from, amount)?;
        *book.native.entry(*to).or_default() += amount;
        Ok(())
    }

    fn begin(&self) {
        let snapshot = self.book.read().unwrap().clone();
        *self.checkpoint.write().unwrap() = Some(snapshot);
    }

    fn commit(&self) {
        self.checkpoint.write().unwrap().take();
    }

    fn rollback(&self) {
        if let Some(snapshot) = self.checkpoint.write().unwrap().take() {
            *self.book.write().unwrap() = snapshot;
        }
    }
}

// =============================================================================
// Stub Exchange
// =============================================================================

/// Stub exchange for testing.
///
/// Fills every order completely at a configured rate, expressed as whole
/// `dst_token` per whole `src_token`.
pub struct StubExchange {
    tokens: Arc<StubTokens>,
    /// Account holding the exchange's inventory
    account: Address,
    /// Rates by pair
    rates: RwLock<HashMap<PairKey, Decimal>>,
    /// Rate for pairs without an explicit one
    default_rate: Decimal,
    /// Whether to simulate a failure on the next call
    fail_next: RwLock<bool>,
}

impl StubExchange {
    /// Create a stub exchange settling through `tokens`
    pub fn new(tokens: Arc<StubTokens>, account: Address, default_rate: Decimal) -> Self {
        Self {
            tokens,
            account,
            rates: RwLock::new(HashMap::new()),
            default_rate,
            fail_next: RwLock::new(false),
        }
    }

    /// Set the rate for a pair
    pub fn set_rate(&self, pair: PairKey, rate: Decimal) {
        self.rates.write().unwrap().insert(pair, rate);
    }

    /// Configure the next call to fail.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().unwrap() = fail;
    }

    fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write().unwrap();
        let fail = *fail_next;
        *fail_next = false;
        fail
    }

    /// Output for `amount` of `pair.token_in` at the configured rate
    pub fn quote(&self, pair: PairKey, amount: u128) -> Result<u128, GatewayError> {
        let rate = self.rates.read().unwrap().get(&pair).copied().unwrap_or(self.default_rate);
        let decimals_in = self.tokens.decimals(&pair.token_in)?;
        let decimals_out = self.tokens.decimals(&pair.token_out)?;

        let overflow = || GatewayError::Exchange(format!("quote overflow for {amount} on {pair}"));
        let amount = i128::try_from(amount).map_err(|_| overflow())?;
        let whole_in = Decimal::try_from_i128_with_scale(amount, u32::from(decimals_in))
            .map_err(|_| overflow())?;
        let whole_out = whole_in.checked_mul(rate).ok_or_else(overflow)?;
        let scale = 10u64.checked_pow(u32::from(decimals_out)).ok_or_else(overflow)?;
        let base_out = whole_out.checked_mul(Decimal::from(scale)).ok_or_else(overflow)?;
        base_out.trunc().to_u128().ok_or_else(overflow)
    }
}

impl ExchangeGateway for StubExchange {
    fn execute(&self, request: &ExchangeRequest) -> Result<(), GatewayError> {
        if self.should_fail() {
            return Err(GatewayError::Exchange("Simulated exchange failure".to_string()));
        }

        let descriptor = &request.descriptor;
        let output = self.quote(descriptor.pair(), descriptor.amount)?;

        self.tokens
            .transfer(&descriptor.src_token, &request.vault, &self.account, descriptor.amount)?;
        self.tokens.mint(descriptor.dst_token, request.vault, output);

        tracing::debug!(
            pair = %descriptor.pair(),
            amount_in = descriptor.amount,
            amount_out = output,
            "Stub: exchange filled"
        );
        Ok(())
    }
}

// =============================================================================
// Stub Price Feed
// =============================================================================

/// Stub price feed with quotes set by the test
pub struct StubPriceFeed {
    id: Address,
    clock: Arc<dyn Clock>,
    quotes: RwLock<HashMap<Address, PriceQuote>>,
}

impl StubPriceFeed {
    /// Create an empty feed
    pub fn new(id: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            clock,
            quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Publish `price` for `token` at the clock's current time
    pub fn set_price(&self, token: Address, price: Price) {
        let updated_at = self.clock.now();
        self.set_quote(token, PriceQuote { price, updated_at });
    }

    /// Publish a quote with an explicit publication time
    pub fn set_quote(&self, token: Address, quote: PriceQuote) {
        self.quotes.write().unwrap().insert(token, quote);
    }
}

impl PriceFeed for StubPriceFeed {
    fn id(&self) -> Address {
        self.id
    }

    fn latest_price(&self, token: &Address) -> Result<PriceQuote, GatewayError> {
        self.quotes
            .read()
            .unwrap()
            .get(token)
            .copied()
            .ok_or(GatewayError::PriceUnavailable(*token))
    }
}

// =============================================================================
// Stub Approvals
// =============================================================================

/// Stub approval signer / verifier.
///
/// A proof's signature is a deterministic encoding of everything it commits
/// to; nonces are single use per owner.
#[derive(Default)]
pub struct StubApprovals {
    used: RwLock<HashSet<(Address, u64)>>,
    checkpoint: RwLock<Option<HashSet<(Address, u64)>>>,
}

impl StubApprovals {
    /// Create a verifier with no used nonces
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a proof `owner` would sign
    pub fn issue(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
        amount: u128,
        nonce: u64,
        deadline: DateTime<Utc>,
    ) -> ApprovalProof {
        ApprovalProof {
            nonce,
            deadline,
            signature: Self::signature(&owner, &spender, &token, amount, nonce, deadline),
        }
    }

    fn signature(
        owner: &Address,
        spender: &Address,
        token: &Address,
        amount: u128,
        nonce: u64,
        deadline: DateTime<Utc>,
    ) -> Vec<u8> {
        format!("{owner}:{spender}:{token}:{amount}:{nonce}:{}", deadline.timestamp()).into_bytes()
    }
}

impl ApprovalVerifier for StubApprovals {
    fn verify(&self, request: &ApprovalRequest) -> bool {
        let proof = &request.proof;
        let expected = Self::signature(
            &request.owner,
            &request.spender,
            &request.token,
            request.amount,
            proof.nonce,
            proof.deadline,
        );
        if proof.signature != expected || proof.deadline < request.now {
            return false;
        }
        self.used.write().unwrap().insert((request.owner, proof.nonce))
    }

    fn begin(&self) {
        let snapshot = self.used.read().unwrap().clone();
        *self.checkpoint.write().unwrap() = Some(snapshot);
    }

    fn commit(&self) {
        self.checkpoint.write().unwrap().take();
    }

    fn rollback(&self) {
        if let Some(snapshot) = self.checkpoint.write().unwrap().take() {
            *self.used.write().unwrap() = snapshot;
        }
    }
}

// =============================================================================
// Clocks
// =============================================================================

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock moved by hand
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(start) }
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        *self.now.write().unwrap() += by;
    }

    /// Jump to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

// =============================================================================
// Tests
// =============================================================================
