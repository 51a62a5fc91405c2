//! Shared harness for vault integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use dca_domain::{Address, BatchSummary, Cadence, PairKey, PositionId, Price, ScheduleKey};
use dca_engine::{CreatePosition, SwapDescriptor};
use dca_exec::{
    ExecResult, Gateways, ManualClock, StubApprovals, StubExchange, StubPriceFeed, StubTokens,
    TokenGateway, Vault, VaultConfig,
};
use dca_store::MemoryStore;

/// One whole 18-decimal token
pub const UNIT: u128 = 1_000_000_000_000_000_000;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

pub fn token_a() -> Address {
    addr(0xa)
}

pub fn token_b() -> Address {
    addr(0xb)
}

pub fn alice() -> Address {
    addr(0xa11ce)
}

pub fn bob() -> Address {
    addr(0xb0b)
}

pub fn keeper() -> Address {
    addr(0x4ee9)
}

pub fn exchange_account() -> Address {
    addr(0xe8)
}

pub fn pair_ab() -> PairKey {
    PairKey::new(token_a(), token_b())
}

pub fn daily_ab() -> ScheduleKey {
    ScheduleKey::new(pair_ab(), Cadence::OneDay)
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Vault wired to in-memory gateways.
///
/// Tokens A and B (18 decimals) and the wrapped native token are allowed
/// and priced 1:1; the exchange fills at 1:1 unless told otherwise.
pub struct Harness {
    pub config: VaultConfig,
    pub vault: Vault,
    pub tokens: Arc<StubTokens>,
    pub exchange: Arc<StubExchange>,
    pub oracle: Arc<StubPriceFeed>,
    pub approvals: Arc<StubApprovals>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();

        let config = VaultConfig::test();
        let clock = Arc::new(ManualClock::new(Self::start()));
        let tokens = Arc::new(StubTokens::new(config.wrapped_native));
        tokens.register(token_a(), 18);
        tokens.register(token_b(), 18);

        let exchange = Arc::new(StubExchange::new(tokens.clone(), exchange_account(), dec!(1)));
        let oracle = Arc::new(StubPriceFeed::new(addr(0x0c), clock.clone()));
        let approvals = Arc::new(StubApprovals::new());

        let vault = Vault::new(
            &config,
            MemoryStore::new(),
            Gateways {
                tokens: tokens.clone(),
                exchange: exchange.clone(),
                oracle: oracle.clone(),
                approvals: approvals.clone(),
                clock: clock.clone(),
            },
        )
        .unwrap();
        vault
            .add_allowed_tokens(config.governor, &[token_a(), token_b(), config.wrapped_native])
            .unwrap();

        let harness = Self { config, vault, tokens, exchange, oracle, approvals, clock };
        harness.publish_prices();
        harness
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    pub fn governor(&self) -> Address {
        self.config.governor
    }

    pub fn vault_address(&self) -> Address {
        self.config.vault_address
    }

    pub fn wrapped(&self) -> Address {
        self.config.wrapped_native
    }

    /// Publish 1:1 prices at the current time
    pub fn publish_prices(&self) {
        for token in [token_a(), token_b(), self.wrapped()] {
            self.oracle.set_price(token, Price::new(Decimal::ONE).unwrap());
        }
    }

    /// Move time forward one cadence and refresh prices
    pub fn advance(&self, cadence: Cadence) {
        self.clock.advance(cadence.duration());
        self.publish_prices();
    }

    /// Mint `amount` to `owner` and approve the vault for it
    pub fn fund(&self, owner: Address, token: Address, amount: u128) {
        self.tokens.mint(token, owner, amount);
        let allowance = self.tokens.allowance(&token, &owner, &self.vault_address());
        self.tokens.approve(token, owner, self.vault_address(), allowance + amount);
    }

    pub fn balance(&self, token: Address, holder: Address) -> u128 {
        self.tokens.balance_of(&token, &holder)
    }

    pub fn create_request(amount: u128, num_swaps: u64, cadence: Cadence) -> CreatePosition {
        CreatePosition {
            token_in: token_a(),
            token_out: token_b(),
            amount,
            num_swaps,
            interval_secs: cadence.seconds(),
            approval: None,
            native_value: 0,
        }
    }

    /// Fund `owner` and open an A → B position
    pub fn open(&self, owner: Address, amount: u128, num_swaps: u64, cadence: Cadence) -> PositionId {
        self.fund(owner, token_a(), amount);
        self.vault
            .create_position(owner, Self::create_request(amount, num_swaps, cadence))
            .unwrap()
    }

    /// Descriptor matching what is due for `pair` right now
    pub fn descriptor(&self, pair: PairKey) -> SwapDescriptor {
        let info = self.vault.next_swap_info(&[pair]).unwrap().remove(0);
        SwapDescriptor {
            executor: exchange_account(),
            src_token: pair.token_in,
            dst_token: pair.token_out,
            dst_receiver: self.vault_address(),
            amount: info.swap_amount,
            min_return_amount: 0,
            flags: 0,
            route_data: Vec::new(),
        }
    }

    /// Execute the due A → B batch
    pub fn swap(&self) -> ExecResult<Vec<BatchSummary>> {
        self.vault.swap(keeper(), &[self.descriptor(pair_ab())], keeper())
    }

    /// Advance one cadence and execute the batch, `times` times
    pub fn run_batches(&self, cadence: Cadence, times: usize) {
        for _ in 0..times {
            self.advance(cadence);
            self.swap().unwrap();
        }
    }
}
