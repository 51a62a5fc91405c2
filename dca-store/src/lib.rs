//! DCA Vault Storage Layer
//!
//! Persists positions, schedule ledgers and the event log.
//!
//! # Architecture
//!
//! - **`LedgerStore` trait**: storage interface (port) applying ledger writes
//! - **`Transaction`**: undo journal, rolled back on drop unless committed
//! - **In-memory store**: `MemoryStore`
//!
//! # Usage
//!
//! ```rust
//! use dca_domain::{Address, Cadence, LedgerView, LedgerWrite, PairKey, ScheduleKey};
//! use dca_store::{MemoryStore, Transaction};
//!
//! let mut store = MemoryStore::new();
//! let key = ScheduleKey::new(
//!     PairKey::new(Address::from_low_u64(1), Address::from_low_u64(2)),
//!     Cadence::OneDay,
//! );
//!
//! let mut tx = Transaction::begin(&mut store);
//! tx.apply(&LedgerWrite::CreditDueAmount { key, amount: 10 }).unwrap();
//! tx.commit();
//!
//! assert_eq!(store.schedule(&key).next_amount_to_swap, 10);
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
pub use repository::{LedgerStore, StoredEvent, Transaction, UndoEntry};
