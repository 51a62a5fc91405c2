//! DCA Vault Domain Layer
//!
//! Pure domain types with zero I/O dependencies: value objects, position and
//! schedule entities, domain events, and the ledger read/write vocabulary
//! shared by the engine and the store.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod events;
pub mod ledger;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{PairKey, Position, PositionId, ScheduleKey, ScheduleState};
pub use events::{BatchSummary, Event};
pub use ledger::{LedgerView, LedgerWrite};
pub use value_objects::{
    Address, ApprovalProof, Bps, Cadence, CadenceSet, DomainError, Price, BPS_DENOMINATOR,
};
