//! Stock ledger (append-only quantity ledger per item and location).
//!
//! Pure domain logic only: entry shapes, balance folding, compensating legs and
//! category allocation. Storage and locking live in the infrastructure crate.

pub mod allocation;
pub mod balance;
pub mod entry;
pub mod reversal;

pub use allocation::{AllocationLine, Candidate, CategoryAllocation, CategoryAllocator};
pub use balance::{fold_balance, verify_snapshots};
pub use entry::{
    DocumentRef, LedgerKey, LedgerPosting, MovementKind, ReferenceKind, StockLedgerEntry,
    TransactionType,
};
pub use reversal::reversal_postings;
