//! Stock-moving components. Each works inside a caller-owned
//! [`StockTransaction`](crate::transaction::StockTransaction): it validates, stages
//! postings and aggregate events, and leaves the commit to the caller.

pub mod claims;
pub mod consumption;
pub mod documents;
pub mod receipts;
pub mod remaining;
pub mod repacking;
pub mod reversal;

pub use claims::{Claimed, Claims};
pub use consumption::ConsumptionEngine;
pub use documents::DocumentLifecycle;
pub use receipts::StockReceiver;
pub use remaining::RemainingQuantityTracker;
pub use repacking::RepackingService;
pub use reversal::ReversalEngine;

/// Stream type names; stable once events were stored under them.
pub const BATCH_AGGREGATE: &str = "production.batch";
pub const REPACKING_AGGREGATE: &str = "production.repacking";
pub const TRANSFER_AGGREGATE: &str = "documents.transfer";
