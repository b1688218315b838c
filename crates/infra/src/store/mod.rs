//! Persistence boundary: the stock ledger, aggregate streams and the stock cache,
//! committed together.
//!
//! A [`ChangeSet`] is applied all-or-nothing. Before applying, the store checks
//! that every ledger key the transaction read is still at the version it saw
//! (compare-and-set on the key's last entry) and that every aggregate stream is
//! still at its expected version.

pub mod in_memory;
pub mod stream;

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use plantflow_core::{AggregateId, ExpectedVersion, ItemId};
use plantflow_ledger::{LedgerKey, LedgerPosting, StockLedgerEntry};

pub use in_memory::InMemoryPlantStore;
pub use stream::{StoredEvent, UncommittedEvent, rehydrate};

use crate::error::StoreError;

/// Committed state of one ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    pub balance: Decimal,
    /// Number of entries posted to the key; bumps on every append.
    pub version: u64,
}

/// Events to append to one aggregate stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub expected: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

/// Everything one command writes, plus the key versions its decisions were based on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub reads: BTreeMap<LedgerKey, u64>,
    pub postings: Vec<LedgerPosting>,
    pub streams: Vec<StreamAppend>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty() && self.streams.iter().all(|s| s.events.is_empty())
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub entries: Vec<StockLedgerEntry>,
    pub events: Vec<StoredEvent>,
}

pub trait PlantStore: Send + Sync {
    fn key_state(&self, key: &LedgerKey) -> Result<KeyState, StoreError>;

    /// Stock card of one key, in append order.
    fn entries(&self, key: &LedgerKey) -> Result<Vec<StockLedgerEntry>, StoreError>;

    /// Every entry posted for a source document, in global sequence order.
    fn entries_for_reference(&self, reference: &AggregateId) -> Result<Vec<StockLedgerEntry>, StoreError>;

    /// Keys that ever held an entry for `item`.
    fn item_keys(&self, item: &ItemId) -> Result<Vec<LedgerKey>, StoreError>;

    /// Cached global (all-location) stock of `item`.
    fn cached_stock(&self, item: &ItemId) -> Result<Option<Decimal>, StoreError>;

    /// Recompute the whole stock cache from the ledger.
    fn rebuild_stock_cache(&self) -> Result<(), StoreError>;

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError>;

    /// Apply `changes` atomically or not at all.
    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError>;
}

impl<S> PlantStore for Arc<S>
where
    S: PlantStore + ?Sized,
{
    fn key_state(&self, key: &LedgerKey) -> Result<KeyState, StoreError> {
        (**self).key_state(key)
    }

    fn entries(&self, key: &LedgerKey) -> Result<Vec<StockLedgerEntry>, StoreError> {
        (**self).entries(key)
    }

    fn entries_for_reference(&self, reference: &AggregateId) -> Result<Vec<StockLedgerEntry>, StoreError> {
        (**self).entries_for_reference(reference)
    }

    fn item_keys(&self, item: &ItemId) -> Result<Vec<LedgerKey>, StoreError> {
        (**self).item_keys(item)
    }

    fn cached_stock(&self, item: &ItemId) -> Result<Option<Decimal>, StoreError> {
        (**self).cached_stock(item)
    }

    fn rebuild_stock_cache(&self) -> Result<(), StoreError> {
        (**self).rebuild_stock_cache()
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        (**self).commit(changes)
    }
}

impl<S> PlantStore for &S
where
    S: PlantStore + ?Sized,
{
    fn key_state(&self, key: &LedgerKey) -> Result<KeyState, StoreError> {
        (**self).key_state(key)
    }

    fn entries(&self, key: &LedgerKey) -> Result<Vec<StockLedgerEntry>, StoreError> {
        (**self).entries(key)
    }

    fn entries_for_reference(&self, reference: &AggregateId) -> Result<Vec<StockLedgerEntry>, StoreError> {
        (**self).entries_for_reference(reference)
    }

    fn item_keys(&self, item: &ItemId) -> Result<Vec<LedgerKey>, StoreError> {
        (**self).item_keys(item)
    }

    fn cached_stock(&self, item: &ItemId) -> Result<Option<Decimal>, StoreError> {
        (**self).cached_stock(item)
    }

    fn rebuild_stock_cache(&self) -> Result<(), StoreError> {
        (**self).rebuild_stock_cache()
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        (**self).commit(changes)
    }
}
