use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use rust_decimal::Decimal;

use plantflow_core::{AggregateId, ItemId};
use plantflow_ledger::{LedgerKey, StockLedgerEntry};

use super::stream::{StoredEvent, stream_version};
use super::{ChangeSet, CommitReceipt, KeyState, PlantStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct StoreState {
    ledger: BTreeMap<LedgerKey, Vec<StockLedgerEntry>>,
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    stock_cache: HashMap<ItemId, Decimal>,
    last_sequence: u64,
}

impl StoreState {
    fn key_state(&self, key: &LedgerKey) -> KeyState {
        match self.ledger.get(key) {
            Some(entries) => KeyState {
                balance: entries.last().map(|e| e.balance_snapshot).unwrap_or_default(),
                version: entries.len() as u64,
            },
            None => KeyState::default(),
        }
    }

    /// The single stock-cache projection: global stock = Σ balances over locations.
    fn recompute_stock_cache(&mut self, items: impl IntoIterator<Item = ItemId>) {
        for item in items {
            let total: Decimal = self
                .ledger
                .iter()
                .filter(|(key, _)| key.item == item)
                .filter_map(|(_, entries)| entries.last().map(|e| e.balance_snapshot))
                .sum();
            self.stock_cache.insert(item, total);
        }
    }

    fn validate(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        for (key, expected) in &changes.reads {
            let current = self.key_state(key).version;
            if current != *expected {
                return Err(StoreError::Concurrency(format!(
                    "ledger key {key} expected version {expected}, found {current}"
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for append in &changes.streams {
            if !seen.insert(append.aggregate_id) {
                return Err(StoreError::InvalidAppend(format!(
                    "change set appends twice to stream {}",
                    append.aggregate_id
                )));
            }
            let Some(first) = append.events.first() else {
                continue;
            };
            for (idx, e) in append.events.iter().enumerate() {
                if e.aggregate_id != append.aggregate_id {
                    return Err(StoreError::InvalidAppend(format!(
                        "batch contains multiple aggregate_ids (index {idx})"
                    )));
                }
                if e.aggregate_type != first.aggregate_type {
                    return Err(StoreError::AggregateTypeMismatch(format!(
                        "batch contains multiple aggregate_types (index {idx})"
                    )));
                }
            }

            let stream = self
                .streams
                .get(&append.aggregate_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let current = stream_version(stream);
            if !append.expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "stream {} expected {:?}, found {current}",
                    append.aggregate_id, append.expected
                )));
            }
            if let Some(existing) = stream.first() {
                if existing.aggregate_type != first.aggregate_type {
                    return Err(StoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, first.aggregate_type
                    )));
                }
            }
        }

        let mut running: BTreeMap<LedgerKey, Decimal> = BTreeMap::new();
        for posting in &changes.postings {
            let balance = running
                .entry(posting.key)
                .or_insert_with(|| self.key_state(&posting.key).balance);
            *balance += posting.net();
            if *balance < Decimal::ZERO {
                return Err(StoreError::NegativeBalance(format!(
                    "{} would go to {balance}",
                    posting.key
                )));
            }
        }
        Ok(())
    }
}

/// In-memory plant store.
///
/// One write lock covers validation and application, so a commit is atomic and
/// concurrent commits touching the same key are serialized. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPlantStore {
    state: RwLock<StoreState>,
}

impl InMemoryPlantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlantStore for InMemoryPlantStore {
    fn key_state(&self, key: &LedgerKey) -> Result<KeyState, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.key_state(key))
    }

    fn entries(&self, key: &LedgerKey) -> Result<Vec<StockLedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.ledger.get(key).cloned().unwrap_or_default())
    }

    fn entries_for_reference(&self, reference: &AggregateId) -> Result<Vec<StockLedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<StockLedgerEntry> = state
            .ledger
            .values()
            .flatten()
            .filter(|e| e.reference.id == *reference)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.sequence);
        Ok(found)
    }

    fn item_keys(&self, item: &ItemId) -> Result<Vec<LedgerKey>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.ledger.keys().filter(|k| k.item == *item).copied().collect())
    }

    fn cached_stock(&self, item: &ItemId) -> Result<Option<Decimal>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.stock_cache.get(item).copied())
    }

    fn rebuild_stock_cache(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let items: BTreeSet<ItemId> = state.ledger.keys().map(|k| k.item).collect();
        state.stock_cache.clear();
        state.recompute_stock_cache(items);
        Ok(())
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.validate(&changes)?;

        let mut receipt = CommitReceipt::default();
        let mut touched = BTreeSet::new();
        for posting in changes.postings {
            let key = posting.key;
            let snapshot = state.key_state(&key).balance + posting.net();
            state.last_sequence += 1;
            let entry = StockLedgerEntry::from_posting(state.last_sequence, posting, snapshot);
            touched.insert(key.item);
            state.ledger.entry(key).or_default().push(entry.clone());
            receipt.entries.push(entry);
        }

        for append in changes.streams {
            let stream = state.streams.entry(append.aggregate_id).or_default();
            let mut next = stream_version(stream) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                receipt.events.push(stored);
            }
        }

        state.recompute_stock_cache(touched);
        tracing::debug!(
            entries = receipt.entries.len(),
            events = receipt.events.len(),
            last_sequence = state.last_sequence,
            "change set committed"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plantflow_core::{ExpectedVersion, LocationId};
    use plantflow_ledger::{DocumentRef, LedgerPosting, MovementKind, ReferenceKind};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::store::{StreamAppend, UncommittedEvent};

    fn reference() -> DocumentRef {
        DocumentRef::new(AggregateId::new(), ReferenceKind::Receipt, "RCV-1")
    }

    fn credit(key: LedgerKey, qty: Decimal) -> LedgerPosting {
        LedgerPosting::credit(key, MovementKind::Receipt, reference(), qty, Utc::now()).unwrap()
    }

    fn debit(key: LedgerKey, qty: Decimal) -> LedgerPosting {
        LedgerPosting::debit(key, MovementKind::IssueOut, reference(), qty, Utc::now()).unwrap()
    }

    fn event(aggregate_id: AggregateId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: "test.stream".into(),
            event_type: "test.happened".into(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn commit_assigns_sequences_and_snapshots() {
        let store = InMemoryPlantStore::new();
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        let receipt = store
            .commit(ChangeSet {
                postings: vec![credit(key, dec!(10)), debit(key, dec!(4))],
                ..ChangeSet::default()
            })
            .unwrap();

        let snapshots: Vec<Decimal> = receipt.entries.iter().map(|e| e.balance_snapshot).collect();
        assert_eq!(snapshots, vec![dec!(10), dec!(6)]);
        assert_eq!(receipt.entries[1].sequence, 2);
        assert_eq!(store.key_state(&key).unwrap(), KeyState { balance: dec!(6), version: 2 });
        assert_eq!(store.cached_stock(&key.item).unwrap(), Some(dec!(6)));
    }

    #[test]
    fn stale_read_is_a_concurrency_conflict() {
        let store = InMemoryPlantStore::new();
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        store
            .commit(ChangeSet {
                postings: vec![credit(key, dec!(5))],
                ..ChangeSet::default()
            })
            .unwrap();

        let mut reads = BTreeMap::new();
        reads.insert(key, 0);
        let err = store
            .commit(ChangeSet {
                reads,
                postings: vec![debit(key, dec!(1))],
                streams: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        assert_eq!(store.key_state(&key).unwrap().balance, dec!(5));
    }

    #[test]
    fn negative_balance_applies_nothing() {
        let store = InMemoryPlantStore::new();
        let a = LedgerKey::new(ItemId::new(), LocationId::new());
        let b = LedgerKey::new(ItemId::new(), LocationId::new());
        let aggregate_id = AggregateId::new();

        let err = store
            .commit(ChangeSet {
                reads: BTreeMap::new(),
                postings: vec![credit(a, dec!(3)), debit(b, dec!(1))],
                streams: vec![StreamAppend {
                    aggregate_id,
                    expected: ExpectedVersion::Exact(0),
                    events: vec![event(aggregate_id)],
                }],
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::NegativeBalance(_)));
        assert!(store.entries(&a).unwrap().is_empty());
        assert!(store.load_stream(aggregate_id).unwrap().is_empty());
    }

    #[test]
    fn stream_expected_version_is_enforced() {
        let store = InMemoryPlantStore::new();
        let aggregate_id = AggregateId::new();
        let append = |expected| ChangeSet {
            streams: vec![StreamAppend {
                aggregate_id,
                expected,
                events: vec![event(aggregate_id)],
            }],
            ..ChangeSet::default()
        };

        store.commit(append(ExpectedVersion::Exact(0))).unwrap();
        let err = store.commit(append(ExpectedVersion::Exact(0))).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        store.commit(append(ExpectedVersion::Exact(1))).unwrap();
        assert_eq!(store.load_stream(aggregate_id).unwrap().len(), 2);
    }

    #[test]
    fn rebuilt_cache_matches_incremental_cache() {
        let store = InMemoryPlantStore::new();
        let item = ItemId::new();
        let (l1, l2) = (LocationId::new(), LocationId::new());
        store
            .commit(ChangeSet {
                postings: vec![
                    credit(LedgerKey::new(item, l1), dec!(2)),
                    credit(LedgerKey::new(item, l2), dec!(3.5)),
                ],
                ..ChangeSet::default()
            })
            .unwrap();

        let before = store.cached_stock(&item).unwrap();
        store.rebuild_stock_cache().unwrap();
        assert_eq!(store.cached_stock(&item).unwrap(), before);
        assert_eq!(before, Some(dec!(5.5)));
        assert_eq!(store.item_keys(&item).unwrap().len(), 2);
    }
}
