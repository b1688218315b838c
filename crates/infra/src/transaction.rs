//! Unit of work for one command.
//!
//! The first read of a ledger key snapshots its committed balance and version.
//! Availability is that snapshot plus whatever this transaction already staged
//! for the key, so two requirements can never both claim the same stock. Nothing
//! is visible to anyone else until [`StockTransaction::commit`], which hands the
//! store one change set together with the versions the decisions were based on.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use plantflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion, Shortfall, StockTarget,
};
use plantflow_ledger::{LedgerKey, LedgerPosting, StockLedgerEntry};

use crate::error::{EngineError, EngineResult};
use crate::store::{
    ChangeSet, CommitReceipt, KeyState, PlantStore, StreamAppend, UncommittedEvent, rehydrate,
};

pub struct StockTransaction<'a, S: ?Sized> {
    store: &'a S,
    reads: BTreeMap<LedgerKey, KeyState>,
    postings: Vec<LedgerPosting>,
    streams: Vec<StreamAppend>,
}

impl<'a, S> StockTransaction<'a, S>
where
    S: PlantStore + ?Sized,
{
    pub fn begin(store: &'a S) -> Self {
        Self {
            store,
            reads: BTreeMap::new(),
            postings: Vec::new(),
            streams: Vec::new(),
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    fn snapshot(&mut self, key: LedgerKey) -> EngineResult<KeyState> {
        if let Some(state) = self.reads.get(&key) {
            return Ok(*state);
        }
        let state = self.store.key_state(&key)?;
        self.reads.insert(key, state);
        Ok(state)
    }

    fn staged_net(&self, key: &LedgerKey) -> Decimal {
        self.postings
            .iter()
            .filter(|p| p.key == *key)
            .map(LedgerPosting::net)
            .sum()
    }

    /// Committed balance plus this transaction's staged movements for `key`.
    pub fn available(&mut self, key: LedgerKey) -> EngineResult<Decimal> {
        let committed = self.snapshot(key)?.balance;
        Ok(committed + self.staged_net(&key))
    }

    /// Stage a posting. Debits are checked against [`StockTransaction::available`].
    pub fn post(&mut self, posting: LedgerPosting) -> EngineResult<()> {
        let available = self.available(posting.key)?;
        if available + posting.net() < Decimal::ZERO {
            return Err(EngineError::InsufficientStock(Shortfall::new(
                StockTarget::Item(posting.key.item),
                posting.key.location,
                posting.quantity_out,
                available,
            )));
        }
        self.postings.push(posting);
        Ok(())
    }

    pub fn staged_postings(&self) -> &[LedgerPosting] {
        &self.postings
    }

    /// Every committed entry of a source document. The keys involved are
    /// snapshotted so a concurrent change to any of them aborts the commit.
    pub fn entries_for_reference(&mut self, reference: &AggregateId) -> EngineResult<Vec<StockLedgerEntry>> {
        let entries = self.store.entries_for_reference(reference)?;
        for e in &entries {
            self.snapshot(e.key())?;
        }
        Ok(entries)
    }

    /// Load an aggregate by replaying its stream; `None` when nothing was ever appended.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> EngineResult<A>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        rehydrate(aggregate_id, &history, make_aggregate)
    }

    /// Run a command against an aggregate, apply the resulting events to it and
    /// stage them for append at the aggregate's current version.
    pub fn execute<A>(
        &mut self,
        aggregate: &mut A,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
    ) -> EngineResult<Vec<A::Event>>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: plantflow_events::Event + Serialize,
    {
        let expected = ExpectedVersion::Exact(aggregate.version());
        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(decided);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;
        for ev in &decided {
            aggregate.apply(ev);
        }

        match self.streams.iter_mut().find(|s| s.aggregate_id == aggregate_id) {
            Some(existing) => existing.events.extend(uncommitted),
            None => self.streams.push(StreamAppend {
                aggregate_id,
                expected,
                events: uncommitted,
            }),
        }
        Ok(decided)
    }

    pub fn commit(self) -> EngineResult<CommitReceipt> {
        let changes = ChangeSet {
            reads: self.reads.iter().map(|(k, s)| (*k, s.version)).collect(),
            postings: self.postings,
            streams: self.streams,
        };
        if changes.is_empty() {
            return Ok(CommitReceipt::default());
        }
        Ok(self.store.commit(changes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plantflow_core::{ItemId, LocationId};
    use plantflow_ledger::{DocumentRef, MovementKind, ReferenceKind};
    use rust_decimal_macros::dec;

    use crate::store::InMemoryPlantStore;

    fn reference() -> DocumentRef {
        DocumentRef::new(AggregateId::new(), ReferenceKind::Issue, "ISS-7")
    }

    fn seed(store: &InMemoryPlantStore, key: LedgerKey, qty: Decimal) {
        let mut tx = StockTransaction::begin(store);
        tx.post(LedgerPosting::credit(key, MovementKind::OpeningBalance, reference(), qty, Utc::now()).unwrap())
            .unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn staged_debits_reduce_availability() {
        let store = InMemoryPlantStore::new();
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        seed(&store, key, dec!(10));

        let mut tx = StockTransaction::begin(&store);
        tx.post(LedgerPosting::debit(key, MovementKind::IssueOut, reference(), dec!(6), Utc::now()).unwrap())
            .unwrap();
        assert_eq!(tx.available(key).unwrap(), dec!(4));

        let err = tx
            .post(LedgerPosting::debit(key, MovementKind::IssueOut, reference(), dec!(5), Utc::now()).unwrap())
            .unwrap_err();
        match err {
            EngineError::InsufficientStock(s) => assert_eq!(s.missing(), dec!(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn concurrent_writer_aborts_the_later_commit() {
        let store = InMemoryPlantStore::new();
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        seed(&store, key, dec!(10));

        let mut first = StockTransaction::begin(&store);
        let mut second = StockTransaction::begin(&store);
        for tx in [&mut first, &mut second] {
            tx.post(LedgerPosting::debit(key, MovementKind::IssueOut, reference(), dec!(8), Utc::now()).unwrap())
                .unwrap();
        }

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(EngineError::ConcurrencyConflict(_))));
        assert_eq!(store.key_state(&key).unwrap().balance, dec!(2));
    }

    #[test]
    fn dropped_transaction_changes_nothing() {
        let store = InMemoryPlantStore::new();
        let key = LedgerKey::new(ItemId::new(), LocationId::new());
        {
            let mut tx = StockTransaction::begin(&store);
            tx.post(LedgerPosting::credit(key, MovementKind::Receipt, reference(), dec!(1), Utc::now()).unwrap())
                .unwrap();
        }
        assert_eq!(store.key_state(&key).unwrap(), KeyState::default());
    }
}
