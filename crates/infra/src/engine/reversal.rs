use chrono::{DateTime, Utc};

use plantflow_core::AggregateId;
use plantflow_ledger::{LedgerPosting, reversal_postings};

use crate::error::EngineResult;
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

/// Undoes the ledger effect of a source document with compensating entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReversalEngine;

impl ReversalEngine {
    /// Stage the exact opposite of every entry posted for `reference`.
    ///
    /// A document that never posted anything reverses to nothing. Reversing legs
    /// are checked like any other posting: if stock that arrived through the
    /// document was moved on since, the reversal fails with insufficient stock.
    pub fn reverse<S>(
        tx: &mut StockTransaction<'_, S>,
        reference: AggregateId,
        occurred_at: DateTime<Utc>,
    ) -> EngineResult<Vec<LedgerPosting>>
    where
        S: PlantStore + ?Sized,
    {
        let entries = tx.entries_for_reference(&reference)?;
        let postings = reversal_postings(&entries, occurred_at)?;

        for posting in &postings {
            tx.post(posting.clone())?;
        }
        tracing::debug!(document = %reference, legs = postings.len(), "staged reversal");
        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantflow_core::{ItemId, LocationId};
    use plantflow_ledger::{DocumentRef, LedgerKey, MovementKind, ReferenceKind, TransactionType};
    use rust_decimal_macros::dec;

    use crate::error::EngineError;
    use crate::store::InMemoryPlantStore;

    #[test]
    fn reversal_restores_both_legs_and_keeps_history() {
        let store = InMemoryPlantStore::new();
        let item = ItemId::new();
        let (source, destination) = (LedgerKey::new(item, LocationId::new()), LedgerKey::new(item, LocationId::new()));
        let opening = DocumentRef::new(AggregateId::new(), ReferenceKind::Receipt, "OPEN");
        let doc = DocumentRef::new(AggregateId::new(), ReferenceKind::Issue, "ISS-1");

        let mut tx = StockTransaction::begin(&store);
        tx.post(LedgerPosting::credit(source, MovementKind::OpeningBalance, opening, dec!(3), Utc::now()).unwrap())
            .unwrap();
        tx.post(LedgerPosting::debit(source, MovementKind::IssueOut, doc.clone(), dec!(3), Utc::now()).unwrap())
            .unwrap();
        tx.post(LedgerPosting::credit(destination, MovementKind::IssueIn, doc.clone(), dec!(3), Utc::now()).unwrap())
            .unwrap();
        tx.commit().unwrap();

        let mut tx = StockTransaction::begin(&store);
        let legs = ReversalEngine::reverse(&mut tx, doc.id, Utc::now()).unwrap();
        assert_eq!(legs.len(), 2);
        tx.commit().unwrap();

        assert_eq!(store.key_state(&source).unwrap().balance, dec!(3));
        assert_eq!(store.key_state(&destination).unwrap().balance, dec!(0));

        let trail = store.entries_for_reference(&doc.id).unwrap();
        assert_eq!(trail.len(), 4);
        assert!(trail
            .iter()
            .any(|e| e.transaction_type == TransactionType::Reversal(MovementKind::IssueIn)));

        let mut again = StockTransaction::begin(&store);
        assert!(matches!(
            ReversalEngine::reverse(&mut again, doc.id, Utc::now()),
            Err(EngineError::State(_))
        ));
    }

    #[test]
    fn nothing_posted_reverses_to_nothing() {
        let store = InMemoryPlantStore::new();
        let mut tx = StockTransaction::begin(&store);
        assert!(ReversalEngine::reverse(&mut tx, AggregateId::new(), Utc::now()).unwrap().is_empty());
        assert!(tx.staged_postings().is_empty());
    }
}
