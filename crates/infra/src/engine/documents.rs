//! Issue, return and transfer documents.
//!
//! Pending documents have no ledger effect. Completion validates every line at
//! the source first and only then stages both legs of every line; deletion of a
//! completed document goes through [`ReversalEngine`].

use plantflow_catalog::{CatalogService, ConversionResolver, LocationService};
use plantflow_core::{AggregateId, LocationId, StockTarget};
use plantflow_documents::{
    self as documents, DocumentCommand, DocumentStatus, MovedLine, TransferDocument, TransferDocumentId,
};
use plantflow_ledger::{DocumentRef, LedgerKey, LedgerPosting};

use crate::commands;
use crate::engine::TRANSFER_AGGREGATE;
use crate::engine::claims::Claims;
use crate::engine::reversal::ReversalEngine;
use crate::error::{EngineError, EngineResult};
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

pub fn load_document<S>(tx: &StockTransaction<'_, S>, document_id: AggregateId) -> EngineResult<TransferDocument>
where
    S: PlantStore + ?Sized,
{
    tx.load(document_id, |id| TransferDocument::empty(TransferDocumentId::new(id)))
}

pub struct DocumentLifecycle<'a, C: ?Sized, L: ?Sized> {
    catalog: &'a C,
    locations: &'a L,
    scale: u32,
}

impl<'a, C, L> DocumentLifecycle<'a, C, L>
where
    C: CatalogService + ?Sized,
    L: LocationService + ?Sized,
{
    pub fn new(catalog: &'a C, locations: &'a L, scale: u32) -> Self {
        Self {
            catalog,
            locations,
            scale,
        }
    }

    fn resolve_location(&self, id: LocationId) -> EngineResult<plantflow_catalog::Location> {
        self.locations
            .resolve(&id)
            .ok_or_else(|| EngineError::NotFound(format!("location {id}")))
    }

    pub fn create<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        cmd: &commands::CreateTransferDocument,
    ) -> EngineResult<TransferDocument>
    where
        S: PlantStore + ?Sized,
    {
        let source = self.resolve_location(cmd.source)?;
        let destination = self.resolve_location(cmd.destination)?;
        for line in &cmd.lines {
            if let StockTarget::Item(item) = line.target {
                if self.catalog.item(&item).is_none() {
                    return Err(EngineError::NotFound(format!("item {item}")));
                }
            }
        }

        let mut doc = load_document(tx, cmd.document_id)?;
        let create = DocumentCommand::Create(documents::CreateTransferDocument {
            document_id: TransferDocumentId::new(cmd.document_id),
            kind: cmd.kind,
            doc_no: cmd.doc_no.clone(),
            source,
            destination,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut doc, cmd.document_id, TRANSFER_AGGREGATE, &create)?;
        Ok(doc)
    }

    /// Move every line from source to destination, or nothing at all.
    pub fn complete<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        cmd: &commands::CompleteTransferDocument,
    ) -> EngineResult<TransferDocument>
    where
        S: PlantStore + ?Sized,
    {
        let mut doc = load_document(tx, cmd.document_id)?;
        let (Some(source), Some(destination)) = (doc.source(), doc.destination()) else {
            return Err(EngineError::NotFound(format!("transfer document {}", cmd.document_id)));
        };
        if doc.status() != DocumentStatus::Pending {
            return Err(EngineError::State(format!(
                "cannot complete document {} in status {:?}",
                doc.doc_no(),
                doc.status()
            )));
        }

        let resolver = ConversionResolver::new(self.catalog, self.scale);
        let mut claims = Claims::new();
        let mut moved = Vec::new();
        for (idx, line) in doc.lines().iter().enumerate() {
            let quantity = match line.target {
                StockTarget::Item(item) => resolver.to_canonical(&item, line.quantity)?,
                StockTarget::Category(_) => line.quantity,
            };
            for claimed in claims.claim_target(tx, self.catalog, line.target, source, quantity)? {
                moved.push(MovedLine {
                    line: idx,
                    item: claimed.item,
                    quantity: claimed.quantity,
                    category: claimed.category,
                });
            }
        }
        claims.finish()?;

        let kind = doc.kind();
        let (out_kind, in_kind) = kind.movements();
        let reference = DocumentRef::new(cmd.document_id, kind.reference_kind(), doc.doc_no());
        for line in &moved {
            tx.post(LedgerPosting::debit(
                LedgerKey::new(line.item, source),
                out_kind,
                reference.clone(),
                line.quantity,
                cmd.occurred_at,
            )?)?;
            tx.post(LedgerPosting::credit(
                LedgerKey::new(line.item, destination),
                in_kind,
                reference.clone(),
                line.quantity,
                cmd.occurred_at,
            )?)?;
        }

        tracing::info!(document = %doc.doc_no(), %source, %destination, legs = moved.len() * 2, "completing document");
        let complete = DocumentCommand::Complete(documents::CompleteTransferDocument {
            document_id: TransferDocumentId::new(cmd.document_id),
            moved,
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut doc, cmd.document_id, TRANSFER_AGGREGATE, &complete)?;
        Ok(doc)
    }

    /// Retire a document; a completed one has its legs reversed first.
    pub fn delete<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        cmd: &commands::DeleteTransferDocument,
    ) -> EngineResult<TransferDocument>
    where
        S: PlantStore + ?Sized,
    {
        let mut doc = load_document(tx, cmd.document_id)?;
        let was_completed = doc.status() == DocumentStatus::Completed;

        let delete = DocumentCommand::Delete(documents::DeleteTransferDocument {
            document_id: TransferDocumentId::new(cmd.document_id),
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut doc, cmd.document_id, TRANSFER_AGGREGATE, &delete)?;

        if was_completed {
            ReversalEngine::reverse(tx, cmd.document_id, cmd.occurred_at)?;
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use plantflow_catalog::{InMemoryCatalog, Item, ItemType, Location, LocationKind, Unit};
    use plantflow_core::ItemId;
    use plantflow_documents::{DocumentKind, TransferLine};
    use plantflow_ledger::{MovementKind, ReferenceKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::store::InMemoryPlantStore;

    fn test_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
    }

    struct Fixture {
        store: InMemoryPlantStore,
        catalog: InMemoryCatalog,
        flour: ItemId,
        store_loc: LocationId,
        floor: LocationId,
    }

    fn fixture(flour_stock: Decimal) -> Fixture {
        let catalog = InMemoryCatalog::new();
        let flour = catalog.add_item(Item::new("FLOUR", ItemType::Raw, Unit::kg()));
        let store_loc = catalog.add_location(Location::new("STORE", LocationKind::Store));
        let floor = catalog.add_location(Location::new("PRODUCTION", LocationKind::ProductionFloor));

        let store = InMemoryPlantStore::new();
        let mut tx = StockTransaction::begin(&store);
        let opening = DocumentRef::new(AggregateId::new(), ReferenceKind::Receipt, "OPEN");
        tx.post(
            LedgerPosting::credit(
                LedgerKey::new(flour, store_loc),
                MovementKind::OpeningBalance,
                opening,
                flour_stock,
                test_time(),
            )
            .unwrap(),
        )
        .unwrap();
        tx.commit().unwrap();

        Fixture {
            store,
            catalog,
            flour,
            store_loc,
            floor,
        }
    }

    fn create_issue(f: &Fixture, lifecycle: &DocumentLifecycle<'_, InMemoryCatalog, InMemoryCatalog>, qty: Decimal) -> AggregateId {
        let document_id = AggregateId::new();
        let mut tx = StockTransaction::begin(&f.store);
        lifecycle
            .create(
                &mut tx,
                &commands::CreateTransferDocument {
                    document_id,
                    kind: DocumentKind::Issue,
                    doc_no: "ISS-1".to_string(),
                    source: f.store_loc,
                    destination: f.floor,
                    lines: vec![TransferLine {
                        target: StockTarget::Item(f.flour),
                        quantity: qty,
                    }],
                    occurred_at: test_time(),
                },
            )
            .unwrap();
        tx.commit().unwrap();
        document_id
    }

    fn balance(f: &Fixture, location: LocationId) -> Decimal {
        f.store.key_state(&LedgerKey::new(f.flour, location)).unwrap().balance
    }

    #[test]
    fn completion_moves_and_deletion_reverses() {
        let f = fixture(dec!(3));
        let lifecycle = DocumentLifecycle::new(&f.catalog, &f.catalog, 3);
        let document_id = create_issue(&f, &lifecycle, dec!(3));
        assert_eq!(balance(&f, f.store_loc), dec!(3));

        let mut tx = StockTransaction::begin(&f.store);
        let doc = lifecycle
            .complete(&mut tx, &commands::CompleteTransferDocument { document_id, occurred_at: test_time() })
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(doc.status(), DocumentStatus::Completed);
        assert_eq!((balance(&f, f.store_loc), balance(&f, f.floor)), (dec!(0), dec!(3)));

        let mut tx = StockTransaction::begin(&f.store);
        lifecycle
            .delete(&mut tx, &commands::DeleteTransferDocument { document_id, occurred_at: test_time() })
            .unwrap();
        tx.commit().unwrap();
        assert_eq!((balance(&f, f.store_loc), balance(&f, f.floor)), (dec!(3), dec!(0)));
        assert_eq!(f.store.entries_for_reference(&document_id).unwrap().len(), 4);
    }

    #[test]
    fn short_document_posts_nothing() {
        let f = fixture(dec!(2));
        let lifecycle = DocumentLifecycle::new(&f.catalog, &f.catalog, 3);
        let document_id = create_issue(&f, &lifecycle, dec!(3));

        let mut tx = StockTransaction::begin(&f.store);
        let err = lifecycle
            .complete(&mut tx, &commands::CompleteTransferDocument { document_id, occurred_at: test_time() })
            .unwrap_err();
        assert_eq!(err.shortfalls().len(), 1);
        assert!(tx.staged_postings().is_empty());
    }

    #[test]
    fn unknown_location_is_not_found() {
        let f = fixture(dec!(1));
        let lifecycle = DocumentLifecycle::new(&f.catalog, &f.catalog, 3);
        let mut tx = StockTransaction::begin(&f.store);
        let err = lifecycle
            .create(
                &mut tx,
                &commands::CreateTransferDocument {
                    document_id: AggregateId::new(),
                    kind: DocumentKind::Transfer,
                    doc_no: "TRF-1".to_string(),
                    source: LocationId::new(),
                    destination: f.floor,
                    lines: vec![TransferLine {
                        target: StockTarget::Item(f.flour),
                        quantity: dec!(1),
                    }],
                    occurred_at: test_time(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
