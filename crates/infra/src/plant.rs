//! Command facade over the stock core.
//!
//! Every command runs the same pipeline:
//!
//! ```text
//! command
//!   ↓
//! 1. begin a StockTransaction (nothing visible yet)
//!   ↓
//! 2. load aggregates, validate, stage postings and events (engine component)
//!   ↓
//! 3. commit the change set (all-or-nothing, compare-and-set on every key read)
//!   ↓
//! 4. audit the committed command
//!   ↓
//! 5. publish committed events (+ ProductionCompleted) to the bus
//! ```
//!
//! A failure in steps 1-3 leaves the ledger and every aggregate exactly as they
//! were. A publication failure is reported after the commit succeeded; events are
//! at-least-once, keyed by stream sequence number.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use plantflow_catalog::{CatalogService, LocationService};
use plantflow_core::AggregateId;
use plantflow_documents::TransferDocument;
use plantflow_events::{Event, EventBus, EventEnvelope};
use plantflow_ledger::StockLedgerEntry;
use plantflow_production::{ProductionBatch, ProductionCompleted, RepackingRecord};

use crate::audit::{AuditLog, AuditRecord};
use crate::commands::{self, PlantCommand};
use crate::config::EngineConfig;
use crate::engine::consumption::load_batch;
use crate::engine::documents::load_document;
use crate::engine::repacking::load_repacking;
use crate::engine::{
    BATCH_AGGREGATE, ConsumptionEngine, DocumentLifecycle, RemainingQuantityTracker, RepackingService,
    StockReceiver,
};
use crate::error::{EngineError, EngineResult};
use crate::ledger_store::LedgerStore;
use crate::store::{CommitReceipt, PlantStore};
use crate::transaction::StockTransaction;

pub struct PlantEngine<S, B> {
    store: S,
    bus: B,
    catalog: Arc<dyn CatalogService>,
    locations: Arc<dyn LocationService>,
    audit: Arc<dyn AuditLog>,
    config: EngineConfig,
}

impl<S, B> PlantEngine<S, B> {
    pub fn new(
        store: S,
        bus: B,
        catalog: Arc<dyn CatalogService>,
        locations: Arc<dyn LocationService>,
        audit: Arc<dyn AuditLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            bus,
            catalog,
            locations,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> PlantEngine<S, B>
where
    S: PlantStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn scale(&self) -> u32 {
        self.config.quantity_scale
    }

    fn tracker(&self) -> RemainingQuantityTracker {
        RemainingQuantityTracker::new(self.config.allow_reverify)
    }

    fn consumption(&self) -> ConsumptionEngine<'_, dyn CatalogService> {
        ConsumptionEngine::new(&*self.catalog, self.scale())
    }

    fn documents(&self) -> DocumentLifecycle<'_, dyn CatalogService, dyn LocationService> {
        DocumentLifecycle::new(&*self.catalog, &*self.locations, self.scale())
    }

    /// Run one command in its own transaction, commit it and record it.
    fn run<T>(
        &self,
        action: &'static str,
        reference: impl FnOnce(&T) -> String,
        occurred_at: chrono::DateTime<chrono::Utc>,
        stage: impl FnOnce(&mut StockTransaction<'_, S>) -> EngineResult<T>,
    ) -> EngineResult<(T, CommitReceipt)> {
        let mut tx = StockTransaction::begin(&self.store);
        let staged = match stage(&mut tx) {
            Ok(staged) => staged,
            Err(err) => {
                tracing::warn!(action, error = %err, "command rejected");
                return Err(err);
            }
        };
        let receipt = tx.commit().inspect_err(|err| {
            tracing::warn!(action, error = %err, "commit failed");
        })?;

        let detail = format!("{} ledger entries, {} events", receipt.entries.len(), receipt.events.len());
        self.audit
            .record(AuditRecord::new(action, reference(&staged), detail, occurred_at));
        self.publish(&receipt)?;
        Ok((staged, receipt))
    }

    fn publish(&self, receipt: &CommitReceipt) -> EngineResult<()> {
        for stored in &receipt.events {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| EngineError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }

    fn publish_completion(&self, receipt: &CommitReceipt, completed: &ProductionCompleted) -> EngineResult<()> {
        let sequence = receipt
            .events
            .iter()
            .find(|e| e.event_type == "production.batch.completed")
            .map(|e| e.sequence_number)
            .unwrap_or_default();
        let payload = serde_json::to_value(completed).map_err(|e| EngineError::Publish(e.to_string()))?;
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            completed.production_id.0,
            BATCH_AGGREGATE,
            completed.event_type(),
            sequence,
            payload,
        );
        self.bus
            .publish(envelope)
            .map_err(|e| EngineError::Publish(format!("{e:?}")))
    }

    #[tracing::instrument(skip(self, cmd), fields(item = %cmd.item, location = %cmd.location, quantity = %cmd.quantity))]
    pub fn receive_stock(&self, cmd: commands::ReceiveStock) -> EngineResult<Vec<StockLedgerEntry>> {
        let receiver = StockReceiver::new(&*self.catalog, &*self.locations, self.scale());
        let (_, receipt) = self.run(
            "stock.receive",
            |_| cmd.reference_no.clone(),
            cmd.occurred_at,
            |tx| receiver.receive(tx, &cmd),
        )?;
        Ok(receipt.entries)
    }

    #[tracing::instrument(skip(self, cmd), fields(batch = %cmd.batch_no))]
    pub fn create_batch(&self, cmd: commands::CreateProductionBatch) -> EngineResult<ProductionBatch> {
        let engine = self.consumption();
        let (batch, _) = self.run(
            "batch.create",
            |b: &ProductionBatch| b.batch_no().to_string(),
            cmd.occurred_at,
            |tx| engine.create_batch(tx, &cmd),
        )?;
        Ok(batch)
    }

    #[tracing::instrument(skip(self, cmd), fields(batch = %cmd.batch_id))]
    pub fn mark_materials_issued(&self, cmd: commands::MarkMaterialsIssued) -> EngineResult<ProductionBatch> {
        let engine = self.consumption();
        let (batch, _) = self.run(
            "batch.materials_issued",
            |b: &ProductionBatch| b.batch_no().to_string(),
            cmd.occurred_at,
            |tx| engine.mark_materials_issued(tx, &cmd),
        )?;
        Ok(batch)
    }

    #[tracing::instrument(skip(self, cmd), fields(batch = %cmd.batch_id))]
    pub fn start_production(&self, cmd: commands::StartProduction) -> EngineResult<ProductionBatch> {
        let engine = self.consumption();
        let (batch, _) = self.run(
            "batch.start",
            |b: &ProductionBatch| b.batch_no().to_string(),
            cmd.occurred_at,
            |tx| engine.start(tx, &cmd),
        )?;
        Ok(batch)
    }

    /// Consume the batch's materials; publishes [`ProductionCompleted`] after commit.
    #[tracing::instrument(skip(self, cmd), fields(batch = %cmd.batch_id))]
    pub fn complete_production(&self, cmd: commands::CompleteProduction) -> EngineResult<ProductionBatch> {
        let engine = self.consumption();
        let ((batch, completed), receipt) = self.run(
            "batch.complete",
            |(b, _): &(ProductionBatch, ProductionCompleted)| b.batch_no().to_string(),
            cmd.occurred_at,
            |tx| engine.complete(tx, &cmd),
        )?;
        self.publish_completion(&receipt, &completed)?;
        Ok(batch)
    }

    #[tracing::instrument(skip(self, cmd), fields(batch = %cmd.batch_id, weight = %cmd.measured_weight))]
    pub fn verify_remaining(&self, cmd: commands::VerifyRemaining) -> EngineResult<ProductionBatch> {
        let tracker = self.tracker();
        let (batch, _) = self.run(
            "batch.verify_remaining",
            |b: &ProductionBatch| b.batch_no().to_string(),
            cmd.occurred_at,
            |tx| tracker.verify(tx, &cmd),
        )?;
        Ok(batch)
    }

    #[tracing::instrument(skip(self, cmd), fields(batch = %cmd.batch_id, quantity = %cmd.quantity))]
    pub fn draw_from_batch(&self, cmd: commands::DrawFromBatch) -> EngineResult<ProductionBatch> {
        let tracker = self.tracker();
        let (batch, _) = self.run(
            "batch.draw",
            |b: &ProductionBatch| b.batch_no().to_string(),
            cmd.occurred_at,
            |tx| tracker.draw(tx, cmd.batch_id, cmd.quantity, cmd.occurred_at),
        )?;
        Ok(batch)
    }

    #[tracing::instrument(skip(self, cmd), fields(repacking = %cmd.repack_no))]
    pub fn create_repacking(&self, cmd: commands::CreateRepacking) -> EngineResult<RepackingRecord> {
        let service = RepackingService::new(&*self.catalog, self.tracker(), self.scale());
        let (record, _) = self.run(
            "repacking.create",
            |r: &RepackingRecord| r.repack_no().to_string(),
            cmd.occurred_at,
            |tx| service.create(tx, &cmd),
        )?;
        Ok(record)
    }

    #[tracing::instrument(skip(self, cmd), fields(repacking = %cmd.repacking_id, quantity = %cmd.quantity))]
    pub fn consume_repacked(&self, cmd: commands::ConsumeRepacked) -> EngineResult<RepackingRecord> {
        let service = RepackingService::new(&*self.catalog, self.tracker(), self.scale());
        let (record, _) = self.run(
            "repacking.consume",
            |r: &RepackingRecord| r.repack_no().to_string(),
            cmd.occurred_at,
            |tx| service.consume(tx, &cmd),
        )?;
        Ok(record)
    }

    #[tracing::instrument(skip(self, cmd), fields(repacking = %cmd.repacking_id))]
    pub fn delete_repacking(&self, cmd: commands::DeleteRepacking) -> EngineResult<RepackingRecord> {
        let service = RepackingService::new(&*self.catalog, self.tracker(), self.scale());
        let (record, _) = self.run(
            "repacking.delete",
            |r: &RepackingRecord| r.repack_no().to_string(),
            cmd.occurred_at,
            |tx| service.delete(tx, &cmd),
        )?;
        Ok(record)
    }

    #[tracing::instrument(skip(self, cmd), fields(document = %cmd.doc_no, kind = ?cmd.kind))]
    pub fn create_transfer_document(&self, cmd: commands::CreateTransferDocument) -> EngineResult<TransferDocument> {
        let lifecycle = self.documents();
        let (doc, _) = self.run(
            "transfer.create",
            |d: &TransferDocument| d.doc_no().to_string(),
            cmd.occurred_at,
            |tx| lifecycle.create(tx, &cmd),
        )?;
        Ok(doc)
    }

    #[tracing::instrument(skip(self, cmd), fields(document = %cmd.document_id))]
    pub fn complete_transfer_document(&self, cmd: commands::CompleteTransferDocument) -> EngineResult<TransferDocument> {
        let lifecycle = self.documents();
        let (doc, _) = self.run(
            "transfer.complete",
            |d: &TransferDocument| d.doc_no().to_string(),
            cmd.occurred_at,
            |tx| lifecycle.complete(tx, &cmd),
        )?;
        Ok(doc)
    }

    #[tracing::instrument(skip(self, cmd), fields(document = %cmd.document_id))]
    pub fn delete_transfer_document(&self, cmd: commands::DeleteTransferDocument) -> EngineResult<TransferDocument> {
        let lifecycle = self.documents();
        let (doc, _) = self.run(
            "transfer.delete",
            |d: &TransferDocument| d.doc_no().to_string(),
            cmd.occurred_at,
            |tx| lifecycle.delete(tx, &cmd),
        )?;
        Ok(doc)
    }

    /// Route a tagged command to its handler.
    pub fn dispatch(&self, command: PlantCommand) -> EngineResult<()> {
        match command {
            PlantCommand::ReceiveStock(c) => self.receive_stock(c).map(drop),
            PlantCommand::CreateProductionBatch(c) => self.create_batch(c).map(drop),
            PlantCommand::MarkMaterialsIssued(c) => self.mark_materials_issued(c).map(drop),
            PlantCommand::StartProduction(c) => self.start_production(c).map(drop),
            PlantCommand::CompleteProduction(c) => self.complete_production(c).map(drop),
            PlantCommand::VerifyRemaining(c) => self.verify_remaining(c).map(drop),
            PlantCommand::DrawFromBatch(c) => self.draw_from_batch(c).map(drop),
            PlantCommand::CreateRepacking(c) => self.create_repacking(c).map(drop),
            PlantCommand::ConsumeRepacked(c) => self.consume_repacked(c).map(drop),
            PlantCommand::DeleteRepacking(c) => self.delete_repacking(c).map(drop),
            PlantCommand::CreateTransferDocument(c) => self.create_transfer_document(c).map(drop),
            PlantCommand::CompleteTransferDocument(c) => self.complete_transfer_document(c).map(drop),
            PlantCommand::DeleteTransferDocument(c) => self.delete_transfer_document(c).map(drop),
        }
    }

    pub fn batch(&self, batch_id: AggregateId) -> EngineResult<ProductionBatch> {
        load_batch(&StockTransaction::begin(&self.store), batch_id)
    }

    pub fn repacking(&self, repacking_id: AggregateId) -> EngineResult<RepackingRecord> {
        load_repacking(&StockTransaction::begin(&self.store), repacking_id)
    }

    pub fn document(&self, document_id: AggregateId) -> EngineResult<TransferDocument> {
        load_document(&StockTransaction::begin(&self.store), document_id)
    }

    /// Reporting queries over committed ledger state.
    pub fn ledger(&self) -> LedgerStore<&S> {
        LedgerStore::new(&self.store)
    }
}
