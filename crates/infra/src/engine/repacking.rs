//! Repacking finished goods into retail units.
//!
//! Creation moves stock from the source item to the repack item at one location
//! (`repack_out` / `repack_in`, both canonical). Deletion is only possible while
//! nothing was consumed downstream; it reverses the two legs and restores any
//! units drawn from the source batch.

use plantflow_catalog::{CatalogService, ConversionResolver};
use plantflow_core::AggregateId;
use plantflow_ledger::{DocumentRef, LedgerKey, LedgerPosting, MovementKind, ReferenceKind};
use plantflow_production::{
    self as production, ProductionBatchId, RepackingCommand, RepackingId, RepackingRecord,
};

use crate::commands;
use crate::engine::REPACKING_AGGREGATE;
use crate::engine::consumption::load_batch;
use crate::engine::remaining::RemainingQuantityTracker;
use crate::engine::reversal::ReversalEngine;
use crate::error::{EngineError, EngineResult};
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

pub fn load_repacking<S>(tx: &StockTransaction<'_, S>, repacking_id: AggregateId) -> EngineResult<RepackingRecord>
where
    S: PlantStore + ?Sized,
{
    tx.load(repacking_id, |id| RepackingRecord::empty(RepackingId::new(id)))
}

pub struct RepackingService<'a, C: ?Sized> {
    catalog: &'a C,
    tracker: RemainingQuantityTracker,
    scale: u32,
}

impl<'a, C> RepackingService<'a, C>
where
    C: CatalogService + ?Sized,
{
    pub fn new(catalog: &'a C, tracker: RemainingQuantityTracker, scale: u32) -> Self {
        Self {
            catalog,
            tracker,
            scale,
        }
    }

    pub fn create<S>(&self, tx: &mut StockTransaction<'_, S>, cmd: &commands::CreateRepacking) -> EngineResult<RepackingRecord>
    where
        S: PlantStore + ?Sized,
    {
        if let Some(batch_id) = cmd.source_batch {
            let batch = load_batch(tx, batch_id)?;
            if batch.item() != Some(cmd.source_item) {
                return Err(EngineError::Validation(format!(
                    "batch {} did not produce the repacking source item",
                    batch.batch_no()
                )));
            }
            if batch.location() != Some(cmd.location) {
                return Err(EngineError::Validation(format!(
                    "batch {} is not held at the repacking location",
                    batch.batch_no()
                )));
            }
        }

        let mut record = load_repacking(tx, cmd.repacking_id)?;
        let create = RepackingCommand::CreateRepacking(production::CreateRepacking {
            repacking_id: RepackingId::new(cmd.repacking_id),
            repack_no: cmd.repack_no.clone(),
            source_item: cmd.source_item,
            repack_item: cmd.repack_item,
            location: cmd.location,
            source_quantity: cmd.source_quantity,
            repack_quantity: cmd.repack_quantity,
            source_batch: cmd.source_batch.map(ProductionBatchId::new),
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut record, cmd.repacking_id, REPACKING_AGGREGATE, &create)?;

        if let Some(batch_id) = cmd.source_batch {
            self.tracker.draw(tx, batch_id, cmd.source_quantity, cmd.occurred_at)?;
        }

        let resolver = ConversionResolver::new(self.catalog, self.scale);
        let source_qty = resolver.to_canonical(&cmd.source_item, cmd.source_quantity)?;
        let repack_qty = resolver.to_canonical(&cmd.repack_item, cmd.repack_quantity)?;

        let reference = DocumentRef::new(cmd.repacking_id, ReferenceKind::Repacking, record.repack_no());
        tx.post(LedgerPosting::debit(
            LedgerKey::new(cmd.source_item, cmd.location),
            MovementKind::RepackOut,
            reference.clone(),
            source_qty,
            cmd.occurred_at,
        )?)?;
        tx.post(LedgerPosting::credit(
            LedgerKey::new(cmd.repack_item, cmd.location),
            MovementKind::RepackIn,
            reference,
            repack_qty,
            cmd.occurred_at,
        )?)?;

        tracing::info!(repacking = %record.repack_no(), source = %source_qty, repacked = %repack_qty, "repacked");
        Ok(record)
    }

    pub fn consume<S>(&self, tx: &mut StockTransaction<'_, S>, cmd: &commands::ConsumeRepacked) -> EngineResult<RepackingRecord>
    where
        S: PlantStore + ?Sized,
    {
        let mut record = load_repacking(tx, cmd.repacking_id)?;
        let consume = RepackingCommand::ConsumeRepacked(production::ConsumeRepacked {
            repacking_id: RepackingId::new(cmd.repacking_id),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut record, cmd.repacking_id, REPACKING_AGGREGATE, &consume)?;
        Ok(record)
    }

    /// Retire an unconsumed repacking, reverse its ledger legs and give the drawn
    /// units back to the source batch.
    pub fn delete<S>(&self, tx: &mut StockTransaction<'_, S>, cmd: &commands::DeleteRepacking) -> EngineResult<RepackingRecord>
    where
        S: PlantStore + ?Sized,
    {
        let mut record = load_repacking(tx, cmd.repacking_id)?;
        let drawn = record.source_batch().map(|b| (b.0, record.source_quantity()));
        let delete = RepackingCommand::DeleteRepacking(production::DeleteRepacking {
            repacking_id: RepackingId::new(cmd.repacking_id),
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut record, cmd.repacking_id, REPACKING_AGGREGATE, &delete)?;
        ReversalEngine::reverse(tx, cmd.repacking_id, cmd.occurred_at)?;
        if let Some((batch_id, quantity)) = drawn {
            self.tracker.restore(tx, batch_id, quantity, cmd.occurred_at)?;
        }
        Ok(record)
    }
}
