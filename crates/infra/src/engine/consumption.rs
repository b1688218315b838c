//! Production batches: planning, lifecycle and completion.
//!
//! Completion is the heavy step. The recipe is resolved into requirements, every
//! requirement is claimed at the batch location (collecting all shortfalls), and
//! only when all of them are covered are the `production_out` debits staged from
//! the same claims. Finished goods are not credited here; the emitted
//! [`ProductionCompleted`] is the hook for whoever verifies the output.

use rust_decimal::Decimal;

use plantflow_catalog::{CatalogService, ConversionResolver};
use plantflow_core::{AggregateId, ItemId, LocationId};
use plantflow_ledger::{DocumentRef, LedgerKey, LedgerPosting, MovementKind, ReferenceKind};
use plantflow_production::{
    self as production, BatchCommand, BatchStatus, ConsumedMaterial, ProductionBatch,
    ProductionBatchId, ProductionCompleted, RecipePlan, resolve_requirements,
};

use crate::commands;
use crate::engine::BATCH_AGGREGATE;
use crate::engine::claims::{Claimed, Claims};
use crate::error::{EngineError, EngineResult};
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

pub fn load_batch<S>(tx: &StockTransaction<'_, S>, batch_id: AggregateId) -> EngineResult<ProductionBatch>
where
    S: PlantStore + ?Sized,
{
    tx.load(batch_id, |id| ProductionBatch::empty(ProductionBatchId::new(id)))
}

pub struct ConsumptionEngine<'a, C: ?Sized> {
    catalog: &'a C,
    scale: u32,
}

impl<'a, C> ConsumptionEngine<'a, C>
where
    C: CatalogService + ?Sized,
{
    pub fn new(catalog: &'a C, scale: u32) -> Self {
        Self { catalog, scale }
    }

    fn plan(&self, item: ItemId, planned_qty: Decimal, peetu_item: Option<ItemId>) -> EngineResult<RecipePlan> {
        Ok(resolve_requirements(self.catalog, &item, planned_qty, peetu_item, self.scale)?)
    }

    /// Claim every requirement of `plan` at `location`.
    fn claim_all<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        plan: &RecipePlan,
        location: LocationId,
    ) -> EngineResult<Vec<Claimed>>
    where
        S: PlantStore + ?Sized,
    {
        let mut claims = Claims::new();
        let mut claimed = Vec::new();
        for req in &plan.requirements {
            claimed.extend(claims.claim_target(tx, self.catalog, req.target, location, req.quantity)?);
        }
        claims.finish()?;
        Ok(claimed)
    }

    /// Plan a batch. Recipe problems fail the command; missing stock only marks
    /// the batch `pending_material`.
    pub fn create_batch<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        cmd: &commands::CreateProductionBatch,
    ) -> EngineResult<ProductionBatch>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, cmd.batch_id)?;
        let plan = self.plan(cmd.item, cmd.planned_qty, cmd.peetu_item)?;

        // Availability is advisory at planning time: check it in a scratch transaction
        // that is never committed, so planning does not pin the stock keys.
        let mut scratch = StockTransaction::begin(tx.store());
        let materials_available = match self.claim_all(&mut scratch, &plan, cmd.location) {
            Ok(_) => true,
            Err(EngineError::AggregatedInsufficientStock(shortfalls)) => {
                tracing::info!(batch = %cmd.batch_no, missing = shortfalls.len(), "materials pending");
                false
            }
            Err(other) => return Err(other),
        };

        let (peetu_item, peetu_qty) = plan.peetu().unzip();
        let create = BatchCommand::CreateBatch(production::CreateBatch {
            batch_id: ProductionBatchId::new(cmd.batch_id),
            batch_no: cmd.batch_no.clone(),
            item: cmd.item,
            location: cmd.location,
            planned_qty: cmd.planned_qty,
            peetu_item,
            peetu_qty,
            materials_available,
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut batch, cmd.batch_id, BATCH_AGGREGATE, &create)?;
        Ok(batch)
    }

    pub fn mark_materials_issued<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        cmd: &commands::MarkMaterialsIssued,
    ) -> EngineResult<ProductionBatch>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, cmd.batch_id)?;
        let issue = BatchCommand::MarkMaterialsIssued(production::MarkMaterialsIssued {
            batch_id: ProductionBatchId::new(cmd.batch_id),
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut batch, cmd.batch_id, BATCH_AGGREGATE, &issue)?;
        Ok(batch)
    }

    pub fn start<S>(&self, tx: &mut StockTransaction<'_, S>, cmd: &commands::StartProduction) -> EngineResult<ProductionBatch>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, cmd.batch_id)?;
        let start = BatchCommand::StartProduction(production::StartProduction {
            batch_id: ProductionBatchId::new(cmd.batch_id),
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut batch, cmd.batch_id, BATCH_AGGREGATE, &start)?;
        Ok(batch)
    }

    /// Consume the recipe for an in-progress batch and mark it completed.
    pub fn complete<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        cmd: &commands::CompleteProduction,
    ) -> EngineResult<(ProductionBatch, ProductionCompleted)>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, cmd.batch_id)?;
        let (Some(item), Some(location)) = (batch.item(), batch.location()) else {
            return Err(EngineError::NotFound(format!("production batch {}", cmd.batch_id)));
        };
        if batch.status() != BatchStatus::InProgress {
            return Err(EngineError::State(format!(
                "cannot complete batch {} in status {:?}",
                batch.batch_no(),
                batch.status()
            )));
        }

        let plan = self.plan(item, batch.planned_qty(), batch.peetu().map(|(peetu, _)| peetu))?;
        let claimed = self.claim_all(tx, &plan, location)?;

        let reference = DocumentRef::new(cmd.batch_id, ReferenceKind::Production, batch.batch_no());
        let mut consumed = Vec::with_capacity(claimed.len());
        for line in claimed {
            tx.post(LedgerPosting::debit(
                LedgerKey::new(line.item, location),
                MovementKind::ProductionOut,
                reference.clone(),
                line.quantity,
                cmd.occurred_at,
            )?)?;
            consumed.push(ConsumedMaterial {
                item: line.item,
                location,
                quantity: line.quantity,
                category: line.category,
            });
        }

        let resolver = ConversionResolver::new(self.catalog, self.scale);
        let unit_mass = resolver.mass_per_unit(&resolver.item(&item)?)?;

        tracing::info!(batch = %batch.batch_no(), %item, %location, lines = consumed.len(), "consuming materials");
        let complete = BatchCommand::CompleteProduction(production::CompleteProduction {
            batch_id: ProductionBatchId::new(cmd.batch_id),
            unit_mass,
            consumed,
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut batch, cmd.batch_id, BATCH_AGGREGATE, &complete)?;

        let completed = ProductionCompleted {
            production_id: ProductionBatchId::new(cmd.batch_id),
            item,
            location,
            quantity: batch.actual_qty(),
            timestamp: cmd.occurred_at,
        };
        Ok((batch, completed))
    }
}
