//! Remaining finished units of a batch: verification from measured weight, and
//! draw-down by downstream consumers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use plantflow_core::AggregateId;
use plantflow_production::{self as production, BatchCommand, ProductionBatch, ProductionBatchId};

use crate::commands;
use crate::engine::BATCH_AGGREGATE;
use crate::engine::consumption::load_batch;
use crate::error::EngineResult;
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

#[derive(Debug, Clone, Copy, Default)]
pub struct RemainingQuantityTracker {
    allow_reverify: bool,
}

impl RemainingQuantityTracker {
    pub fn new(allow_reverify: bool) -> Self {
        Self { allow_reverify }
    }

    pub fn verify<S>(&self, tx: &mut StockTransaction<'_, S>, cmd: &commands::VerifyRemaining) -> EngineResult<ProductionBatch>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, cmd.batch_id)?;
        let verify = BatchCommand::VerifyRemaining(production::VerifyRemaining {
            batch_id: ProductionBatchId::new(cmd.batch_id),
            measured_weight: cmd.measured_weight,
            reason: cmd.reason.clone(),
            allow_reverify: self.allow_reverify,
            occurred_at: cmd.occurred_at,
        });
        tx.execute(&mut batch, cmd.batch_id, BATCH_AGGREGATE, &verify)?;

        tracing::info!(
            batch = %batch.batch_no(),
            remaining = %batch.remaining_qty(),
            wastage = %batch.wastage().wastage_units,
            "remaining verified"
        );
        Ok(batch)
    }

    /// Take `quantity` finished units off a batch's remaining quantity.
    pub fn draw<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        batch_id: AggregateId,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> EngineResult<ProductionBatch>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, batch_id)?;
        let draw = BatchCommand::DrawRemaining(production::DrawRemaining {
            batch_id: ProductionBatchId::new(batch_id),
            quantity,
            occurred_at,
        });
        tx.execute(&mut batch, batch_id, BATCH_AGGREGATE, &draw)?;
        Ok(batch)
    }

    /// Give back units of an earlier draw, e.g. when the repacking that took them is deleted.
    pub fn restore<S>(
        &self,
        tx: &mut StockTransaction<'_, S>,
        batch_id: AggregateId,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> EngineResult<ProductionBatch>
    where
        S: PlantStore + ?Sized,
    {
        let mut batch = load_batch(tx, batch_id)?;
        let restore = BatchCommand::RestoreRemaining(production::RestoreRemaining {
            batch_id: ProductionBatchId::new(batch_id),
            quantity,
            occurred_at,
        });
        tx.execute(&mut batch, batch_id, BATCH_AGGREGATE, &restore)?;
        tracing::debug!(batch = %batch.batch_no(), %quantity, remaining = %batch.remaining_qty(), "draw restored");
        Ok(batch)
    }
}
