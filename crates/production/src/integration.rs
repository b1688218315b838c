use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{ItemId, LocationId};
use plantflow_events::Event;

use crate::batch::ProductionBatchId;

/// Integration event: a batch finished and its units await verification.
///
/// Finished-goods credits are posted by the downstream verification module
/// (through `ReceiveStock` with `production_in`), never by the batch itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionCompleted {
    pub production_id: ProductionBatchId,
    pub item: ItemId,
    pub location: LocationId,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Event for ProductionCompleted {
    fn event_type(&self) -> &'static str {
        "production.completed"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
