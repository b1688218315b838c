//! Inbound commands accepted by [`crate::plant::PlantEngine`].
//!
//! These are the shapes callers (request layer, CLI scenario files) send. The engine
//! enriches them with catalog data and configuration before the aggregates see
//! them. Ids of new records default to a fresh id when omitted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{AggregateId, ItemId, LocationId};
use plantflow_documents::{DocumentKind, TransferLine};
use plantflow_ledger::MovementKind;

fn receipt_kind() -> MovementKind {
    MovementKind::Receipt
}

/// Credit stock from outside the core: opening balances, supplier receipts, and
/// finished goods posted by the verification module (`production_in`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub item: ItemId,
    pub location: LocationId,
    /// In the item's own unit; pieces are converted to mass.
    pub quantity: Decimal,
    #[serde(default = "receipt_kind")]
    pub kind: MovementKind,
    pub reference_no: String,
    /// Source document, e.g. the production batch for `production_in`.
    #[serde(default)]
    pub reference: Option<AggregateId>,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProductionBatch {
    #[serde(default)]
    pub batch_id: AggregateId,
    pub batch_no: String,
    pub item: ItemId,
    pub location: LocationId,
    pub planned_qty: Decimal,
    /// Picks the yield row when a finished item can be made from several Peetus.
    #[serde(default)]
    pub peetu_item: Option<ItemId>,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkMaterialsIssued {
    pub batch_id: AggregateId,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProduction {
    pub batch_id: AggregateId,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteProduction {
    pub batch_id: AggregateId,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRemaining {
    pub batch_id: AggregateId,
    pub measured_weight: Decimal,
    pub reason: String,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

/// Downstream consumption of finished units (trolley loading).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawFromBatch {
    pub batch_id: AggregateId,
    pub quantity: Decimal,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRepacking {
    #[serde(default)]
    pub repacking_id: AggregateId,
    pub repack_no: String,
    pub source_item: ItemId,
    pub repack_item: ItemId,
    pub location: LocationId,
    pub source_quantity: Decimal,
    pub repack_quantity: Decimal,
    /// Batch whose remaining units the source is drawn from.
    #[serde(default)]
    pub source_batch: Option<AggregateId>,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeRepacked {
    pub repacking_id: AggregateId,
    pub quantity: Decimal,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRepacking {
    pub repacking_id: AggregateId,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferDocument {
    #[serde(default)]
    pub document_id: AggregateId,
    pub kind: DocumentKind,
    pub doc_no: String,
    pub source: LocationId,
    pub destination: LocationId,
    pub lines: Vec<TransferLine>,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTransferDocument {
    pub document_id: AggregateId,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTransferDocument {
    pub document_id: AggregateId,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

/// Any inbound command, tagged by name for scenario files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlantCommand {
    ReceiveStock(ReceiveStock),
    CreateProductionBatch(CreateProductionBatch),
    MarkMaterialsIssued(MarkMaterialsIssued),
    StartProduction(StartProduction),
    CompleteProduction(CompleteProduction),
    VerifyRemaining(VerifyRemaining),
    DrawFromBatch(DrawFromBatch),
    CreateRepacking(CreateRepacking),
    ConsumeRepacked(ConsumeRepacked),
    DeleteRepacking(DeleteRepacking),
    CreateTransferDocument(CreateTransferDocument),
    CompleteTransferDocument(CompleteTransferDocument),
    DeleteTransferDocument(DeleteTransferDocument),
}

impl PlantCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlantCommand::ReceiveStock(_) => "stock.receive",
            PlantCommand::CreateProductionBatch(_) => "batch.create",
            PlantCommand::MarkMaterialsIssued(_) => "batch.materials_issued",
            PlantCommand::StartProduction(_) => "batch.start",
            PlantCommand::CompleteProduction(_) => "batch.complete",
            PlantCommand::VerifyRemaining(_) => "batch.verify_remaining",
            PlantCommand::DrawFromBatch(_) => "batch.draw",
            PlantCommand::CreateRepacking(_) => "repacking.create",
            PlantCommand::ConsumeRepacked(_) => "repacking.consume",
            PlantCommand::DeleteRepacking(_) => "repacking.delete",
            PlantCommand::CreateTransferDocument(_) => "transfer.create",
            PlantCommand::CompleteTransferDocument(_) => "transfer.complete",
            PlantCommand::DeleteTransferDocument(_) => "transfer.delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn scenario_commands_are_tagged_by_name() {
        let item = ItemId::new();
        let location = LocationId::new();
        let json = serde_json::json!({
            "command": "receive_stock",
            "item": item,
            "location": location,
            "quantity": "25",
            "reference_no": "GRN-1",
        });

        let cmd: PlantCommand = serde_json::from_value(json).unwrap();
        match &cmd {
            PlantCommand::ReceiveStock(r) => {
                assert_eq!(r.quantity, dec!(25));
                assert_eq!(r.kind, MovementKind::Receipt);
                assert!(r.reference.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cmd.name(), "stock.receive");
    }

    #[test]
    fn omitted_ids_are_generated() {
        let json = serde_json::json!({
            "command": "create_production_batch",
            "batch_no": "B-1",
            "item": ItemId::new(),
            "location": LocationId::new(),
            "planned_qty": "10",
        });
        let a: PlantCommand = serde_json::from_value(json.clone()).unwrap();
        let b: PlantCommand = serde_json::from_value(json).unwrap();
        match (a, b) {
            (PlantCommand::CreateProductionBatch(a), PlantCommand::CreateProductionBatch(b)) => {
                assert_ne!(a.batch_id, b.batch_id);
                assert!(a.peetu_item.is_none());
            }
            other => panic!("unexpected commands: {other:?}"),
        }
    }
}
