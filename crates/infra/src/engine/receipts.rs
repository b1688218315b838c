use plantflow_catalog::{CatalogService, ConversionResolver, LocationService};
use plantflow_core::{AggregateId, ensure_positive};
use plantflow_ledger::{DocumentRef, LedgerKey, LedgerPosting, MovementKind, ReferenceKind};

use crate::commands;
use crate::error::{EngineError, EngineResult};
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

/// Inbound credits: opening balances, supplier receipts and verified finished goods.
pub struct StockReceiver<'a, C: ?Sized, L: ?Sized> {
    catalog: &'a C,
    locations: &'a L,
    scale: u32,
}

impl<'a, C, L> StockReceiver<'a, C, L>
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

    pub fn receive<S>(&self, tx: &mut StockTransaction<'_, S>, cmd: &commands::ReceiveStock) -> EngineResult<LedgerPosting>
    where
        S: PlantStore + ?Sized,
    {
        let reference_kind = match cmd.kind {
            MovementKind::OpeningBalance | MovementKind::Receipt => ReferenceKind::Receipt,
            MovementKind::ProductionIn => ReferenceKind::Production,
            other => {
                return Err(EngineError::Validation(format!(
                    "{} cannot be received from outside",
                    other.as_str()
                )));
            }
        };
        if cmd.reference_no.trim().is_empty() {
            return Err(EngineError::Validation("reference_no cannot be empty".to_string()));
        }
        ensure_positive(cmd.quantity, "received quantity")?;
        if self.locations.resolve(&cmd.location).is_none() {
            return Err(EngineError::NotFound(format!("location {}", cmd.location)));
        }

        let quantity = ConversionResolver::new(self.catalog, self.scale).to_canonical(&cmd.item, cmd.quantity)?;
        let reference = DocumentRef::new(
            cmd.reference.unwrap_or_else(AggregateId::new),
            reference_kind,
            cmd.reference_no.trim(),
        );
        let posting = LedgerPosting::credit(
            LedgerKey::new(cmd.item, cmd.location),
            cmd.kind,
            reference,
            quantity,
            cmd.occurred_at,
        )?;
        tx.post(posting.clone())?;

        tracing::info!(item = %cmd.item, location = %cmd.location, %quantity, kind = cmd.kind.as_str(), "stock received");
        Ok(posting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plantflow_catalog::{BomComponent, DirectBom, InMemoryCatalog, Item, ItemType, Location, LocationKind, Unit};
    use plantflow_core::{ItemId, LocationId};
    use rust_decimal_macros::dec;

    use crate::store::InMemoryPlantStore;

    fn receive(
        kind: MovementKind,
        item: ItemId,
        location: LocationId,
        quantity: rust_decimal::Decimal,
    ) -> commands::ReceiveStock {
        commands::ReceiveStock {
            item,
            location,
            quantity,
            kind,
            reference_no: "GRN-9".to_string(),
            reference: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn pieces_are_received_as_mass() {
        let catalog = InMemoryCatalog::new();
        let salt = catalog.add_item(Item::new("SALT", ItemType::Raw, Unit::kg()));
        let bun = catalog.add_item(Item::new("BUN", ItemType::Finished, Unit::pieces()));
        let floor = catalog.add_location(Location::new("PRODUCTION", LocationKind::ProductionFloor));
        catalog
            .add_direct_bom(DirectBom {
                finished_item: bun,
                components: vec![BomComponent::item(salt, dec!(0.01))],
                unit_mass: Some(dec!(0.08)),
            })
            .unwrap();

        let store = InMemoryPlantStore::new();
        let mut tx = StockTransaction::begin(&store);
        let posting = StockReceiver::new(&catalog, &catalog, 3)
            .receive(&mut tx, &receive(MovementKind::ProductionIn, bun, floor, dec!(50)))
            .unwrap();
        assert_eq!(posting.quantity_in, dec!(4.000));
        assert_eq!(posting.reference.kind, ReferenceKind::Production);
    }

    #[test]
    fn internal_movements_are_rejected() {
        let catalog = InMemoryCatalog::new();
        let salt = catalog.add_item(Item::new("SALT", ItemType::Raw, Unit::kg()));
        let store_loc = catalog.add_location(Location::new("STORE", LocationKind::Store));
        let store = InMemoryPlantStore::new();
        let mut tx = StockTransaction::begin(&store);

        let err = StockReceiver::new(&catalog, &catalog, 3)
            .receive(&mut tx, &receive(MovementKind::TransferIn, salt, store_loc, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn unknown_location_is_not_found() {
        let catalog = InMemoryCatalog::new();
        let salt = catalog.add_item(Item::new("SALT", ItemType::Raw, Unit::kg()));
        let store = InMemoryPlantStore::new();
        let mut tx = StockTransaction::begin(&store);

        let err = StockReceiver::new(&catalog, &catalog, 3)
            .receive(&mut tx, &receive(MovementKind::Receipt, salt, LocationId::new(), dec!(1)))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(msg) if msg.starts_with("location")));
        assert!(tx.staged_postings().is_empty());
    }
}
