//! Requirement resolution shared by production consumption and documents.
//!
//! Every line of a command is validated before anything is staged. Claims keep
//! track of what earlier lines already promised, so a later line sees only the
//! stock that is still free.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use plantflow_catalog::CatalogService;
use plantflow_core::{CategoryId, ItemId, LocationId, Shortfall, StockTarget};
use plantflow_ledger::{Candidate, CategoryAllocator, LedgerKey};

use crate::error::{EngineError, EngineResult};
use crate::store::PlantStore;
use crate::transaction::StockTransaction;

/// A concrete quantity of one item promised to a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claimed {
    pub item: ItemId,
    pub quantity: Decimal,
    /// Category the item was allocated for, if any.
    pub category: Option<CategoryId>,
}

#[derive(Debug, Default)]
pub struct Claims {
    claimed: BTreeMap<LedgerKey, Decimal>,
    shortfalls: Vec<Shortfall>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    fn free<S>(&self, tx: &mut StockTransaction<'_, S>, key: LedgerKey) -> EngineResult<Decimal>
    where
        S: PlantStore + ?Sized,
    {
        let claimed = self.claimed.get(&key).copied().unwrap_or_default();
        Ok(tx.available(key)? - claimed)
    }

    fn claim(&mut self, key: LedgerKey, quantity: Decimal) {
        *self.claimed.entry(key).or_default() += quantity;
    }

    /// Claim `quantity` of `target` at `location`.
    ///
    /// A shortage is recorded and returns an empty claim so the caller can keep
    /// validating the remaining lines; see [`Claims::finish`].
    pub fn claim_target<S, C>(
        &mut self,
        tx: &mut StockTransaction<'_, S>,
        catalog: &C,
        target: StockTarget,
        location: LocationId,
        quantity: Decimal,
    ) -> EngineResult<Vec<Claimed>>
    where
        S: PlantStore + ?Sized,
        C: CatalogService + ?Sized,
    {
        match target {
            StockTarget::Item(item) => {
                let key = LedgerKey::new(item, location);
                let free = self.free(tx, key)?;
                if free < quantity {
                    self.shortfalls
                        .push(Shortfall::new(target, location, quantity, free.max(Decimal::ZERO)));
                    return Ok(vec![]);
                }
                self.claim(key, quantity);
                Ok(vec![Claimed {
                    item,
                    quantity,
                    category: None,
                }])
            }
            StockTarget::Category(category) => {
                let mut candidates = Vec::new();
                for item in catalog.raw_items_in_category(&category) {
                    let available = self.free(tx, LedgerKey::new(item, location))?;
                    candidates.push(Candidate { item, available });
                }

                match CategoryAllocator::allocate(category, location, quantity, candidates) {
                    Ok(plan) => {
                        let mut out = Vec::with_capacity(plan.lines.len());
                        for line in plan.lines {
                            self.claim(LedgerKey::new(line.item, location), line.quantity);
                            out.push(Claimed {
                                item: line.item,
                                quantity: line.quantity,
                                category: Some(category),
                            });
                        }
                        Ok(out)
                    }
                    Err(plantflow_core::DomainError::InsufficientStock(s)) => {
                        self.shortfalls.push(s);
                        Ok(vec![])
                    }
                    Err(other) => Err(other.into()),
                }
            }
        }
    }

    /// Fail with every shortfall recorded so far, or succeed if there were none.
    pub fn finish(self) -> EngineResult<()> {
        if self.shortfalls.is_empty() {
            Ok(())
        } else {
            Err(EngineError::AggregatedInsufficientStock(self.shortfalls))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plantflow_catalog::{InMemoryCatalog, Item, ItemType, Unit};
    use plantflow_core::AggregateId;
    use plantflow_ledger::{DocumentRef, LedgerPosting, MovementKind, ReferenceKind};
    use rust_decimal_macros::dec;

    use crate::store::InMemoryPlantStore;

    fn seed(store: &InMemoryPlantStore, item: ItemId, location: LocationId, qty: Decimal) {
        let mut tx = StockTransaction::begin(store);
        let reference = DocumentRef::new(AggregateId::new(), ReferenceKind::Receipt, "OPEN");
        tx.post(
            LedgerPosting::credit(LedgerKey::new(item, location), MovementKind::OpeningBalance, reference, qty, Utc::now())
                .unwrap(),
        )
        .unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn item_and_category_lines_share_stock() {
        let store = InMemoryPlantStore::new();
        let catalog = InMemoryCatalog::new();
        let spices = CategoryId::new();
        let pepper = catalog.add_item(Item::new("PEPPER", ItemType::Raw, Unit::kg()).with_category(spices));
        let location = LocationId::new();
        seed(&store, pepper, location, dec!(5));

        let mut tx = StockTransaction::begin(&store);
        let mut claims = Claims::new();
        let direct = claims
            .claim_target(&mut tx, &catalog, StockTarget::Item(pepper), location, dec!(4))
            .unwrap();
        assert_eq!(direct.len(), 1);

        let by_category = claims
            .claim_target(&mut tx, &catalog, StockTarget::Category(spices), location, dec!(2))
            .unwrap();
        assert!(by_category.is_empty());

        match claims.finish().unwrap_err() {
            EngineError::AggregatedInsufficientStock(all) => {
                assert_eq!(all.len(), 1);
                assert_eq!(all[0].available, dec!(1));
                assert_eq!(all[0].missing(), dec!(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn every_short_line_is_reported() {
        let store = InMemoryPlantStore::new();
        let catalog = InMemoryCatalog::new();
        let location = LocationId::new();
        let (a, b) = (ItemId::new(), ItemId::new());

        let mut tx = StockTransaction::begin(&store);
        let mut claims = Claims::new();
        for item in [a, b] {
            claims
                .claim_target(&mut tx, &catalog, StockTarget::Item(item), location, dec!(1))
                .unwrap();
        }
        assert_eq!(
            claims.finish().unwrap_err().shortfalls().len(),
            2
        );
    }
}
