//! Read side of the stock ledger.
//!
//! Queries read committed state without joining a transaction; they are
//! reporting snapshots. Decisions that lead to writes go through
//! [`crate::transaction::StockTransaction`] instead.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use plantflow_core::{AggregateId, ItemId, LocationId};
use plantflow_ledger::{LedgerKey, StockLedgerEntry, fold_balance, verify_snapshots};

use crate::error::EngineResult;
use crate::store::PlantStore;

#[derive(Debug, Clone)]
pub struct LedgerStore<S> {
    store: S,
}

impl<S> LedgerStore<S>
where
    S: PlantStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn balance(&self, item: ItemId, location: LocationId) -> EngineResult<Decimal> {
        Ok(self.store.key_state(&LedgerKey::new(item, location))?.balance)
    }

    /// Stock of `item` across every location.
    pub fn global_balance(&self, item: ItemId) -> EngineResult<Decimal> {
        Ok(self.balances_for_item(item)?.values().copied().sum())
    }

    pub fn balances_for_item(&self, item: ItemId) -> EngineResult<BTreeMap<LocationId, Decimal>> {
        let mut out = BTreeMap::new();
        for key in self.store.item_keys(&item)? {
            out.insert(key.location, self.store.key_state(&key)?.balance);
        }
        Ok(out)
    }

    /// Stock card: every entry of one key in append order.
    pub fn entries(&self, item: ItemId, location: LocationId) -> EngineResult<Vec<StockLedgerEntry>> {
        Ok(self.store.entries(&LedgerKey::new(item, location))?)
    }

    /// Audit trail of one source document, reversals included.
    pub fn entries_for_reference(&self, reference: AggregateId) -> EngineResult<Vec<StockLedgerEntry>> {
        Ok(self.store.entries_for_reference(&reference)?)
    }

    pub fn cached_stock(&self, item: ItemId) -> EngineResult<Decimal> {
        Ok(self.store.cached_stock(&item)?.unwrap_or_default())
    }

    pub fn rebuild_stock_cache(&self) -> EngineResult<()> {
        Ok(self.store.rebuild_stock_cache()?)
    }

    /// Recompute one key's balance from its entries and check every snapshot.
    pub fn audit_key(&self, item: ItemId, location: LocationId) -> EngineResult<Decimal> {
        let entries = self.entries(item, location)?;
        verify_snapshots(&entries)?;
        Ok(fold_balance(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plantflow_ledger::{DocumentRef, LedgerPosting, MovementKind, ReferenceKind};
    use rust_decimal_macros::dec;

    use crate::store::InMemoryPlantStore;
    use crate::transaction::StockTransaction;

    #[test]
    fn balances_follow_postings() {
        let store = InMemoryPlantStore::new();
        let item = ItemId::new();
        let (store_loc, floor) = (LocationId::new(), LocationId::new());
        let reference = DocumentRef::new(AggregateId::new(), ReferenceKind::Transfer, "TRF-1");

        let mut tx = StockTransaction::begin(&store);
        for (loc, qty) in [(store_loc, dec!(7)), (floor, dec!(1.25))] {
            tx.post(
                LedgerPosting::credit(LedgerKey::new(item, loc), MovementKind::Receipt, reference.clone(), qty, Utc::now())
                    .unwrap(),
            )
            .unwrap();
        }
        tx.commit().unwrap();

        let ledger = LedgerStore::new(&store);
        assert_eq!(ledger.balance(item, store_loc).unwrap(), dec!(7));
        assert_eq!(ledger.global_balance(item).unwrap(), dec!(8.25));
        assert_eq!(ledger.cached_stock(item).unwrap(), dec!(8.25));
        assert_eq!(ledger.audit_key(item, floor).unwrap(), dec!(1.25));
        assert_eq!(ledger.entries_for_reference(reference.id).unwrap().len(), 2);
    }
}
