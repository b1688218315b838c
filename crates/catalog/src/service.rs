//! Read-only collaborator interfaces to the catalog/master-data service.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use plantflow_core::{CategoryId, DomainResult, ItemId, LocationId};

use crate::bom::{DirectBom, PeetuBom, ProductYieldBom};
use crate::item::Item;
use crate::location::Location;

/// Items and recipes, as owned by the catalog service.
pub trait CatalogService: Send + Sync {
    fn item(&self, id: &ItemId) -> Option<Item>;

    fn items(&self) -> Vec<Item>;

    fn direct_bom(&self, finished_item: &ItemId) -> Option<DirectBom>;

    fn peetu_bom(&self, peetu_item: &ItemId) -> Option<PeetuBom>;

    /// Every yield row for a finished item (one per Peetu it can be cut from).
    fn yield_boms_for(&self, finished_item: &ItemId) -> Vec<ProductYieldBom>;

    /// Explicit membership list of a category (in addition to primary categories).
    fn category_members(&self, category: &CategoryId) -> Vec<ItemId>;

    /// Raw items that may substitute for `category`: primary category or membership
    /// list, deduplicated and ordered by id.
    fn raw_items_in_category(&self, category: &CategoryId) -> Vec<ItemId> {
        let mut ids: BTreeSet<ItemId> = self
            .items()
            .into_iter()
            .filter(|i| i.category.as_ref() == Some(category))
            .map(|i| i.id)
            .collect();
        ids.extend(self.category_members(category));

        ids.into_iter()
            .filter(|id| self.item(id).is_some_and(|i| i.is_raw()))
            .collect()
    }
}

/// Location lookup, as owned by the location service.
pub trait LocationService: Send + Sync {
    fn resolve(&self, id: &LocationId) -> Option<Location>;

    fn resolve_code(&self, code: &str) -> Option<Location>;
}

impl<S> CatalogService for Arc<S>
where
    S: CatalogService + ?Sized,
{
    fn item(&self, id: &ItemId) -> Option<Item> {
        (**self).item(id)
    }

    fn items(&self) -> Vec<Item> {
        (**self).items()
    }

    fn direct_bom(&self, finished_item: &ItemId) -> Option<DirectBom> {
        (**self).direct_bom(finished_item)
    }

    fn peetu_bom(&self, peetu_item: &ItemId) -> Option<PeetuBom> {
        (**self).peetu_bom(peetu_item)
    }

    fn yield_boms_for(&self, finished_item: &ItemId) -> Vec<ProductYieldBom> {
        (**self).yield_boms_for(finished_item)
    }

    fn category_members(&self, category: &CategoryId) -> Vec<ItemId> {
        (**self).category_members(category)
    }
}

impl<S> LocationService for Arc<S>
where
    S: LocationService + ?Sized,
{
    fn resolve(&self, id: &LocationId) -> Option<Location> {
        (**self).resolve(id)
    }

    fn resolve_code(&self, code: &str) -> Option<Location> {
        (**self).resolve_code(code)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    items: HashMap<ItemId, Item>,
    locations: HashMap<LocationId, Location>,
    direct: HashMap<ItemId, DirectBom>,
    peetu: HashMap<ItemId, PeetuBom>,
    yields: Vec<ProductYieldBom>,
    members: HashMap<CategoryId, Vec<ItemId>>,
}

/// In-memory catalog for tests/dev and the CLI.
///
/// Registration validates recipes up front so configuration errors surface when
/// master data is loaded, not halfway through a production run.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CatalogState> {
        // Catalog writers never panic while holding the lock; recover the data if they did.
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CatalogState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_item(&self, item: Item) -> ItemId {
        let id = item.id;
        self.write().items.insert(id, item);
        id
    }

    pub fn add_location(&self, location: Location) -> LocationId {
        let id = location.id;
        self.write().locations.insert(id, location);
        id
    }

    pub fn add_direct_bom(&self, bom: DirectBom) -> DomainResult<()> {
        bom.validate()?;
        self.write().direct.insert(bom.finished_item, bom);
        Ok(())
    }

    pub fn add_peetu_bom(&self, bom: PeetuBom) -> DomainResult<()> {
        bom.validate()?;
        self.write().peetu.insert(bom.peetu_item, bom);
        Ok(())
    }

    /// Add (or replace) the yield row for a (finished item, Peetu) pair.
    pub fn add_yield_bom(&self, bom: ProductYieldBom) -> DomainResult<()> {
        bom.validate()?;
        let mut state = self.write();
        state
            .yields
            .retain(|y| !(y.finished_item == bom.finished_item && y.peetu_item == bom.peetu_item));
        state.yields.push(bom);
        Ok(())
    }

    pub fn add_category_member(&self, category: CategoryId, item: ItemId) {
        let mut state = self.write();
        let members = state.members.entry(category).or_default();
        if !members.contains(&item) {
            members.push(item);
        }
    }
}

impl CatalogService for InMemoryCatalog {
    fn item(&self, id: &ItemId) -> Option<Item> {
        self.read().items.get(id).cloned()
    }

    fn items(&self) -> Vec<Item> {
        self.read().items.values().cloned().collect()
    }

    fn direct_bom(&self, finished_item: &ItemId) -> Option<DirectBom> {
        self.read().direct.get(finished_item).cloned()
    }

    fn peetu_bom(&self, peetu_item: &ItemId) -> Option<PeetuBom> {
        self.read().peetu.get(peetu_item).cloned()
    }

    fn yield_boms_for(&self, finished_item: &ItemId) -> Vec<ProductYieldBom> {
        self.read()
            .yields
            .iter()
            .filter(|y| &y.finished_item == finished_item)
            .cloned()
            .collect()
    }

    fn category_members(&self, category: &CategoryId) -> Vec<ItemId> {
        self.read().members.get(category).cloned().unwrap_or_default()
    }
}

impl LocationService for InMemoryCatalog {
    fn resolve(&self, id: &LocationId) -> Option<Location> {
        self.read().locations.get(id).cloned()
    }

    fn resolve_code(&self, code: &str) -> Option<Location> {
        self.read()
            .locations
            .values()
            .find(|l| l.code.eq_ignore_ascii_case(code))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemType, Unit};
    use crate::location::LocationKind;

    #[test]
    fn category_resolution_merges_primary_and_membership_raw_items_only() {
        let catalog = InMemoryCatalog::new();
        let spices = CategoryId::new();

        let chilli = catalog.add_item(Item::new("CHILLI", ItemType::Raw, Unit::kg()).with_category(spices));
        let pepper = catalog.add_item(Item::new("PEPPER", ItemType::Raw, Unit::kg()));
        let masala = catalog.add_item(
            Item::new("MASALA-PEETU", ItemType::SemiFinished, Unit::kg()).with_category(spices),
        );
        catalog.add_category_member(spices, pepper);
        catalog.add_category_member(spices, chilli);

        let members = catalog.raw_items_in_category(&spices);
        assert_eq!(members.len(), 2);
        assert!(members.contains(&chilli));
        assert!(members.contains(&pepper));
        assert!(!members.contains(&masala));
    }

    #[test]
    fn yield_rows_replace_per_pair() {
        let catalog = InMemoryCatalog::new();
        let bun = ItemId::new();
        let dough = ItemId::new();
        let row = |units| ProductYieldBom {
            finished_item: bun,
            peetu_item: dough,
            units_per_peetu: units,
            mass_per_unit: None,
        };
        catalog.add_yield_bom(row(rust_decimal::Decimal::from(10))).unwrap();
        catalog.add_yield_bom(row(rust_decimal::Decimal::from(12))).unwrap();

        let rows = catalog.yield_boms_for(&bun);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].units_per_peetu, rust_decimal::Decimal::from(12));
    }

    #[test]
    fn locations_resolve_by_id_and_code() {
        let catalog = InMemoryCatalog::new();
        let store = catalog.add_location(Location::new("STORE", LocationKind::Store));
        assert_eq!(catalog.resolve(&store).map(|l| l.kind), Some(LocationKind::Store));
        assert_eq!(catalog.resolve_code("store").map(|l| l.id), Some(store));
        assert!(catalog.resolve_code("floor").is_none());
    }
}
