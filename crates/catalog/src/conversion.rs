//! Discrete-to-mass conversion.
//!
//! Piece-unit items are stocked in canonical mass. The factor comes from the
//! recipes: the product yield row first, then the direct recipe. There is no
//! 1:1 fallback; a piece item without a factor is a configuration error.

use rust_decimal::Decimal;

use plantflow_core::{DomainError, DomainResult, ItemId, checked_mul, round_quantity};

use crate::item::{Item, UnitKind};
use crate::service::CatalogService;

#[derive(Debug)]
pub struct ConversionResolver<'a, C: ?Sized> {
    catalog: &'a C,
    scale: u32,
}

impl<'a, C> ConversionResolver<'a, C>
where
    C: CatalogService + ?Sized,
{
    pub fn new(catalog: &'a C, scale: u32) -> Self {
        Self { catalog, scale }
    }

    pub fn item(&self, id: &ItemId) -> DomainResult<Item> {
        self.catalog
            .item(id)
            .ok_or_else(|| DomainError::not_found(format!("item {id}")))
    }

    /// Mass (kg) of one unit of `item` as listed in the catalog.
    pub fn mass_per_unit(&self, item: &Item) -> DomainResult<Decimal> {
        match item.unit.kind {
            UnitKind::Mass => Ok(Decimal::ONE),
            UnitKind::Volume => Err(DomainError::configuration(format!(
                "item {} is measured in {} and has no mass conversion",
                item.code, item.unit.code
            ))),
            UnitKind::Piece => self.piece_mass(item),
        }
    }

    fn piece_mass(&self, item: &Item) -> DomainResult<Decimal> {
        let mut factors: Vec<Decimal> = self
            .catalog
            .yield_boms_for(&item.id)
            .into_iter()
            .filter_map(|y| y.mass_per_unit)
            .collect();
        factors.sort();
        factors.dedup();

        match factors.as_slice() {
            [single] => return Ok(*single),
            [] => {}
            _ => {
                return Err(DomainError::configuration(format!(
                    "item {} has conflicting mass-per-unit factors across yield rows",
                    item.code
                )));
            }
        }

        self.catalog
            .direct_bom(&item.id)
            .and_then(|b| b.unit_mass)
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "no conversion factor for piece item {} (no yield or direct recipe mass)",
                    item.code
                ))
            })
    }

    /// Convert a quantity expressed in the item's catalog unit into the unit the
    /// ledger stocks it in.
    pub fn to_canonical(&self, item_id: &ItemId, quantity: Decimal) -> DomainResult<Decimal> {
        let item = self.item(item_id)?;
        if !item.unit.is_piece() {
            return Ok(quantity);
        }
        let mass = self.piece_mass(&item)?;
        tracing::debug!(item = %item.code, %quantity, %mass, "converted pieces to mass");
        Ok(round_quantity(checked_mul(quantity, mass, "canonical quantity")?, self.scale))
    }
}
