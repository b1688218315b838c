//! Recipes. A finished item is produced either directly from raw materials
//! (`DirectBom`) or by dividing Peetu (`ProductYieldBom` + the Peetu's `PeetuBom`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{DomainError, DomainResult, ItemId, StockTarget, ValueObject};

/// One recipe line: a concrete raw item or any member of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomComponent {
    pub source: StockTarget,
    /// Quantity per produced unit (Direct) or per Peetu (Peetu), in canonical units.
    pub quantity: Decimal,
}

impl BomComponent {
    pub fn item(item: ItemId, quantity: Decimal) -> Self {
        Self {
            source: StockTarget::Item(item),
            quantity,
        }
    }

    pub fn category(category: plantflow_core::CategoryId, quantity: Decimal) -> Self {
        Self {
            source: StockTarget::Category(category),
            quantity,
        }
    }
}

impl ValueObject for BomComponent {}

fn validate_components(owner: ItemId, components: &[BomComponent]) -> DomainResult<()> {
    if components.is_empty() {
        return Err(DomainError::configuration(format!(
            "recipe for item {owner} has no components"
        )));
    }
    if let Some(bad) = components.iter().find(|c| c.quantity <= Decimal::ZERO) {
        return Err(DomainError::configuration(format!(
            "recipe for item {owner} has non-positive quantity for {}",
            bad.source
        )));
    }
    Ok(())
}

/// Finished item made straight from raw materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectBom {
    pub finished_item: ItemId,
    pub components: Vec<BomComponent>,
    /// Mass of one finished unit (kg).
    pub unit_mass: Option<Decimal>,
}

impl DirectBom {
    pub fn validate(&self) -> DomainResult<()> {
        validate_components(self.finished_item, &self.components)?;
        if matches!(self.unit_mass, Some(m) if m <= Decimal::ZERO) {
            return Err(DomainError::configuration(format!(
                "unit mass for item {} must be positive",
                self.finished_item
            )));
        }
        Ok(())
    }
}

/// Raw materials needed for one Peetu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeetuBom {
    pub peetu_item: ItemId,
    pub components: Vec<BomComponent>,
}

impl PeetuBom {
    pub fn validate(&self) -> DomainResult<()> {
        validate_components(self.peetu_item, &self.components)
    }
}

/// How many finished units one Peetu divides into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductYieldBom {
    pub finished_item: ItemId,
    pub peetu_item: ItemId,
    pub units_per_peetu: Decimal,
    /// Mass of one finished unit (kg).
    pub mass_per_unit: Option<Decimal>,
}

impl ProductYieldBom {
    pub fn validate(&self) -> DomainResult<()> {
        if self.units_per_peetu <= Decimal::ZERO {
            return Err(DomainError::configuration(format!(
                "units per peetu for item {} / peetu {} must be positive",
                self.finished_item, self.peetu_item
            )));
        }
        if matches!(self.mass_per_unit, Some(m) if m <= Decimal::ZERO) {
            return Err(DomainError::configuration(format!(
                "mass per unit for item {} must be positive",
                self.finished_item
            )));
        }
        Ok(())
    }
}
