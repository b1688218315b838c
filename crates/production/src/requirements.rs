//! Recipe resolution for a production batch.
//!
//! - Semi-finished (Peetu) batch: the Peetu's own recipe × planned quantity.
//! - Finished item with a direct recipe: per-unit quantity × planned quantity.
//! - Otherwise the Peetu path: planned ÷ units-per-Peetu gives the Peetu count,
//!   each Peetu component × that count.
//!
//! A direct recipe wins when both shapes exist. Anything missing or ambiguous is
//! a configuration error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_catalog::{BomComponent, CatalogService, ItemType, ProductYieldBom};
use plantflow_core::{
    DomainError, DomainResult, ItemId, StockTarget, checked_div, checked_mul, ensure_positive, round_quantity,
};

/// Quantity of one item or category needed by a batch (canonical units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub target: StockTarget,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RecipeShape {
    Direct,
    Peetu {
        peetu_item: ItemId,
        units_per_peetu: Decimal,
        peetu_qty: Decimal,
    },
    SemiFinished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipePlan {
    pub shape: RecipeShape,
    pub requirements: Vec<Requirement>,
}

impl RecipePlan {
    pub fn peetu(&self) -> Option<(ItemId, Decimal)> {
        match self.shape {
            RecipeShape::Peetu {
                peetu_item,
                peetu_qty,
                ..
            } => Some((peetu_item, peetu_qty)),
            _ => None,
        }
    }
}

/// Resolve what producing `planned_qty` of `item` consumes.
///
/// `peetu_item` disambiguates when a finished item can be cut from several Peetus.
pub fn resolve_requirements<C>(
    catalog: &C,
    item: &ItemId,
    planned_qty: Decimal,
    peetu_item: Option<ItemId>,
    scale: u32,
) -> DomainResult<RecipePlan>
where
    C: CatalogService + ?Sized,
{
    ensure_positive(planned_qty, "planned quantity")?;
    let produced = catalog
        .item(item)
        .ok_or_else(|| DomainError::not_found(format!("item {item}")))?;

    match produced.item_type {
        ItemType::Raw => Err(DomainError::configuration(format!(
            "raw item {} cannot be produced",
            produced.code
        ))),
        ItemType::SemiFinished => {
            let bom = catalog.peetu_bom(item).ok_or_else(|| {
                DomainError::configuration(format!("no peetu recipe for {}", produced.code))
            })?;
            Ok(RecipePlan {
                shape: RecipeShape::SemiFinished,
                requirements: scale_components(&bom.components, planned_qty, Decimal::ONE, scale)?,
            })
        }
        ItemType::Finished => {
            if let Some(bom) = catalog.direct_bom(item) {
                return Ok(RecipePlan {
                    shape: RecipeShape::Direct,
                    requirements: scale_components(&bom.components, planned_qty, Decimal::ONE, scale)?,
                });
            }

            let row = select_yield_row(catalog.yield_boms_for(item), peetu_item, &produced.code)?;
            if row.units_per_peetu <= Decimal::ZERO {
                return Err(DomainError::configuration(format!(
                    "units per peetu for {} must be positive",
                    produced.code
                )));
            }
            let bom = catalog.peetu_bom(&row.peetu_item).ok_or_else(|| {
                DomainError::configuration(format!(
                    "no peetu recipe for peetu {} of {}",
                    row.peetu_item, produced.code
                ))
            })?;

            // Rounded count is informational; requirements use the exact quotient.
            let peetu_qty = round_quantity(checked_div(planned_qty, row.units_per_peetu, "peetu count")?, scale);
            Ok(RecipePlan {
                shape: RecipeShape::Peetu {
                    peetu_item: row.peetu_item,
                    units_per_peetu: row.units_per_peetu,
                    peetu_qty,
                },
                requirements: scale_components(&bom.components, planned_qty, row.units_per_peetu, scale)?,
            })
        }
    }
}

fn select_yield_row(
    rows: Vec<ProductYieldBom>,
    peetu_item: Option<ItemId>,
    code: &str,
) -> DomainResult<ProductYieldBom> {
    let mut candidates: Vec<ProductYieldBom> = match peetu_item {
        Some(p) => rows.into_iter().filter(|r| r.peetu_item == p).collect(),
        None => rows,
    };
    match candidates.len() {
        0 => Err(DomainError::configuration(format!(
            "no direct recipe or yield row for {code}"
        ))),
        1 => Ok(candidates.remove(0)),
        n => Err(DomainError::configuration(format!(
            "{n} yield rows for {code} and no peetu item given"
        ))),
    }
}

/// Each component × `planned` ÷ `divisor`, rounded once, merging lines that hit
/// the same target.
fn scale_components(
    components: &[BomComponent],
    planned: Decimal,
    divisor: Decimal,
    scale: u32,
) -> DomainResult<Vec<Requirement>> {
    let mut merged: Vec<Requirement> = Vec::with_capacity(components.len());
    for c in components {
        let gross = checked_mul(c.quantity, planned, "component requirement")?;
        let quantity = round_quantity(checked_div(gross, divisor, "component requirement")?, scale);
        match merged.iter_mut().find(|r| r.target == c.source) {
            Some(existing) => existing.quantity += quantity,
            None => merged.push(Requirement {
                target: c.source,
                quantity,
            }),
        }
    }
    Ok(merged)
}
