use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{CategoryId, Entity, ItemId, ValueObject};

/// Position of an item in the material flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Raw,
    /// Peetu: processed from raw materials, divided into finished units.
    SemiFinished,
    Finished,
}

/// Physical dimension of a unit of measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Mass,
    Volume,
    /// Discrete units (pcs, nos). Stocked in canonical mass.
    Piece,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub code: String,
    pub kind: UnitKind,
}

impl Unit {
    pub fn kg() -> Self {
        Self {
            code: "kg".to_string(),
            kind: UnitKind::Mass,
        }
    }

    pub fn pieces() -> Self {
        Self {
            code: "pcs".to_string(),
            kind: UnitKind::Piece,
        }
    }

    pub fn litre() -> Self {
        Self {
            code: "l".to_string(),
            kind: UnitKind::Volume,
        }
    }

    pub fn is_piece(&self) -> bool {
        self.kind == UnitKind::Piece
    }
}

impl ValueObject for Unit {}

/// Catalog item. Identity is immutable; the stock core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub code: String,
    pub name: String,
    pub item_type: ItemType,
    pub unit: Unit,
    /// Primary category, used for substitution of raw materials.
    pub category: Option<CategoryId>,
    /// Standard cost per canonical unit.
    pub cost: Decimal,
}

impl Item {
    pub fn new(code: impl Into<String>, item_type: ItemType, unit: Unit) -> Self {
        let code = code.into();
        Self {
            id: ItemId::new(),
            name: code.clone(),
            code,
            item_type,
            unit,
            category: None,
            cost: Decimal::ZERO,
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = cost;
        self
    }

    pub fn is_raw(&self) -> bool {
        self.item_type == ItemType::Raw
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
