//! Stock addressing shared by every module: what is being requested, and what was missing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::{CategoryId, ItemId, LocationId};
use crate::value_object::ValueObject;

/// A quantity request is either for one concrete item or for any substitutable
/// member of a category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockTarget {
    Item(ItemId),
    Category(CategoryId),
}

impl core::fmt::Display for StockTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StockTarget::Item(id) => write!(f, "item {id}"),
            StockTarget::Category(id) => write!(f, "category {id}"),
        }
    }
}

/// One unmet requirement: `required` was asked for at `location`, only
/// `available` could be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub target: StockTarget,
    pub location: LocationId,
    pub required: Decimal,
    pub available: Decimal,
}

impl Shortfall {
    pub fn new(target: StockTarget, location: LocationId, required: Decimal, available: Decimal) -> Self {
        Self {
            target,
            location,
            required,
            available,
        }
    }

    /// Missing quantity (`required - available`, never negative).
    pub fn missing(&self) -> Decimal {
        (self.required - self.available).max(Decimal::ZERO)
    }
}

impl ValueObject for Shortfall {}

impl core::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} at location {}: required {}, available {}, short {}",
            self.target,
            self.location,
            self.required,
            self.available,
            self.missing()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_is_required_minus_available() {
        let s = Shortfall::new(
            StockTarget::Category(CategoryId::new()),
            LocationId::new(),
            dec!(12),
            dec!(11),
        );
        assert_eq!(s.missing(), dec!(1));
    }

    #[test]
    fn missing_never_goes_negative() {
        let s = Shortfall::new(StockTarget::Item(ItemId::new()), LocationId::new(), dec!(1), dec!(3));
        assert_eq!(s.missing(), Decimal::ZERO);
    }
}
