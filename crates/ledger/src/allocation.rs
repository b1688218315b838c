//! Category allocation: split a required quantity across substitutable raw items.
//!
//! The same ordering (available descending, then item id ascending) is used for the
//! feasibility check and for the plan that gets posted, because the plan returned
//! here *is* what gets posted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{
    CategoryId, DomainError, DomainResult, ItemId, LocationId, Shortfall, StockTarget,
    ensure_positive,
};

/// A category member and what it has available at the target location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub item: ItemId,
    pub available: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub item: ItemId,
    pub quantity: Decimal,
}

/// Concrete, ordered plan: each line ≤ that item's availability, lines sum to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAllocation {
    pub category: CategoryId,
    pub location: LocationId,
    pub lines: Vec<AllocationLine>,
}

impl CategoryAllocation {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CategoryAllocator;

impl CategoryAllocator {
    /// Drop empty candidates and order the rest deterministically.
    ///
    /// Candidates are expected to be unique per item.
    pub fn order(candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
        let mut ordered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.available > Decimal::ZERO)
            .collect();
        ordered.sort_by(|a, b| b.available.cmp(&a.available).then(a.item.cmp(&b.item)));
        ordered
    }

    /// Greedy allocation. On shortage returns `InsufficientStock` and no plan.
    pub fn allocate(
        category: CategoryId,
        location: LocationId,
        required: Decimal,
        candidates: impl IntoIterator<Item = Candidate>,
    ) -> DomainResult<CategoryAllocation> {
        ensure_positive(required, "category requirement")?;

        let ordered = Self::order(candidates);
        let total: Decimal = ordered.iter().map(|c| c.available).sum();
        if total < required {
            return Err(DomainError::InsufficientStock(Shortfall::new(
                StockTarget::Category(category),
                location,
                required,
                total,
            )));
        }

        let mut remaining = required;
        let mut lines = Vec::new();
        for c in ordered {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(c.available);
            lines.push(AllocationLine {
                item: c.item,
                quantity: take,
            });
            remaining -= take;
        }

        tracing::debug!(%category, %location, %required, lines = lines.len(), "category allocated");
        Ok(CategoryAllocation {
            category,
            location,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(n: u128) -> ItemId {
        ItemId::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn spices_ten_kg_takes_largest_first() {
        let (a, b) = (item(1), item(2));
        let plan = CategoryAllocator::allocate(
            CategoryId::new(),
            LocationId::new(),
            dec!(10),
            [
                Candidate { item: b, available: dec!(3) },
                Candidate { item: a, available: dec!(8) },
            ],
        )
        .unwrap();

        assert_eq!(
            plan.lines,
            vec![
                AllocationLine { item: a, quantity: dec!(8) },
                AllocationLine { item: b, quantity: dec!(2) },
            ]
        );
    }

    #[test]
    fn spices_twelve_kg_reports_one_kg_short() {
        let err = CategoryAllocator::allocate(
            CategoryId::new(),
            LocationId::new(),
            dec!(12),
            [
                Candidate { item: item(1), available: dec!(8) },
                Candidate { item: item(2), available: dec!(3) },
            ],
        )
        .unwrap_err();

        match err {
            DomainError::InsufficientStock(s) => assert_eq!(s.missing(), dec!(1)),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn ties_break_by_item_id_and_empty_stock_is_ignored() {
        let ordered = CategoryAllocator::order([
            Candidate { item: item(9), available: dec!(5) },
            Candidate { item: item(3), available: dec!(5) },
            Candidate { item: item(1), available: dec!(0) },
            Candidate { item: item(2), available: dec!(-1) },
        ]);
        let ids: Vec<ItemId> = ordered.iter().map(|c| c.item).collect();
        assert_eq!(ids, vec![item(3), item(9)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a feasible allocation sums exactly to the request and never
        /// exceeds any candidate's availability; an infeasible one yields no plan.
        #[test]
        fn allocation_sums_to_request(
            stocks in prop::collection::vec(0i64..5_000, 1..8),
            required in 1i64..20_000,
        ) {
            let candidates: Vec<Candidate> = stocks
                .iter()
                .enumerate()
                .map(|(i, s)| Candidate { item: item(i as u128 + 1), available: Decimal::new(*s, 1) })
                .collect();
            let required = Decimal::new(required, 1);
            let total: Decimal = candidates.iter().map(|c| c.available).sum();

            match CategoryAllocator::allocate(CategoryId::new(), LocationId::new(), required, candidates.clone()) {
                Ok(plan) => {
                    prop_assert!(total >= required);
                    prop_assert_eq!(plan.total(), required);
                    for line in &plan.lines {
                        let avail = candidates.iter().find(|c| c.item == line.item).map(|c| c.available).unwrap();
                        prop_assert!(line.quantity <= avail);
                        prop_assert!(line.quantity > Decimal::ZERO);
                    }
                }
                Err(DomainError::InsufficientStock(s)) => {
                    prop_assert!(total < required);
                    prop_assert_eq!(s.available, total);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
