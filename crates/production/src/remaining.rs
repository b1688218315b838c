//! Remaining quantity from a measured weight.
//!
//! Two different losses are kept apart: `wastage_units` is the fraction of a unit
//! lost to rounding down (`raw_units - floor(raw_units)`), `variance_weight` is the
//! gap between measured and theoretical weight.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantflow_core::{DomainError, DomainResult, ValueObject, checked_div, checked_mul};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingMeasurement {
    pub measured_weight: Decimal,
    pub unit_mass: Decimal,
    pub prior_remaining: Decimal,
    pub theoretical_weight: Decimal,
    pub raw_units: Decimal,
    pub remaining_units: Decimal,
    pub wastage_units: Decimal,
    pub variance_weight: Decimal,
}

impl RemainingMeasurement {
    pub fn measure(
        measured_weight: Decimal,
        unit_mass: Decimal,
        prior_remaining: Decimal,
    ) -> DomainResult<Self> {
        if unit_mass <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "unit mass must be positive (got {unit_mass})"
            )));
        }
        if measured_weight < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "measured weight cannot be negative (got {measured_weight})"
            )));
        }

        let theoretical_weight = checked_mul(prior_remaining, unit_mass, "theoretical weight")?;
        let variance_weight = measured_weight - theoretical_weight;

        if measured_weight.is_zero() {
            return Ok(Self {
                measured_weight,
                unit_mass,
                prior_remaining,
                theoretical_weight,
                raw_units: Decimal::ZERO,
                remaining_units: Decimal::ZERO,
                wastage_units: prior_remaining,
                variance_weight,
            });
        }

        let raw_units = checked_div(measured_weight, unit_mass, "remaining units")?;
        let remaining_units = raw_units.floor();
        Ok(Self {
            measured_weight,
            unit_mass,
            prior_remaining,
            theoretical_weight,
            raw_units,
            remaining_units,
            wastage_units: raw_units - remaining_units,
            variance_weight,
        })
    }

    /// Weight represented by the whole units that remain.
    pub fn remaining_weight(&self) -> Decimal {
        self.remaining_units * self.unit_mass
    }
}

impl ValueObject for RemainingMeasurement {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_weight_turns_everything_into_wastage() {
        let m = RemainingMeasurement::measure(dec!(0), dec!(0.25), dec!(40)).unwrap();
        assert_eq!(m.remaining_units, Decimal::ZERO);
        assert_eq!(m.wastage_units, dec!(40));
        assert_eq!(m.variance_weight, dec!(-10));
    }

    #[test]
    fn partial_unit_is_rounding_wastage() {
        let m = RemainingMeasurement::measure(dec!(2.6), dec!(0.25), dec!(10)).unwrap();
        assert_eq!(m.raw_units, dec!(10.4));
        assert_eq!(m.remaining_units, dec!(10));
        assert_eq!(m.wastage_units, dec!(0.4));
        assert_eq!(m.variance_weight, dec!(0.1));
        assert_eq!(m.remaining_weight(), dec!(2.5));
    }

    #[test]
    fn non_positive_unit_mass_is_rejected() {
        assert!(RemainingMeasurement::measure(dec!(1), dec!(0), dec!(1)).is_err());
        assert!(RemainingMeasurement::measure(dec!(1), dec!(-2), dec!(1)).is_err());
    }

    #[test]
    fn tiny_unit_mass_is_rejected_instead_of_overflowing() {
        let err = RemainingMeasurement::measure(dec!(1000000), dec!(0.0000000000000000000000001), dec!(10)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        /// Property: remaining is floor(W/U) and wastage stays within one unit.
        #[test]
        fn remaining_is_floor_of_weight_over_unit_mass(
            grams in 1i64..1_000_000,
            unit_grams in 1i64..5_000,
        ) {
            let w = Decimal::new(grams, 3);
            let u = Decimal::new(unit_grams, 3);
            let m = RemainingMeasurement::measure(w, u, dec!(100)).unwrap();
            prop_assert_eq!(m.remaining_units, (w / u).floor());
            prop_assert!(m.wastage_units >= Decimal::ZERO && m.wastage_units < Decimal::ONE);
        }
    }
}
