//! Quantity helpers.
//!
//! All stock quantities are `Decimal` in the item's canonical unit (kg for mass-stocked
//! items). Floats are never used for stock.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Reject zero and negative quantities.
pub fn ensure_positive(quantity: Decimal, what: &str) -> DomainResult<Decimal> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} must be positive (got {quantity})"
        )));
    }
    Ok(quantity)
}

/// Round a derived quantity (conversion, proportional split) to `scale` decimal places.
///
/// Midpoints round away from zero so a converted requirement never undershoots.
pub fn round_quantity(quantity: Decimal, scale: u32) -> Decimal {
    quantity
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// `a × b`, or a validation error instead of an overflow panic.
pub fn checked_mul(a: Decimal, b: Decimal, what: &str) -> DomainResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| DomainError::validation(format!("{what} overflows ({a} × {b})")))
}

/// `a ÷ b`; division by zero and overflow are validation errors.
pub fn checked_div(a: Decimal, b: Decimal, what: &str) -> DomainResult<Decimal> {
    a.checked_div(b)
        .ok_or_else(|| DomainError::validation(format!("{what} cannot be computed ({a} ÷ {b})")))
}
