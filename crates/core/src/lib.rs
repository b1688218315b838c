//! `plantflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;
pub mod stock;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, CategoryId, ItemId, LocationId};
pub use quantity::{checked_div, checked_mul, ensure_positive, round_quantity};
pub use stock::{Shortfall, StockTarget};
pub use value_object::ValueObject;
