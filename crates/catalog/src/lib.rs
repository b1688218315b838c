//! Catalog & master data as seen by the stock core.
//!
//! Items, units, locations and recipes are owned by an external catalog service;
//! this crate defines their shapes, the read-only collaborator traits, an in-memory
//! implementation, and the unit conversion rules derived from recipes.

pub mod bom;
pub mod conversion;
pub mod item;
pub mod location;
pub mod service;

pub use bom::{BomComponent, DirectBom, PeetuBom, ProductYieldBom};
pub use conversion::ConversionResolver;
pub use item::{Item, ItemType, Unit, UnitKind};
pub use location::{Location, LocationKind};
pub use service::{CatalogService, InMemoryCatalog, LocationService};
