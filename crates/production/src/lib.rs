//! Production domain module (event-sourced).
//!
//! Batches from planning to verified remaining quantity, recipe resolution, and
//! repacking records. Deterministic domain logic only; stock postings are made by
//! the infrastructure engine in the same transaction as these events.

pub mod batch;
pub mod integration;
pub mod remaining;
pub mod repacking;
pub mod requirements;

pub use batch::{
    BatchCommand, BatchCompleted, BatchCreated, BatchEvent, BatchStatus, CompleteProduction,
    ConsumedMaterial, CreateBatch, DrawRemaining, MarkMaterialsIssued, MaterialsIssued,
    ProductionBatch, ProductionBatchId, ProductionStarted, RemainingDrawn, RemainingRestored,
    RemainingVerified, RestoreRemaining, StartProduction, VerifyRemaining, WastageRecord,
};
pub use integration::ProductionCompleted;
pub use remaining::RemainingMeasurement;
pub use repacking::{
    ConsumeRepacked, CreateRepacking, DeleteRepacking, RepackedConsumed, RepackingCommand,
    RepackingCreated, RepackingDeleted, RepackingEvent, RepackingId, RepackingRecord,
};
pub use requirements::{RecipePlan, RecipeShape, Requirement, resolve_requirements};
