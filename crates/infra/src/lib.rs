//! Infrastructure layer: persistence, transactions, the stock-moving engine
//! components and the command facade.

pub mod audit;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger_store;
pub mod plant;
pub mod store;
pub mod transaction;


pub use audit::{AuditLog, AuditRecord, InMemoryAuditLog};
pub use commands::PlantCommand;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, StoreError};
pub use ledger_store::LedgerStore;
pub use plant::PlantEngine;
pub use store::{InMemoryPlantStore, PlantStore};
pub use transaction::StockTransaction;
