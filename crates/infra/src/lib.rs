//! Infrastructure layer: account store, stock ledger, recipe catalog, config
//! and the application service that ties them to the pure inventory domain.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod service;
pub mod store;


pub use catalog::{InMemoryRecipeCatalog, RecipeCatalog};
pub use config::EngineConfig;
pub use error::{ServiceError, StoreError};
pub use ledger::{MovementHistory, StockLedger};
pub use service::{ConsumptionResult, InventoryService, TransferOutcome};
pub use store::{
    AccountUpdate, ChangeSet, Committed, InMemoryInventoryStore, InventoryStore, StoredMovement,
};
