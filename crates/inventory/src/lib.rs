//! Inventory costing and consumption domain (pure logic).
//!
//! This crate contains the business rules for multi-level stock: unit
//! conversion, moving-average costing, warehouse → buffer transfers and
//! recipe consumption. Everything here is deterministic and free of IO; each
//! operation returns the new account states and the ledger movements to
//! commit, and the infrastructure layer commits them as one unit.

pub mod account;
pub mod consumption;
pub mod costing;
pub mod error;
pub mod movement;
pub mod recipe;
pub mod restock;
pub mod shortage;
pub mod transfer;
pub mod unit;
pub mod valuation;

pub use account::{AdjustStock, DEFAULT_COST_SCALE, InventoryAccount, Location, OpenAccount};
pub use consumption::{
    ConsumeRecipe, ConsumptionPlan, Deduction, FallbackPolicy, StockSnapshot, plan_consumption,
};
pub use costing::{ApplyReceipt, apply_receipt, moving_average};
pub use error::{InventoryError, InventoryResult};
pub use movement::{MovementKind, StockMovement};
pub use recipe::{Ingredient, Recipe};
pub use restock::{RestockSuggestion, WarehouseSource, suggest_restock};
pub use shortage::{Shortage, ShortageReport};
pub use transfer::{CapacityMode, TransferPlan, TransferStock, plan_transfer};
pub use unit::{Dimension, Unit, UnitDefinition, UnitTable, UnitTableError};
pub use valuation::{AccountValuation, ItemValuation};
