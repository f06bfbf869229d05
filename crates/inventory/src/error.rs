//! Inventory error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

use larder_core::{AccountId, DomainError};

use crate::shortage::ShortageReport;
use crate::unit::Unit;

/// Result alias for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Failure of an inventory operation.
///
/// Every variant is produced before any state is changed; callers never see a
/// partially applied receipt, transfer or consumption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Conversion requested across physical dimensions (mass → volume).
    /// A configuration error: retrying will not help.
    #[error("incompatible units: cannot convert {from} to {to}")]
    IncompatibleUnits { from: Unit, to: Unit },

    /// The unit is not registered in the unit table.
    #[error("unknown unit: {0}")]
    UnknownUnit(String),

    /// One or more accounts cannot cover the requested quantity.
    #[error("insufficient stock: {0}")]
    InsufficientStock(ShortageReport),

    /// The destination buffer would exceed its configured maximum.
    #[error(
        "capacity exceeded on account {account}: {requested_level} {unit} would exceed max level {max_level} {unit}"
    )]
    CapacityExceeded {
        account: AccountId,
        max_level: Decimal,
        requested_level: Decimal,
        unit: Unit,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InventoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::validation(msg))
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::invariant(msg))
    }

    /// The shortage report carried by an `InsufficientStock` error.
    pub fn shortages(&self) -> Option<&ShortageReport> {
        match self {
            InventoryError::InsufficientStock(report) => Some(report),
            _ => None,
        }
    }
}
