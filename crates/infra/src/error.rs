//! Infrastructure and service-level errors.

use thiserror::Error;

use larder_core::{AccountId, RecipeId};
use larder_inventory::{InventoryError, ShortageReport};

/// Storage operation error.
///
/// These are **infrastructure errors** (concurrency, missing records,
/// unavailable storage) as opposed to inventory rule violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An account changed between read and commit.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("duplicate account: {0}")]
    Duplicate(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The change set itself is malformed (e.g. the same account updated twice).
    #[error("invalid change set: {0}")]
    InvalidChange(String),

    /// Storage could not be reached (poisoned lock, lost connection).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Transient failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::Unavailable(_))
    }
}

/// Error returned by `InventoryService` operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("recipe not found: {0}")]
    RecipeNotFound(RecipeId),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Shortage report of an insufficient-stock failure, to surface to the operator.
    pub fn shortages(&self) -> Option<&ShortageReport> {
        match self {
            ServiceError::Inventory(err) => err.shortages(),
            _ => None,
        }
    }
}
