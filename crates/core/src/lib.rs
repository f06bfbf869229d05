//! `larder-core` — shared building blocks for the inventory workspace.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod value_object;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{AccountId, ItemId, MovementId, RecipeId};
pub use value_object::ValueObject;
pub use version::{ExpectedVersion, Versioned};
