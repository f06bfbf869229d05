//! Recipe lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use larder_core::RecipeId;
use larder_inventory::Recipe;

use crate::error::StoreError;

/// Source of recipes (bills of materials) for consumption.
pub trait RecipeCatalog: Send + Sync {
    fn recipe(&self, id: RecipeId) -> Result<Option<Recipe>, StoreError>;
}

impl<C> RecipeCatalog for Arc<C>
where
    C: RecipeCatalog + ?Sized,
{
    fn recipe(&self, id: RecipeId) -> Result<Option<Recipe>, StoreError> {
        (**self).recipe(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecipeCatalog {
    recipes: RwLock<HashMap<RecipeId, Recipe>>,
}

impl InMemoryRecipeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a recipe.
    pub fn register(&self, recipe: Recipe) -> Result<(), StoreError> {
        let mut recipes = self
            .recipes
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        recipes.insert(recipe.id(), recipe);
        Ok(())
    }
}

impl RecipeCatalog for InMemoryRecipeCatalog {
    fn recipe(&self, id: RecipeId) -> Result<Option<Recipe>, StoreError> {
        let recipes = self
            .recipes
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(recipes.get(&id).cloned())
    }
}
