use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{AccountId, RecipeId};

use crate::error::{InventoryError, InventoryResult};
use crate::unit::Unit;

/// One line of a bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// The department/kitchen account the ingredient is drawn from.
    pub account_id: AccountId,
    pub quantity_per_serving: Decimal,
    /// Unit `quantity_per_serving` is written in; may differ from the account's.
    pub unit: Unit,
}

/// Bill of materials for one finished product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    id: RecipeId,
    product: String,
    ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Build a recipe; it needs a product name and at least one ingredient,
    /// each with a positive per-serving quantity.
    pub fn new(
        id: RecipeId,
        product: impl Into<String>,
        ingredients: Vec<Ingredient>,
    ) -> InventoryResult<Self> {
        let product = product.into();
        if product.trim().is_empty() {
            return Err(InventoryError::validation("product name cannot be empty"));
        }
        if ingredients.is_empty() {
            return Err(InventoryError::validation("recipe must have at least one ingredient"));
        }
        if let Some(bad) = ingredients
            .iter()
            .find(|i| i.quantity_per_serving <= Decimal::ZERO)
        {
            return Err(InventoryError::validation(format!(
                "quantity per serving must be positive (account {})",
                bad.account_id
            )));
        }

        Ok(Self {
            id,
            product: product.trim().to_string(),
            ingredients,
        })
    }

    pub fn id(&self) -> RecipeId {
        self.id
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }
}
