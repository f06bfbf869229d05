//! Stock valuation across the accounts of one item.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{AccountId, ItemId};

use crate::account::{InventoryAccount, Location};
use crate::unit::Unit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountValuation {
    pub account_id: AccountId,
    pub location: Location,
    pub quantity: Decimal,
    pub unit: Unit,
    pub cost_per_unit: Decimal,
    pub value: Decimal,
}

/// Value of one item across all of its accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemValuation {
    pub item_id: ItemId,
    pub accounts: Vec<AccountValuation>,
    pub total_value: Decimal,
}

impl ItemValuation {
    /// Value the accounts of `item_id`; accounts of other items are ignored.
    pub fn from_accounts<'a>(
        item_id: ItemId,
        accounts: impl IntoIterator<Item = &'a InventoryAccount>,
    ) -> Self {
        let accounts: Vec<AccountValuation> = accounts
            .into_iter()
            .filter(|a| a.item_id() == item_id)
            .map(|a| AccountValuation {
                account_id: a.id_typed(),
                location: a.location().clone(),
                quantity: a.quantity(),
                unit: a.unit().clone(),
                cost_per_unit: a.cost_per_unit(),
                value: a.value(),
            })
            .collect();
        let total_value = accounts.iter().map(|a| a.value).sum();

        Self {
            item_id,
            accounts,
            total_value,
        }
    }
}
