//! Restock suggestions for department buffers below their minimum level.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{AccountId, ItemId};

use crate::account::{InventoryAccount, Location};
use crate::error::InventoryResult;
use crate::unit::{Unit, UnitTable};

/// Where a suggested restock could be drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseSource {
    pub account_id: AccountId,
    pub unit: Unit,
    /// The suggested quantity expressed in the warehouse unit.
    pub quantity: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockSuggestion {
    pub account_id: AccountId,
    pub item_id: ItemId,
    pub item_name: String,
    pub location: Location,
    pub unit: Unit,
    pub on_hand: Decimal,
    pub min_level: Decimal,
    /// Quantity (buffer unit) that brings the buffer back to `max_level`, or
    /// to `min_level` when no maximum is configured.
    pub suggested: Decimal,
    pub warehouse: Option<WarehouseSource>,
}

/// Suggest transfers for every buffer under its `min_level`.
///
/// Warehouse accounts are looked up by item; a warehouse in an incompatible
/// unit yields a suggestion without a source.
pub fn suggest_restock<'a>(
    units: &UnitTable,
    buffers: impl IntoIterator<Item = &'a InventoryAccount>,
    warehouses: &HashMap<ItemId, InventoryAccount>,
) -> InventoryResult<Vec<RestockSuggestion>> {
    let mut suggestions = Vec::new();

    for buffer in buffers {
        let Some(min_level) = buffer.min_level() else {
            continue;
        };
        if !buffer.is_below_min() {
            continue;
        }

        let target = buffer.max_level().unwrap_or(min_level);
        let suggested = target - buffer.quantity();

        let warehouse = match warehouses.get(&buffer.item_id()) {
            Some(w) if units.compatible(buffer.unit(), w.unit()) => Some(WarehouseSource {
                account_id: w.id_typed(),
                unit: w.unit().clone(),
                quantity: units.convert(suggested, buffer.unit(), w.unit())?,
                available: w.quantity(),
            }),
            _ => None,
        };

        suggestions.push(RestockSuggestion {
            account_id: buffer.id_typed(),
            item_id: buffer.item_id(),
            item_name: buffer.item_name().to_string(),
            location: buffer.location().clone(),
            unit: buffer.unit().clone(),
            on_hand: buffer.quantity(),
            min_level,
            suggested,
            warehouse,
        });
    }

    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::OpenAccount;
    use crate::account::tests::stocked;
    use rust_decimal_macros::dec;

    fn buffer(item: &InventoryAccount, qty: Decimal, min: Decimal, max: Option<Decimal>) -> InventoryAccount {
        InventoryAccount::open(
            &OpenAccount {
                account_id: AccountId::new(),
                item_id: item.item_id(),
                item_name: item.item_name().to_string(),
                location: Location::department("kitchen"),
                unit: Unit::new("g"),
                cost_scale: Some(2),
                min_level: Some(min),
                max_level: max,
            },
            &UnitTable::default(),
        )
        .unwrap()
        .with_balance(qty, dec!(15))
    }

    #[test]
    fn suggests_refill_to_max_level_with_warehouse_equivalent() {
        let warehouse = stocked("Beras", Location::Warehouse, "kg", dec!(50), dec!(15000));
        let low = buffer(&warehouse, dec!(1500), dec!(2000), Some(dec!(10000)));
        let fine = buffer(&warehouse, dec!(2500), dec!(2000), Some(dec!(10000)));
        let warehouses = HashMap::from([(warehouse.item_id(), warehouse.clone())]);

        let suggestions = suggest_restock(&UnitTable::default(), [&low, &fine], &warehouses).unwrap();

        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.account_id, low.id_typed());
        assert_eq!(s.suggested, dec!(8500));
        let source = s.warehouse.as_ref().unwrap();
        assert_eq!(source.account_id, warehouse.id_typed());
        assert_eq!(source.quantity, dec!(8.5));
        assert_eq!(source.available, dec!(50));
    }

    #[test]
    fn without_max_level_refills_to_minimum() {
        let item = stocked("Gula", Location::Warehouse, "kg", dec!(1), dec!(14000));
        let low = buffer(&item, dec!(100), dec!(500), None);

        let suggestions = suggest_restock(&UnitTable::default(), [&low], &HashMap::new()).unwrap();

        assert_eq!(suggestions[0].suggested, dec!(400));
        assert!(suggestions[0].warehouse.is_none());
    }
}
