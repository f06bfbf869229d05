//! Stock transfers between accounts of the same item.
//!
//! A transfer moves quantity and cost basis together: the source keeps its
//! unit cost, the destination books the incoming stock exactly like a
//! purchase receipt (moving average), with quantity and cost converted into
//! the destination's unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_core::AccountId;

use crate::account::InventoryAccount;
use crate::costing::apply_receipt;
use crate::error::{InventoryError, InventoryResult};
use crate::movement::{MovementKind, StockMovement};
use crate::shortage::ShortageReport;
use crate::unit::UnitTable;

/// Command: TransferStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub source_id: AccountId,
    pub destination_id: AccountId,
    /// Quantity in the source account's unit.
    pub quantity: Decimal,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// How a transfer treats the destination's `max_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMode {
    /// Fail with `CapacityExceeded` if the destination would overflow.
    Reject,
    /// Move only as much as fits; fail if nothing fits.
    UpToCapacity,
    /// Ignore `max_level` (stock pulled in to be consumed immediately).
    Unbounded,
}

/// Fully computed transfer, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub transfer_id: Uuid,
    /// Source state after the transfer.
    pub source: InventoryAccount,
    /// Destination state after the transfer.
    pub destination: InventoryAccount,
    /// Quantity removed from the source, in the source unit.
    pub quantity_out: Decimal,
    /// Quantity added to the destination, in the destination unit.
    pub quantity_in: Decimal,
    /// Source unit cost at the time of the transfer.
    pub cost_out: Decimal,
    /// The same cost expressed per destination unit (before averaging).
    pub cost_in: Decimal,
}

impl TransferPlan {
    /// The `TRANSFER_OUT` / `TRANSFER_IN` pair, cross-referencing each other.
    pub fn movements(
        &self,
        reference: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> [StockMovement; 2] {
        let source_id = self.source.id_typed();
        let destination_id = self.destination.id_typed();

        let out = StockMovement::new(
            MovementKind::TransferOut,
            &self.source,
            -self.quantity_out,
            self.cost_out,
            occurred_at,
        )
        .with_counterpart(destination_id)
        .with_correlation(self.transfer_id)
        .with_reference(reference.clone());

        let inbound = StockMovement::new(
            MovementKind::TransferIn,
            &self.destination,
            self.quantity_in,
            self.cost_in,
            occurred_at,
        )
        .with_counterpart(source_id)
        .with_correlation(self.transfer_id)
        .with_reference(reference);

        [out, inbound]
    }
}

/// Plan moving `quantity` (source unit) from `source` to `destination`.
///
/// Checks, in order: positive quantity, distinct accounts of the same item,
/// unit compatibility, source sufficiency, destination capacity. Nothing is
/// mutated; the returned plan carries both new states.
pub fn plan_transfer(
    units: &UnitTable,
    source: &InventoryAccount,
    destination: &InventoryAccount,
    quantity: Decimal,
    mode: CapacityMode,
) -> InventoryResult<TransferPlan> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::validation("transfer quantity must be positive"));
    }
    if source.id_typed() == destination.id_typed() {
        return Err(InventoryError::validation(
            "source and destination must be different accounts",
        ));
    }
    if source.item_id() != destination.item_id() {
        return Err(InventoryError::invariant(format!(
            "cannot transfer {} into an account holding {}",
            source.item_name(),
            destination.item_name()
        )));
    }

    let requested_in = units.convert(quantity, source.unit(), destination.unit())?;
    let cost_in =
        units.convert_cost_per_unit(source.cost_per_unit(), source.unit(), destination.unit())?;

    let landed = destination
        .quantity()
        .checked_add(requested_in)
        .ok_or_else(|| InventoryError::validation("destination quantity overflowed"))?;
    let overflow = destination.max_level().is_some_and(|max| landed > max);

    let (quantity_out, quantity_in) = match (mode, destination.headroom()) {
        (CapacityMode::UpToCapacity, Some(headroom)) if overflow => {
            if headroom.is_zero() {
                return Err(capacity_exceeded(destination, requested_in));
            }
            let out = units.convert(headroom, destination.unit(), source.unit())?;
            (out, headroom)
        }
        _ => (quantity, requested_in),
    };

    if quantity_out > source.quantity() {
        return Err(InventoryError::InsufficientStock(ShortageReport::single(
            source.shortage(quantity_out),
        )));
    }

    if mode == CapacityMode::Reject && overflow {
        return Err(capacity_exceeded(destination, requested_in));
    }

    let source_after = source.deduct(quantity_out)?;
    let destination_after = apply_receipt(destination, quantity_in, cost_in)?;

    Ok(TransferPlan {
        transfer_id: Uuid::now_v7(),
        source: source_after,
        destination: destination_after,
        quantity_out,
        quantity_in,
        cost_out: source.cost_per_unit(),
        cost_in,
    })
}

fn capacity_exceeded(destination: &InventoryAccount, incoming: Decimal) -> InventoryError {
    InventoryError::CapacityExceeded {
        account: destination.id_typed(),
        max_level: destination.max_level().unwrap_or(Decimal::ZERO),
        requested_level: destination.quantity().saturating_add(incoming),
        unit: destination.unit().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tests::{open, stocked};
    use crate::account::{Location, OpenAccount};
    use crate::unit::Unit;
    use rust_decimal_macros::dec;

    fn kitchen() -> Location {
        Location::department("main-kitchen")
    }

    /// Warehouse (kg) and kitchen (g) accounts for the same item.
    fn pair(
        warehouse_qty: Decimal,
        warehouse_cost: Decimal,
        kitchen_qty: Decimal,
        kitchen_cost: Decimal,
        kitchen_max: Option<Decimal>,
    ) -> (InventoryAccount, InventoryAccount) {
        let units = UnitTable::default();
        let warehouse = stocked("Beras", Location::Warehouse, "kg", warehouse_qty, warehouse_cost);
        let kitchen = InventoryAccount::open(
            &OpenAccount {
                account_id: AccountId::new(),
                item_id: warehouse.item_id(),
                item_name: "Beras".to_string(),
                location: kitchen(),
                unit: Unit::new("gram"),
                cost_scale: Some(2),
                min_level: None,
                max_level: kitchen_max,
            },
            &units,
        )
        .unwrap()
        .with_balance(kitchen_qty, kitchen_cost);
        (warehouse, kitchen)
    }

    #[test]
    fn transfer_converts_quantity_and_cost() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(100), dec!(15000), dec!(5000), dec!(15), None);

        let plan = plan_transfer(&units, &warehouse, &kitchen, dec!(10), CapacityMode::Reject).unwrap();

        assert_eq!(plan.source.quantity(), dec!(90));
        assert_eq!(plan.source.cost_per_unit(), dec!(15000));
        assert_eq!(plan.destination.quantity(), dec!(15000));
        assert_eq!(plan.destination.cost_per_unit(), dec!(15));
        assert_eq!(plan.quantity_in, dec!(10000));
        assert_eq!(plan.cost_in, dec!(15));
    }

    #[test]
    fn transfer_preserves_value() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(3), dec!(45000), dec!(0), dec!(0), None);

        let plan = plan_transfer(&units, &warehouse, &kitchen, dec!(3), CapacityMode::Reject).unwrap();

        assert_eq!(plan.destination.quantity(), dec!(3000));
        assert_eq!(plan.destination.cost_per_unit(), dec!(45));
        let before = warehouse.value() + kitchen.value();
        let after = plan.source.value() + plan.destination.value();
        assert_eq!(before, after);
    }

    #[test]
    fn movements_cross_reference_each_other() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(100), dec!(15000), dec!(0), dec!(0), None);
        let plan = plan_transfer(&units, &warehouse, &kitchen, dec!(2), CapacityMode::Reject).unwrap();

        let [out, inbound] = plan.movements(Some("req-9".to_string()), Utc::now());

        assert_eq!(out.kind, MovementKind::TransferOut);
        assert_eq!(out.quantity_delta, dec!(-2));
        assert_eq!(out.counterpart, Some(kitchen.id_typed()));
        assert_eq!(inbound.kind, MovementKind::TransferIn);
        assert_eq!(inbound.quantity_delta, dec!(2000));
        assert_eq!(inbound.counterpart, Some(warehouse.id_typed()));
        assert_eq!(out.correlation_id, inbound.correlation_id);
        assert_eq!(out.value() + inbound.value(), Decimal::ZERO);
    }

    #[test]
    fn insufficient_source_is_rejected() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(1), dec!(15000), dec!(0), dec!(0), None);

        let err = plan_transfer(&units, &warehouse, &kitchen, dec!(1.5), CapacityMode::Reject).unwrap_err();

        let report = err.shortages().unwrap();
        assert_eq!(report.shortages()[0].account_id, warehouse.id_typed());
        assert_eq!(report.shortages()[0].needed, dec!(1.5));
        assert_eq!(report.shortages()[0].available, dec!(1));
    }

    #[test]
    fn overflow_is_rejected_by_default() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(100), dec!(15000), dec!(18000), dec!(15), Some(dec!(20000)));

        let err = plan_transfer(&units, &warehouse, &kitchen, dec!(3), CapacityMode::Reject).unwrap_err();

        assert_eq!(
            err,
            InventoryError::CapacityExceeded {
                account: kitchen.id_typed(),
                max_level: dec!(20000),
                requested_level: dec!(21000),
                unit: Unit::new("gram"),
            }
        );
    }

    #[test]
    fn destination_overflow_is_a_validation_error() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(10), dec!(15000), Decimal::MAX, dec!(15), None);

        let err = plan_transfer(&units, &warehouse, &kitchen, dec!(1), CapacityMode::Unbounded).unwrap_err();
        assert!(matches!(err, InventoryError::Domain(_)));
    }

    #[test]
    fn capped_transfer_fills_to_max_level() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(100), dec!(15000), dec!(18000), dec!(15), Some(dec!(20000)));

        let plan = plan_transfer(&units, &warehouse, &kitchen, dec!(3), CapacityMode::UpToCapacity).unwrap();

        assert_eq!(plan.quantity_out, dec!(2));
        assert_eq!(plan.destination.quantity(), dec!(20000));
        assert_eq!(plan.source.quantity(), dec!(98));
    }

    #[test]
    fn capped_transfer_into_full_buffer_fails() {
        let units = UnitTable::default();
        let (warehouse, kitchen) = pair(dec!(100), dec!(15000), dec!(20000), dec!(15), Some(dec!(20000)));

        let err = plan_transfer(&units, &warehouse, &kitchen, dec!(1), CapacityMode::UpToCapacity).unwrap_err();
        assert!(matches!(err, InventoryError::CapacityExceeded { .. }));
    }

    #[test]
    fn different_items_cannot_be_transferred() {
        let units = UnitTable::default();
        let rice = stocked("Beras", Location::Warehouse, "kg", dec!(10), dec!(15000));
        let sugar = open("Gula", kitchen(), "g", None);
        assert_ne!(rice.item_id(), sugar.item_id());

        let err = plan_transfer(&units, &rice, &sugar, dec!(1), CapacityMode::Reject).unwrap_err();
        assert!(matches!(err, InventoryError::Domain(_)));
    }

    #[test]
    fn incompatible_units_are_rejected() {
        let units = UnitTable::default();
        let warehouse = stocked("Susu", Location::Warehouse, "l", dec!(10), dec!(20000));
        let kitchen = InventoryAccount::open(
            &OpenAccount {
                account_id: AccountId::new(),
                item_id: warehouse.item_id(),
                item_name: "Susu".to_string(),
                location: kitchen(),
                unit: Unit::new("g"),
                cost_scale: Some(2),
                min_level: None,
                max_level: None,
            },
            &units,
        )
        .unwrap();

        let err = plan_transfer(&units, &warehouse, &kitchen, dec!(1), CapacityMode::Reject).unwrap_err();
        assert!(matches!(err, InventoryError::IncompatibleUnits { .. }));
    }
}
