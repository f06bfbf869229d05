//! Moving-average costing of goods receipts.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use larder_core::AccountId;

use crate::account::InventoryAccount;
use crate::error::{InventoryError, InventoryResult};

/// Command: ApplyReceipt (a purchase receipt landing on an account).
///
/// Quantity and cost are expressed in the account's unit; callers convert first
/// when the supplier invoiced in another unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReceipt {
    pub account_id: AccountId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Weighted-average unit cost after adding `received_qty` at `received_cost`.
///
/// Intermediate sums are exact; only the result is rounded (half-up) to `scale`.
/// If the combined quantity is zero the current cost is returned unchanged.
pub fn moving_average(
    on_hand_qty: Decimal,
    on_hand_cost: Decimal,
    received_qty: Decimal,
    received_cost: Decimal,
    scale: u32,
) -> InventoryResult<Decimal> {
    let overflow = || InventoryError::validation("moving average overflowed");

    let new_qty = on_hand_qty.checked_add(received_qty).ok_or_else(overflow)?;
    if new_qty.is_zero() {
        return Ok(on_hand_cost);
    }

    let on_hand_value = on_hand_qty.checked_mul(on_hand_cost).ok_or_else(overflow)?;
    let received_value = received_qty.checked_mul(received_cost).ok_or_else(overflow)?;
    let total_value = on_hand_value.checked_add(received_value).ok_or_else(overflow)?;

    let average = total_value.checked_div(new_qty).ok_or_else(overflow)?;
    Ok(average.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

/// New account state after a receipt of `quantity` at `unit_cost`.
///
/// Pure: the caller decides when (and whether) to commit the returned state.
pub fn apply_receipt(
    account: &InventoryAccount,
    quantity: Decimal,
    unit_cost: Decimal,
) -> InventoryResult<InventoryAccount> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::validation("received quantity must be positive"));
    }
    if unit_cost < Decimal::ZERO {
        return Err(InventoryError::validation("unit cost cannot be negative"));
    }

    let new_cost = moving_average(
        account.quantity(),
        account.cost_per_unit(),
        quantity,
        unit_cost,
        account.cost_scale(),
    )?;
    let new_quantity = account.quantity() + quantity;

    Ok(account.with_balance(new_quantity, new_cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Location;
    use crate::account::tests::{open, stocked};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn moving_average_matches_weighted_mean() {
        let account = stocked("Beras", Location::Warehouse, "kg", dec!(10), dec!(45000));
        let after = apply_receipt(&account, dec!(5), dec!(48000)).unwrap();

        assert_eq!(after.quantity(), dec!(15));
        assert_eq!(after.cost_per_unit(), dec!(46000));
    }

    #[test]
    fn first_receipt_takes_receipt_cost() {
        let account = open("Minyak", Location::Warehouse, "l", None);
        let after = apply_receipt(&account, dec!(12), dec!(18500.50)).unwrap();

        assert_eq!(after.quantity(), dec!(12));
        assert_eq!(after.cost_per_unit(), dec!(18500.50));
    }

    #[test]
    fn result_is_rounded_half_up_to_account_scale() {
        // (1 × 10 + 1 × 10.01) / 2 = 10.005 → 10.01
        assert_eq!(
            moving_average(dec!(1), dec!(10), dec!(1), dec!(10.01), 2).unwrap(),
            dec!(10.01)
        );
        // (2 × 1 + 1 × 0) / 3 = 0.6666… → 0.67
        assert_eq!(
            moving_average(dec!(2), dec!(1), dec!(1), dec!(0), 2).unwrap(),
            dec!(0.67)
        );
    }

    #[test]
    fn zero_total_quantity_keeps_cost() {
        assert_eq!(
            moving_average(dec!(0), dec!(99), dec!(0), dec!(10), 2).unwrap(),
            dec!(99)
        );
    }

    #[test]
    fn invalid_receipts_are_rejected() {
        let account = open("Gula", Location::Warehouse, "kg", None);
        assert!(apply_receipt(&account, dec!(0), dec!(10)).is_err());
        assert!(apply_receipt(&account, dec!(-1), dec!(10)).is_err());
        assert!(apply_receipt(&account, dec!(1), dec!(-0.01)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the new average lies between the old cost and the receipt cost.
        #[test]
        fn average_is_bounded_by_inputs(
            on_hand in 0i64..1_000_000i64,
            old_cost in 0i64..10_000_000i64,
            received in 1i64..1_000_000i64,
            new_cost in 0i64..10_000_000i64,
        ) {
            let old_cost = Decimal::new(old_cost, 2);
            let new_cost = Decimal::new(new_cost, 2);
            let account = stocked("X", Location::Warehouse, "g", Decimal::from(on_hand), old_cost);

            let after = apply_receipt(&account, Decimal::from(received), new_cost).unwrap();

            let lo = old_cost.min(new_cost);
            let hi = old_cost.max(new_cost);
            prop_assert!(after.cost_per_unit() >= lo && after.cost_per_unit() <= hi);
            prop_assert!(after.cost_per_unit() >= Decimal::ZERO);
            prop_assert_eq!(after.quantity(), Decimal::from(on_hand + received));
        }
    }
}
