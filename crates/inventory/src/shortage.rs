//! Shortage report produced when stock cannot cover a request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{AccountId, ValueObject};

use crate::unit::Unit;

/// One account that cannot cover what was asked of it.
///
/// Quantities are in the account's own unit so the report can be shown to an
/// operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub account_id: AccountId,
    pub item_name: String,
    pub unit: Unit,
    pub needed: Decimal,
    pub available: Decimal,
    /// Warehouse stock (already expressed in `unit`) that was considered as a
    /// fallback source, if one was consulted.
    pub warehouse_available: Option<Decimal>,
}

impl Shortage {
    /// How much more stock would be required.
    pub fn missing(&self) -> Decimal {
        let covered = self.available + self.warehouse_available.unwrap_or(Decimal::ZERO);
        (self.needed - covered).max(Decimal::ZERO)
    }
}

impl ValueObject for Shortage {}

impl core::fmt::Display for Shortage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: needed {} {}, available {} {}",
            self.item_name,
            self.needed.normalize(),
            self.unit,
            self.available.normalize(),
            self.unit
        )?;
        if let Some(warehouse) = self.warehouse_available {
            write!(f, " (+{} {} in warehouse)", warehouse.normalize(), self.unit)?;
        }
        Ok(())
    }
}

/// Every shortage found while validating one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortageReport(Vec<Shortage>);

impl ShortageReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(shortage: Shortage) -> Self {
        Self(vec![shortage])
    }

    pub fn push(&mut self, shortage: Shortage) {
        self.0.push(shortage);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn shortages(&self) -> &[Shortage] {
        &self.0
    }

    pub fn get(&self, account_id: AccountId) -> Option<&Shortage> {
        self.0.iter().find(|s| s.account_id == account_id)
    }
}

impl IntoIterator for ShortageReport {
    type Item = Shortage;
    type IntoIter = std::vec::IntoIter<Shortage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl core::fmt::Display for ShortageReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (idx, shortage) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{shortage}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn report_lists_every_shortage_verbatim() {
        let mut report = ShortageReport::new();
        report.push(Shortage {
            account_id: AccountId::new(),
            item_name: "Beras".to_string(),
            unit: Unit::new("g"),
            needed: dec!(1500),
            available: dec!(1200.00),
            warehouse_available: None,
        });
        report.push(Shortage {
            account_id: AccountId::new(),
            item_name: "Minyak".to_string(),
            unit: Unit::new("ml"),
            needed: dec!(500),
            available: dec!(100),
            warehouse_available: Some(dec!(200)),
        });

        assert_eq!(
            report.to_string(),
            "Beras: needed 1500 g, available 1200 g; \
             Minyak: needed 500 ml, available 100 ml (+200 ml in warehouse)"
        );
        assert_eq!(report.shortages()[1].missing(), dec!(200));
    }
}
