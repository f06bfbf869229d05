use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{AccountId, ItemId, Versioned};

use crate::error::{InventoryError, InventoryResult};
use crate::shortage::{Shortage, ShortageReport};
use crate::unit::{Unit, UnitTable};

/// Cost scale used when an account is opened without one (currency cents).
pub const DEFAULT_COST_SCALE: u32 = 2;

/// Largest scale a `Decimal` can carry.
const MAX_COST_SCALE: u32 = 28;

/// Where an account's stock physically sits.
///
/// Department codes are compared trimmed and lowercased; deserialization and
/// `open` normalize them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(
    rename_all = "snake_case",
    tag = "kind",
    content = "code",
    from = "RawLocation"
)]
pub enum Location {
    /// The central store receiving purchases.
    Warehouse,
    /// A department or kitchen buffer, identified by its code (e.g. `"main-kitchen"`).
    Department(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
enum RawLocation {
    Warehouse,
    Department(String),
}

impl From<RawLocation> for Location {
    fn from(raw: RawLocation) -> Self {
        match raw {
            RawLocation::Warehouse => Location::Warehouse,
            RawLocation::Department(code) => Location::department(code),
        }
    }
}

impl Location {
    pub fn department(code: impl AsRef<str>) -> Self {
        Self::Department(code.as_ref().trim().to_lowercase())
    }

    /// Same location with its department code in canonical form.
    pub fn normalized(&self) -> Self {
        match self {
            Location::Warehouse => Location::Warehouse,
            Location::Department(code) => Location::department(code),
        }
    }

    pub fn is_warehouse(&self) -> bool {
        matches!(self, Location::Warehouse)
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Location::Warehouse => f.write_str("WAREHOUSE"),
            Location::Department(code) => write!(f, "department:{code}"),
        }
    }
}

/// Command: OpenAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_id: AccountId,
    pub item_id: ItemId,
    pub item_name: String,
    pub location: Location,
    pub unit: Unit,
    /// Decimal places kept on `cost_per_unit` after each receipt
    /// (`DEFAULT_COST_SCALE` when absent).
    pub cost_scale: Option<u32>,
    pub min_level: Option<Decimal>,
    pub max_level: Option<Decimal>,
}

/// Command: AdjustStock.
///
/// A signed correction (stock-take loss, breakage, found stock). The only way
/// to correct a balance once movements have been recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub account_id: AccountId,
    pub delta: Decimal,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Balance of one item at one location.
///
/// `quantity` and `cost_per_unit` are never negative; every state change goes
/// through a function in this crate that checks that before returning the new
/// state.
///
/// Deserialized accounts are checked against the same rules as `open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AccountRecord")]
pub struct InventoryAccount {
    id: AccountId,
    item_id: ItemId,
    item_name: String,
    location: Location,
    unit: Unit,
    quantity: Decimal,
    cost_per_unit: Decimal,
    cost_scale: u32,
    min_level: Option<Decimal>,
    max_level: Option<Decimal>,
    version: u64,
}

impl InventoryAccount {
    /// Validate an `OpenAccount` command and build the empty account.
    pub fn open(cmd: &OpenAccount, units: &UnitTable) -> InventoryResult<Self> {
        if cmd.item_name.trim().is_empty() {
            return Err(InventoryError::validation("item name cannot be empty"));
        }
        if !units.contains(&cmd.unit) {
            return Err(InventoryError::UnknownUnit(cmd.unit.to_string()));
        }
        let cost_scale = cmd.cost_scale.unwrap_or(DEFAULT_COST_SCALE);
        check_cost_scale(cost_scale)?;
        check_levels(&cmd.location, cmd.min_level, cmd.max_level)?;

        Ok(Self {
            id: cmd.account_id,
            item_id: cmd.item_id,
            item_name: cmd.item_name.trim().to_string(),
            location: cmd.location.normalized(),
            unit: cmd.unit.clone(),
            quantity: Decimal::ZERO,
            cost_per_unit: Decimal::ZERO,
            cost_scale,
            min_level: cmd.min_level,
            max_level: cmd.max_level,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn cost_per_unit(&self) -> Decimal {
        self.cost_per_unit
    }

    pub fn cost_scale(&self) -> u32 {
        self.cost_scale
    }

    pub fn min_level(&self) -> Option<Decimal> {
        self.min_level
    }

    pub fn max_level(&self) -> Option<Decimal> {
        self.max_level
    }

    /// Stock value: `quantity × cost_per_unit`.
    pub fn value(&self) -> Decimal {
        self.quantity * self.cost_per_unit
    }

    /// Room left below `max_level`, if one is configured.
    pub fn headroom(&self) -> Option<Decimal> {
        self.max_level
            .map(|max| (max - self.quantity).max(Decimal::ZERO))
    }

    pub fn is_below_min(&self) -> bool {
        self.min_level.is_some_and(|min| self.quantity < min)
    }

    /// Called by stores after committing a new state for this account.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }

    /// Shortage line describing a request this account cannot cover.
    pub fn shortage(&self, needed: Decimal) -> Shortage {
        Shortage {
            account_id: self.id,
            item_name: self.item_name.clone(),
            unit: self.unit.clone(),
            needed,
            available: self.quantity,
            warehouse_available: None,
        }
    }

    /// New state after removing `quantity`; cost basis is unchanged.
    pub fn deduct(&self, quantity: Decimal) -> InventoryResult<Self> {
        if quantity <= Decimal::ZERO {
            return Err(InventoryError::validation("quantity must be positive"));
        }
        if quantity > self.quantity {
            return Err(InventoryError::InsufficientStock(ShortageReport::single(
                self.shortage(quantity),
            )));
        }
        let mut next = self.clone();
        next.quantity -= quantity;
        Ok(next)
    }

    /// New state after a signed correction; cost basis is unchanged.
    pub fn adjust(&self, delta: Decimal) -> InventoryResult<Self> {
        if delta.is_zero() {
            return Err(InventoryError::validation("delta cannot be zero"));
        }
        if delta.is_sign_negative() {
            return self.deduct(-delta);
        }
        let mut next = self.clone();
        next.quantity += delta;
        Ok(next)
    }

    pub(crate) fn with_balance(&self, quantity: Decimal, cost_per_unit: Decimal) -> Self {
        let mut next = self.clone();
        next.quantity = quantity;
        next.cost_per_unit = cost_per_unit;
        next
    }
}

fn check_cost_scale(cost_scale: u32) -> InventoryResult<()> {
    if cost_scale > MAX_COST_SCALE {
        return Err(InventoryError::validation(format!(
            "cost scale cannot exceed {MAX_COST_SCALE}"
        )));
    }
    Ok(())
}

fn check_levels(
    location: &Location,
    min_level: Option<Decimal>,
    max_level: Option<Decimal>,
) -> InventoryResult<()> {
    if location.is_warehouse() && (min_level.is_some() || max_level.is_some()) {
        return Err(InventoryError::validation(
            "min/max levels apply to department buffers only",
        ));
    }
    if min_level.is_some_and(|min| min < Decimal::ZERO) {
        return Err(InventoryError::validation("min level cannot be negative"));
    }
    if max_level.is_some_and(|max| max <= Decimal::ZERO) {
        return Err(InventoryError::validation("max level must be positive"));
    }
    if let (Some(min), Some(max)) = (min_level, max_level) {
        if min > max {
            return Err(InventoryError::validation("min level cannot exceed max level"));
        }
    }
    Ok(())
}

/// Wire shape of `InventoryAccount` before validation.
#[derive(Deserialize)]
struct AccountRecord {
    id: AccountId,
    item_id: ItemId,
    item_name: String,
    location: Location,
    unit: Unit,
    quantity: Decimal,
    cost_per_unit: Decimal,
    cost_scale: u32,
    min_level: Option<Decimal>,
    max_level: Option<Decimal>,
    version: u64,
}

impl TryFrom<AccountRecord> for InventoryAccount {
    type Error = InventoryError;

    fn try_from(record: AccountRecord) -> InventoryResult<Self> {
        if record.item_name.trim().is_empty() {
            return Err(InventoryError::validation("item name cannot be empty"));
        }
        if record.quantity < Decimal::ZERO || record.cost_per_unit < Decimal::ZERO {
            return Err(InventoryError::invariant(
                "quantity and cost per unit cannot be negative",
            ));
        }
        check_cost_scale(record.cost_scale)?;
        check_levels(&record.location, record.min_level, record.max_level)?;

        Ok(Self {
            id: record.id,
            item_id: record.item_id,
            item_name: record.item_name,
            location: record.location,
            unit: record.unit,
            quantity: record.quantity,
            cost_per_unit: record.cost_per_unit,
            cost_scale: record.cost_scale,
            min_level: record.min_level,
            max_level: record.max_level,
            version: record.version,
        })
    }
}

impl Versioned for InventoryAccount {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
