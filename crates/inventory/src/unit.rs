//! Units of measure and value-preserving conversion between them.
//!
//! Units are grouped by physical [`Dimension`]; every unit carries a fixed
//! factor to its dimension's base unit (grams, millilitres, pieces). The table
//! is data, not code: deployments register extra units through JSON.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_core::ValueObject;

use crate::error::{InventoryError, InventoryResult};

/// A unit of measure code, normalised to trimmed lowercase (`"KG "` → `"kg"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Unit(String);

impl Unit {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Unit {}

impl From<String> for Unit {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Unit {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        value.0
    }
}

impl core::fmt::Display for Unit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical dimension of a unit. Conversion is only defined within one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

/// One entry of the unit table as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub code: Unit,
    pub dimension: Dimension,
    /// How many base units one of this unit is (kg → 1000 when the base is g).
    pub factor: Decimal,
    #[serde(default)]
    pub aliases: Vec<Unit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UnitEntry {
    dimension: Dimension,
    factor: Decimal,
}

/// Failure while building or loading a unit table.
#[derive(Debug, Error)]
pub enum UnitTableError {
    #[error("failed to read unit table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse unit table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid unit definition: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct UnitTableFile {
    units: Vec<UnitDefinition>,
}

/// Registry of known units and their conversion factors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTable {
    units: HashMap<Unit, UnitEntry>,
}

impl Default for UnitTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for def in default_definitions() {
            // The built-in set has no collisions.
            let _ = table.register(def);
        }
        table
    }
}

impl UnitTable {
    /// A table with no units registered.
    pub fn empty() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Parse a table from JSON: `{"units": [{"code": "kg", "dimension": "mass", "factor": "1000"}]}`.
    ///
    /// The parsed units replace the built-in defaults entirely.
    pub fn from_json(json: &str) -> Result<Self, UnitTableError> {
        let file: UnitTableFile = serde_json::from_str(json)?;
        let mut table = Self::empty();
        for def in file.units {
            table.register(def)?;
        }
        Ok(table)
    }

    /// Read and parse a JSON unit table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, UnitTableError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| UnitTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Register a unit and its aliases.
    ///
    /// Re-registering a code with the same dimension and factor is a no-op;
    /// a different definition for an existing code is rejected.
    pub fn register(&mut self, def: UnitDefinition) -> Result<(), UnitTableError> {
        if def.code.as_str().is_empty() {
            return Err(UnitTableError::Invalid("unit code cannot be empty".to_string()));
        }
        if def.factor <= Decimal::ZERO {
            return Err(UnitTableError::Invalid(format!(
                "factor for '{}' must be positive",
                def.code
            )));
        }

        let entry = UnitEntry {
            dimension: def.dimension,
            factor: def.factor.normalize(),
        };

        let codes: Vec<Unit> = std::iter::once(def.code.clone())
            .chain(def.aliases.iter().cloned())
            .collect();
        for code in &codes {
            if let Some(existing) = self.units.get(code) {
                if *existing != entry {
                    return Err(UnitTableError::Invalid(format!(
                        "unit '{code}' is already registered with a different definition"
                    )));
                }
            }
        }
        for code in codes {
            self.units.insert(code, entry);
        }
        Ok(())
    }

    pub fn contains(&self, unit: &Unit) -> bool {
        self.units.contains_key(unit)
    }

    pub fn dimension(&self, unit: &Unit) -> InventoryResult<Dimension> {
        Ok(self.entry(unit)?.dimension)
    }

    /// Whether a quantity in `from` can be expressed in `to`.
    pub fn compatible(&self, from: &Unit, to: &Unit) -> bool {
        match (self.entry(from), self.entry(to)) {
            (Ok(a), Ok(b)) => a.dimension == b.dimension,
            _ => false,
        }
    }

    /// `convert(1, from, to)`: how many `to` units one `from` unit is.
    pub fn factor(&self, from: &Unit, to: &Unit) -> InventoryResult<Decimal> {
        let (from_entry, to_entry) = self.pair(from, to)?;
        checked_ratio(Decimal::ONE, from_entry.factor, to_entry.factor)
    }

    /// Express `quantity` of `from` in `to`.
    pub fn convert(&self, quantity: Decimal, from: &Unit, to: &Unit) -> InventoryResult<Decimal> {
        if from == to {
            self.entry(from)?;
            return Ok(quantity);
        }
        let (from_entry, to_entry) = self.pair(from, to)?;
        checked_ratio(quantity, from_entry.factor, to_entry.factor)
    }

    /// Express a per-`from` cost as a per-`to` cost.
    ///
    /// Returns `cost / factor(from, to)`, so `quantity × cost` is the same on
    /// both sides of a conversion.
    pub fn convert_cost_per_unit(
        &self,
        cost_per_unit: Decimal,
        from: &Unit,
        to: &Unit,
    ) -> InventoryResult<Decimal> {
        if from == to {
            self.entry(from)?;
            return Ok(cost_per_unit);
        }
        let (from_entry, to_entry) = self.pair(from, to)?;
        checked_ratio(cost_per_unit, to_entry.factor, from_entry.factor)
    }

    fn entry(&self, unit: &Unit) -> InventoryResult<UnitEntry> {
        self.units
            .get(unit)
            .copied()
            .ok_or_else(|| InventoryError::UnknownUnit(unit.to_string()))
    }

    fn pair(&self, from: &Unit, to: &Unit) -> InventoryResult<(UnitEntry, UnitEntry)> {
        let from_entry = self.entry(from)?;
        let to_entry = self.entry(to)?;
        if from_entry.dimension != to_entry.dimension {
            return Err(InventoryError::IncompatibleUnits {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok((from_entry, to_entry))
    }
}

/// `value × numerator / denominator`, multiplying first to keep exact ratios exact.
fn checked_ratio(value: Decimal, numerator: Decimal, denominator: Decimal) -> InventoryResult<Decimal> {
    value
        .checked_mul(numerator)
        .and_then(|v| v.checked_div(denominator))
        .map(|v| v.normalize())
        .ok_or_else(|| InventoryError::validation("unit conversion overflowed"))
}

fn default_definitions() -> Vec<UnitDefinition> {
    fn def(code: &str, dimension: Dimension, factor: Decimal, aliases: &[&str]) -> UnitDefinition {
        UnitDefinition {
            code: Unit::new(code),
            dimension,
            factor,
            aliases: aliases.iter().map(Unit::new).collect(),
        }
    }

    vec![
        def("g", Dimension::Mass, Decimal::ONE, &["gram", "grams", "gr"]),
        def("kg", Dimension::Mass, Decimal::from(1000), &["kilogram", "kilograms", "kilo"]),
        def("mg", Dimension::Mass, Decimal::new(1, 3), &["milligram", "milligrams"]),
        def("ml", Dimension::Volume, Decimal::ONE, &["milliliter", "millilitre"]),
        def("l", Dimension::Volume, Decimal::from(1000), &["liter", "litre", "ltr"]),
        def("pcs", Dimension::Count, Decimal::ONE, &["pc", "piece", "pieces", "unit"]),
        def("dozen", Dimension::Count, Decimal::from(12), &["dz"]),
    ]
}
