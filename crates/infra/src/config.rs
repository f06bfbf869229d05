//! Engine configuration.
//!
//! Read once at startup from `LARDER_*` environment variables. Invalid values
//! are logged and replaced by the default rather than failing the process.

use std::path::PathBuf;
use std::time::Duration;

use larder_inventory::{DEFAULT_COST_SCALE, FallbackPolicy, UnitTable, UnitTableError};

pub const COST_SCALE_VAR: &str = "LARDER_COST_SCALE";
pub const FALLBACK_VAR: &str = "LARDER_CONSUMPTION_FALLBACK";
pub const MAX_COMMIT_ATTEMPTS_VAR: &str = "LARDER_MAX_COMMIT_ATTEMPTS";
pub const RETRY_BACKOFF_VAR: &str = "LARDER_RETRY_BACKOFF_MS";
pub const UNITS_FILE_VAR: &str = "LARDER_UNITS_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Cost scale for accounts opened without an explicit one.
    pub default_cost_scale: u32,
    pub fallback: FallbackPolicy,
    /// Plan/commit attempts before a concurrency conflict is returned.
    pub max_commit_attempts: u32,
    /// Base delay between attempts; grows linearly with the attempt number.
    pub retry_backoff: Duration,
    /// JSON unit table replacing the built-in one.
    pub units_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_cost_scale: DEFAULT_COST_SCALE,
            fallback: FallbackPolicy::Disabled,
            max_commit_attempts: 8,
            retry_backoff: Duration::from_millis(5),
            units_file: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_cost_scale = parse_or(&lookup, COST_SCALE_VAR, defaults.default_cost_scale)
            .min(28);
        let fallback = parse_or(&lookup, FALLBACK_VAR, defaults.fallback);
        let max_commit_attempts =
            parse_or(&lookup, MAX_COMMIT_ATTEMPTS_VAR, defaults.max_commit_attempts).max(1);
        let retry_backoff = Duration::from_millis(parse_or(
            &lookup,
            RETRY_BACKOFF_VAR,
            defaults.retry_backoff.as_millis() as u64,
        ));
        let units_file = lookup(UNITS_FILE_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            default_cost_scale,
            fallback,
            max_commit_attempts,
            retry_backoff,
            units_file,
        }
    }

    /// The configured unit table, or the built-in one.
    pub fn load_units(&self) -> Result<UnitTable, UnitTableError> {
        match &self.units_file {
            Some(path) => {
                let units = UnitTable::load(path)?;
                tracing::info!(path = %path.display(), "loaded unit table");
                Ok(units)
            }
            None => Ok(UnitTable::default()),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + core::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(%key, value = %raw, ?default, "invalid configuration value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(EngineConfig::from_lookup(|_| None), EngineConfig::default());
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = EngineConfig::from_lookup(lookup(&[
            (COST_SCALE_VAR, "4"),
            (FALLBACK_VAR, "Warehouse"),
            (MAX_COMMIT_ATTEMPTS_VAR, "3"),
            (RETRY_BACKOFF_VAR, "0"),
            (UNITS_FILE_VAR, "/etc/larder/units.json"),
        ]));

        assert_eq!(config.default_cost_scale, 4);
        assert_eq!(config.fallback, FallbackPolicy::Warehouse);
        assert_eq!(config.max_commit_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::ZERO);
        assert_eq!(config.units_file, Some(PathBuf::from("/etc/larder/units.json")));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (COST_SCALE_VAR, "two"),
            (FALLBACK_VAR, "supplier"),
            (MAX_COMMIT_ATTEMPTS_VAR, "0"),
        ]));

        assert_eq!(config.default_cost_scale, DEFAULT_COST_SCALE);
        assert_eq!(config.fallback, FallbackPolicy::Disabled);
        assert_eq!(config.max_commit_attempts, 1);
    }

    #[test]
    fn builtin_units_when_no_file_configured() {
        let units = EngineConfig::default().load_units().unwrap();
        assert!(units.contains(&larder_inventory::Unit::new("kg")));
    }
}
