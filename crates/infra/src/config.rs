//! Engine configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stockledger_core::DomainResult;
use stockledger_strategy::{BatchStrategy, CostStrategy, StrategyRegistry};

pub const ENV_SWEEP_INTERVAL_MS: &str = "STOCKLEDGER_SWEEP_INTERVAL_MS";
pub const ENV_DEFAULT_LOCK_TTL_SECS: &str = "STOCKLEDGER_DEFAULT_LOCK_TTL_SECS";
pub const ENV_COST_STRATEGY: &str = "STOCKLEDGER_COST_STRATEGY";
pub const ENV_BATCH_STRATEGY: &str = "STOCKLEDGER_BATCH_STRATEGY";
pub const ENV_TAKING_NUMBER_PREFIX: &str = "STOCKLEDGER_TAKING_NUMBER_PREFIX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often the expiry sweeper runs.
    pub sweep_interval_ms: u64,
    /// Upper bound on locks released per sweep.
    pub sweep_batch_size: usize,
    /// Applied to LockStock requests that carry no expiry. `None` means such
    /// locks never expire.
    pub default_lock_ttl_secs: Option<u64>,
    pub default_cost_strategy: String,
    pub default_batch_strategy: String,
    pub taking_number_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 30_000,
            sweep_batch_size: 500,
            default_lock_ttl_secs: None,
            default_cost_strategy: "moving_average".to_string(),
            default_batch_strategy: "fifo".to_string(),
            taking_number_prefix: "ST".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `STOCKLEDGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`], reading values through `lookup`.
    /// Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = parsed::<u64>(&lookup, ENV_SWEEP_INTERVAL_MS) {
            if ms == 0 {
                tracing::warn!(key = ENV_SWEEP_INTERVAL_MS, "sweep interval must be positive; using default");
            } else {
                config.sweep_interval_ms = ms;
            }
        }
        if let Some(secs) = parsed::<u64>(&lookup, ENV_DEFAULT_LOCK_TTL_SECS) {
            if secs > 0 && lock_ttl(secs).is_none() {
                tracing::warn!(
                    key = ENV_DEFAULT_LOCK_TTL_SECS,
                    secs,
                    "lock ttl out of range; using default"
                );
            } else {
                config.default_lock_ttl_secs = (secs > 0).then_some(secs);
            }
        }
        if let Some(name) = non_empty(&lookup, ENV_COST_STRATEGY) {
            config.default_cost_strategy = name;
        }
        if let Some(name) = non_empty(&lookup, ENV_BATCH_STRATEGY) {
            config.default_batch_strategy = name;
        }
        if let Some(prefix) = non_empty(&lookup, ENV_TAKING_NUMBER_PREFIX) {
            config.taking_number_prefix = prefix;
        }

        config
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// `None` also when the configured seconds do not fit a duration.
    pub fn default_lock_ttl(&self) -> Option<chrono::Duration> {
        self.default_lock_ttl_secs.and_then(lock_ttl)
    }

    /// Built-in strategies with this config's cost and batch defaults.
    /// Unknown default names fail with `NotFound`.
    pub fn build_registry(&self) -> DomainResult<StrategyRegistry> {
        let registry = StrategyRegistry::with_defaults()?;
        registry.set_default::<dyn CostStrategy>(&self.default_cost_strategy)?;
        registry.set_default::<dyn BatchStrategy>(&self.default_batch_strategy)?;
        Ok(registry)
    }
}

fn lock_ttl(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "invalid config value; using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
        assert!(config.default_lock_ttl().is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_SWEEP_INTERVAL_MS, "250"),
            (ENV_DEFAULT_LOCK_TTL_SECS, "900"),
            (ENV_COST_STRATEGY, "fifo"),
            (ENV_BATCH_STRATEGY, " fefo "),
            (ENV_TAKING_NUMBER_PREFIX, "PI"),
        ]));
        assert_eq!(config.sweep_interval_ms, 250);
        assert_eq!(config.default_lock_ttl(), Some(chrono::Duration::minutes(15)));
        assert_eq!(config.default_cost_strategy, "fifo");
        assert_eq!(config.default_batch_strategy, "fefo");
        assert_eq!(config.taking_number_prefix, "PI");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_SWEEP_INTERVAL_MS, "soon"),
            (ENV_DEFAULT_LOCK_TTL_SECS, "-5"),
        ]));
        assert_eq!(config.sweep_interval_ms, 30_000);
        assert_eq!(config.default_lock_ttl_secs, None);
    }

    #[test]
    fn oversized_lock_ttl_falls_back() {
        for huge in [u64::MAX.to_string(), (i64::MAX as u64).to_string()] {
            let lookup = lookup_from(&[(ENV_DEFAULT_LOCK_TTL_SECS, huge.as_str())]);
            let config = EngineConfig::from_lookup(lookup);
            assert_eq!(config.default_lock_ttl_secs, None);
            assert_eq!(config.default_lock_ttl(), None);
        }

        let literal = EngineConfig {
            default_lock_ttl_secs: Some(u64::MAX / 2),
            ..EngineConfig::default()
        };
        assert_eq!(literal.default_lock_ttl(), None);
    }

    #[test]
    fn partial_json_uses_defaults_for_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_batch_strategy":"fefo"}"#).unwrap();
        assert_eq!(config.default_batch_strategy, "fefo");
        assert_eq!(config.taking_number_prefix, "ST");
    }

    #[test]
    fn registry_honours_configured_defaults() {
        let config = EngineConfig {
            default_cost_strategy: "fifo".to_string(),
            default_batch_strategy: "fefo".to_string(),
            ..EngineConfig::default()
        };
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.get::<dyn CostStrategy>(None).unwrap().name(), "fifo");
        assert_eq!(registry.get::<dyn BatchStrategy>(None).unwrap().name(), "fefo");

        let unknown = EngineConfig {
            default_cost_strategy: "lifo".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(unknown.build_registry().unwrap_err().code(), "NOT_FOUND");
    }
}
