//! Adapter configuration

use castate_error::{CaError, ErrorContext, Result};
use castate_provider::ETHEREUM_SLOT;
use castate_traits::AllowanceChoice;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of the environment variables that override file settings
pub const ENV_PREFIX: &str = "CASTATE_";

/// Tunables of a [`CaAdapter`](crate::CaAdapter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Step type id whose completion triggers a balance refetch
    pub balance_refresh_step: String,
    /// Allowance policy preselected when a request arrives
    pub default_allowance: AllowanceChoice,
    /// Provider slot read by `ensure_injected_session`
    pub provider_slot: String,
    /// Default period of the intent refresh timer
    pub intent_refresh_interval_secs: u64,
    /// Buffer of the update stream; slow subscribers lag past it
    pub update_channel_capacity: usize,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            balance_refresh_step: "IF".to_string(),
            default_allowance: AllowanceChoice::Max,
            provider_slot: ETHEREUM_SLOT.to_string(),
            intent_refresh_interval_secs: 5,
            update_channel_capacity: 64,
            log_filter: "info".to_string(),
        }
    }
}

impl AdapterConfig {
    /// Reads a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CaError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file, falling back to defaults when it is absent
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Writes the config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Defaults overridden from `CASTATE_*` variables (a `.env` file counts)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::default().with_env()
    }

    /// Applies `CASTATE_*` variables on top of this config
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by full variable name
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(step) = var("BALANCE_REFRESH_STEP") {
            self.balance_refresh_step = step;
        }
        if let Some(choice) = var("DEFAULT_ALLOWANCE") {
            self.default_allowance = choice.parse()?;
        }
        if let Some(slot) = var("PROVIDER_SLOT") {
            self.provider_slot = slot;
        }
        if let Some(secs) = var("INTENT_REFRESH_INTERVAL_SECS") {
            self.intent_refresh_interval_secs = secs
                .parse()
                .map_err(|e| CaError::ConfigError(format!("intent refresh interval: {}", e)))?;
        }
        if let Some(capacity) = var("UPDATE_CHANNEL_CAPACITY") {
            self.update_channel_capacity = capacity
                .parse()
                .map_err(|e| CaError::ConfigError(format!("update channel capacity: {}", e)))?;
        }
        if let Some(filter) = var("LOG_FILTER") {
            self.log_filter = filter;
        }

        self.validate()?;
        Ok(self)
    }

    /// Rejects settings the adapter cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.balance_refresh_step.trim().is_empty() {
            return Err(CaError::ConfigError("balance_refresh_step is empty".into()));
        }
        if self.provider_slot.trim().is_empty() {
            return Err(CaError::ConfigError("provider_slot is empty".into()));
        }
        if self.intent_refresh_interval_secs == 0 {
            return Err(CaError::ConfigError("intent_refresh_interval_secs must be non-zero".into()));
        }
        if self.update_channel_capacity == 0 {
            return Err(CaError::ConfigError("update_channel_capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Sets the balance refetch marker
    pub fn with_balance_refresh_step(mut self, step: impl Into<String>) -> Self {
        self.balance_refresh_step = step.into();
        self
    }

    /// Sets the preselected allowance policy
    pub fn with_default_allowance(mut self, choice: AllowanceChoice) -> Self {
        self.default_allowance = choice;
        self
    }

    /// Sets the injected provider slot
    pub fn with_provider_slot(mut self, slot: impl Into<String>) -> Self {
        self.provider_slot = slot.into();
        self
    }

    /// Sets the intent refresh period
    pub fn with_intent_refresh_interval(mut self, secs: u64) -> Self {
        self.intent_refresh_interval_secs = secs;
        self
    }

    /// Sets the update stream buffer
    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        self.update_channel_capacity = capacity;
        self
    }

    /// Sets the fallback log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Intent refresh period as a duration
    pub fn intent_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.intent_refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.balance_refresh_step, "IF");
        assert_eq!(config.default_allowance, AllowanceChoice::Max);
        assert_eq!(config.provider_slot, "ethereum");
        assert_eq!(config.intent_refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.update_channel_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = AdapterConfig::default()
            .with_overrides(lookup(&[
                ("CASTATE_BALANCE_REFRESH_STEP", "IS"),
                ("CASTATE_DEFAULT_ALLOWANCE", "min"),
                ("CASTATE_INTENT_REFRESH_INTERVAL_SECS", "12"),
            ]))
            .unwrap();

        assert_eq!(config.balance_refresh_step, "IS");
        assert_eq!(config.default_allowance, AllowanceChoice::Min);
        assert_eq!(config.intent_refresh_interval_secs, 12);
        assert_eq!(config.provider_slot, "ethereum");
    }

    #[test]
    fn test_bad_overrides_rejected() {
        let err = AdapterConfig::default()
            .with_overrides(lookup(&[("CASTATE_UPDATE_CHANNEL_CAPACITY", "lots")]))
            .unwrap_err();
        assert!(matches!(err, CaError::ConfigError(_)));

        assert!(AdapterConfig::default()
            .with_overrides(lookup(&[("CASTATE_DEFAULT_ALLOWANCE", "unlimited")]))
            .is_err());
    }

    #[test]
    fn test_validation() {
        assert!(AdapterConfig::default().with_balance_refresh_step(" ").validate().is_err());
        assert!(AdapterConfig::default().with_intent_refresh_interval(0).validate().is_err());
        assert!(AdapterConfig::default().with_update_channel_capacity(0).validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("castate-config-{}.json", std::process::id()));
        let config = AdapterConfig::default()
            .with_default_allowance(AllowanceChoice::Exact(1_000))
            .with_provider_slot("wallet");
        config.save(&path).unwrap();

        let loaded = AdapterConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AdapterConfig = serde_json::from_str(r#"{"balance_refresh_step":"IS"}"#).unwrap();
        assert_eq!(config.balance_refresh_step, "IS");
        assert_eq!(config.update_channel_capacity, 64);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AdapterConfig::load("/nonexistent/castate.json").is_err());
        assert_eq!(
            AdapterConfig::load_or_default("/nonexistent/castate.json").unwrap(),
            AdapterConfig::default()
        );
    }
}
