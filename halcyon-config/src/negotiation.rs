// Negotiation settings

use crate::{ConfigError, ConfigManager, Result};
use halcyon_core::{NegotiationSettings, Negotiator};
use serde::{Deserialize, Serialize};

/// Serializable form of [`NegotiationSettings`].
///
/// ```toml
/// [negotiation]
/// expand_json_suffix = true
/// binary_fallback = false
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Let plain `application/json` requests match producible `+json` types
    pub expand_json_suffix: bool,
    /// Answer `*/*` and `application/*` with `application/octet-stream`
    pub binary_fallback: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        let settings = NegotiationSettings::default();
        Self {
            expand_json_suffix: settings.expand_json_suffix,
            binary_fallback: settings.binary_fallback,
        }
    }
}

impl NegotiationConfig {
    /// Table key in configuration files.
    pub const KEY: &'static str = "negotiation";

    /// Read from a manager: the `negotiation` table first, then flat keys
    /// (as set by `HALCYON_EXPAND_JSON_SUFFIX` and `HALCYON_BINARY_FALLBACK`).
    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let mut config = if manager.has(Self::KEY) {
            manager.get::<Self>(Self::KEY)?
        } else {
            Self::default()
        };

        if let Some(value) = flag(manager, "expand_json_suffix")? {
            config.expand_json_suffix = value;
        }
        if let Some(value) = flag(manager, "binary_fallback")? {
            config.binary_fallback = value;
        }

        Ok(config)
    }

    pub fn settings(&self) -> NegotiationSettings {
        NegotiationSettings::from(*self)
    }

    pub fn negotiator(&self) -> Negotiator {
        Negotiator::with_settings(self.settings())
    }
}

fn flag(manager: &ConfigManager, key: &str) -> Result<Option<bool>> {
    match manager.get_bool(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl From<NegotiationConfig> for NegotiationSettings {
    fn from(config: NegotiationConfig) -> Self {
        Self {
            expand_json_suffix: config.expand_json_suffix,
            binary_fallback: config.binary_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigLoader, FileFormat};

    #[test]
    fn test_defaults_match_core() {
        let config = NegotiationConfig::default();
        assert_eq!(config.settings(), NegotiationSettings::default());
        assert!(config.expand_json_suffix);
        assert!(config.binary_fallback);
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let manager = ConfigManager::new();
        manager.set("negotiation", serde_json::json!({ "binary_fallback": false })).unwrap();

        let config = manager.negotiation().unwrap();
        assert!(config.expand_json_suffix);
        assert!(!config.binary_fallback);
    }

    #[test]
    fn test_flat_keys_override_table() {
        let manager = ConfigManager::with_prefix("HALCYON");
        manager.set("negotiation", NegotiationConfig::default()).unwrap();
        manager.load_env_from(vec![("HALCYON_EXPAND_JSON_SUFFIX".to_string(), "false".to_string())]);

        let config = NegotiationConfig::from_manager(&manager).unwrap();
        assert!(!config.expand_json_suffix);
        assert!(config.binary_fallback);
        assert!(!config.negotiator().settings().expand_json_suffix);
    }

    #[test]
    fn test_invalid_flag_is_an_error() {
        let manager = ConfigManager::new();
        manager.set("binary_fallback", "sometimes").unwrap();
        assert!(manager.negotiation().is_err());
    }

    #[test]
    fn test_toml_table() {
        let config: NegotiationConfig = ConfigLoader::new(FileFormat::Toml)
            .parse_as("expand_json_suffix = false")
            .unwrap();
        assert!(!config.expand_json_suffix);
        assert!(config.binary_fallback);
    }
}
