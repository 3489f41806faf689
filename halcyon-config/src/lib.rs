// Configuration management for Halcyon
// Negotiation settings and producible-format declaration manifests

pub mod env;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod negotiation;
pub mod validation;

pub use env::{EnvLoader, ENV_PREFIX};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use manifest::{ContractManifest, DeclarationManifest, OperationManifest, ResourceManifest};
pub use negotiation::NegotiationConfig;
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Main configuration manager
///
/// A flat key/value store fed from files and the environment. Later loads
/// override earlier ones key by key.
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Create with the `HALCYON` prefix and load the environment.
    pub fn from_env() -> Result<Self> {
        let manager = Self::with_prefix(ENV_PREFIX);
        manager.load_env()?;
        Ok(manager)
    }

    fn env_loader(&self) -> EnvLoader {
        EnvLoader::new(self.env_prefix.clone())
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let vars = self.env_loader().load()?;
        self.insert_strings(vars);
        Ok(())
    }

    /// Load configuration from an explicit set of variables
    pub fn load_env_from<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = self.env_loader().load_from(vars);
        self.insert_strings(vars);
    }

    fn insert_strings(&self, vars: HashMap<String, String>) {
        debug!(count = vars.len(), prefix = ?self.env_prefix, "Loaded environment configuration");
        let mut config = self.config.write();
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }
    }

    /// Load a `.env` file into the process environment, then load the
    /// environment. A missing default `.env` is not an error.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path.as_ref())?;
        self.merge_value(data)?;
        debug!(path = %path.as_ref().display(), format = ?format, "Loaded configuration file");
        Ok(())
    }

    /// Load configuration from file, detecting the format from the path
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let format = ConfigLoader::auto(path.as_ref())?.format();
        self.load_file(path, format)
    }

    fn merge_value(&self, data: Value) -> Result<()> {
        let Value::Object(map) = data else {
            return Err(ConfigError::ParseError(
                "configuration document must be a table or object".to_string(),
            ));
        };

        let mut config = self.config.write();
        config.extend(map);
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .config
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get a boolean value. Strings from the environment such as `true`,
    /// `0` or `off` are accepted too.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get::<Value>(key)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::DeserializationError(format!(
                    "{}: '{}' is not a boolean",
                    key, s
                ))),
            },
            other => Err(ConfigError::DeserializationError(format!(
                "{}: {} is not a boolean",
                key, other
            ))),
        }
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.config.read().contains_key(key)
    }

    /// Get all configuration keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager
    pub fn merge(&self, other: &ConfigManager) {
        if Arc::ptr_eq(&self.config, &other.config) {
            return;
        }
        let other_config = other.config.read().clone();
        self.config.write().extend(other_config);
    }

    /// Deserialize the whole store and validate it
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let json_value = Value::Object(
            self.config
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        let validated: T =
            serde_json::from_value(json_value).map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }

    /// Negotiation settings: the `negotiation` table, overridden by flat
    /// `expand_json_suffix` and `binary_fallback` keys.
    pub fn negotiation(&self) -> Result<NegotiationConfig> {
        NegotiationConfig::from_manager(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("manifest", "declarations.toml").unwrap();

        let value: String = manager.get("manifest").unwrap();
        assert_eq!(value, "declarations.toml");
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();
        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_missing_and_mistyped_keys() {
        let manager = ConfigManager::new();
        manager.set("count", "many").unwrap();

        assert!(matches!(manager.get::<i64>("absent"), Err(ConfigError::KeyNotFound(_))));
        assert!(matches!(
            manager.get::<i64>("count"),
            Err(ConfigError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_get_bool_accepts_env_strings() {
        let manager = ConfigManager::with_prefix("HALCYON");
        manager.load_env_from(vec![
            ("HALCYON_BINARY_FALLBACK".to_string(), "off".to_string()),
            ("HALCYON_EXPAND_JSON_SUFFIX".to_string(), "1".to_string()),
            ("HALCYON_LOG_FORMAT".to_string(), "json".to_string()),
        ]);
        manager.set("native", true).unwrap();

        assert!(!manager.get_bool("binary_fallback").unwrap());
        assert!(manager.get_bool("expand_json_suffix").unwrap());
        assert!(manager.get_bool("native").unwrap());
        assert!(manager.get_bool("log_format").is_err());
    }

    #[test]
    fn test_merge() {
        let base = ConfigManager::new();
        base.set("a", 1).unwrap();
        base.set("b", 1).unwrap();

        let overrides = ConfigManager::new();
        overrides.set("b", 2).unwrap();

        base.merge(&overrides);
        base.merge(&base.clone());
        assert_eq!(base.get::<i64>("a").unwrap(), 1);
        assert_eq!(base.get::<i64>("b").unwrap(), 2);
        assert_eq!(base.keys().len(), 2);
    }

    #[test]
    fn test_non_table_document_is_rejected() {
        let manager = ConfigManager::new();
        assert!(manager.merge_value(Value::from(42)).is_err());
    }
}
