// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Prefix of every Halcyon environment variable.
pub const ENV_PREFIX: &str = "HALCYON";

/// Reads prefixed environment variables into flat configuration keys.
///
/// With the prefix `HALCYON`, `HALCYON_BINARY_FALLBACK=false` becomes the key
/// `binary_fallback`. Variables without the prefix are ignored.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Loader for the `HALCYON_` namespace.
    pub fn halcyon() -> Self {
        Self::new(Some(ENV_PREFIX.to_string()))
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Load all matching variables of the process environment.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.load_from(env::vars()))
    }

    /// Load all matching variables from an explicit source.
    pub fn load_from<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.config_key(&key).map(|key| (key, value)))
            .collect()
    }

    /// Map a variable name to its configuration key.
    pub fn config_key(&self, var: &str) -> Option<String> {
        match &self.prefix {
            Some(prefix) => {
                let rest = var.strip_prefix(prefix.as_str())?.strip_prefix('_')?;
                (!rest.is_empty()).then(|| rest.to_lowercase())
            }
            None => Some(var.to_lowercase()),
        }
    }

    /// Map a configuration key to its variable name.
    pub fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Load a single variable by configuration key.
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.var_name(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::halcyon()
    }
}
