// Configuration file loaders

use crate::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Detect the format of a path. `.env` files have no extension, only a
    /// file name.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        if path.file_name().and_then(|n| n.to_str()) == Some(".env") {
            return Some(FileFormat::Env);
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Parses configuration documents into a JSON value tree.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from the path
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::from_path(path)
            .map(Self::new)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported configuration file: {}", path.display())))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;

        self.parse(&content)
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e))),
            FileFormat::Toml => toml::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e))),
            FileFormat::Env => parse_env(content),
        }
    }

    /// Parse straight into a typed document.
    pub fn parse_as<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e))),
            FileFormat::Toml => toml::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e))),
            FileFormat::Env => serde_json::from_value(parse_env(content)?)
                .map_err(|e| ConfigError::DeserializationError(e.to_string())),
        }
    }
}

/// `.env` syntax, parsed with dotenvy so quoting and escapes follow the
/// usual rules. Values stay strings.
fn parse_env(content: &str) -> Result<Value> {
    let mut map = serde_json::Map::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        let (key, value) = item.map_err(|e| ConfigError::ParseError(format!(".env parse error: {}", e)))?;
        map.insert(key, Value::String(value));
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let value = loader.parse(r#"{"negotiation": {"binary_fallback": false}}"#).unwrap();
        assert_eq!(value["negotiation"]["binary_fallback"], Value::Bool(false));
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let value = loader
            .parse(
                r#"
                [negotiation]
                expand_json_suffix = true
                "#,
            )
            .unwrap();
        assert_eq!(value["negotiation"]["expand_json_suffix"], Value::Bool(true));
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let value = loader
            .parse("# defaults\nBINARY_FALLBACK=false\nPROFILE=\"https://example.com/orders/v2\"\n")
            .unwrap();
        assert_eq!(value["BINARY_FALLBACK"], "false");
        assert_eq!(value["PROFILE"], "https://example.com/orders/v2");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConfigLoader::new(FileFormat::Json).parse("{"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            ConfigLoader::new(FileFormat::Toml).parse("a = "),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_as() {
        #[derive(Deserialize)]
        struct Doc {
            name: String,
        }

        let doc: Doc = ConfigLoader::new(FileFormat::Toml).parse_as("name = \"orders\"").unwrap();
        assert_eq!(doc.name, "orders");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("JSON"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_path("config/halcyon.toml"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_path(".env"), Some(FileFormat::Env));
        assert_eq!(FileFormat::from_path("halcyon.yaml"), None);
        assert!(ConfigLoader::auto("halcyon").is_err());
    }
}
