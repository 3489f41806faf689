// Configuration validation

use crate::{ConfigError, Result};
use halcyon_core::MediaType;
use std::collections::HashSet;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not blank
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + std::fmt::Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that no name appears twice
    pub fn unique<'a, I>(names: I, field: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                return Err(ConfigError::ValidationError(format!("duplicate {} '{}'", field, name)));
            }
        }
        Ok(())
    }

    /// Parse every entry as a media type.
    ///
    /// Only `qs` may weight a producible entry; `q` belongs to clients.
    pub fn producible_media_types(values: &[String], field: &str) -> Result<Vec<MediaType>> {
        values
            .iter()
            .map(|value| -> Result<MediaType> {
                let media_type = MediaType::parse(value)?;
                if media_type.param("q").is_some() {
                    return Err(ConfigError::ValidationError(format!(
                        "{} declares client quality in '{}', use qs",
                        field, value
                    )));
                }
                Ok(media_type)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty() {
        assert!(ConfigValidator::not_empty("Orders", "name").is_ok());
        assert!(ConfigValidator::not_empty("  ", "name").is_err());
    }

    #[test]
    fn test_in_range() {
        assert!(ConfigValidator::in_range(0.5, 0.0, 1.0, "qs").is_ok());
        let err = ConfigValidator::in_range(1.5, 0.0, 1.0, "qs").unwrap_err();
        assert!(err.to_string().contains("between 0 and 1"));
    }

    #[test]
    fn test_unique() {
        assert!(ConfigValidator::unique(["Orders", "Customers"], "resource").is_ok());
        let err = ConfigValidator::unique(["Orders", "Orders"], "resource").unwrap_err();
        assert!(err.to_string().contains("duplicate resource 'Orders'"));
    }

    #[test]
    fn test_producible_media_types() {
        let parsed = ConfigValidator::producible_media_types(
            &["application/hal+json; profile=\"urn:orders:v2\"; qs=0.7".to_string()],
            "Orders",
        )
        .unwrap();
        assert_eq!(parsed[0].profile(), Some("urn:orders:v2"));
        assert_eq!(parsed[0].server_quality(), 0.7);

        assert!(matches!(
            ConfigValidator::producible_media_types(&["application/json;q=0.5".to_string()], "Orders"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ConfigValidator::producible_media_types(&["nonsense".to_string()], "Orders"),
            Err(ConfigError::Declaration(_))
        ));
    }
}
