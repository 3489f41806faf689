//! Declaration manifests.
//!
//! A manifest lists resources and capability contracts together with the
//! media types they produce, and builds a validated
//! [`Registry`](halcyon_core::Registry) from them:
//!
//! ```toml
//! [[contracts]]
//! name = "Collection"
//!
//! [[contracts.operations]]
//! name = "list"
//! parameters = ["Page"]
//! produces = ['application/hal+json; profile="https://example.com/collection/v2"; qs=0.7']
//!
//! [[resources]]
//! name = "OrderResource"
//! implements = ["Collection"]
//! produces = ["application/json"]
//! ```

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigLoader, FileFormat, Result};
use halcyon_core::{ContractDeclaration, OperationSignature, Registry, ResourceDeclaration};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One operation and the formats declared on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationManifest {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
}

impl OperationManifest {
    pub fn signature(&self) -> OperationSignature {
        OperationSignature::with_parameters(self.name.clone(), self.parameters.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub name: String,
    #[serde(default)]
    pub produces: Vec<String>,
    /// Ancestor resource
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub operations: Vec<OperationManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractManifest {
    pub name: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub operations: Vec<OperationManifest>,
}

/// Resources and contracts as loaded from a TOML or JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationManifest {
    #[serde(default)]
    pub resources: Vec<ResourceManifest>,
    #[serde(default)]
    pub contracts: Vec<ContractManifest>,
}

impl DeclarationManifest {
    /// Parse a manifest document.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        if format == FileFormat::Env {
            return Err(ConfigError::LoadError(
                "declaration manifests must be TOML or JSON".to_string(),
            ));
        }
        ConfigLoader::new(format).parse_as(content)
    }

    /// Load a manifest file, detecting the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content, loader.format())
    }

    /// Build the declarations without checking resolution.
    pub fn declarations(&self) -> Result<(Vec<ResourceDeclaration>, Vec<ContractDeclaration>)> {
        self.validate()?;

        let mut resources = Vec::with_capacity(self.resources.len());
        for manifest in &self.resources {
            let mut resource = ResourceDeclaration::new(&manifest.name)
                .produces(ConfigValidator::producible_media_types(&manifest.produces, &manifest.name)?);
            if let Some(parent) = &manifest.extends {
                resource = resource.extends(parent);
            }
            for contract in &manifest.implements {
                resource = resource.implements(contract);
            }
            for op in &manifest.operations {
                let field = format!("{}::{}", manifest.name, op.name);
                resource = resource.operation(
                    op.signature(),
                    ConfigValidator::producible_media_types(&op.produces, &field)?,
                );
            }
            resources.push(resource);
        }

        let mut contracts = Vec::with_capacity(self.contracts.len());
        for manifest in &self.contracts {
            let mut contract = ContractDeclaration::new(&manifest.name);
            for parent in &manifest.extends {
                contract = contract.extends(parent);
            }
            for op in &manifest.operations {
                let field = format!("{}::{}", manifest.name, op.name);
                contract = contract.operation(
                    op.signature(),
                    ConfigValidator::producible_media_types(&op.produces, &field)?,
                );
            }
            contracts.push(contract);
        }

        Ok((resources, contracts))
    }

    /// Build a registry and resolve every operation once, so ambiguous or
    /// dangling declarations fail here rather than on a request.
    pub fn into_registry(self) -> Result<Registry> {
        let (resources, contracts) = self.declarations()?;

        let mut registry = Registry::new();
        for contract in contracts {
            registry.register_contract(contract);
        }
        for resource in resources {
            registry.register_resource(resource);
        }
        registry.validate()?;

        info!(
            resources = self.resources.len(),
            contracts = self.contracts.len(),
            "Declaration manifest loaded"
        );
        Ok(registry)
    }
}

impl Validate for DeclarationManifest {
    fn validate(&self) -> Result<()> {
        for resource in &self.resources {
            ConfigValidator::not_empty(&resource.name, "resource name")?;
            validate_operations(&resource.name, &resource.operations)?;
        }
        for contract in &self.contracts {
            ConfigValidator::not_empty(&contract.name, "contract name")?;
            validate_operations(&contract.name, &contract.operations)?;
        }

        ConfigValidator::unique(self.resources.iter().map(|r| r.name.as_str()), "resource")?;
        ConfigValidator::unique(self.contracts.iter().map(|c| c.name.as_str()), "contract")?;
        Ok(())
    }
}

fn validate_operations(owner: &str, operations: &[OperationManifest]) -> Result<()> {
    for op in operations {
        ConfigValidator::not_empty(&op.name, "operation name")?;
    }
    let signatures: Vec<String> = operations.iter().map(|op| op.signature().to_string()).collect();
    ConfigValidator::unique(
        signatures.iter().map(String::as_str),
        &format!("operation on {}", owner),
    )
}
