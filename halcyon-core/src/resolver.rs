//! Producible-representation resolution.
//!
//! For one operation the registry finds the formats it can emit. The first
//! level that declares anything wins; levels are never merged:
//!
//! 1. the operation itself
//! 2. the same signature on the nearest ancestor that declares formats
//! 3. the capability contracts implemented by the resource or its ancestors
//! 4. the resource itself
//!
//! Contracts are the only level that can conflict. When several contracts
//! each declare a different non-empty list for the operation, resolution
//! fails with [`Error::AmbiguousDeclaration`]. A contract that declares
//! nothing for the operation defers to the contracts it extends.
//!
//! # Examples
//!
//! ```
//! use halcyon_core::declaration::{ContractDeclaration, OperationSignature, ResourceDeclaration};
//! use halcyon_core::resolver::{Registry, ResolutionSource};
//! use halcyon_core::MediaType;
//!
//! let list = OperationSignature::new("list");
//!
//! let mut registry = Registry::new();
//! registry.register_contract(
//!     ContractDeclaration::new("Collection").operation(list.clone(), vec![MediaType::hal_json()]),
//! );
//! registry.register_resource(
//!     ResourceDeclaration::new("Orders")
//!         .produces(vec![MediaType::json()])
//!         .implements("Collection")
//!         .operation(list.clone(), Vec::new()),
//! );
//!
//! let resolved = registry.resolve_with_source("Orders", &list).unwrap();
//! assert_eq!(resolved.media_types(), [MediaType::hal_json()]);
//! assert_eq!(resolved.source(), &ResolutionSource::Contract("Collection".into()));
//! ```

use crate::cache::{OperationKey, ProducibleCache};
use crate::declaration::{ContractDeclaration, OperationSignature, ResourceDeclaration};
use crate::media_type::MediaType;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Which declaration level answered a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    /// Declared on the operation.
    Operation,
    /// Declared on the same operation of the named ancestor.
    Ancestor(String),
    /// Declared by the named capability contract.
    Contract(String),
    /// Declared on the resource.
    Resource,
    /// Declared nowhere.
    None,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Operation => write!(f, "operation"),
            ResolutionSource::Ancestor(name) => write!(f, "ancestor {}", name),
            ResolutionSource::Contract(name) => write!(f, "contract {}", name),
            ResolutionSource::Resource => write!(f, "resource"),
            ResolutionSource::None => write!(f, "none"),
        }
    }
}

/// Resolved producible formats of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducibleDeclaration {
    resource: String,
    signature: OperationSignature,
    media_types: Vec<MediaType>,
    source: ResolutionSource,
}

impl ProducibleDeclaration {
    pub fn new(
        resource: impl Into<String>,
        signature: OperationSignature,
        media_types: Vec<MediaType>,
        source: ResolutionSource,
    ) -> Self {
        Self {
            resource: resource.into(),
            signature,
            media_types,
            source,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn signature(&self) -> &OperationSignature {
        &self.signature
    }

    /// The producible list in declaration order, `qs` included.
    pub fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    pub fn into_media_types(self) -> Vec<MediaType> {
        self.media_types
    }

    pub fn source(&self) -> &ResolutionSource {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.media_types.is_empty()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Declaration table plus its resolution cache.
///
/// Registration takes `&mut self` and happens at startup; resolution takes
/// `&self` and is safe to call from any number of request threads.
#[derive(Debug, Default)]
pub struct Registry {
    resources: HashMap<String, ResourceDeclaration>,
    resource_order: Vec<String>,
    contracts: HashMap<String, ContractDeclaration>,
    cache: ProducibleCache,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a resource.
    pub fn register_resource(&mut self, resource: ResourceDeclaration) -> &mut Self {
        let name = resource.name().to_string();
        debug!(resource = %name, operations = resource.operations().len(), "Registering resource");
        if self.resources.insert(name.clone(), resource).is_none() {
            self.resource_order.push(name);
        }
        self.cache.clear();
        self
    }

    /// Register or replace a capability contract.
    pub fn register_contract(&mut self, contract: ContractDeclaration) -> &mut Self {
        debug!(contract = %contract.name(), operations = contract.operations().len(), "Registering contract");
        self.contracts.insert(contract.name().to_string(), contract);
        self.cache.clear();
        self
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDeclaration> {
        self.resources.get(name)
    }

    pub fn contract(&self, name: &str) -> Option<&ContractDeclaration> {
        self.contracts.get(name)
    }

    /// Registered resources in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDeclaration> {
        self.resource_order.iter().filter_map(|name| self.resources.get(name))
    }

    pub fn cache(&self) -> &ProducibleCache {
        &self.cache
    }

    /// Resolve the producible formats of an operation.
    ///
    /// An operation that declares nothing at any level resolves to an empty
    /// list. An operation that is not declared on the resource, its
    /// ancestors or its contracts fails with [`Error::UnknownOperation`].
    pub fn resolve(&self, resource: &str, signature: &OperationSignature) -> Result<Vec<MediaType>> {
        self.resolve_with_source(resource, signature)
            .map(ProducibleDeclaration::into_media_types)
    }

    /// Resolve and report which declaration level answered.
    ///
    /// Lookups of resources or operations that were never registered are
    /// not kept in the cache, so names taken from requests cannot grow it.
    pub fn resolve_with_source(&self, resource: &str, signature: &OperationSignature) -> Result<ProducibleDeclaration> {
        let key = OperationKey::new(resource, signature.clone());
        let result = self
            .cache
            .get_or_resolve(&key, || self.resolve_uncached(resource, signature));

        if matches!(
            result,
            Err(Error::UnknownResource(_) | Error::UnknownOperation { .. })
        ) {
            self.cache.remove(&key);
        }
        result
    }

    /// The resolved list with `q` and `qs` removed, as shown in API
    /// documentation.
    pub fn documented_media_types(&self, resource: &str, signature: &OperationSignature) -> Result<Vec<MediaType>> {
        let mut documented: Vec<MediaType> = Vec::new();
        for media_type in self.resolve(resource, signature)? {
            let media_type = media_type.without_quality_parameters();
            if !documented.contains(&media_type) {
                documented.push(media_type);
            }
        }
        Ok(documented)
    }

    /// Every operation signature callable on a resource: its own, its
    /// ancestors' and its contracts', nearest first.
    pub fn operations(&self, resource: &str) -> Result<Vec<OperationSignature>> {
        let mut signatures: Vec<OperationSignature> = Vec::new();
        let mut push = |signature: &OperationSignature| {
            if !signatures.contains(signature) {
                signatures.push(signature.clone());
            }
        };

        let lineage = self.lineage(resource)?;
        for ancestor in &lineage {
            ancestor.operations().iter().for_each(|op| push(op.signature()));
        }
        for contract in self.contracts_of(&lineage)? {
            contract.operations().iter().for_each(|op| push(op.signature()));
        }

        Ok(signatures)
    }

    /// Distinct union of every operation's producible formats, in
    /// registration order.
    pub fn all_producible(&self) -> Result<Vec<MediaType>> {
        let mut all: Vec<MediaType> = Vec::new();
        for resource in &self.resource_order {
            for signature in self.operations(resource)? {
                for media_type in self.resolve(resource, &signature)? {
                    if !all.iter().any(|known| known.identical(&media_type)) {
                        all.push(media_type);
                    }
                }
            }
        }
        Ok(all)
    }

    /// Resolve every operation of every resource, surfacing configuration
    /// defects such as ambiguous contracts at startup.
    pub fn validate(&self) -> Result<()> {
        let mut operations = 0usize;
        for resource in &self.resource_order {
            for signature in self.operations(resource)? {
                self.resolve_with_source(resource, &signature)?;
                operations += 1;
            }
        }
        debug!(
            resources = self.resource_order.len(),
            contracts = self.contracts.len(),
            operations,
            "Declarations validated"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    fn resolve_uncached(&self, resource: &str, signature: &OperationSignature) -> Result<ProducibleDeclaration> {
        let lineage = self.lineage(resource)?;
        let contracts = self.contracts_of(&lineage)?;

        let declared = lineage.iter().any(|r| r.find_operation(signature).is_some())
            || contracts
                .iter()
                .any(|c| self.contract_declares(c, signature, &mut HashSet::new()));
        if !declared {
            return Err(Error::UnknownOperation {
                resource: resource.to_string(),
                operation: signature.to_string(),
            });
        }

        let found = |media_types: &[MediaType], source: ResolutionSource| {
            debug!(
                resource,
                operation = %signature,
                source = %source,
                formats = media_types.len(),
                "Resolved producible media types"
            );
            Ok(ProducibleDeclaration::new(
                resource,
                signature.clone(),
                media_types.to_vec(),
                source,
            ))
        };

        // 1 and 2: the operation, then the ancestor chain
        for (depth, declaration) in lineage.iter().enumerate() {
            if let Some(op) = declaration.find_operation(signature).filter(|op| op.declares_formats()) {
                let source = if depth == 0 {
                    ResolutionSource::Operation
                } else {
                    ResolutionSource::Ancestor(declaration.name().to_string())
                };
                return found(op.produces(), source);
            }
        }

        // 3: capability contracts
        let mut visited = HashSet::new();
        let names: Vec<&str> = contracts.iter().map(|c| c.name()).collect();
        if let Some((contract, media_types)) = self.resolve_contracts(resource, &names, signature, &mut visited)? {
            return found(&media_types, ResolutionSource::Contract(contract));
        }

        // 4: the resource
        let root = &lineage[0];
        if !root.declared_produces().is_empty() {
            return found(root.declared_produces(), ResolutionSource::Resource);
        }

        found(&[], ResolutionSource::None)
    }

    /// The resource followed by its ancestors, nearest first.
    fn lineage(&self, resource: &str) -> Result<Vec<&ResourceDeclaration>> {
        let mut lineage = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(resource);

        while let Some(name) = next {
            if !seen.insert(name) {
                warn!(resource, ancestor = name, "Cycle in resource ancestry");
                break;
            }
            let declaration = self
                .resources
                .get(name)
                .ok_or_else(|| Error::UnknownResource(name.to_string()))?;
            lineage.push(declaration);
            next = declaration.parent();
        }

        Ok(lineage)
    }

    /// Contracts implemented along a lineage, nearest first, without
    /// duplicates.
    fn contracts_of(&self, lineage: &[&ResourceDeclaration]) -> Result<Vec<&ContractDeclaration>> {
        let mut contracts: Vec<&ContractDeclaration> = Vec::new();
        for name in lineage.iter().flat_map(|r| r.contracts()) {
            let contract = self.find_contract(name)?;
            if !contracts.iter().any(|c| c.name() == contract.name()) {
                contracts.push(contract);
            }
        }
        Ok(contracts)
    }

    fn find_contract(&self, name: &str) -> Result<&ContractDeclaration> {
        self.contracts
            .get(name)
            .ok_or_else(|| Error::UnknownContract(name.to_string()))
    }

    fn contract_declares<'a>(
        &'a self,
        contract: &'a ContractDeclaration,
        signature: &OperationSignature,
        visited: &mut HashSet<&'a str>,
    ) -> bool {
        if !visited.insert(contract.name()) {
            return false;
        }
        contract.find_operation(signature).is_some()
            || contract.super_contracts().iter().any(|name| {
                self.contracts
                    .get(name)
                    .is_some_and(|parent| self.contract_declares(parent, signature, visited))
            })
    }

    /// Resolve over a set of sibling contracts.
    ///
    /// Returns the attributed formats when exactly one distinct non-empty
    /// list is found, `None` when no contract declares anything.
    fn resolve_contracts<'a>(
        &'a self,
        resource: &str,
        names: &[&'a str],
        signature: &OperationSignature,
        visited: &mut HashSet<&'a str>,
    ) -> Result<Option<(String, Vec<MediaType>)>> {
        let mut results: Vec<(String, Vec<MediaType>)> = Vec::new();

        for &name in names {
            let Some(result) = self.resolve_contract(resource, name, signature, visited)? else {
                continue;
            };
            if !results.iter().any(|(_, known)| same_list(known, &result.1)) {
                results.push(result);
            }
        }

        if results.len() > 1 {
            let contracts: Vec<String> = results.into_iter().map(|(name, _)| name).collect();
            warn!(
                resource,
                operation = %signature,
                contracts = ?contracts,
                "Conflicting producible declarations from capability contracts"
            );
            return Err(Error::AmbiguousDeclaration {
                resource: resource.to_string(),
                operation: signature.to_string(),
                contracts,
            });
        }

        Ok(results.pop())
    }

    fn resolve_contract<'a>(
        &'a self,
        resource: &str,
        name: &'a str,
        signature: &OperationSignature,
        visited: &mut HashSet<&'a str>,
    ) -> Result<Option<(String, Vec<MediaType>)>> {
        if !visited.insert(name) {
            debug!(contract = name, "Contract already searched");
            return Ok(None);
        }

        let contract = self.find_contract(name)?;
        if let Some(op) = contract.find_operation(signature).filter(|op| op.declares_formats()) {
            return Ok(Some((contract.name().to_string(), op.produces().to_vec())));
        }

        let supers: Vec<&str> = contract.super_contracts().iter().map(String::as_str).collect();
        self.resolve_contracts(resource, &supers, signature, visited)
    }
}

fn same_list(a: &[MediaType], b: &[MediaType]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
}
