//! Static producible-format declarations.
//!
//! Resources and capability contracts are described as tagged data and
//! registered explicitly with a [`Registry`](crate::resolver::Registry).
//! Nothing is discovered at runtime.
//!
//! ```
//! use halcyon_core::declaration::{ContractDeclaration, OperationSignature, ResourceDeclaration};
//! use halcyon_core::MediaType;
//!
//! let readable = ContractDeclaration::new("Readable")
//!     .operation(OperationSignature::new("get").param("id"), vec![MediaType::json()]);
//!
//! let orders = ResourceDeclaration::new("OrderResource")
//!     .produces(vec![MediaType::hal_json()])
//!     .implements("Readable")
//!     .operation(OperationSignature::new("get").param("id"), Vec::new());
//!
//! assert_eq!(orders.contracts(), ["Readable".to_string()]);
//! assert!(readable.find_operation(&OperationSignature::new("get").param("id")).is_some());
//! ```

use crate::media_type::MediaType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation identity: name plus parameter shape.
///
/// Parameter entries describe the shape (for example type names), not
/// argument values. Two signatures are equivalent when both the name and
/// every parameter entry match in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationSignature {
    name: String,
    #[serde(default)]
    parameters: Vec<String>,
}

impl OperationSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter to the shape.
    pub fn param(mut self, parameter: impl Into<String>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    /// Build from a name and full parameter shape.
    pub fn with_parameters<I, S>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(", "))
    }
}

/// An operation together with the formats declared directly on it.
///
/// An empty `produces` list means the operation exists at this level but
/// leaves the decision to the levels above it.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDeclaration {
    signature: OperationSignature,
    produces: Vec<MediaType>,
}

impl OperationDeclaration {
    pub fn new(signature: OperationSignature, produces: Vec<MediaType>) -> Self {
        Self { signature, produces }
    }

    pub fn signature(&self) -> &OperationSignature {
        &self.signature
    }

    pub fn produces(&self) -> &[MediaType] {
        &self.produces
    }

    pub fn declares_formats(&self) -> bool {
        !self.produces.is_empty()
    }
}

fn upsert(operations: &mut Vec<OperationDeclaration>, declaration: OperationDeclaration) {
    match operations
        .iter_mut()
        .find(|op| op.signature == declaration.signature)
    {
        Some(existing) => *existing = declaration,
        None => operations.push(declaration),
    }
}

/// A resource type: the owner of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDeclaration {
    name: String,
    produces: Vec<MediaType>,
    parent: Option<String>,
    contracts: Vec<String>,
    operations: Vec<OperationDeclaration>,
}

impl ResourceDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            produces: Vec::new(),
            parent: None,
            contracts: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Formats that apply to every operation of this resource unless
    /// something closer to the operation overrides them.
    pub fn produces(mut self, produces: Vec<MediaType>) -> Self {
        self.produces = produces;
        self
    }

    /// Set the ancestor implementation this resource extends.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add an implemented capability contract. Order is preserved.
    pub fn implements(mut self, contract: impl Into<String>) -> Self {
        let contract = contract.into();
        if !self.contracts.contains(&contract) {
            self.contracts.push(contract);
        }
        self
    }

    /// Declare an operation. Redeclaring a signature replaces it.
    pub fn operation(mut self, signature: OperationSignature, produces: Vec<MediaType>) -> Self {
        upsert(&mut self.operations, OperationDeclaration::new(signature, produces));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_produces(&self) -> &[MediaType] {
        &self.produces
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn contracts(&self) -> &[String] {
        &self.contracts
    }

    pub fn operations(&self) -> &[OperationDeclaration] {
        &self.operations
    }

    pub fn find_operation(&self, signature: &OperationSignature) -> Option<&OperationDeclaration> {
        self.operations.iter().find(|op| op.signature() == signature)
    }
}

/// A capability contract (an implemented interface) that may declare
/// formats for the operations it defines.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDeclaration {
    name: String,
    extends: Vec<String>,
    operations: Vec<OperationDeclaration>,
}

impl ContractDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Add a super-contract.
    pub fn extends(mut self, contract: impl Into<String>) -> Self {
        let contract = contract.into();
        if !self.extends.contains(&contract) {
            self.extends.push(contract);
        }
        self
    }

    pub fn operation(mut self, signature: OperationSignature, produces: Vec<MediaType>) -> Self {
        upsert(&mut self.operations, OperationDeclaration::new(signature, produces));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_contracts(&self) -> &[String] {
        &self.extends
    }

    pub fn operations(&self) -> &[OperationDeclaration] {
        &self.operations
    }

    pub fn find_operation(&self, signature: &OperationSignature) -> Option<&OperationDeclaration> {
        self.operations.iter().find(|op| op.signature() == signature)
    }
}
