// Core library for the Halcyon hypermedia toolkit
// Media types, Accept parsing, content negotiation and producible-format resolution

pub mod accept;
pub mod cache;
pub mod declaration;
pub mod error;
pub mod media_type;
pub mod negotiation;
pub mod resolver;

// Re-export commonly used types
pub use accept::Accept;
pub use cache::{OperationKey, ProducibleCache, ProducibleCacheStats};
pub use declaration::{ContractDeclaration, OperationDeclaration, OperationSignature, ResourceDeclaration};
pub use error::*;
pub use media_type::{MediaType, Specificity};
pub use negotiation::{select, Candidate, Negotiation, NegotiationSettings, Negotiator};
pub use resolver::{ProducibleDeclaration, Registry, ResolutionSource};
