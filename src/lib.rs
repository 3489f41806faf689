// Halcyon - hypermedia content negotiation for Rust
//
// This library selects a response media type from the formats a resource
// operation can produce and the formats a client accepts, with support for
// profile-qualified HAL types and server quality (`qs`) weighting.

// Re-export core functionality
pub use halcyon_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use halcyon_config;

#[cfg(feature = "log")]
pub use halcyon_log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Accept,
        ContractDeclaration,
        Error,
        MediaType,
        Negotiation,
        NegotiationSettings,
        Negotiator,
        OperationSignature,
        Registry,
        ResourceDeclaration,
        Result,
    };

    #[cfg(feature = "config")]
    pub use halcyon_config::{ConfigManager, DeclarationManifest, NegotiationConfig};
}
