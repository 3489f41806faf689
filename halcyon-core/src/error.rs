// Error types for content negotiation and media type resolution

use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No representation satisfies both the client and the server.
    #[error("Not Acceptable: {0}")]
    NotAcceptable(String),

    /// Several unrelated capability contracts declare different formats for
    /// the same operation.
    #[error(
        "Ambiguous declaration: operation {operation} on {resource} has conflicting produced media types from contracts [{}]",
        .contracts.join(", ")
    )]
    AmbiguousDeclaration {
        resource: String,
        operation: String,
        contracts: Vec<String>,
    },

    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    #[error("Unknown operation {operation} on resource {resource}")]
    UnknownOperation { resource: String, operation: String },
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Error::InvalidMediaType(_) => StatusCode::BAD_REQUEST,

            // Registration defects are the server's fault
            Error::AmbiguousDeclaration { .. }
            | Error::UnknownResource(_)
            | Error::UnknownContract(_)
            | Error::UnknownOperation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error describes a broken declaration table rather than a
    /// property of the request.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousDeclaration { .. }
                | Error::UnknownResource(_)
                | Error::UnknownContract(_)
                | Error::UnknownOperation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
