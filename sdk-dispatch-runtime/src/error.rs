//! Error types for command execution.

use sdk_dispatch_common::CodecError;
use thiserror::Error;

use crate::exception::{Fault, ServiceException};

/// Boxed error as produced by transports and signers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a `send` can fail with.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The service answered with an error response.
    #[error(transparent)]
    Service(#[from] ServiceException),

    /// The transport failed before a response was received. Passed through unchanged.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// A wire value could not be coerced to its modeled type.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Failed to serialize request: {0}")]
    Serialization(String),

    #[error("Failed to deserialize response: {0}")]
    Deserialization(String),

    /// The command or client was assembled incorrectly (e.g. no serializer).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Registration on a middleware stack failed (duplicate names, bad overrides).
    #[error("Middleware stack error: {0}")]
    Stack(String),
}

impl SdkError {
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    pub fn service_exception(&self) -> Option<&ServiceException> {
        match self {
            Self::Service(exception) => Some(exception),
            _ => None,
        }
    }

    pub fn service_exception_mut(&mut self) -> Option<&mut ServiceException> {
        match self {
            Self::Service(exception) => Some(exception),
            _ => None,
        }
    }

    /// The service error name, when this is a service fault.
    pub fn name(&self) -> Option<&str> {
        self.service_exception().map(ServiceException::name)
    }

    pub fn fault(&self) -> Option<Fault> {
        self.service_exception().map(ServiceException::fault)
    }
}

/// Result type for command execution
pub type SdkResult<T> = Result<T, SdkError>;
