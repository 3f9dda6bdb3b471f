#![allow(missing_docs)]

use std::io;

use thiserror::Error;

/// Result alias used throughout the mapper.
pub type Result<T> = std::result::Result<T, MapperError>;

/// Errors surfaced to the caller of a mapped method invocation.
///
/// Nothing in the pipeline retries or swallows these; the session used by a
/// failed call has already been handed back to the pool by the time the
/// caller observes the error.
#[derive(Debug, Error)]
pub enum MapperError {
    /// No descriptor is registered for the requested method.
    #[error("method '{interface}.{method}' not found")]
    NotFound { interface: String, method: String },
    /// Positional argument count disagrees with the declared parameters.
    #[error("method '{method}' declares {expected} parameters (got {found})")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
    /// The template renderer rejected the template or its inputs.
    #[error("template error: {0}")]
    Template(String),
    /// The database reported a failed execution.
    #[error("query failed: {0}")]
    QueryFailure(String),
    /// Registration-time misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A caller-supplied value violates an invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Result or config payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MapperError {
    pub(crate) fn not_found(interface: impl Into<String>, method: impl Into<String>) -> Self {
        MapperError::NotFound {
            interface: interface.into(),
            method: method.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            MapperError::NotFound { .. } => "NotFound",
            MapperError::ArityMismatch { .. } => "ArityMismatch",
            MapperError::Template(_) => "TemplateError",
            MapperError::QueryFailure(_) => "QueryFailure",
            MapperError::Configuration(_) => "ConfigurationError",
            MapperError::InvalidArgument(_) => "InvalidArgument",
            MapperError::Decode(_) => "DecodeError",
            MapperError::Io(_) => "Io",
        }
    }
}

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        MapperError::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for MapperError {
    fn from(err: toml::de::Error) -> Self {
        MapperError::Decode(err.to_string())
    }
}
