use thiserror::Error;

use crate::error::Result;
use crate::result::RawResult;
use crate::types::ParameterMap;

/// Outcome reported by a session for one submitted statement batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecResult {
    /// Whether the database accepted and ran the statements.
    pub succeeded: bool,
    /// Database error message on failure.
    pub error_message: Option<String>,
    /// Opaque rows handed to the result resolver.
    pub rows: RawResult,
}

impl ExecResult {
    /// Successful execution carrying `rows`.
    pub fn ok(rows: RawResult) -> Self {
        Self {
            succeeded: true,
            error_message: None,
            rows,
        }
    }

    /// Failed execution carrying the database's message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_message: Some(message.into()),
            rows: RawResult::default(),
        }
    }
}

/// The session could not talk to the database at all.
///
/// Unlike a failed [`ExecResult`], this takes the session out of rotation.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Live, stateful database session.
pub trait Session: Send {
    /// Runs `text` with `params` bound as execution parameters.
    fn execute(
        &mut self,
        text: &str,
        params: &ParameterMap,
    ) -> std::result::Result<ExecResult, TransportError>;
}

/// Opens new sessions for the pool.
pub trait Connector: Send + Sync {
    /// Opens one session. Its active space is unknown to the pool.
    fn connect(&self) -> Result<Box<dyn Session>>;
}
