//! Space-aware execution of rendered query text on pooled sessions.

use std::time::Instant;

use tracing::{debug, warn};

use crate::descriptor::{InterfaceDescriptor, MethodDescriptor};
use crate::error::{MapperError, Result};
use crate::pool::SessionPool;
use crate::result::RawResult;
use crate::space;
use crate::types::ParameterMap;

/// Executes rendered statements against the pool, keeping each session's
/// tracked space in line with what actually ran on it.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: SessionPool,
    default_space: String,
}

impl QueryExecutor {
    /// Creates an executor over `pool` with the process-wide default space.
    pub fn new(pool: SessionPool, default_space: impl Into<String>) -> Self {
        Self {
            pool,
            default_space: default_space.into(),
        }
    }

    /// The pool sessions are drawn from.
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Process-wide fallback space.
    pub fn default_space(&self) -> &str {
        &self.default_space
    }

    /// Space a call to `method` of `interface` targets.
    pub fn target_space<'a>(
        &'a self,
        interface: &'a InterfaceDescriptor,
        method: &'a MethodDescriptor,
    ) -> &'a str {
        space::resolve_space(
            interface.space.as_deref(),
            method.space.as_deref(),
            &self.default_space,
        )
    }

    /// Runs `text` with `params` on a pooled session.
    ///
    /// A `USE` for the target space is prepended when the session sits
    /// elsewhere. After success the session's space becomes the target of the
    /// last `USE` in the submitted text, or the call's target when there is
    /// none. The session goes back to the pool on every path; a transport
    /// error additionally takes it out of rotation.
    pub fn execute(
        &self,
        interface: &InterfaceDescriptor,
        method: &MethodDescriptor,
        text: &str,
        params: &ParameterMap,
    ) -> Result<RawResult> {
        let target = self.target_space(interface, method);
        let mut session = self.pool.poll()?;
        let submitted = space::with_use_prefix(text, session.current_space(), target);
        let start = Instant::now();
        let outcome = session.execute(&submitted, params);
        let query_ms = start.elapsed().as_secs_f64() * 1_000.0;
        match outcome {
            Ok(result) if result.succeeded => {
                let next = space::space_after(&submitted, session.current_space(), target);
                session.set_current_space(next);
                debug!(
                    interface = %interface.name,
                    method = %method.name,
                    session_id = session.id(),
                    space = session.current_space().unwrap_or(""),
                    gql = %submitted,
                    params = ?params,
                    rows = result.rows.len(),
                    query_ms,
                    "executor.query.completed"
                );
                Ok(result.rows)
            }
            Ok(result) => {
                let message = result
                    .error_message
                    .unwrap_or_else(|| "unknown database error".to_string());
                warn!(
                    interface = %interface.name,
                    method = %method.name,
                    session_id = session.id(),
                    gql = %submitted,
                    params = ?params,
                    error = %message,
                    query_ms,
                    "executor.query.failed"
                );
                Err(MapperError::QueryFailure(message))
            }
            Err(err) => {
                warn!(
                    interface = %interface.name,
                    method = %method.name,
                    session_id = session.id(),
                    gql = %submitted,
                    error = %err,
                    "executor.session.broken"
                );
                session.discard();
                Err(MapperError::QueryFailure(err.to_string()))
            }
        }
    }
}
