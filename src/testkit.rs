//! In-memory session backend for tests, benches and local experiments.
//!
//! [`ScriptedConnector`] hands out sessions that record every submitted
//! statement batch and answer through a caller-supplied responder.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::pool::{Connector, ExecResult, Session, TransportError};
use crate::result::RawResult;
use crate::types::ParameterMap;

type Responder = dyn Fn(&str, &ParameterMap) -> ExecResult + Send + Sync;

enum Injected {
    Fail(String),
    Break(String),
}

struct Shared {
    submitted: Mutex<Vec<String>>,
    injected: Mutex<VecDeque<Injected>>,
    responder: Box<Responder>,
    latency: Duration,
    opened: AtomicUsize,
}

/// Connector producing scripted in-memory sessions.
pub struct ScriptedConnector {
    shared: Arc<Shared>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new(|_, _| ExecResult::ok(RawResult::default()))
    }
}

impl ScriptedConnector {
    /// Answers every statement batch through `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &ParameterMap) -> ExecResult + Send + Sync + 'static,
    {
        Self::with_latency(responder, Duration::ZERO)
    }

    /// Like [`new`](Self::new), sleeping `latency` inside every execution.
    pub fn with_latency<F>(responder: F, latency: Duration) -> Self
    where
        F: Fn(&str, &ParameterMap) -> ExecResult + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                submitted: Mutex::new(Vec::new()),
                injected: Mutex::new(VecDeque::new()),
                responder: Box::new(responder),
                latency,
                opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Makes the next execution report a database failure.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.shared
            .injected
            .lock()
            .push_back(Injected::Fail(message.into()));
    }

    /// Makes the next execution fail at the transport level.
    pub fn break_next(&self, message: impl Into<String>) {
        self.shared
            .injected
            .lock()
            .push_back(Injected::Break(message.into()));
    }

    /// Every statement batch submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        self.shared.submitted.lock().clone()
    }

    /// Number of sessions opened.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> Result<Box<dyn Session>> {
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct ScriptedSession {
    shared: Arc<Shared>,
}

impl Session for ScriptedSession {
    fn execute(
        &mut self,
        text: &str,
        params: &ParameterMap,
    ) -> std::result::Result<ExecResult, TransportError> {
        self.shared.submitted.lock().push(text.to_string());
        if !self.shared.latency.is_zero() {
            thread::sleep(self.shared.latency);
        }
        let injected = self.shared.injected.lock().pop_front();
        match injected {
            Some(Injected::Fail(message)) => Ok(ExecResult::failed(message)),
            Some(Injected::Break(message)) => Err(TransportError(message)),
            None => Ok((self.shared.responder)(text, params)),
        }
    }
}
