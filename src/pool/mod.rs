#![forbid(unsafe_code)]

//! Bounded pool of reusable database sessions.
//!
//! Every session carries one piece of mutable state the pool cares about: the
//! space it currently sits in. A session is held by at most one caller at a
//! time; [`PooledSession`] hands it back on drop, so every successful
//! [`SessionPool::poll`] is paired with exactly one release on every exit
//! path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{MapperError, Result};
use crate::types::ParameterMap;

mod session;

pub use session::{Connector, ExecResult, Session, TransportError};

/// Sizing of a [`SessionPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of live sessions.
    pub capacity: usize,
    /// Sessions opened eagerly when the pool is created.
    pub min_idle: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            capacity: 8,
            min_idle: 0,
        }
    }
}

impl PoolOptions {
    /// Rejects a zero capacity or `min_idle > capacity`.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MapperError::Configuration(
                "pool capacity must be > 0".into(),
            ));
        }
        if self.min_idle > self.capacity {
            return Err(MapperError::Configuration(format!(
                "pool min_idle {} exceeds capacity {}",
                self.min_idle, self.capacity
            )));
        }
        Ok(())
    }
}

/// Point-in-time counters of a pool.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Configured maximum of live sessions.
    pub capacity: usize,
    /// Sessions currently open, idle or checked out.
    pub live: usize,
    /// Sessions waiting in the pool.
    pub idle: usize,
    /// Sessions currently held by callers.
    pub checked_out: usize,
    /// Highest `checked_out` ever observed.
    pub peak_checked_out: usize,
    /// Successful polls.
    pub acquisitions: u64,
    /// Sessions handed back, including discarded ones.
    pub releases: u64,
    /// Sessions removed from rotation after transport errors.
    pub discarded: u64,
}

struct LocalSession {
    id: u64,
    space: Option<String>,
    handle: Box<dyn Session>,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<LocalSession>,
    live: usize,
    checked_out: usize,
    peak_checked_out: usize,
    acquisitions: u64,
    releases: u64,
    discarded: u64,
}

impl PoolState {
    fn check_out(&mut self) {
        self.checked_out += 1;
        self.acquisitions += 1;
        self.peak_checked_out = self.peak_checked_out.max(self.checked_out);
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    capacity: usize,
    state: Mutex<PoolState>,
    available: Condvar,
    next_id: AtomicU64,
}

impl Inner {
    fn open(&self) -> Result<LocalSession> {
        let handle = self.connector.connect()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(session_id = id, "pool.session.created");
        Ok(LocalSession {
            id,
            space: None,
            handle,
        })
    }

    fn offer(&self, session: LocalSession, broken: bool) {
        let mut state = self.state.lock();
        state.checked_out -= 1;
        state.releases += 1;
        let dropped = if broken {
            state.live -= 1;
            state.discarded += 1;
            Some(session)
        } else {
            state.idle.push(session);
            None
        };
        drop(state);
        self.available.notify_one();
        if let Some(session) = dropped {
            warn!(session_id = session.id, "pool.session.discarded");
        }
    }
}

/// Shared handle to a bounded session pool.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<Inner>,
}

impl SessionPool {
    /// Creates a pool and eagerly opens `min_idle` sessions.
    pub fn new(connector: Arc<dyn Connector>, opts: PoolOptions) -> Result<Self> {
        opts.validate()?;
        let inner = Arc::new(Inner {
            connector,
            capacity: opts.capacity,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            next_id: AtomicU64::new(1),
        });
        let mut warm = Vec::with_capacity(opts.min_idle);
        for _ in 0..opts.min_idle {
            warm.push(inner.open()?);
        }
        {
            let mut state = inner.state.lock();
            state.live = warm.len();
            state.idle = warm;
        }
        Ok(Self { inner })
    }

    /// Checks out a session, blocking while the pool is exhausted.
    ///
    /// New sessions are opened lazily until `capacity` is reached. A connect
    /// failure gives the reserved slot back and is returned to the caller.
    pub fn poll(&self) -> Result<PooledSession> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(session) = state.idle.pop() {
                state.check_out();
                return Ok(PooledSession::new(Arc::clone(&self.inner), session));
            }
            if state.live < self.inner.capacity {
                state.live += 1;
                state.check_out();
                break;
            }
            self.inner.available.wait(&mut state);
        }
        drop(state);
        match self.inner.open() {
            Ok(session) => Ok(PooledSession::new(Arc::clone(&self.inner), session)),
            Err(err) => {
                let mut state = self.inner.state.lock();
                state.live -= 1;
                state.checked_out -= 1;
                state.acquisitions -= 1;
                drop(state);
                self.inner.available.notify_one();
                Err(err)
            }
        }
    }

    /// Returns a session to the pool. Equivalent to dropping it.
    pub fn offer(&self, session: PooledSession) {
        drop(session);
    }

    /// Current counters.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.inner.state.lock();
        PoolSnapshot {
            capacity: self.inner.capacity,
            live: state.live,
            idle: state.idle.len(),
            checked_out: state.checked_out,
            peak_checked_out: state.peak_checked_out,
            acquisitions: state.acquisitions,
            releases: state.releases,
            discarded: state.discarded,
        }
    }
}

/// Session checked out of a [`SessionPool`].
///
/// Dropping the guard offers the session back, or discards it when it was
/// marked broken.
pub struct PooledSession {
    inner: Arc<Inner>,
    session: Option<LocalSession>,
    broken: bool,
}

impl PooledSession {
    fn new(inner: Arc<Inner>, session: LocalSession) -> Self {
        Self {
            inner,
            session: Some(session),
            broken: false,
        }
    }

    fn local(&self) -> &LocalSession {
        self.session.as_ref().expect("pooled session present until drop")
    }

    fn local_mut(&mut self) -> &mut LocalSession {
        self.session.as_mut().expect("pooled session present until drop")
    }

    /// Pool-assigned session identifier.
    pub fn id(&self) -> u64 {
        self.local().id
    }

    /// Space the session is believed to sit in, `None` when unknown.
    pub fn current_space(&self) -> Option<&str> {
        self.local().space.as_deref()
    }

    /// Records the space the session now sits in.
    pub fn set_current_space(&mut self, space: Option<String>) {
        self.local_mut().space = space;
    }

    /// Submits `text` to the underlying session.
    pub fn execute(
        &mut self,
        text: &str,
        params: &ParameterMap,
    ) -> std::result::Result<ExecResult, TransportError> {
        self.local_mut().handle.execute(text, params)
    }

    /// Takes the session out of rotation once it is released.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Removes the session from rotation immediately, waking one waiter so
    /// the pool can open a replacement.
    pub fn discard(mut self) {
        self.mark_broken();
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.inner.offer(session, self.broken);
        }
    }
}
