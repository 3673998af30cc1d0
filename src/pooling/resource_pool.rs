//! Fixed-capacity, round-robin pool of long-lived remote sessions
//!
//! The pool fills lazily: each of the first `capacity` acquisitions creates
//! one session in a new slot. After that, acquisitions cycle through the
//! slots, probing the selected session and replacing it in place when the
//! probe fails. Sessions are never checked back in; every caller receives
//! its own [`SessionHandle::copy`] of the pooled session.

use crate::error::ConnectError;
use crate::session::{Connector, SessionError, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Default remote endpoint
pub const DEFAULT_ENDPOINT: &str = "mongodb://127.0.0.1:27017";

/// Error returned by [`ResourcePool::acquire`]
pub type AcquireError<C> = ConnectError<SessionError<C>>;

/// Resource pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of slots
    pub capacity: usize,
    /// Endpoint handed to the connector
    pub endpoint: String,
    /// Upper bound on a single session creation
    pub connect_timeout: Duration,
    /// Upper bound on a single liveness probe
    pub health_check_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            health_check_timeout: Duration::from_secs(2),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set capacity
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set endpoint
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set connect timeout
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set health check timeout
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}

struct Slot<S> {
    resource: Option<Arc<S>>,
    last_error: Option<String>,
    /// Serializes close-and-recreate of this slot; held across `.await`.
    replace_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<S> Slot<S> {
    fn empty() -> Self {
        Self {
            resource: None,
            last_error: None,
            replace_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

struct PoolState<S> {
    slots: Vec<Slot<S>>,
    cursor: usize,
    /// Bumped by every flush; work started under an older generation never
    /// writes into the current slot list.
    generation: u64,
}

impl<S> PoolState<S> {
    fn slot_mut(&mut self, index: usize, generation: u64) -> Option<&mut Slot<S>> {
        if self.generation != generation {
            return None;
        }
        self.slots.get_mut(index)
    }
}

enum Selection<S> {
    /// A freshly reserved slot that still has to be filled
    Grow {
        index: usize,
        generation: u64,
        replace_lock: Arc<tokio::sync::Mutex<()>>,
    },
    /// The next slot in round-robin order
    Existing {
        index: usize,
        generation: u64,
        resource: Option<Arc<S>>,
        replace_lock: Arc<tokio::sync::Mutex<()>>,
    },
}

/// Bounded pool of reusable remote sessions
pub struct ResourcePool<C: Connector> {
    config: PoolConfig,
    connector: C,
    state: parking_lot::Mutex<PoolState<C::Session>>,
}

impl<C: Connector> ResourcePool<C> {
    /// Create an empty pool; no session is created until the first `acquire`
    pub fn new(mut config: PoolConfig, connector: C) -> Self {
        if config.capacity == 0 {
            tracing::warn!("Pool capacity of 0 requested; using 1");
            config.capacity = 1;
        }

        Self {
            state: parking_lot::Mutex::new(PoolState {
                slots: Vec::with_capacity(config.capacity),
                cursor: 0,
                generation: 0,
            }),
            config,
            connector,
        }
    }

    /// Create a pool with default configuration
    pub fn with_default_config(connector: C) -> Self {
        Self::new(PoolConfig::default(), connector)
    }

    /// Configuration in use
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Endpoint sessions are created against
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Maximum number of slots
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Current number of slots
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Check if the pool holds no slots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the growth phase is over
    pub fn is_full(&self) -> bool {
        self.len() >= self.config.capacity
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            slots: state.slots.len(),
            capacity: self.config.capacity,
            unset: state.slots.iter().filter(|s| s.resource.is_none()).count(),
            failed: state
                .slots
                .iter()
                .filter(|s| s.resource.is_none() && s.last_error.is_some())
                .count(),
        }
    }

    /// Get a handle to a live session
    ///
    /// Grows the pool by one slot while it is below capacity, otherwise
    /// takes the next slot in round-robin order and probes it. An unhealthy
    /// or unset slot is (re)created in place before its handle is returned.
    /// Creation failures are returned as-is; the slot is retried the next
    /// time the cursor reaches it.
    pub async fn acquire(&self) -> Result<C::Session, AcquireError<C>> {
        loop {
            let outcome = match self.select() {
                Selection::Grow {
                    index,
                    generation,
                    replace_lock,
                } => {
                    tracing::debug!(
                        "Growing session pool: slot {}/{}",
                        index + 1,
                        self.config.capacity
                    );
                    self.replace(index, generation, None, replace_lock).await?
                }
                Selection::Existing {
                    index,
                    generation,
                    resource,
                    replace_lock,
                } => {
                    if let Some(session) = &resource {
                        match self.probe(session).await {
                            Ok(()) => return Ok(session.copy()),
                            Err(reason) => {
                                tracing::warn!(
                                    "Session in slot {} failed health check: {}",
                                    index,
                                    reason
                                );
                            }
                        }
                    }
                    self.replace(index, generation, resource, replace_lock)
                        .await?
                }
            };

            match outcome {
                Some(session) => return Ok(session),
                None => tracing::debug!("Session pool flushed during acquire; retrying"),
            }
        }
    }

    /// Reserve a new slot or advance the cursor, in one critical section
    fn select(&self) -> Selection<C::Session> {
        let mut state = self.state.lock();
        let generation = state.generation;

        if state.slots.len() < self.config.capacity {
            let slot = Slot::empty();
            let replace_lock = Arc::clone(&slot.replace_lock);
            state.slots.push(slot);
            let index = state.slots.len() - 1;
            state.cursor = index;
            return Selection::Grow {
                index,
                generation,
                replace_lock,
            };
        }

        let index = (state.cursor + 1) % state.slots.len();
        state.cursor = index;
        let slot = &state.slots[index];

        Selection::Existing {
            index,
            generation,
            resource: slot.resource.clone(),
            replace_lock: Arc::clone(&slot.replace_lock),
        }
    }

    /// Close `stale` and create a replacement for slot `index`
    ///
    /// Runs under the slot's replacement lock. If another task already
    /// replaced the session that this task saw, that replacement is used.
    /// Returns `None` when a flush retired the slot; a session created for
    /// it is closed instead of being handed out.
    async fn replace(
        &self,
        index: usize,
        generation: u64,
        stale: Option<Arc<C::Session>>,
        replace_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Result<Option<C::Session>, AcquireError<C>> {
        let _guard = replace_lock.lock().await;

        let current = {
            let mut state = self.state.lock();
            // Flushed meanwhile; the flush closes whatever was pooled.
            let Some(slot) = state.slot_mut(index, generation) else {
                return Ok(None);
            };
            let unchanged = match (&slot.resource, &stale) {
                (Some(current), Some(stale)) => Arc::ptr_eq(current, stale),
                _ => false,
            };
            if unchanged {
                slot.resource.take()
            } else if let Some(current) = &slot.resource {
                return Ok(Some(current.copy()));
            } else {
                None
            }
        };

        if let Some(old) = current {
            old.close().await;
        }

        let created = self.create().await;

        let orphan = {
            let mut state = self.state.lock();
            match (created, state.slot_mut(index, generation)) {
                (Ok(session), Some(slot)) => {
                    let session = Arc::new(session);
                    let handle = session.copy();
                    slot.resource = Some(session);
                    slot.last_error = None;
                    return Ok(Some(handle));
                }
                (Ok(session), None) => session,
                (Err(e), slot) => {
                    tracing::error!(
                        "Failed to create session for slot {} ({}): {}",
                        index,
                        self.config.endpoint,
                        e
                    );
                    if let Some(slot) = slot {
                        slot.last_error = Some(e.to_string());
                    }
                    return Err(e);
                }
            }
        };

        tracing::debug!(
            "Session pool flushed while connecting slot {}; closing the new session",
            index
        );
        orphan.close().await;
        Ok(None)
    }

    async fn create(&self) -> Result<C::Session, AcquireError<C>> {
        match timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.config.endpoint),
        )
        .await
        {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(ConnectError::Failed(e)),
            Err(_) => Err(ConnectError::TimedOut(self.config.connect_timeout)),
        }
    }

    async fn probe(&self, session: &C::Session) -> Result<(), String> {
        match timeout(self.config.health_check_timeout, session.health()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "no answer within {:?}",
                self.config.health_check_timeout
            )),
        }
    }

    /// Empty the pool and remove every pooled session from it
    fn drain(&self) -> Vec<Arc<C::Session>> {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        state.cursor = 0;
        state
            .slots
            .drain(..)
            .filter_map(|slot| slot.resource)
            .collect()
    }

    /// Close every session in the background and empty the pool
    ///
    /// Later acquisitions repopulate the pool from scratch. Closing is
    /// spawned onto the current tokio runtime; outside a runtime the
    /// sessions are dropped without `close`.
    pub fn flush(&self) {
        let sessions = self.drain();
        tracing::info!("Flushing session pool ({} sessions)", sessions.len());

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                for session in sessions {
                    runtime.spawn(async move {
                        session.close().await;
                    });
                }
            }
            Err(_) => {
                if !sessions.is_empty() {
                    tracing::warn!(
                        "No tokio runtime; dropping {} sessions without closing them",
                        sessions.len()
                    );
                }
            }
        }
    }

    /// Close every session, wait for the closes, and empty the pool
    pub async fn shutdown(&self) {
        let sessions = self.drain();
        tracing::info!("Shutting down session pool ({} sessions)", sessions.len());

        for session in sessions {
            session.close().await;
        }
    }
}

impl<C: Connector> Drop for ResourcePool<C> {
    fn drop(&mut self) {
        let open = self
            .state
            .get_mut()
            .slots
            .iter()
            .filter(|s| s.resource.is_some())
            .count();
        if open > 0 {
            tracing::warn!(
                "ResourcePool dropped with {} sessions still open. Call flush() or shutdown() first to close them.",
                open
            );
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Number of slots
    pub slots: usize,
    /// Maximum number of slots
    pub capacity: usize,
    /// Slots without a session (being created, or creation failed)
    pub unset: usize,
    /// Slots whose last creation attempt failed
    pub failed: usize,
}
