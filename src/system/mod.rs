//! Process-wide owner of the cache and the session pool
//!
//! Build one [`ResourceSystem`] at startup, share it by `Arc` with every
//! consumer, and call [`ResourceSystem::shutdown`] before exit.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::pooling::{ResourcePool, TtlCache};
use crate::session::Connector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cache and pool with an explicit start/shutdown lifecycle
pub struct ResourceSystem<V, C: Connector> {
    cache: Arc<TtlCache<String, V>>,
    pool: Arc<ResourcePool<C>>,
    stopped: AtomicBool,
}

impl<V, C> ResourceSystem<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Connector,
{
    /// Validate `config`, build both components and start the cache sweeper
    ///
    /// Outside a tokio runtime the sweeper is not started; expired entries
    /// then stay hidden from reads but are only reclaimed by explicit sweeps.
    pub fn start(config: Config, connector: C) -> Result<Self> {
        Self::start_with_clock(config, connector, Arc::new(SystemClock))
    }

    /// Like [`start`](Self::start), with the cache reading time from `clock`
    pub fn start_with_clock(config: Config, connector: C, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(TtlCache::with_clock(config.cache, clock));
        cache.start_sweeper();

        let pool = Arc::new(ResourcePool::new(config.pool, connector));

        tracing::info!(
            "Resource system started (cache capacity: {}, pool capacity: {}, endpoint: {})",
            cache.config().capacity,
            pool.capacity(),
            pool.endpoint()
        );

        Ok(Self {
            cache,
            pool,
            stopped: AtomicBool::new(false),
        })
    }

    /// The shared cache
    pub fn cache(&self) -> &Arc<TtlCache<String, V>> {
        &self.cache
    }

    /// The shared session pool
    pub fn pool(&self) -> &Arc<ResourcePool<C>> {
        &self.pool
    }

    /// Check if `shutdown` has not been called yet
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stop the sweeper and close every pooled session
    ///
    /// Safe to call repeatedly. Both components stay usable afterwards:
    /// cache reads still honor expiry, and `acquire` repopulates the pool,
    /// so a later `shutdown` closes those sessions as well.
    pub async fn shutdown(&self) {
        let first = !self.stopped.swap(true, Ordering::AcqRel);
        if first {
            self.cache.stop_sweeper().await;
        }

        self.pool.shutdown().await;

        if first {
            tracing::info!("Resource system stopped");
        }
    }
}
