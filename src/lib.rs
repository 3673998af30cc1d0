//! Rust Resource System
//!
//! Resource lifecycle primitives for async backend services.
//!
//! ## Features
//!
//! - [`TtlCache`]: in-memory key/value store with per-entry TTL, a hard
//!   capacity limit and a background sweeper
//! - [`ResourcePool`]: fixed-capacity, round-robin pool of remote sessions
//!   with lazy health checks and in-place replacement
//! - [`ResourceSystem`]: owns one cache and one pool with an explicit
//!   start/shutdown lifecycle
//! - Injectable [`Clock`] for deterministic expiry tests
//!
//! ## Example
//!
//! ```no_run
//! use rust_resource_system::{Config, Connector, ResourceSystem, SessionHandle};
//! use std::time::Duration;
//!
//! # async fn example<C: Connector>(connector: C) -> Result<(), Box<dyn std::error::Error>> {
//! let system = ResourceSystem::<u64, C>::start(Config::from_env()?, connector)?;
//!
//! system.cache().put("answer".to_string(), 42, Duration::from_secs(30))?;
//! assert_eq!(system.cache().get("answer"), Some(42));
//!
//! let session = system.pool().acquire().await?;
//! session.health().await?;
//!
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod pooling;
pub mod session;
pub mod stability;
pub mod system;

// Re-export main types
pub use clock::{Clock, MockClock, SystemClock};
pub use config::Config;
pub use error::{CacheError, ConfigError, ConnectError, ResourceError, Result};
pub use pooling::{
    AcquireError, CacheConfig, CacheStats, PoolConfig, PoolStats, ResourcePool, TtlCache,
};
pub use session::{Connector, SessionError, SessionHandle};
pub use stability::ShutdownSignal;
pub use system::ResourceSystem;
