//! Reusable and expiring state: the TTL cache and the session pool

pub mod cache;
pub mod resource_pool;

pub use cache::{CacheConfig, CacheStats, TtlCache, MAX_TTL};
pub use resource_pool::{AcquireError, PoolConfig, PoolStats, ResourcePool, DEFAULT_ENDPOINT};
