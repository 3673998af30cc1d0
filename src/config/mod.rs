//! Startup configuration
//!
//! Values are supplied once, before the cache and pool are built, and are
//! read-only afterwards. The service scaffold keeps its settings as a flat
//! string map (a JSON object of strings, or environment variables); the
//! keys read here are listed in [`KEYS`].

use crate::error::ConfigError;
use crate::pooling::{CacheConfig, PoolConfig};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Maximum number of cache entries
pub const CACHE_CAPACITY: &str = "CACHE_CAPACITY";
/// Seconds between cache sweeps
pub const CACHE_SWEEP_SECONDS: &str = "CACHE_SWEEP_SECONDS";
/// Remote endpoint for pooled sessions
pub const MONGO_URL: &str = "MONGO_URL";
/// Number of pooled sessions
pub const MONGO_POOL: &str = "MONGO_POOL";
/// Seconds allowed for one session creation
pub const MONGO_CONNECT_TIMEOUT_SECONDS: &str = "MONGO_CONNECT_TIMEOUT_SECONDS";
/// Seconds allowed for one liveness probe
pub const MONGO_HEALTH_TIMEOUT_SECONDS: &str = "MONGO_HEALTH_TIMEOUT_SECONDS";

/// Every key understood by [`Config::from_map`]
pub const KEYS: [&str; 6] = [
    CACHE_CAPACITY,
    CACHE_SWEEP_SECONDS,
    MONGO_URL,
    MONGO_POOL,
    MONGO_CONNECT_TIMEOUT_SECONDS,
    MONGO_HEALTH_TIMEOUT_SECONDS,
];

/// Configuration for the cache and the session pool
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Cache settings
    pub cache: CacheConfig,
    /// Pool settings
    pub pool: PoolConfig,
}

impl Config {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cache configuration
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set pool configuration
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Build from a flat key/value map
    ///
    /// Missing or blank keys keep their defaults, and a pool size of `0`
    /// falls back to the default size as well.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(capacity) = parse::<usize>(map, CACHE_CAPACITY)? {
            config.cache.capacity = capacity;
        }
        if let Some(secs) = parse::<u64>(map, CACHE_SWEEP_SECONDS)? {
            config.cache.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(url) = lookup(map, MONGO_URL) {
            config.pool.endpoint = url.to_string();
        }
        if let Some(size) = parse::<usize>(map, MONGO_POOL)? {
            if size > 0 {
                config.pool.capacity = size;
            }
        }
        if let Some(secs) = parse::<u64>(map, MONGO_CONNECT_TIMEOUT_SECONDS)? {
            config.pool.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(map, MONGO_HEALTH_TIMEOUT_SECONDS)? {
            config.pool.health_check_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Build from a JSON object of string values
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let map: HashMap<String, String> = serde_json::from_str(json)?;
        Self::from_map(&map)
    }

    /// Build from a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Build from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let map: HashMap<String, String> = KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self::from_map(&map)
    }

    /// Reject values the cache or pool cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::invalid("cache capacity must be positive"));
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(ConfigError::invalid("cache sweep interval must be positive"));
        }
        if self.pool.capacity == 0 {
            return Err(ConfigError::invalid("pool capacity must be positive"));
        }
        if self.pool.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("pool endpoint must not be empty"));
        }
        if self.pool.connect_timeout.is_zero() {
            return Err(ConfigError::invalid("connect timeout must be positive"));
        }
        if self.pool.health_check_timeout.is_zero() {
            return Err(ConfigError::invalid("health check timeout must be positive"));
        }
        Ok(())
    }
}

fn lookup<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(map: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError> {
    match lookup(map, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid_value(key, raw)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pooling::DEFAULT_ENDPOINT;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.cache.capacity, 10_000);
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.pool.capacity, 5);
        assert_eq!(config.pool.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_from_map() {
        let config = Config::from_map(&map(&[
            (CACHE_CAPACITY, "2"),
            (CACHE_SWEEP_SECONDS, "1"),
            (MONGO_URL, "mongodb://db.internal:27017"),
            (MONGO_POOL, "3"),
            (MONGO_CONNECT_TIMEOUT_SECONDS, "4"),
        ]))
        .unwrap();

        assert_eq!(config.cache.capacity, 2);
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.pool.endpoint, "mongodb://db.internal:27017");
        assert_eq!(config.pool.capacity, 3);
        assert_eq!(config.pool.connect_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_zero_pool_falls_back_to_default() {
        let config = Config::from_map(&map(&[(MONGO_POOL, "0")])).unwrap();
        assert_eq!(config.pool.capacity, 5);
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_map(&map(&[(MONGO_POOL, "five")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == MONGO_POOL));
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let err = Config::from_map(&map(&[(CACHE_SWEEP_SECONDS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_json_str() {
        let config =
            Config::from_json_str(r#"{"MONGO_URL": "mongodb://replica:27017", "MONGO_POOL": "8"}"#)
                .unwrap();
        assert_eq!(config.pool.endpoint, "mongodb://replica:27017");
        assert_eq!(config.pool.capacity, 8);

        assert!(matches!(
            Config::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "rust_resource_system_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"CACHE_CAPACITY": "64"}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.cache.capacity, 64);

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            Config::from_json_file(&path),
            Err(ConfigError::Io(_))
        ));
    }
}
