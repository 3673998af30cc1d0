//! Error types for the resource system

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache and configuration operations
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Cache errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The cache already holds `capacity` entries and the key is new
    #[error("Cache capacity exceeded: {capacity} entries stored")]
    CapacityExceeded {
        /// Configured maximum number of entries
        capacity: usize,
    },
}

/// Resource creation errors returned by the pool
#[derive(Debug, Error)]
pub enum ConnectError<E: std::error::Error + 'static> {
    /// The connector reported a failure
    #[error("Failed to create session: {0}")]
    Failed(#[source] E),

    /// The connector did not answer within the configured timeout
    #[error("Session creation timed out after {0:?}")]
    TimedOut(Duration),
}

impl<E: std::error::Error + 'static> ConnectError<E> {
    /// Check whether the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    /// Config file is not a flat JSON string map
    #[error("Config file is not parseable: {0}")]
    Parse(#[from] serde_json::Error),

    /// A numeric key holds something that is not a number
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Configuration key
        key: String,
        /// Raw value
        value: String,
    },

    /// A value is syntactically valid but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Crate-level error for the synchronous surfaces
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}
