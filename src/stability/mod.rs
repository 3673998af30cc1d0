//! Lifecycle primitives for background tasks

pub mod shutdown;

pub use shutdown::ShutdownSignal;
