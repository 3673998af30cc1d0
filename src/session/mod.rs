//! Remote-session capabilities consumed by the pool
//!
//! The pool never speaks a wire protocol itself. It manages values that
//! implement [`SessionHandle`] and obtains new ones from a [`Connector`].

use async_trait::async_trait;

/// Handle to a long-lived remote session
///
/// `copy` must produce an independent handle that can be used by one
/// borrower without disturbing other copies or the pooled original.
#[async_trait]
pub trait SessionHandle: Send + Sync + Sized + 'static {
    /// Error reported by liveness probes and connection attempts
    type Error: std::error::Error + Send + Sync + 'static;

    /// Liveness probe (e.g. a ping round trip)
    async fn health(&self) -> Result<(), Self::Error>;

    /// Close the underlying session
    async fn close(&self);

    /// Independent handle sharing the underlying session
    fn copy(&self) -> Self;
}

/// Error type of the sessions a connector produces
pub type SessionError<C> = <<C as Connector>::Session as SessionHandle>::Error;

/// Creates new remote sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Session type produced
    type Session: SessionHandle;

    /// Establish a session with `endpoint`
    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<Self::Session, <Self::Session as SessionHandle>::Error>;
}
