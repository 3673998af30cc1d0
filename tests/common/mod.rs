//! Mock sessions shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rust_resource_system::{Connector, SessionHandle};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("mock session: {0}")]
pub struct MockError(pub &'static str);

/// State shared by a pooled session and all of its copies
#[derive(Debug, Default)]
pub struct SessionProbe {
    pub unhealthy: AtomicBool,
    pub closes: AtomicUsize,
    pub checks: AtomicUsize,
}

#[derive(Debug)]
pub struct MockSession {
    pub id: u32,
    pub probe: Arc<SessionProbe>,
}

#[async_trait]
impl SessionHandle for MockSession {
    type Error = MockError;

    async fn health(&self) -> Result<(), MockError> {
        self.probe.checks.fetch_add(1, Ordering::SeqCst);
        if self.probe.unhealthy.load(Ordering::SeqCst) {
            Err(MockError("ping failed"))
        } else {
            Ok(())
        }
    }

    async fn close(&self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn copy(&self) -> Self {
        Self {
            id: self.id,
            probe: Arc::clone(&self.probe),
        }
    }
}

/// Connector handing out numbered sessions starting at 1
#[derive(Default)]
pub struct MockConnector {
    next_id: AtomicU32,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    pub endpoints: parking_lot::Mutex<Vec<String>>,
    probes: parking_lot::Mutex<Vec<Arc<SessionProbe>>>,
}

impl MockConnector {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn created(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn probe(&self, id: u32) -> Arc<SessionProbe> {
        Arc::clone(&self.probes.lock()[(id - 1) as usize])
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, endpoint: &str) -> Result<MockSession, MockError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.endpoints.lock().push(endpoint.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(MockError("connection refused"));
        }

        let mut probes = self.probes.lock();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let probe = Arc::new(SessionProbe::default());
        probes.push(Arc::clone(&probe));
        Ok(MockSession { id, probe })
    }
}

/// Connector shared by reference so a test can inspect it after handing it to a pool
pub struct SharedConnector(pub Arc<MockConnector>);

#[async_trait]
impl Connector for SharedConnector {
    type Session = MockSession;

    async fn connect(&self, endpoint: &str) -> Result<MockSession, MockError> {
        self.0.connect(endpoint).await
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}
