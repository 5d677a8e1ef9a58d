use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use rama::error::BoxError;

use super::{Broker, Connection};

/// In-memory broker with scripted behaviour.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockBroker {
    pub(crate) fail_connect: bool,
    pub(crate) fail_close: bool,
    /// fail every n-th send (counted across all connections)
    pub(crate) fail_every: Option<u64>,
    pub(crate) latency: Duration,
    pub(crate) stats: Arc<MockStats>,
}

#[derive(Debug, Default)]
pub(crate) struct MockStats {
    pub(crate) connects: AtomicUsize,
    pub(crate) sends: AtomicU64,
    pub(crate) closes: AtomicUsize,
}

impl MockStats {
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn sends(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockConnection {
    fail_every: Option<u64>,
    fail_close: bool,
    latency: Duration,
    stats: Arc<MockStats>,
    closed: AtomicBool,
}

impl Broker for MockBroker {
    type Connection = MockConnection;

    async fn connect(
        &self,
        client_id: &str,
        _addresses: &[String],
    ) -> Result<Self::Connection, BoxError> {
        if self.fail_connect {
            return Err(BoxError::from(format!("{client_id}: mock connection refused")));
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            fail_every: self.fail_every,
            fail_close: self.fail_close,
            latency: self.latency,
            stats: self.stats.clone(),
            closed: AtomicBool::new(false),
        })
    }
}

impl Connection for MockConnection {
    async fn send(&self, _topic: &str, _payload: &[u8]) -> Result<(), BoxError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BoxError::from("mock connection closed"));
        }
        let n = self.stats.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        } else {
            tokio::task::yield_now().await;
        }
        match self.fail_every {
            Some(every) if n % every == 0 => Err(BoxError::from("mock send failure")),
            _ => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), BoxError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BoxError::from("mock connection closed twice"));
        }
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(BoxError::from("mock close failure"));
        }
        Ok(())
    }
}
