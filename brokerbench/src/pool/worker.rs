use std::sync::Arc;

use rama::{graceful::ShutdownGuard, telemetry::tracing};
use tokio::time::Instant;

use super::LaneTicket;
use crate::{broker::Connection, config::LoadConfig, metrics::Metrics, payload::PayloadGenerator};

/// A single send lane.
///
/// Loops until shutdown, checking for it in between two messages.
/// A send that is in flight is always allowed to complete.
pub(super) struct SendWorker<C> {
    pub(super) client_id: String,
    pub(super) lane: usize,
    pub(super) conn: Arc<C>,
    pub(super) config: Arc<LoadConfig>,
    pub(super) metrics: Arc<Metrics>,
    pub(super) generator: PayloadGenerator,
    pub(super) _ticket: LaneTicket,
}

impl<C: Connection> SendWorker<C> {
    pub(super) async fn run(mut self, guard: ShutdownGuard) {
        tracing::trace!(client_id = %self.client_id, lane = self.lane, "send lane started");

        let mut cancelled = std::pin::pin!(guard.cancelled());
        loop {
            tokio::select! {
                biased;
                _ = cancelled.as_mut() => break,
                _ = std::future::ready(()) => (),
            }

            if self.config.noop {
                self.generate_only().await;
            } else {
                self.send_one().await;
            }
        }

        tracing::trace!(client_id = %self.client_id, lane = self.lane, "send lane stopped");
    }

    async fn generate_only(&mut self) {
        std::hint::black_box(self.generator.next_payload());
        self.metrics.record_success(None);
        // the only yield point in dry-run mode, once the task budget is spent
        tokio::task::consume_budget().await;
    }

    async fn send_one(&mut self) {
        let payload = self.generator.next_payload();
        let start = Instant::now();
        match self.conn.send(&self.config.topic, payload).await {
            Ok(()) => self.metrics.record_success(Some(start.elapsed())),
            Err(err) => {
                self.metrics.record_failure();
                tracing::error!(
                    client_id = %self.client_id,
                    lane = self.lane,
                    "send failed: {err}",
                );
            }
        }
    }
}
