use std::sync::Arc;

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    telemetry::tracing::{self, Instrument as _},
};
use tokio::{sync::mpsc, task::JoinSet};

use super::{LANE_DRAIN_TIMEOUT, PoolContext, worker::SendWorker};
use crate::{
    broker::{Broker, Connection as _},
    config::LANES_PER_GROUP,
    payload::PayloadGenerator,
};

/// One broker connection and the lanes publishing over it.
pub(super) struct ClientGroup<B> {
    client_id: String,
    ctx: Arc<PoolContext<B>>,
}

impl<B: Broker> ClientGroup<B> {
    pub(super) fn new(ordinal: usize, ctx: Arc<PoolContext<B>>) -> Self {
        Self {
            client_id: format!("client_{ordinal}"),
            ctx,
        }
    }

    pub(super) async fn serve(self, guard: ShutdownGuard, error_tx: mpsc::Sender<BoxError>) {
        let client_id = self.client_id.clone();
        if let Err(err) = self.run(guard).await {
            tracing::error!(%client_id, "client group exited with an error: {err}");
            let _ = error_tx.send(err).await;
        }
    }

    async fn run(self, guard: ShutdownGuard) -> Result<(), BoxError> {
        let Self { client_id, ctx } = self;

        let conn = tokio::select! {
            biased;

            _ = guard.cancelled() => {
                tracing::debug!(%client_id, "shutdown initiated prior to connecting: exit client group");
                return Ok(());
            }

            result = ctx.broker.connect(&client_id, ctx.config.brokers.as_slice()) => {
                result
                    .context("establish broker connection")
                    .context_str_field("client", client_id.as_str())?
            }
        };
        let conn = Arc::new(conn);
        tracing::info!("{client_id} connected");

        let mut lanes = JoinSet::new();
        for lane in 0..LANES_PER_GROUP {
            let worker = SendWorker {
                client_id: client_id.clone(),
                lane,
                conn: conn.clone(),
                config: ctx.config.clone(),
                metrics: ctx.metrics.clone(),
                generator: PayloadGenerator::new(ctx.config.size.get()),
                _ticket: ctx.live_lanes.enter(),
            };
            lanes.spawn(worker.run(guard.clone()).in_current_span());
        }

        guard.cancelled().await;
        tracing::info!("{client_id} shutting down");

        let drained = tokio::time::timeout(LANE_DRAIN_TIMEOUT, async {
            while let Some(result) = lanes.join_next().await {
                if let Err(err) = result {
                    tracing::error!(%client_id, "send lane failed: {err}");
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                %client_id,
                remaining = lanes.len(),
                "send lanes did not stop in time: abort them",
            );
            lanes.shutdown().await;
        }

        if let Err(err) = conn.close().await {
            tracing::warn!(%client_id, "failed to close broker connection: {err}");
        }
        Ok(())
    }
}
