//! Worker pool: client groups, each fanning one connection out to its send lanes.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rama::{
    error::BoxError,
    graceful::Shutdown,
    telemetry::tracing::{self, Instrument as _},
};
use tokio::sync::mpsc;

use crate::{broker::Broker, config::LoadConfig, metrics::Metrics};

mod group;
mod worker;

use self::group::ClientGroup;

/// Upper bound for a client group to wait on its lanes
/// after shutdown, before it aborts them and closes the connection.
const LANE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared by every client group of a pool.
struct PoolContext<B> {
    broker: B,
    config: Arc<LoadConfig>,
    metrics: Arc<Metrics>,
    live_lanes: LiveLanes,
}

/// Creates and supervises the configured amount of client groups.
pub struct WorkerPool<B> {
    ctx: Arc<PoolContext<B>>,
}

impl<B: Broker> WorkerPool<B> {
    pub fn new(broker: B, config: Arc<LoadConfig>, metrics: Arc<Metrics>) -> Self {
        Self {
            ctx: Arc::new(PoolContext {
                broker,
                config,
                metrics,
                live_lanes: LiveLanes::default(),
            }),
        }
    }

    /// Handle to the amount of send lanes currently running.
    pub fn live_lanes(&self) -> LiveLanes {
        self.ctx.live_lanes.clone()
    }

    /// Spawn all client groups as graceful tasks.
    ///
    /// A group that fails to connect reports its error over `error_tx`.
    pub fn spawn(&self, graceful: &Shutdown, error_tx: mpsc::Sender<BoxError>) {
        let groups = self.ctx.config.workers.get();
        tracing::debug!(%groups, "spawning client groups");

        for ordinal in 1..=groups {
            let group = ClientGroup::new(ordinal, self.ctx.clone());
            let error_tx = error_tx.clone();
            let span = tracing::debug_span!("client_group", %ordinal);
            graceful.spawn_task_fn(move |guard| group.serve(guard, error_tx).instrument(span));
        }
    }
}

/// Counter of running send lanes.
#[derive(Debug, Clone, Default)]
pub struct LiveLanes(Arc<AtomicUsize>);

impl LiveLanes {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn enter(&self) -> LaneTicket {
        self.0.fetch_add(1, Ordering::AcqRel);
        LaneTicket(self.0.clone())
    }
}

/// Held by a running lane, releases its slot in [`LiveLanes`] on drop.
#[derive(Debug)]
struct LaneTicket(Arc<AtomicUsize>);

impl Drop for LaneTicket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
