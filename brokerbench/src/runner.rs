use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use rama::{
    error::BoxError,
    graceful::{Shutdown, ShutdownGuard},
    telemetry::tracing,
};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    broker::Broker,
    config::{LANES_PER_GROUP, LoadConfig},
    metrics::Metrics,
    pool::WorkerPool,
    reporter::Reporter,
};

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub report_interval: Duration,
    /// `None` waits for every client group without a limit.
    pub graceful_timeout: Option<Duration>,
}

type FatalError = Arc<Mutex<Option<BoxError>>>;

/// Generate load against `broker` until the shutdown signal fires
/// or a client group fails fatally.
///
/// Used by the binary as well as by the e2e tests,
/// which drive it with their own signal and reporter.
pub async fn run_bench<B, F>(
    base_shutdown_signal: F,
    config: Arc<LoadConfig>,
    broker: B,
    reporter: Box<dyn Reporter>,
    settings: RunSettings,
) -> Result<(), BoxError>
where
    B: Broker,
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let metrics = Arc::new(Metrics::new());
    let fatal = FatalError::default();

    let (error_tx, error_rx) = mpsc::channel::<BoxError>(1);
    let graceful = Shutdown::new(new_shutdown_signal(
        error_rx,
        base_shutdown_signal,
        fatal.clone(),
    ));

    let pool = WorkerPool::new(broker, config.clone(), metrics.clone());
    pool.spawn(&graceful, error_tx);

    graceful.spawn_task_fn({
        let message_size = config.size.get();
        move |guard| {
            report_loop(
                guard,
                metrics,
                reporter,
                settings.report_interval,
                message_size,
            )
        }
    });

    let live_lanes = pool.live_lanes();
    match settings.graceful_timeout {
        Some(limit) => match graceful.shutdown_with_limit(limit).await {
            Ok(delay) => tracing::debug!("gracefully shutdown with a delay of: {delay:?}"),
            Err(err) => tracing::warn!(
                remaining_lanes = live_lanes.count(),
                "graceful shutdown did not complete within {limit:?}: {err}",
            ),
        },
        None => {
            let delay = graceful.shutdown().await;
            tracing::debug!("gracefully shutdown with a delay of: {delay:?}");
        }
    }

    match fatal.lock().take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn report_loop(
    guard: ShutdownGuard,
    metrics: Arc<Metrics>,
    mut reporter: Box<dyn Reporter>,
    interval: Duration,
    message_size: usize,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_report = Instant::now();

    loop {
        tokio::select! {
            biased;

            _ = guard.cancelled() => {
                tracing::debug!("exit report loop: guard shutdown");
                reporter.finish();
                return;
            }

            _ = ticker.tick() => {
                let now = Instant::now();
                let snapshot = metrics.snapshot_and_reset(
                    now.duration_since(last_report),
                    message_size,
                    LANES_PER_GROUP,
                );
                last_report = now;
                reporter.on_snapshot(&snapshot);
            }
        }
    }
}

fn new_shutdown_signal(
    error_rx: mpsc::Receiver<BoxError>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
    fatal: FatalError,
) -> impl Future + Send + 'static {
    async move {
        let mut error_rx = error_rx;
        let mut signal = Box::pin(base_shutdown_signal);

        tokio::select! {
            _ = signal.as_mut() => {
                tracing::debug!("default signal triggered: init graceful shutdown");
            }
            err = error_rx.recv() => {
                if let Some(err) = err {
                    tracing::error!("fatal err received: {err}; abort");
                    *fatal.lock() = Some(err);
                } else {
                    tracing::info!("wait for default signal, no error was received");
                    signal.await;
                    tracing::debug!("default signal triggered: init graceful shutdown");
                }
            }
        }
    }
}
