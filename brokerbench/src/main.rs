#![cfg_attr(
    not(test),
    warn(clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful,
    telemetry::tracing,
};

use clap::Parser;

pub mod broker;
pub mod config;
pub mod metrics;
pub mod payload;
pub mod pool;
pub mod reporter;
pub mod runner;
pub mod utils;


use self::{
    config::{Driver, LoadConfig},
    reporter::{HumanReporter, JsonlReporter, Reporter},
    runner::RunSettings,
};

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Synthetic load generator for the write path of a message broker.
#[derive(Debug, Clone, Parser)]
#[command(name = "brokerbench")]
#[command(bin_name = "brokerbench")]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub load: LoadConfig,

    /// report json lines instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// time between two status reports
    #[arg(long, value_name = "SECONDS", default_value_t = 5.)]
    pub interval: f64,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", default_value_t = 2.)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,
}

/// Upper bound to wait for blocking calls (e.g. a kafka metadata fetch)
/// still running once the bench itself has shut down.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(utils::telemetry::TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    })?;

    let result = block_on_runtime(async move {
        let base_shutdown_signal = graceful::default_signal();
        run_with_args(base_shutdown_signal, args).await
    })?;
    if let Err(err) = result {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Run `fut` to completion on a fresh multi-threaded runtime.
///
/// Unlike dropping the runtime, blocking tasks that are still running
/// afterwards are abandoned after [`RUNTIME_SHUTDOWN_TIMEOUT`].
fn block_on_runtime<F: Future>(fut: F) -> Result<F::Output, BoxError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let output = runtime.block_on(fut);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    Ok(output)
}

/// Generate load with the given args until shutdown or a fatal error.
async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let settings = run_settings(&args)?;
    args.load.driver.ensure_available()?;
    let config = Arc::new(args.load);

    println!(
        "\n::: brokerbench :::\nStarting {} workers\nMessage size {} bytes\n",
        config.workers, config.size,
    );
    tracing::info!(
        brokers = %config.brokers,
        topic = %config.topic,
        size = %config.size,
        workers = %config.workers,
        lanes = config.lane_count(),
        noop = config.noop,
        driver = ?config.driver,
        "load config ready",
    );

    let reporter: Box<dyn Reporter> = if args.json {
        Box::new(JsonlReporter::new(config.topic.clone()))
    } else {
        Box::new(HumanReporter::new(config.topic.clone()))
    };

    match config.driver {
        Driver::Tcp => {
            runner::run_bench(
                base_shutdown_signal,
                config,
                broker::TcpBroker::new(),
                reporter,
                settings,
            )
            .await
        }
        #[cfg(feature = "kafka")]
        Driver::Kafka => {
            runner::run_bench(
                base_shutdown_signal,
                config,
                broker::KafkaBroker::new(),
                reporter,
                settings,
            )
            .await
        }
        #[cfg(not(feature = "kafka"))]
        Driver::Kafka => Driver::Kafka.ensure_available(),
    }
}

fn run_settings(args: &Args) -> Result<RunSettings, BoxError> {
    let report_interval = Duration::try_from_secs_f64(args.interval)
        .context("parse report interval")
        .with_context_debug_field("seconds", || args.interval)?;
    if report_interval.is_zero() {
        return Err(BoxError::from("report interval has to be positive"));
    }

    let graceful_timeout = (args.graceful > 0.)
        .then(|| Duration::try_from_secs_f64(args.graceful))
        .transpose()
        .context("parse graceful shutdown timeout")?;

    Ok(RunSettings {
        report_interval,
        graceful_timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("brokerbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn default_run_settings() {
        let settings = run_settings(&parse(&[])).unwrap();
        assert_eq!(settings.report_interval, Duration::from_secs(5));
        assert_eq!(settings.graceful_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_run_settings() {
        for (args, expected) in [
            (
                &["--interval", "0.25"][..],
                Some((Duration::from_millis(250), Some(Duration::from_secs(2)))),
            ),
            (
                &["--graceful", "0"][..],
                Some((Duration::from_secs(5), None)),
            ),
            (
                &["--graceful=-1"][..],
                Some((Duration::from_secs(5), None)),
            ),
            (
                &["--graceful", "0.5"][..],
                Some((Duration::from_secs(5), Some(Duration::from_millis(500)))),
            ),
            (&["--interval", "0"][..], None),
            (&["--interval=-1"][..], None),
            (&["--graceful", "inf"][..], None),
        ] {
            let result = run_settings(&parse(args));
            match (result, expected) {
                (Ok(settings), Some((interval, graceful))) => {
                    assert_eq!(settings.report_interval, interval, "args: {args:?}");
                    assert_eq!(settings.graceful_timeout, graceful, "args: {args:?}");
                }
                (Err(_), None) => (),
                (result, expected) => panic!(
                    "args = {args:?}, unexpected result '{result:?}', expected: '{expected:?}'"
                ),
            }
        }
    }

    #[test]
    fn runtime_shutdown_abandons_blocking_tasks() {
        let start = std::time::Instant::now();
        let output = block_on_runtime(async {
            let _blocking =
                tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(10)));
            tokio::task::yield_now().await;
            42
        })
        .unwrap();

        assert_eq!(output, 42);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn output_flags() {
        let args = parse(&["--json", "-v", "--pretty", "-o", "bench.log", "--topic", "t"]);
        assert!(args.json);
        assert!(args.verbose);
        assert!(args.pretty);
        assert_eq!(args.output.as_deref(), Some(std::path::Path::new("bench.log")));
        assert_eq!(args.load.topic, "t");
    }
}
