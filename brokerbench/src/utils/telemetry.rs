use std::{io::IsTerminal as _, path::Path};

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing::{
        self,
        metadata::LevelFilter,
        subscriber::{EnvFilter, fmt::writer::BoxMakeWriter},
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryConfig<'a> {
    pub verbose: bool,
    pub pretty: bool,
    /// log file to append to, stderr if none
    pub output: Option<&'a Path>,
}

/// Set up structured logging for the diagnostics of the harness.
///
/// Status lines are printed to stdout and never go through the subscriber.
/// `RUST_LOG` takes precedence over the default level
/// (INFO, or DEBUG when verbose).
pub fn init_tracing(cfg: TelemetryConfig<'_>) -> Result<(), BoxError> {
    let subscriber = tracing::subscriber::fmt()
        .with_ansi(cfg.output.is_none() && std::io::stderr().is_terminal())
        .with_thread_names(cfg.verbose)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level(cfg.verbose).into())
                .from_env_lossy(),
        )
        .with_writer(log_writer(cfg.output)?);

    if cfg.pretty {
        subscriber.pretty().try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::debug!(output = ?cfg.output, "tracing is set up");
    Ok(())
}

fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

fn log_writer(output: Option<&Path>) -> Result<BoxMakeWriter, BoxError> {
    let Some(path) = output else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };

    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .context("open log file")
        .with_context_debug_field("path", || path.to_path_buf())?;
    Ok(BoxMakeWriter::new(file))
}
