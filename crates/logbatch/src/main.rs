//! Logbatch - batch stdin lines into rotating log files
//!
//! # Usage
//!
//! ```bash
//! # Defaults: ./logs/logbatch-*.log, batches of 32, 1s idle flush
//! my-service | logbatch
//!
//! # Config file with CLI overrides
//! my-service | logbatch --config configs/logbatch.toml --category my-service --level warn
//! ```
//!
//! Each stdin line becomes one record. On EOF, Ctrl-C or SIGTERM the pipeline
//! drains and the final metrics are reported on stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use logbatch_config::{Config, FileSettings, LogFormat};
use logbatch_pipeline::{BatchingPipeline, Level};
use logbatch_sinks::{FileSink, FileSinkConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logbatch - batch stdin lines into rotating log files
#[derive(Parser, Debug)]
#[command(name = "logbatch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Diagnostic log level (overrides [log] level)
    #[arg(long)]
    log_level: Option<String>,

    /// Category recorded for every line
    #[arg(long, default_value = "stdin")]
    category: String,

    /// Severity recorded for every line
    #[arg(long, default_value = "info")]
    level: Level,

    /// Log directory (overrides [file] directory)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// File name prefix (overrides [file] file_name_root)
    #[arg(long)]
    file_name_root: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.as_str().to_string());
    init_logging(&log_level, config.log.format)?;

    run(cli, config).await
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let pipeline_config = config.pipeline.to_pipeline_config()?;
    let file_config = file_sink_config(
        &config.file,
        cli.directory.as_deref(),
        cli.file_name_root.as_deref(),
    )?;

    info!(
        directory = %file_config.directory.display(),
        file_name_root = %file_config.file_name_root,
        max_batch_size = pipeline_config.max_batch_size,
        max_queue_size = pipeline_config.max_queue_size,
        enabled = pipeline_config.enabled,
        "starting logbatch"
    );

    let sink = FileSink::new(file_config).context("invalid file sink configuration")?;
    let pipeline =
        BatchingPipeline::start(pipeline_config, sink).context("failed to start pipeline")?;
    let logger = pipeline.logger(cli.category.as_str());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => logger.log(cli.level, 0, line).await,
                Ok(None) => {
                    info!("end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin, stopping");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("shutdown signal received, draining");
                break;
            }
        }
    }

    pipeline.shutdown().await;

    let metrics = pipeline.metrics();
    info!(
        records_enqueued = metrics.records_enqueued,
        records_written = metrics.records_written,
        records_dropped = metrics.records_dropped,
        batches_written = metrics.batches_written,
        write_errors = metrics.write_errors,
        avg_batch_size = metrics.avg_batch_size().unwrap_or(0.0),
        "logbatch stopped"
    );
    Ok(())
}

/// Config file if given, defaults otherwise
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// `[file]` settings with the CLI overrides applied
fn file_sink_config(
    settings: &FileSettings,
    directory: Option<&Path>,
    file_name_root: Option<&str>,
) -> Result<FileSinkConfig> {
    let settings = FileSettings {
        directory: directory.map_or_else(|| settings.directory.clone(), Path::to_path_buf),
        file_name_root: file_name_root.map_or_else(|| settings.file_name_root.clone(), str::to_string),
        ..settings.clone()
    };
    Ok(settings.to_file_sink_config()?)
}

/// Initialize the tracing subscriber; diagnostics go to stderr
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
