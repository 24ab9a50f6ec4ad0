//! Multi-device camera acquisition - Main Entry Point
//!
//! Enumerates all devices on the selected backend, runs the color preview
//! graph on each of them and logs received frames until a limit is reached
//! or Ctrl+C is pressed.

use anyhow::Context;
use clap::Parser;
use multicam_rs::{
    backend::{create_backend, BackendKind, Orchestrator},
    config::{default_config_path, AppConfig, DropPolicy, LoggingConfig},
    consumer::{LimitConsumer, LoggingConsumer},
    MulticamError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run a color preview pipeline on every connected camera
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use N synthetic devices (implies --backend mock)
    #[arg(long, value_name = "N")]
    mock: Option<usize>,

    /// Device backend: mock or v4l2
    #[arg(short, long, default_value = "mock")]
    backend: BackendKind,

    /// Frame channel capacity per stream
    #[arg(long)]
    capacity: Option<usize>,

    /// Policy when a channel is full: drop-oldest or drop-newest
    #[arg(long)]
    drop_policy: Option<DropPolicy>,

    /// Stop after this many frames in total
    #[arg(long)]
    max_frames: Option<u64>,

    /// Stop on the first frame with a sequence marker at least this large
    #[arg(long)]
    stop_at_sequence: Option<u64>,

    /// Log filter directive, e.g. "debug" or "info,multicam_rs=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_default(),
    };

    if let Some(devices) = args.mock {
        config.mock.devices = devices;
    }
    if let Some(capacity) = args.capacity {
        config.channel.capacity = capacity;
    }
    if let Some(policy) = args.drop_policy {
        config.channel.drop_policy = policy;
    }
    if let Some(filter) = &args.log_level {
        config.logging.filter = filter.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.filter)
            .with_context(|| format!("Invalid log filter {:?}", logging.filter))?,
    };

    let (file_layer, guard) = match &logging.file {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "multicam.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config.logging)?;

    let backend_kind = if args.mock.is_some() {
        BackendKind::Mock
    } else {
        args.backend
    };

    tracing::info!(
        backend = %backend_kind,
        config = ?args.config.clone().or_else(default_config_path),
        capacity = config.channel.capacity,
        drop_policy = %config.channel.drop_policy,
        "Starting multicam"
    );

    let mut consumer = LimitConsumer::new(LoggingConsumer::default());
    if let Some(max) = args.max_frames {
        consumer = consumer.with_max_frames(max);
    }
    if let Some(sequence) = args.stop_at_sequence {
        consumer = consumer.with_stop_at_sequence(sequence);
    }

    let backend = create_backend(backend_kind, &config)?;
    let orchestrator = Orchestrator::new(config, backend, Arc::new(consumer));

    let stop = orchestrator.stop_flag();
    ctrlc::set_handler(move || {
        stop.raise();
    })
    .context("Failed to install Ctrl+C handler")?;

    let summary = match orchestrator.run() {
        Ok(summary) => summary,
        Err(MulticamError::NoDeviceFound) => {
            tracing::error!("No devices found");
            anyhow::bail!("no devices found on the {} backend", backend_kind);
        }
        Err(e) => return Err(e.into()),
    };

    for worker in summary.failed() {
        tracing::warn!(device = %worker.device, exit = ?worker.exit, "Device failed");
    }

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    tracing::info!(
        devices = summary.workers.len(),
        frames = summary.total_frames(),
        "Shutting down"
    );
    Ok(())
}
