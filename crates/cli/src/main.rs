//! dirwatch CLI - report directory changes as they happen

use anyhow::{Context, Result};
use clap::Parser;
use cli_lib::output::OutputFormat;
use cli_lib::settings::{self, Overrides};
use dirwatch_core::WatchConfig;
use std::path::PathBuf;

/// dirwatch - watch directories through ReadDirectoryChangesW
#[derive(Parser)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directories to watch
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// TOML file with watch settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to sleep between polls
    #[arg(short, long)]
    latency: Option<f64>,

    /// Notification buffer capacity in records
    #[arg(long)]
    buffer_records: Option<usize>,

    /// Watch only the top level of each directory
    #[arg(long)]
    no_recursive: bool,

    /// Gitignore-style pattern for paths to drop (repeatable)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = cli_lib::logging::init(cli.verbose, cli.log_file.as_deref())?;

    let overrides = Overrides {
        latency: cli.latency,
        buffer_records: cli.buffer_records,
        no_recursive: cli.no_recursive,
        exclude: cli.exclude,
    };
    let config = settings::load_config(cli.config.as_deref(), &overrides)?;

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let paths = settings::resolve_paths(&cli.paths, &cwd)?;

    watch(paths, config, cli.format).await
}

#[cfg(windows)]
async fn watch(paths: Vec<PathBuf>, config: WatchConfig, format: OutputFormat) -> Result<()> {
    use cli_lib::output::EventPrinter;
    use tracing::info;
    use watcher::{Win32Api, WindowsMonitor};

    let printer = EventPrinter::stdout(format);
    let mut monitor = WindowsMonitor::new(Win32Api, &paths, printer, config)
        .context("Failed to set up watch")?;
    let shutdown = monitor.shutdown_handle();

    let worker = tokio::task::spawn_blocking(move || monitor.run());

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping watch");
            shutdown.shutdown();
        }
    });

    let result = worker.await.context("Watch thread panicked")?;
    interrupt.abort();

    result.context("Watch failed")
}

#[cfg(not(windows))]
async fn watch(paths: Vec<PathBuf>, _config: WatchConfig, _format: OutputFormat) -> Result<()> {
    anyhow::bail!(
        "dirwatch uses ReadDirectoryChangesW and only runs on Windows ({} path(s) requested)",
        paths.len()
    )
}
