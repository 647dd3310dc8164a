//! CLI entry point for the srcmirror tool.
//!
//! Watches a source tree and mirrors every changed file matching one of the
//! filter patterns into `<out dir>/<parent dir name>/<file name>`.
//!
//! # Usage
//!
//! ```bash
//! srcmirror [OPTIONS] [PATTERNS]...
//!
//! # Watch the default patterns (*.vb, *.cs, *.dll) next to the executable
//! srcmirror
//!
//! # Watch C# and VB sources of a project into a custom folder
//! srcmirror --watch-dir ~/src/App --out-dir ~/mirror '*.cs' '*.vb'
//!
//! # Load settings from a JSON file, overriding the output folder
//! srcmirror --config srcmirror.json --out-dir /tmp/mirror
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::{BufRead, Write};
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use sm_core::{ConfigInput, WatchConfig};
use sm_watcher::{ActionLogger, ConsoleLogger, WatchSupervisor, WatcherSummary};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Line that stops watching when typed on stdin.
const STOP_COMMAND: &str = "x";

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Mirrors changed source files into a flat per-folder copy tree.
///
/// Every pattern gets its own recursive watcher. Created, renamed and deleted
/// files are only reported; changed files are copied.
#[derive(Parser)]
#[command(name = "srcmirror", version, about, long_about = None)]
struct Cli {
    /// File-name patterns to watch (e.g. '*.cs'). Defaults to *.vb *.cs *.dll.
    patterns: Vec<String>,

    /// Directory tree to watch.
    ///
    /// Defaults to the directory containing the srcmirror executable.
    #[arg(short, long, env = "SRCMIRROR_WATCH_DIR")]
    watch_dir: Option<Utf8PathBuf>,

    /// Directory to mirror changed files into. Created if missing.
    ///
    /// Defaults to `<data dir>/srcmirror/CopiedSourceFiles`.
    #[arg(short, long, env = "SRCMIRROR_OUT_DIR")]
    out_dir: Option<Utf8PathBuf>,

    /// JSON configuration file. Command-line values take precedence.
    #[arg(short, long, env = "SRCMIRROR_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Capacity of each watcher's event queue.
    #[arg(long)]
    event_capacity: Option<usize>,

    /// Print per-pattern counters as JSON after stopping.
    #[arg(long)]
    summary: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

/// Why watching stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// The operator typed the stop command.
    Operator,
    /// Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Something else cancelled the token.
    Cancelled,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for diagnostics on stderr.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `warn` level by default so that
/// stdout carries only the action log.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`WatchConfig`] from the config file and CLI arguments.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or the resolved
/// directories are unusable.
fn build_config(cli: &Cli) -> color_eyre::Result<WatchConfig> {
    let base = match &cli.config {
        Some(path) => ConfigInput::from_json_file(path)
            .wrap_err_with(|| format!("Failed to load config file {path}"))?,
        None => ConfigInput::default(),
    };

    let input = base.merge(ConfigInput {
        watch_root: cli.watch_dir.clone(),
        out_root: cli.out_dir.clone(),
        filters: cli.patterns.clone(),
        event_capacity: cli.event_capacity,
    });

    WatchConfig::resolve(input).wrap_err("Invalid configuration")
}

// =============================================================================
// STOP CONTROL
// =============================================================================

/// Returns `true` if `line` asks to stop watching.
fn is_stop_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(STOP_COMMAND)
}

/// Forwards stdin lines from a dedicated thread.
///
/// The channel closes when stdin does.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);

    let spawned = std::thread::Builder::new()
        .name("srcmirror-stdin".to_owned())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });

    if let Err(error) = spawned {
        tracing::warn!(error = %error, "Failed to start stdin reader, use Ctrl-C to stop");
    }

    rx
}

#[cfg(unix)]
async fn terminate_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> std::io::Result<()> {
    std::future::pending().await
}

/// Blocks until the operator asks to stop.
async fn wait_for_stop(
    mut lines: mpsc::Receiver<String>,
    token: &CancellationToken,
) -> color_eyre::Result<StopReason> {
    let ctrl_c = tokio::signal::ctrl_c();
    let terminate = terminate_signal();
    tokio::pin!(ctrl_c, terminate);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = token.cancelled() => return Ok(StopReason::Cancelled),

            result = &mut ctrl_c => {
                result.wrap_err("Failed to listen for Ctrl-C")?;
                return Ok(StopReason::Interrupt);
            }

            result = &mut terminate => {
                result.wrap_err("Failed to listen for SIGTERM")?;
                return Ok(StopReason::Terminate);
            }

            line = lines.recv(), if stdin_open => match line {
                Some(line) if is_stop_command(&line) => return Ok(StopReason::Operator),
                Some(_) => {}
                None => {
                    tracing::debug!("stdin closed, waiting for a signal to stop");
                    stdin_open = false;
                }
            },
        }
    }
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Prints the startup banner.
fn print_banner(config: &WatchConfig) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    let _ = writeln!(handle, "srcmirror {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(handle, "Watch directory:  {}", config.watch_root);
    let _ = writeln!(handle, "Output directory: {}", config.out_root);
    let _ = writeln!(handle);
}

/// Prints how to stop.
fn print_stop_hint() {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle);
    let _ = writeln!(handle, "Type '{STOP_COMMAND}' and press Enter to stop watching.");
}

/// Prints the per-pattern counters as JSON.
fn print_summary(summaries: &[WatcherSummary]) -> color_eyre::Result<()> {
    let json = serde_json::to_string_pretty(summaries)
        .map_err(|e| eyre!("Failed to serialize summary: {}", e))?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}")?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Resolve configuration; failures here end the run before watching
    let config = Arc::new(build_config(&cli)?);
    print_banner(&config);

    // 5. Start one watcher per distinct pattern
    let logger: Arc<dyn ActionLogger> = Arc::new(ConsoleLogger::new());
    let handle = WatchSupervisor::start_all(Arc::clone(&config), logger);
    if !handle.is_watching() {
        handle.shutdown().await;
        return Err(eyre!(
            "No filter pattern could be watched under {}",
            config.watch_root
        ));
    }
    print_stop_hint();

    // 6. Block until the operator stops us, then release every watcher
    let stopped = wait_for_stop(spawn_stdin_reader(), &handle.cancellation_token()).await;
    if let Ok(reason) = &stopped {
        info!(?reason, "Stopping");
    }
    let summaries = handle.shutdown().await;
    stopped?;

    if cli.summary {
        print_summary(&summaries)?;
    }

    Ok(())
}
