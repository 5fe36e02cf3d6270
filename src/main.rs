//! Keel editor shell.
//!
//! Exit codes: `0` normal, `1` error, `2` killed, `3` linked exit,
//! `4` startup failure.

use anyhow::{Context as _, Result};
use clap::Parser;
use keel::app::Editor;
use keel::event::{InputSource, TickerSource};
use keel::terminal::TerminalSession;
use keel::{Config, ExitStatus, Runtime, RuntimeConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

/// Startup failed before the editor ran.
const EXIT_STARTUP: u8 = 4;

/// Keel - actor-based terminal editor shell
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/keel/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Keymap mode to start in
    #[arg(short, long)]
    mode: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(status) => ExitCode::from(u8::try_from(status.code()).unwrap_or(1)),
        Err(e) => {
            error!("startup failed: {e:#}");
            eprintln!("keel: {e:#}");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

fn run(args: Args) -> Result<ExitStatus> {
    let mut config = Config::discover(args.config.as_deref()).context("loading configuration")?;
    if let Some(workers) = args.workers {
        config.workers = Some(workers.max(1));
    }
    if let Some(path) = args.log_file {
        config.log_file = Some(path);
    }
    if let Some(mode) = args.mode {
        config.initial_mode = mode;
    }

    let _log = keel::logging::init(&config.log_level, config.log_file.as_deref())
        .context("initializing logging")?;
    info!("Keel v{} starting up", env!("CARGO_PKG_VERSION"));

    let mut runtime_config = RuntimeConfig::default();
    if let Some(workers) = config.workers {
        runtime_config.workers = workers;
    }
    let runtime = Runtime::with_config(runtime_config).context("starting runtime")?;

    let session = TerminalSession::enter().context("entering raw mode")?;
    let launched = Editor::launch(&runtime.handle(), &config, session.size(), std::io::stdout())
        .context("launching editor")?;
    let input = InputSource::spawn(launched.hub.clone(), Duration::from_millis(50))
        .context("starting input source")?;
    let ticker = TickerSource::spawn(launched.hub, Duration::from_secs(1))
        .context("starting ticker")?;

    let status = runtime.wait();
    input.join();
    ticker.join();
    drop(session);
    info!(code = status.code(), reason = %status.reason(), "keel exiting");
    Ok(status)
}
