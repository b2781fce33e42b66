//! Drover satellite daemon (stlt).
//!
//! Usage:
//!   stlt [OPTIONS] [DATA_DIR]
//!
//! Runs the controller accept loop and the update stall watchdog until
//! SIGINT.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use drover_proto::defaults::{DEFAULT_DATA_DIR, DEFAULT_WATCHDOG_INTERVAL_MS};
use drover_stlt::config::{config_path, load_config};
use drover_stlt::connection::accept_loop;
use drover_stlt::watchdog::run_watchdog;
use drover_stlt::{StltState, UpdateSequencer};

/// Drover satellite daemon
#[derive(Parser, Debug)]
#[command(name = "stlt", version, about = "Drover satellite daemon")]
struct Args {
    /// Data directory
    #[arg(value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    dir: PathBuf,

    /// Config file (default: <DIR>/stlt.toml)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'b', long)]
    bind_addr: Option<String>,

    /// Listen port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Expected local node name
    #[arg(short = 'n', long)]
    node_name: Option<String>,

    /// Log level
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Seconds a missing update may stall the queue (0 disables the watchdog)
    #[arg(long)]
    stall_timeout: Option<u64>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let path = args.config.clone().unwrap_or_else(|| config_path(&args.dir));
    let loaded = load_config(&path).await;

    let mut config = loaded.clone().unwrap_or_default();
    config.data_dir = args.dir.clone();
    if let Some(addr) = args.bind_addr {
        config.listen_addr = addr;
    }
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(name) = args.node_name {
        config.node_name = Some(name);
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(secs) = args.stall_timeout {
        config.update_stall_timeout_secs = secs;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("stlt v{} starting", env!("CARGO_PKG_VERSION"));
    if let Err(e) = loaded {
        error!("failed to load config from {}: {}", path.display(), e);
        std::process::exit(1);
    }
    info!("data dir: {}", config.data_dir.display());

    let stall_timeout = Duration::from_secs(config.update_stall_timeout_secs);
    let stlt = Arc::new(StltState::with_defaults(config));
    let seq = Arc::new(UpdateSequencer::new(stlt.clone()));

    let mut accept_handle = tokio::spawn(accept_loop(stlt.clone(), seq.clone()));
    tokio::spawn(run_watchdog(
        seq.clone(),
        stall_timeout,
        Duration::from_millis(DEFAULT_WATCHDOG_INTERVAL_MS),
        stlt.shutdown_notify.clone(),
    ));

    let shutdown = stlt.shutdown_notify.clone();
    let listener_done = tokio::select! {
        _ = shutdown.notified() => {
            info!("shutdown signal received");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down");
            false
        }
        result = &mut accept_handle => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("controller listener failed: {}", e),
                Err(e) => error!("controller listener task failed: {}", e),
            }
            true
        }
    };

    info!("stlt shutting down");
    stlt.shutdown_notify.notify_waiters();
    if !listener_done {
        let _ = tokio::time::timeout(Duration::from_secs(5), accept_handle).await;
    }
    info!("stlt stopped");
}
