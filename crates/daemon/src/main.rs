// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential Broker Daemon (cbd)
//!
//! Background process that owns the record store and the engine connection
//! and serves bind requests over a Unix socket.

use std::path::PathBuf;

use cb_daemon::config::Config;
use cb_daemon::lifecycle::{self, LifecycleError};
use cb_daemon::server::{self, ServerContext};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let config_path = parse_config_arg(std::env::args().skip(1))?;

    // Load configuration
    let config = Config::load(config_path.as_deref())?;

    // Write startup marker to log (before tracing setup, so operators can find it)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting cbd with state in {}", config.state_dir.display());

    // Start daemon
    let mut daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

    let ctx = ServerContext {
        broker: daemon.broker.clone(),
        start_time: daemon.start_time,
        shutdown: shutdown_tx,
    };

    info!(
        "Daemon ready, listening on {}",
        config.socket_path.display()
    );

    // Signal ready for parent process (e.g., systemd, test harness)
    println!("READY");

    let mut maintenance = tokio::time::interval(config.maintenance.sweep_interval);
    // Skip initial immediate tick
    maintenance.tick().await;

    let mut connections = JoinSet::new();

    let reason = loop {
        tokio::select! {
            result = daemon.listener.accept() => match result {
                // One task per connection so tenants never queue behind each other
                Ok((stream, _)) => {
                    let ctx = ctx.clone();
                    connections.spawn(async move {
                        if let Err(e) = server::handle_connection(ctx, stream).await {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => error!("Error accepting connection: {}", e),
            },

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!("connection task failed: {}", e);
                }
            }

            _ = maintenance.tick() => {
                daemon.spawn_maintenance();
            }

            Some(()) = shutdown_rx.recv() => break "shutdown request",
            _ = sigterm.recv() => break "SIGTERM",
            _ = sigint.recv() => break "SIGINT",
        }
    };

    info!(reason, "stopping");
    lifecycle::drain_connections(&mut connections).await;
    daemon.shutdown().await?;

    info!("Daemon stopped");
    Ok(())
}

/// Accepts `--config <path>` / `--config=<path>`; anything else is an error
fn parse_config_arg(args: impl Iterator<Item = String>) -> Result<Option<PathBuf>, String> {
    let mut args = args;
    let mut config = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().ok_or("--config requires a path")?;
            config = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config = Some(PathBuf::from(path));
        } else {
            return Err(format!("unexpected argument: {arg}"));
        }
    }
    Ok(config)
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- cbd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- cbd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    // Create log directory if needed
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Set up file appender
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
