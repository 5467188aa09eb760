// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cb - Credential Broker CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cb_engine::UnbindOutcome;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "cb",
    version,
    about = "Credential Broker - per-tenant database logins on demand"
)]
struct Cli {
    /// Daemon socket (defaults to $CB_SOCKET_PATH or the state directory)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reserve a tenant and create its database
    Create { tenant: String },
    /// Get connection settings for a consumer of a tenant
    Bind {
        tenant: String,
        consumer: String,
        /// Print a JSON object instead of KEY=value lines
        #[arg(long)]
        json: bool,
    },
    /// Release a consumer's claim on a tenant
    Unbind { tenant: String, consumer: String },
    /// Tear a tenant down, dropping its database and login
    Remove { tenant: String },
    /// Check the engine and show broker state
    Status { tenant: Option<String> },
    /// Check that the daemon is answering
    Ping,
    /// Stop the daemon
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let socket = match cli.socket {
        Some(path) => path,
        None => cb_daemon::config::socket_path_from_env()?,
    };
    let client = DaemonClient::connect(socket)?;

    match cli.command {
        Commands::Create { tenant } => {
            client.create(&tenant).await?;
            println!("Created {}", tenant);
        }

        Commands::Bind {
            tenant,
            consumer,
            json,
        } => {
            let env = client.bind(&tenant, &consumer).await?;
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };
            output::print_env(&env, format);
        }

        Commands::Unbind { tenant, consumer } => match client.unbind(&tenant, &consumer).await? {
            UnbindOutcome::Released { remaining } => {
                println!("Unbound {} from {} ({} remaining)", consumer, tenant, remaining);
            }
            UnbindOutcome::Revoked => {
                println!("Unbound {} from {} (login revoked)", consumer, tenant);
            }
            UnbindOutcome::RevokeFailed { error } => {
                println!("Unbound {} from {}", consumer, tenant);
                eprintln!("warning: login revocation failed, queued for retry: {}", error);
            }
        },

        Commands::Remove { tenant } => {
            let purged = client.remove(&tenant).await?;
            println!("Removed {} ({} records purged)", tenant, purged);
        }

        Commands::Status { tenant } => {
            let (uptime_secs, report) = client.status(tenant.as_deref()).await?;
            output::print_status(uptime_secs, &report);
        }

        Commands::Ping => {
            let version = client.hello().await?;
            client.ping().await?;
            println!("cbd {} is running", version);
        }

        Commands::Shutdown => {
            client.shutdown().await?;
            println!("Daemon stopping");
        }
    }

    Ok(())
}
