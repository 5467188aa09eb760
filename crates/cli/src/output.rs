// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::collections::BTreeMap;

use cb_engine::StatusReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print bind settings as `KEY=value` lines or a JSON object
pub fn print_env(env: &BTreeMap<String, String>, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for (key, value) in env {
                println!("{}={}", key, value);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(env) {
                println!("{}", json);
            }
        }
    }
}

pub fn print_status(uptime_secs: u64, report: &StatusReport) {
    println!("engine: ok");
    println!("uptime: {}s", uptime_secs);
    println!("bound tenants: {}", report.bound_tenants);
    println!("lock entries: {}", report.lock_entries);
    println!("revocation backlog: {}", report.revocation_backlog);

    if let Some(tenant) = &report.tenant {
        println!();
        println!("tenant: {}", tenant.tenant);
        println!("  bound: {}", tenant.bound);
        println!("  login: {}", if tenant.login_exists { "present" } else { "absent" });
        if !tenant.consumers.is_empty() {
            println!("  consumers: {}", tenant.consumers.join(", "));
        }
        if let Some(pending) = &tenant.pending_revocation {
            println!(
                "  pending revocation: {} attempts, last error: {}",
                pending.attempts, pending.last_error
            );
        }
    }
}
