//! Behavioral specifications for the cb CLI and cbd daemon.
//!
//! These tests are black-box: they start the daemon binary with the
//! in-memory engine, drive it through the CLI binary, and verify stdout,
//! stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// daemon/
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;
#[path = "specs/daemon/persistence.rs"]
mod daemon_persistence;

// broker/
#[path = "specs/broker/bind.rs"]
mod broker_bind;
#[path = "specs/broker/remove.rs"]
mod broker_remove;
#[path = "specs/broker/status.rs"]
mod broker_status;
#[path = "specs/broker/unbind.rs"]
mod broker_unbind;
