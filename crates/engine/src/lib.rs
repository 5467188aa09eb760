// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Credential broker bind orchestration

mod broker;
mod error;
mod reconcile;

pub use broker::{Broker, BrokerConfig, StatusReport, TenantStatus, UnbindOutcome};
pub use error::{BrokerError, ErrorKind};
pub use reconcile::{PendingRevocation, RevocationBacklog, SweepReport};
