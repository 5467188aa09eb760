// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cb-core: Core types for the credential broker
//!
//! This crate provides:
//! - Validated tenant and consumer names
//! - The persisted `BindRecord` and the store operations that mutate it
//! - Per-tenant lock registry used to serialize bind/unbind
//! - Secret generation and connection descriptors handed back to consumers

pub mod coordination;
pub mod descriptor;
pub mod name;
pub mod operation;
pub mod record;
pub mod secret;

pub use coordination::{LockError, TenantGuard, TenantLocks};
pub use descriptor::ConnectionDescriptor;
pub use name::{ConsumerId, NameError, TenantName};
pub use operation::Operation;
pub use record::{BindRecord, Password};
pub use secret::{RandomSecretGen, SecretGen, SequentialSecretGen};
