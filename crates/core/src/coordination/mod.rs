// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination primitives for per-tenant serialization
//!
//! This module provides:
//! - **TenantLocks** - Lazily created mutual-exclusion lock per tenant key
//! - **TenantGuard** - Held lock, released on drop

pub mod lock;

pub use lock::{LockError, TenantGuard, TenantLocks};
