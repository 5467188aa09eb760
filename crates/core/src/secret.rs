// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret generation for provisioned logins

use crate::record::Password;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Bytes of OS entropy behind each generated password
pub const SECRET_ENTROPY_BYTES: usize = 32;

/// Generates login passwords
pub trait SecretGen: Clone + Send + Sync + 'static {
    fn generate(&self) -> Password;
}

/// Random secrets for production use.
///
/// Draws 32 bytes from the OS RNG and hex-encodes their SHA-512 digest, so
/// each password is 128 lowercase hex characters with no relation to the
/// tenant name.
#[derive(Clone, Default)]
pub struct RandomSecretGen;

impl SecretGen for RandomSecretGen {
    fn generate(&self) -> Password {
        let mut seed = [0u8; SECRET_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut seed);
        let digest = Sha512::digest(seed);
        Password::new(hex_encode(&digest))
    }
}

/// Predictable secrets for testing
#[derive(Clone)]
pub struct SequentialSecretGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialSecretGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Number of secrets generated so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst) - 1
    }
}

impl Default for SequentialSecretGen {
    fn default() -> Self {
        Self::new("secret")
    }
}

impl SecretGen for SequentialSecretGen {
    fn generate(&self) -> Password {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Password::new(format!("{}-{}", self.prefix, n))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
