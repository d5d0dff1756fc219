//! Test-only OpenID provider.
//!
//! # Purpose
//! Runs an in-process issuer serving the discovery document and a JWKS
//! endpoint, with RSA key generation, rotation, and access-token minting, so
//! integration tests can drive the key manager and validator against a
//! provider they fully control.

mod keys;
mod provider;

pub use provider::{TestProvider, TestProviderBuilder};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
