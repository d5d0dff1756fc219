//! JWKS plumbing for OpenID-Connect token verification.
//!
//! # Purpose
//! Keeps a verification key set synchronized with a remote issuer: fetches
//! JWKS documents, resolves the JWKS endpoint through OIDC discovery, and
//! runs a [`KeyManager`] that serves key lookups to concurrent verifiers
//! while coalescing and rate-limiting refresh traffic.
//!
//! # How it fits
//! `tokenward-oidc` builds a `KeyManager` per validator and asks it for the
//! key matching an inbound token's `kid` (or for the single key of the set
//! when key ids are disabled). All refresh concurrency lives here.
//!
//! # Key invariants
//! - An installed key set is immutable; a refresh installs a whole new set.
//! - With key ids disabled, every installed key set has exactly one key.
//! - Concurrent forced refreshes coalesce onto a single fetch, and fetches
//!   never start more often than the configured rate limit allows.

mod client;
mod discovery;
mod errors;
mod keyset;
mod manager;

pub use client::fetch_key_set;
pub use discovery::{discovery_uri_from_issuer, jwks_uri_from_discovery};
pub use errors::{JwksError, JwksResult};
pub use keyset::{KeySet, to_signature_algorithm};
pub use manager::KeyManager;

pub use jsonwebtoken::jwk::Jwk;
