//! OpenID-Connect token validation.
//!
//! # Purpose
//! Verifies compact-serialized JWS access tokens against an issuer's
//! published keys and enforces the configured policy: expiration with drift,
//! exact issuer match, audience membership, token type, and structural
//! required-claims containment.
//!
//! # How it fits
//! Built on `tokenward-jwks`: the [`Validator`] owns a key manager that
//! fetches and refreshes the issuer's JWKS; this crate decides which
//! algorithm applies, verifies signatures, and applies the policy gates.
//! Host frameworks wrap [`Validator::parse_token`] in their middleware.
//!
//! # Key invariants
//! - Gates run in a fixed order and short-circuit on the first failure.
//! - An empty configured issuer never validates; it is rejected at
//!   construction and, defensively, at the issuer gate.
//! - A signature failure is retried (once, after a forced key refresh) only
//!   when key ids are disabled, where it is the sole rotation signal.

mod algorithm;
mod claims;
mod errors;
mod options;
mod token;
mod validator;

pub use algorithm::resolve_signature_algorithm;
pub use claims::validate_required_claims;
pub use errors::{ClaimsError, OidcError, OidcResult};
pub use options::{
    DEFAULT_ALLOWED_TOKEN_DRIFT, DEFAULT_JWKS_FETCH_TIMEOUT, DEFAULT_JWKS_RATE_LIMIT,
    ValidatorOptions,
};
pub use token::Token;
pub use validator::Validator;

pub use tokenward_jwks::{JwksError, KeyManager, KeySet};
