use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_JWKS_RATE_LIMIT: u32 = 1;
pub const DEFAULT_ALLOWED_TOKEN_DRIFT: Duration = Duration::from_secs(10);

/// Configuration for a [`Validator`](crate::Validator). Policy is frozen at
/// construction; build a new validator to change it.
#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    /// The authority that issues the tokens. Required; tokens must carry an
    /// `iss` claim equal to this value.
    pub issuer: String,

    /// Where the `jwks_uri` will be resolved from. Defaults to
    /// `{issuer}/.well-known/openid-configuration` with a trailing slash on
    /// the issuer stripped.
    pub discovery_uri: Option<String>,

    /// The JWKS endpoint itself. When set, discovery is skipped entirely.
    pub jwks_uri: Option<String>,

    /// Total deadline for each JWKS or discovery fetch. Defaults to 5 s.
    pub jwks_fetch_timeout: Option<Duration>,

    /// Maximum JWKS refreshes per second. Defaults to 1. Lookups that force
    /// a refresh (an unknown kid, a failed signature in unkeyed mode) are
    /// rate limited by this as well.
    pub jwks_rate_limit: Option<u32>,

    /// Used when a JWKS key does not declare its `alg`. When a key declares
    /// one, the declared value always wins. Without a fallback, RSA keys
    /// default to RS256 and EC keys to ES256.
    pub fallback_signature_algorithm: Option<String>,

    /// Added to the token expiration to tolerate clock drift between
    /// parties. Defaults to 10 s.
    pub allowed_token_drift: Option<Duration>,

    /// Defers the initial JWKS load to the first `parse_token` call. The
    /// construction-time error surfaces there instead.
    pub lazy_load_jwks: bool,

    /// Requires an exact `typ` header match when set; any type is accepted
    /// otherwise. Providers use values like `JWT` or `JWT+AT` to tell access
    /// tokens and id tokens apart.
    pub required_token_type: Option<String>,

    /// Requires this audience to be present in the `aud` claim when set.
    pub required_audience: Option<String>,

    /// Claims the token must contain, checked by structural containment:
    /// scalars compare by value, sequences require every required element to
    /// appear (the token may carry more), and mappings recurse per key.
    pub required_claims: Option<Map<String, Value>>,

    /// Disables kid-based key lookup. The JWKS must then contain exactly one
    /// key, and a signature failure triggers a single refresh-and-retry, the
    /// only way to notice rotation without kids.
    pub disable_key_id: bool,

    /// HTTP client used for discovery and JWKS fetches. A fresh client is
    /// created when not supplied.
    pub http_client: Option<reqwest::Client>,
}
