//! Token validation pipeline.
//!
//! # Purpose
//! Orchestrates header parse, key lookup, signature verification, and the
//! policy gates, in that order, short-circuiting on the first failure.
use crate::algorithm::resolve_signature_algorithm;
use crate::claims::validate_required_claims;
use crate::errors::{OidcError, OidcResult};
use crate::options::{
    DEFAULT_ALLOWED_TOKEN_DRIFT, DEFAULT_JWKS_FETCH_TIMEOUT, DEFAULT_JWKS_RATE_LIMIT,
    ValidatorOptions,
};
use crate::token::Token;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode_header};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokenward_jwks::{JwksError, KeyManager, discovery_uri_from_issuer, jwks_uri_from_discovery};
use tokio::sync::OnceCell;
use tracing::debug;

/// Validates compact-serialized JWS tokens against one issuer.
///
/// Policy is frozen at construction. The validator is `Send + Sync`; host
/// frameworks typically share one behind an `Arc`.
#[derive(Debug)]
pub struct Validator {
    issuer: String,
    discovery_uri: String,
    jwks_uri: Option<String>,
    jwks_fetch_timeout: Duration,
    jwks_rate_limit: u32,
    fallback_algorithm: Option<Algorithm>,
    allowed_token_drift: Duration,
    required_token_type: Option<String>,
    required_audience: Option<String>,
    required_claims: Option<Map<String, Value>>,
    disable_key_id: bool,
    http: reqwest::Client,
    key_manager: OnceCell<KeyManager>,
}

impl Validator {
    /// Builds a validator and, unless lazy loading was requested, resolves
    /// the JWKS endpoint and performs the initial key fetch.
    pub async fn new(options: ValidatorOptions) -> OidcResult<Self> {
        if options.issuer.is_empty() {
            return Err(OidcError::EmptyIssuer);
        }

        let fallback_algorithm = match options.fallback_signature_algorithm.as_deref() {
            Some(name) => {
                Some(Algorithm::from_str(name).map_err(OidcError::InvalidFallbackAlgorithm)?)
            }
            None => None,
        };

        let discovery_uri = options
            .discovery_uri
            .unwrap_or_else(|| discovery_uri_from_issuer(&options.issuer));

        let validator = Self {
            issuer: options.issuer,
            discovery_uri,
            jwks_uri: options.jwks_uri,
            jwks_fetch_timeout: options
                .jwks_fetch_timeout
                .unwrap_or(DEFAULT_JWKS_FETCH_TIMEOUT),
            jwks_rate_limit: options
                .jwks_rate_limit
                .unwrap_or(DEFAULT_JWKS_RATE_LIMIT)
                .max(1),
            fallback_algorithm,
            allowed_token_drift: options
                .allowed_token_drift
                .unwrap_or(DEFAULT_ALLOWED_TOKEN_DRIFT),
            required_token_type: options
                .required_token_type
                .filter(|token_type| !token_type.is_empty()),
            required_audience: options
                .required_audience
                .filter(|audience| !audience.is_empty()),
            required_claims: options.required_claims,
            disable_key_id: options.disable_key_id,
            http: options.http_client.unwrap_or_else(reqwest::Client::new),
            key_manager: OnceCell::new(),
        };

        if !options.lazy_load_jwks {
            validator.key_manager().await?;
        }

        Ok(validator)
    }

    /// Parses and validates a token, returning it with its decoded claims.
    pub async fn parse_token(&self, token_string: &str) -> OidcResult<Token> {
        let manager = self.key_manager().await?;

        let header = decode_header(token_string).map_err(OidcError::Header)?;

        if let Some(required_type) = &self.required_token_type
            && !is_token_type_valid(required_type, header.typ.as_deref())
        {
            return Err(OidcError::WrongTokenType(required_type.clone()));
        }

        let key = if self.disable_key_id {
            manager.lookup_key("").await?
        } else {
            let kid = header
                .kid
                .as_deref()
                .filter(|kid| !kid.is_empty())
                .ok_or(OidcError::MissingKeyId)?;
            manager.lookup_key(kid).await?
        };

        let alg = resolve_signature_algorithm(&key, self.fallback_algorithm)?;
        let claims = match verify_token(token_string, &key, alg) {
            Ok(claims) => claims,
            Err(OidcError::SignatureVerification) if self.disable_key_id => {
                // Without kids a bad signature is the only rotation signal:
                // refresh once and retry once.
                debug!("signature verification failed without key ids, refreshing key set");
                let rotated = manager.refresh_single_key().await?;
                let alg = resolve_signature_algorithm(&rotated, self.fallback_algorithm)?;
                verify_token(token_string, &rotated, alg)?
            }
            Err(err) => return Err(err),
        };

        let token = Token::new(header, claims);

        if !is_token_expiration_valid(
            token.expiration(),
            self.allowed_token_drift,
            now_epoch_seconds(),
        ) {
            return Err(OidcError::Expired);
        }

        if !is_token_issuer_valid(&self.issuer, token.issuer()) {
            return Err(OidcError::WrongIssuer {
                required: self.issuer.clone(),
                received: token.issuer().unwrap_or_default().to_string(),
            });
        }

        let audiences = token.audiences();
        if !is_token_audience_valid(self.required_audience.as_deref(), &audiences) {
            return Err(OidcError::WrongAudience {
                required: self.required_audience.clone().unwrap_or_default(),
                received: audiences,
            });
        }

        if let Some(required_claims) = &self.required_claims {
            validate_required_claims(required_claims, token.claims())?;
        }

        Ok(token)
    }

    // Lazily built so a validator with `lazy_load_jwks` surfaces load errors
    // at the first parse instead of construction.
    async fn key_manager(&self) -> Result<&KeyManager, JwksError> {
        self.key_manager
            .get_or_try_init(|| async {
                let jwks_uri = match &self.jwks_uri {
                    Some(jwks_uri) => jwks_uri.clone(),
                    None => {
                        jwks_uri_from_discovery(
                            &self.http,
                            &self.discovery_uri,
                            self.jwks_fetch_timeout,
                        )
                        .await?
                    }
                };

                KeyManager::new(
                    self.http.clone(),
                    jwks_uri,
                    self.jwks_fetch_timeout,
                    self.jwks_rate_limit,
                    self.disable_key_id,
                )
                .await
            })
            .await
    }
}

fn verify_token(token_string: &str, key: &Jwk, alg: Algorithm) -> OidcResult<Value> {
    let decoding_key = DecodingKey::from_jwk(key).map_err(OidcError::Jwt)?;

    // Signature only; expiration, issuer, and audience have their own gates.
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match jsonwebtoken::decode::<Value>(token_string, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(err) => match err.kind() {
            ErrorKind::InvalidSignature => Err(OidcError::SignatureVerification),
            _ => Err(OidcError::Jwt(err)),
        },
    }
}

fn is_token_type_valid(required: &str, token_type: Option<&str>) -> bool {
    token_type == Some(required)
}

fn is_token_expiration_valid(expiration: Option<i64>, allowed_drift: Duration, now: i64) -> bool {
    let Some(expiration) = expiration else {
        return false;
    };
    expiration + allowed_drift.as_secs() as i64 > now
}

fn is_token_issuer_valid(required: &str, token_issuer: Option<&str>) -> bool {
    // An empty configured issuer never matches.
    if required.is_empty() {
        return false;
    }
    token_issuer == Some(required)
}

fn is_token_audience_valid(required: Option<&str>, audiences: &[String]) -> bool {
    let Some(required) = required else {
        return true;
    };
    audiences.iter().any(|audience| audience == required)
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_type_requires_exact_match() {
        assert!(is_token_type_valid("JWT", Some("JWT")));
        assert!(!is_token_type_valid("JWT+AT", Some("JWT")));
        assert!(!is_token_type_valid("JWT", Some("")));
        assert!(!is_token_type_valid("JWT", None));
    }

    #[test]
    fn expiration_boundary_is_rejected() {
        let drift = Duration::from_secs(10);
        let now = 1_700_000_000;

        // Expiring exactly `drift` ago lands on the boundary: rejected.
        assert!(!is_token_expiration_valid(Some(now - 10), drift, now));
        assert!(is_token_expiration_valid(Some(now - 9), drift, now));
        assert!(is_token_expiration_valid(Some(now + 60), drift, now));
        assert!(!is_token_expiration_valid(Some(now - 60), drift, now));
        assert!(!is_token_expiration_valid(None, drift, now));
    }

    #[test]
    fn empty_required_issuer_rejects_everything() {
        assert!(!is_token_issuer_valid("", Some("https://issuer")));
        assert!(!is_token_issuer_valid("", Some("")));
        assert!(!is_token_issuer_valid("", None));
    }

    #[test]
    fn issuer_requires_exact_match() {
        assert!(is_token_issuer_valid(
            "https://issuer/",
            Some("https://issuer/")
        ));
        assert!(!is_token_issuer_valid(
            "https://issuer/",
            Some("https://issuer")
        ));
        assert!(!is_token_issuer_valid("https://issuer/", None));
    }

    #[test]
    fn audience_membership() {
        let audiences = vec!["api".to_string(), "web".to_string()];
        assert!(is_token_audience_valid(None, &audiences));
        assert!(is_token_audience_valid(None, &[]));
        assert!(is_token_audience_valid(Some("web"), &audiences));
        assert!(!is_token_audience_valid(Some("mobile"), &audiences));
        assert!(!is_token_audience_valid(Some("api"), &[]));
    }
}
