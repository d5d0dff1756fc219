use crate::errors::{OidcError, OidcResult};
use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use tokenward_jwks::to_signature_algorithm;

/// Picks the signature algorithm for a verification key.
///
/// A declared `alg` on the key always wins (and must name a signature
/// algorithm); otherwise the configured fallback applies; otherwise the key
/// type decides: RS256 for RSA, ES256 for EC, an error for anything else.
pub fn resolve_signature_algorithm(key: &Jwk, fallback: Option<Algorithm>) -> OidcResult<Algorithm> {
    if let Some(declared) = key.common.key_algorithm {
        return to_signature_algorithm(declared).ok_or_else(|| OidcError::UnknownAlgorithm {
            kty: key_type_name(&key.algorithm).to_string(),
            alg: Some(declared.to_string()),
        });
    }

    if let Some(fallback) = fallback {
        return Ok(fallback);
    }

    match &key.algorithm {
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(_) => Ok(Algorithm::ES256),
        other => Err(OidcError::UnknownAlgorithm {
            kty: key_type_name(other).to_string(),
            alg: None,
        }),
    }
}

fn key_type_name(parameters: &AlgorithmParameters) -> &'static str {
    match parameters {
        AlgorithmParameters::EllipticCurve(_) => "EC",
        AlgorithmParameters::RSA(_) => "RSA",
        AlgorithmParameters::OctetKey(_) => "oct",
        AlgorithmParameters::OctetKeyPair(_) => "OKP",
    }
}
