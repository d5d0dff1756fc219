use thiserror::Error;
use tokenward_jwks::JwksError;

#[derive(Debug, Error)]
pub enum OidcError {
    #[error("issuer is empty")]
    EmptyIssuer,
    #[error("fallback signature algorithm not accepted: {0}")]
    InvalidFallbackAlgorithm(jsonwebtoken::errors::Error),
    #[error("unable to load jwks: {0}")]
    Jwks(#[from] JwksError),
    #[error("unable to parse token header: {0}")]
    Header(jsonwebtoken::errors::Error),
    #[error("token type {0:?} required")]
    WrongTokenType(String),
    #[error("token header does not contain key id (kid)")]
    MissingKeyId,
    #[error("unable to get signature algorithm with kty={kty}, alg={alg:?}")]
    UnknownAlgorithm { kty: String, alg: Option<String> },
    #[error("failed to verify signature")]
    SignatureVerification,
    #[error("unable to validate token: {0}")]
    Jwt(jsonwebtoken::errors::Error),
    #[error("token has expired")]
    Expired,
    #[error("required issuer {required:?} was not found, received: {received:?}")]
    WrongIssuer { required: String, received: String },
    #[error("required audience {required:?} was not found, received: {received:?}")]
    WrongAudience {
        required: String,
        received: Vec<String>,
    },
    #[error("unable to validate required claims: {0}")]
    Claims(#[from] ClaimsError),
}

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token does not have the claim: {0}")]
    MissingClaim(String),
    #[error("claim {claim:?} not valid: {detail}")]
    NotValid { claim: String, detail: String },
}

pub type OidcResult<T> = Result<T, OidcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            OidcError::EmptyIssuer,
            OidcError::WrongTokenType("JWT+AT".to_string()),
            OidcError::MissingKeyId,
            OidcError::UnknownAlgorithm {
                kty: "oct".to_string(),
                alg: None,
            },
            OidcError::SignatureVerification,
            OidcError::Expired,
            OidcError::WrongIssuer {
                required: "https://issuer".to_string(),
                received: "https://other".to_string(),
            },
            OidcError::WrongAudience {
                required: "api".to_string(),
                received: vec!["web".to_string()],
            },
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn claims_error_names_the_claim() {
        let missing = ClaimsError::MissingClaim("azp".to_string());
        assert!(missing.to_string().contains("azp"));

        let mismatch = ClaimsError::NotValid {
            claim: "azp".to_string(),
            detail: "expected \"c\", received \"d\"".to_string(),
        };
        assert!(mismatch.to_string().contains("azp"));
    }
}
