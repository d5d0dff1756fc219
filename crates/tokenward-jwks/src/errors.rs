use std::sync::Arc;
use thiserror::Error;

// Fetch errors are Arc-wrapped so one failed refresh can be fanned out to
// every waiter of the batch.
#[derive(Debug, Clone, Error)]
pub enum JwksError {
    #[error("jwks fetch failed: {0}")]
    Fetch(Arc<reqwest::Error>),
    #[error("discovery fetch failed: {0}")]
    Discovery(Arc<reqwest::Error>),
    #[error("discovery document contains no jwks_uri")]
    MissingJwksUri,
    #[error("expected a jwks with exactly one key, received {0}")]
    SingleKeyExpected(usize),
    #[error("unable to find key {kid:?}")]
    KeyNotFound { kid: String },
    #[error("key set refresh was aborted")]
    RefreshAborted,
}

pub type JwksResult<T> = Result<T, JwksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            JwksError::MissingJwksUri,
            JwksError::SingleKeyExpected(3),
            JwksError::KeyNotFound {
                kid: "k1".to_string(),
            },
            JwksError::RefreshAborted,
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn key_not_found_names_the_kid() {
        let err = JwksError::KeyNotFound {
            kid: "rotated".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("unable to find key"));
        assert!(rendered.contains("rotated"));
    }
}
