use crate::errors::{JwksError, JwksResult};
use reqwest::header;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: String,
}

/// Derives the OIDC discovery URI from an issuer, stripping a trailing slash.
pub fn discovery_uri_from_issuer(issuer: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    )
}

/// Resolves the `jwks_uri` from a discovery document. Not cached; the key
/// manager calls this at most once per lifetime.
pub async fn jwks_uri_from_discovery(
    client: &reqwest::Client,
    discovery_uri: &str,
    timeout: Duration,
) -> JwksResult<String> {
    let document: DiscoveryDocument = client
        .get(discovery_uri)
        .header(header::ACCEPT, "application/json")
        .timeout(timeout)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| JwksError::Discovery(Arc::new(err)))?
        .json()
        .await
        .map_err(|err| JwksError::Discovery(Arc::new(err)))?;

    if document.jwks_uri.is_empty() {
        return Err(JwksError::MissingJwksUri);
    }

    Ok(document.jwks_uri)
}
