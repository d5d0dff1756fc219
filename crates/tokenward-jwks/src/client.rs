use crate::errors::{JwksError, JwksResult};
use crate::keyset::KeySet;
use reqwest::header;
use std::sync::Arc;
use std::time::Duration;

/// Fetches a JWKS document with a single GET.
///
/// `timeout` is the total deadline for the request: connect, read, and body
/// decode all count against it. Key order in the response is preserved.
pub async fn fetch_key_set(
    client: &reqwest::Client,
    jwks_uri: &str,
    timeout: Duration,
) -> JwksResult<KeySet> {
    let response = client
        .get(jwks_uri)
        .header(header::ACCEPT, "application/json")
        .timeout(timeout)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| JwksError::Fetch(Arc::new(err)))?;

    response
        .json::<KeySet>()
        .await
        .map_err(|err| JwksError::Fetch(Arc::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router.into_make_service()).await;
        });
        addr
    }

    #[tokio::test]
    async fn fetch_decodes_jwks_in_order() {
        let document = json!({
            "keys": [
                {"kty": "RSA", "kid": "first", "use": "sig", "n": "AQAB", "e": "AQAB"},
                {"kty": "RSA", "kid": "second", "use": "sig", "n": "AQAC", "e": "AQAB"},
            ]
        });
        let served = document.clone();
        let addr = serve(Router::new().route(
            "/jwks",
            get(move || {
                let served = served.clone();
                async move { Json(served) }
            }),
        ))
        .await;

        let client = reqwest::Client::new();
        let key_set = fetch_key_set(
            &client,
            &format!("http://{addr}/jwks"),
            Duration::from_secs(1),
        )
        .await
        .expect("fetch");

        let expected: KeySet = serde_json::from_value(document).expect("decode");
        assert_eq!(key_set, expected);
    }

    #[tokio::test]
    async fn fetch_fails_on_error_status() {
        let addr = serve(Router::new().route(
            "/jwks",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let client = reqwest::Client::new();
        let result = fetch_key_set(
            &client,
            &format!("http://{addr}/jwks"),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(JwksError::Fetch(_))));
    }

    #[tokio::test]
    async fn fetch_fails_on_malformed_body() {
        let addr = serve(Router::new().route("/jwks", get(|| async { "not json" }))).await;

        let client = reqwest::Client::new();
        let result = fetch_key_set(
            &client,
            &format!("http://{addr}/jwks"),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(JwksError::Fetch(_))));
    }

    #[tokio::test]
    async fn fetch_enforces_the_deadline() {
        let addr = serve(Router::new().route(
            "/jwks",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(Value::Null)
            }),
        ))
        .await;

        let client = reqwest::Client::new();
        let result = fetch_key_set(
            &client,
            &format!("http://{addr}/jwks"),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(JwksError::Fetch(_))));
    }

    #[tokio::test]
    async fn fetch_fails_on_unreachable_host() {
        let client = reqwest::Client::new();
        let result = fetch_key_set(&client, "http://127.0.0.1:1/jwks", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(JwksError::Fetch(_))));
    }
}
