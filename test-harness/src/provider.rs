use crate::keys::{ProviderKey, generate_provider_key};
use crate::now_epoch_seconds;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, Header};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// An in-process OpenID provider for tests.
///
/// Serves `/.well-known/openid-configuration` and `/jwks` on a loopback
/// port, signs access tokens with its current RSA key, and lets tests rotate
/// or reshape the published key set at will.
pub struct TestProvider {
    addr: SocketAddr,
    state: Arc<ProviderState>,
    server: JoinHandle<()>,
}

pub struct TestProviderBuilder {
    key_count: usize,
    include_kid: bool,
    include_alg: bool,
}

struct ProviderState {
    issuer: String,
    include_kid: bool,
    include_alg: bool,
    signing: RwLock<SigningState>,
    fail_jwks: AtomicBool,
}

struct SigningState {
    keys: Vec<ProviderKey>,
    document: Value,
}

impl Default for TestProviderBuilder {
    fn default() -> Self {
        Self {
            key_count: 1,
            include_kid: true,
            include_alg: true,
        }
    }
}

impl TestProviderBuilder {
    /// Number of keys in the published JWKS (and the signing key pool).
    pub fn key_count(mut self, key_count: usize) -> Self {
        self.key_count = key_count;
        self
    }

    /// Whether JWKS entries and token headers carry a `kid`. Disable to
    /// exercise the single-key mode.
    pub fn include_kid(mut self, include_kid: bool) -> Self {
        self.include_kid = include_kid;
        self
    }

    /// Whether JWKS entries declare their `alg`. Disable to exercise the
    /// fallback-algorithm path.
    pub fn include_alg(mut self, include_alg: bool) -> Self {
        self.include_alg = include_alg;
        self
    }

    pub async fn start(self) -> Result<TestProvider> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind provider listener")?;
        let addr = listener.local_addr().context("provider local addr")?;

        let keys = generate_keys(self.key_count)?;
        let document = build_document(&keys, self.include_kid, self.include_alg);
        let state = Arc::new(ProviderState {
            issuer: format!("http://{addr}"),
            include_kid: self.include_kid,
            include_alg: self.include_alg,
            signing: RwLock::new(SigningState { keys, document }),
            fail_jwks: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/jwks", get(jwks))
            .with_state(Arc::clone(&state));
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });

        Ok(TestProvider {
            addr,
            state,
            server,
        })
    }
}

impl TestProvider {
    pub fn builder() -> TestProviderBuilder {
        TestProviderBuilder::default()
    }

    /// One keyed RSA key, `alg` declared.
    pub async fn start() -> Result<Self> {
        Self::builder().start().await
    }

    pub fn issuer(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn jwks_uri(&self) -> String {
        format!("http://{}/jwks", self.addr)
    }

    /// Key id of the current signing key, when kids are published.
    pub fn current_kid(&self) -> Option<String> {
        if !self.state.include_kid {
            return None;
        }
        let signing = self.state.signing.read().expect("signing lock");
        signing.keys.first().map(|key| key.kid.clone())
    }

    /// The JWKS document currently served, as raw JSON.
    pub fn current_jwks(&self) -> Value {
        self.state
            .signing
            .read()
            .expect("signing lock")
            .document
            .clone()
    }

    /// Replaces every signing key with a freshly generated one.
    pub fn rotate_keys(&self) -> Result<()> {
        let mut signing = self.state.signing.write().expect("signing lock");
        signing.keys = generate_keys(signing.keys.len())?;
        signing.document =
            build_document(&signing.keys, self.state.include_kid, self.state.include_alg);
        Ok(())
    }

    /// Regenerates the key pool with `key_count` keys.
    pub fn set_key_count(&self, key_count: usize) -> Result<()> {
        let mut signing = self.state.signing.write().expect("signing lock");
        signing.keys = generate_keys(key_count)?;
        signing.document =
            build_document(&signing.keys, self.state.include_kid, self.state.include_alg);
        Ok(())
    }

    /// Publishes the current key twice under the same kid, declared once as
    /// RS256 and once as RS512.
    pub fn serve_duplicate_kid(&self) -> Result<()> {
        let mut signing = self.state.signing.write().expect("signing lock");
        let key = signing.keys.first().context("no signing key")?;
        let rs256 = jwk_value(key, true, Some("RS256"));
        let rs512 = jwk_value(key, true, Some("RS512"));
        signing.document = json!({ "keys": [rs256, rs512] });
        Ok(())
    }

    /// Makes the JWKS endpoint answer 500 until turned off again.
    pub fn set_jwks_failure(&self, failing: bool) {
        self.state.fail_jwks.store(failing, Ordering::SeqCst);
    }

    /// Baseline claims for a token of this issuer, expiring in one hour.
    pub fn standard_claims(&self, audience: &str) -> Value {
        let now = now_epoch_seconds();
        json!({
            "iss": self.issuer(),
            "sub": "test-subject",
            "aud": audience,
            "iat": now,
            "exp": now + 3600,
        })
    }

    /// Signs an access token with the current key. The header carries the
    /// key's `kid` unless kids are disabled, and `typ: JWT`.
    pub fn mint_token(&self, claims: &Value) -> Result<String> {
        self.mint(claims, Some("JWT"), self.state.include_kid)
    }

    /// Signs a token with an explicit `typ` header (`None` omits it).
    pub fn mint_token_with_typ(&self, claims: &Value, typ: Option<&str>) -> Result<String> {
        self.mint(claims, typ, self.state.include_kid)
    }

    /// Signs a token whose header has no `kid`, regardless of provider mode.
    pub fn mint_token_without_kid(&self, claims: &Value) -> Result<String> {
        self.mint(claims, Some("JWT"), false)
    }

    /// Signs a token with a key the provider never published. The header
    /// still names the current kid, so only signature verification can tell
    /// it apart.
    pub fn mint_foreign_token(&self, claims: &Value) -> Result<String> {
        let rogue = generate_provider_key()?;
        let mut header = Header::new(Algorithm::RS256);
        if self.state.include_kid {
            header.kid = self.current_kid();
        }
        jsonwebtoken::encode(&header, claims, &rogue.encoding_key).context("encode token")
    }

    fn mint(&self, claims: &Value, typ: Option<&str>, include_kid: bool) -> Result<String> {
        let signing = self.state.signing.read().expect("signing lock");
        let key = signing.keys.first().context("no signing key")?;
        let mut header = Header::new(Algorithm::RS256);
        header.typ = typ.map(|typ| typ.to_string());
        if include_kid {
            header.kid = Some(key.kid.clone());
        }
        jsonwebtoken::encode(&header, claims, &key.encoding_key).context("encode token")
    }
}

impl Drop for TestProvider {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn discovery(State(state): State<Arc<ProviderState>>) -> Json<Value> {
    Json(json!({
        "issuer": state.issuer.clone(),
        "jwks_uri": format!("{}/jwks", state.issuer),
    }))
}

async fn jwks(State(state): State<Arc<ProviderState>>) -> Result<Json<Value>, StatusCode> {
    if state.fail_jwks.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(
        state.signing.read().expect("signing lock").document.clone(),
    ))
}

fn generate_keys(key_count: usize) -> Result<Vec<ProviderKey>> {
    (0..key_count).map(|_| generate_provider_key()).collect()
}

fn build_document(keys: &[ProviderKey], include_kid: bool, include_alg: bool) -> Value {
    let keys: Vec<Value> = keys
        .iter()
        .map(|key| jwk_value(key, include_kid, include_alg.then_some("RS256")))
        .collect();
    json!({ "keys": keys })
}

fn jwk_value(key: &ProviderKey, include_kid: bool, alg: Option<&str>) -> Value {
    let mut jwk = json!({
        "kty": "RSA",
        "use": "sig",
        "n": key.n.clone(),
        "e": key.e.clone(),
    });
    if include_kid {
        jwk["kid"] = json!(key.kid.clone());
    }
    if let Some(alg) = alg {
        jwk["alg"] = json!(alg);
    }
    jwk
}
