//! Refreshing key manager.
//!
//! # Purpose
//! Owns the current [`KeySet`] and all refresh concurrency: many verifier
//! tasks read keys without touching the network, while a single refresher
//! task serializes fetches, coalesces concurrent refresh requests into one
//! fetch, and enforces the refresh rate limit.
use crate::client::fetch_key_set;
use crate::errors::{JwksError, JwksResult};
use crate::keyset::{KeySet, to_signature_algorithm};
use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::Jwk;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Serves verification keys and keeps them synchronized with a JWKS endpoint.
///
/// Cloning is cheap and all clones share the same key set and refresher.
#[derive(Clone, Debug)]
pub struct KeyManager {
    inner: Arc<ManagerInner>,
    refresh_tx: mpsc::UnboundedSender<RefreshRequest>,
}

#[derive(Debug)]
struct ManagerInner {
    http: reqwest::Client,
    jwks_uri: String,
    fetch_timeout: Duration,
    refresh_interval: Duration,
    disable_key_id: bool,
    published: RwLock<Published>,
}

// Snapshot handed to readers; the key set pointer is replaced wholesale on
// install, never mutated in place.
#[derive(Clone, Debug)]
struct Published {
    key_set: Arc<KeySet>,
    update_count: u64,
}

struct RefreshRequest {
    entered_at_count: u64,
    respond_to: oneshot::Sender<JwksResult<Arc<KeySet>>>,
}

impl KeyManager {
    /// Builds a manager and performs the initial refresh. On any fetch or
    /// invariant failure the error is returned and no manager exists.
    ///
    /// `rate_limit` is the maximum number of refreshes per second; values
    /// below one are treated as one.
    pub async fn new(
        http: reqwest::Client,
        jwks_uri: impl Into<String>,
        fetch_timeout: Duration,
        rate_limit: u32,
        disable_key_id: bool,
    ) -> JwksResult<Self> {
        let inner = Arc::new(ManagerInner {
            http,
            jwks_uri: jwks_uri.into(),
            fetch_timeout,
            refresh_interval: Duration::from_secs(1) / rate_limit.max(1),
            disable_key_id,
            published: RwLock::new(Published {
                key_set: Arc::new(KeySet::default()),
                update_count: 0,
            }),
        });

        inner.fetch_and_install().await?;

        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_refresher(
            Arc::clone(&inner),
            refresh_rx,
            Instant::now(),
        ));

        Ok(Self { inner, refresh_tx })
    }

    /// The currently installed key set. Never blocks and never fails.
    pub fn key_set(&self) -> Arc<KeySet> {
        self.inner.snapshot().key_set
    }

    /// Number of key sets installed so far; one right after construction.
    pub fn update_count(&self) -> u64 {
        self.inner.snapshot().update_count
    }

    /// Looks up the key for a token.
    ///
    /// With key ids enabled this scans the current set for `key_id`, forcing
    /// a single rate-limited refresh on a miss before giving up. With key ids
    /// disabled the single key of the current set is returned and `key_id`
    /// is ignored.
    pub async fn lookup_key(&self, key_id: &str) -> JwksResult<Jwk> {
        if self.inner.disable_key_id {
            return single_key(&self.key_set());
        }
        self.lookup(key_id, None).await
    }

    /// Like [`KeyManager::lookup_key`], but disambiguates duplicate key ids
    /// by the token's signature algorithm: a key declaring the matching
    /// algorithm wins, a key declaring no algorithm is second choice, and
    /// keys declaring only other algorithms never match.
    pub async fn lookup_key_with_alg(
        &self,
        key_id: &str,
        token_alg: Option<Algorithm>,
    ) -> JwksResult<Jwk> {
        self.lookup(key_id, token_alg).await
    }

    async fn lookup(&self, key_id: &str, token_alg: Option<Algorithm>) -> JwksResult<Jwk> {
        let current = self.key_set();
        if let Some(key) = select_key(&current, key_id, token_alg) {
            return Ok(key.clone());
        }

        debug!(kid = key_id, "key not in cached key set, forcing refresh");
        let refreshed = self.refresh_key_set().await?;
        select_key(&refreshed, key_id, token_alg)
            .cloned()
            .ok_or_else(|| JwksError::KeyNotFound {
                kid: key_id.to_string(),
            })
    }

    /// Forces a refresh and returns the newly installed key set.
    ///
    /// Concurrent callers coalesce onto a single fetch; every caller either
    /// observes a set installed after its call began or an error.
    pub async fn refresh_key_set(&self) -> JwksResult<Arc<KeySet>> {
        let (respond_to, response) = oneshot::channel();
        let request = RefreshRequest {
            entered_at_count: self.update_count(),
            respond_to,
        };
        self.refresh_tx
            .send(request)
            .map_err(|_| JwksError::RefreshAborted)?;
        response.await.map_err(|_| JwksError::RefreshAborted)?
    }

    /// Forces a refresh and returns the single key of the new set. Intended
    /// for the disabled-key-id mode, where a signature failure is the only
    /// rotation signal.
    pub async fn refresh_single_key(&self) -> JwksResult<Jwk> {
        let key_set = self.refresh_key_set().await?;
        single_key(&key_set)
    }
}

impl ManagerInner {
    fn snapshot(&self) -> Published {
        self.published.read().expect("key set lock").clone()
    }

    async fn fetch_and_install(&self) -> JwksResult<Arc<KeySet>> {
        let fetched = match fetch_key_set(&self.http, &self.jwks_uri, self.fetch_timeout).await {
            Ok(key_set) => key_set,
            Err(err) => {
                warn!(uri = %self.jwks_uri, error = %err, "jwks fetch failed");
                return Err(err);
            }
        };

        if self.disable_key_id && fetched.len() != 1 {
            warn!(
                keys = fetched.len(),
                "rejecting fetched jwks: exactly one key required when key ids are disabled"
            );
            return Err(JwksError::SingleKeyExpected(fetched.len()));
        }

        let key_set = Arc::new(fetched);
        let update_count = {
            let mut published = self.published.write().expect("key set lock");
            published.key_set = Arc::clone(&key_set);
            published.update_count += 1;
            published.update_count
        };
        debug!(update_count, keys = key_set.len(), "installed new key set");

        Ok(key_set)
    }
}

// The refresher is the only writer. Requests arrive over the channel and are
// served in FIFO batches: sleep out the rate-limit gate, then everything
// queued at fetch time shares the single fetch. Requests that enqueued
// before an already-completed install are answered from the current set
// without another fetch.
async fn run_refresher(
    inner: Arc<ManagerInner>,
    mut requests: mpsc::UnboundedReceiver<RefreshRequest>,
    mut last_refresh: Instant,
) {
    while let Some(request) = requests.recv().await {
        let published = inner.snapshot();
        if request.entered_at_count < published.update_count {
            let _ = request.respond_to.send(Ok(published.key_set));
            continue;
        }

        // Gate before the fetch. The first forced refresh after construction
        // waits out the full interval as well.
        time::sleep_until(last_refresh + inner.refresh_interval).await;

        let mut batch = vec![request];
        while let Ok(queued) = requests.try_recv() {
            batch.push(queued);
        }

        let outcome = inner.fetch_and_install().await;
        if outcome.is_ok() {
            last_refresh = Instant::now();
        }
        for waiter in batch {
            // A waiter may have been cancelled while queued; that is its
            // problem, not the refresher's.
            let _ = waiter.respond_to.send(outcome.clone());
        }
    }
}

fn single_key(key_set: &KeySet) -> JwksResult<Jwk> {
    match key_set.keys.as_slice() {
        [key] => Ok(key.clone()),
        keys => Err(JwksError::SingleKeyExpected(keys.len())),
    }
}

fn select_key<'a>(
    key_set: &'a KeySet,
    key_id: &str,
    token_alg: Option<Algorithm>,
) -> Option<&'a Jwk> {
    let mut candidates = key_set.keys_with_id(key_id);
    let Some(token_alg) = token_alg else {
        return candidates.next();
    };

    let candidates: Vec<&Jwk> = candidates.collect();
    candidates
        .iter()
        .copied()
        .find(|key| {
            key.common
                .key_algorithm
                .and_then(to_signature_algorithm)
                .is_some_and(|alg| alg == token_alg)
        })
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|key| key.common.key_algorithm.is_none())
        })
}
