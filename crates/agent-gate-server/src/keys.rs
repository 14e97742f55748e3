// crates/agent-gate-server/src/keys.rs
// ============================================================================
// Module: Signing Key Set
// Description: Issuer key set cache with periodic, fail-static refresh.
// Purpose: Supply verification keys for inbound security event bundles.
// Dependencies: agent-gate-core, agent-gate-providers, jsonwebtoken, reqwest, serde, tokio
// ============================================================================

//! ## Overview
//! [`SigningKeySet`] holds the issuer's current JSON Web Key Set behind a
//! read-write lock and is replaced wholesale on every successful refresh.
//! [`KeySetRefresher`] fetches the set either directly or through a discovery
//! document and re-fetches on a fixed interval until shutdown is signalled.
//! While no keys are loaded it retries on a doubling backoff instead, so a
//! failed startup load does not leave the receiver keyless for an interval.
//!
//! Invariants:
//! - A failed or empty fetch never replaces the current set.
//! - Several keys may be active at once so rotation windows verify cleanly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use agent_gate_core::AuditSink;
use agent_gate_core::audit::KeySetAuditEvent;
use agent_gate_providers::ResponseReadError;
use agent_gate_providers::read_response_limited;
use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default interval between key set refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default first retry delay while no keys are loaded.
pub const DEFAULT_KEY_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound for the keyless retry delay.
pub const MAX_KEY_RETRY_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Default timeout for discovery and key set requests.
pub const DEFAULT_KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted discovery or key set document size in bytes.
pub const MAX_KEY_DOCUMENT_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key set fetch failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySetError {
    /// The fetch client could not be built.
    #[error("key set client error: {0}")]
    Client(String),
    /// Transport failure.
    #[error("key set network error: {0}")]
    Network(String),
    /// Non-success HTTP status.
    #[error("key set endpoint returned status {0}")]
    Status(u16),
    /// The document could not be decoded.
    #[error("key set decode error: {0}")]
    Decode(String),
    /// The discovery document did not name a usable key set.
    #[error("discovery document error: {0}")]
    Discovery(String),
    /// The fetched set contained no keys.
    #[error("key set is empty")]
    Empty,
}

// ============================================================================
// SECTION: Key Set
// ============================================================================

/// Shared, wholesale-replaced signing key set.
#[derive(Debug)]
pub struct SigningKeySet {
    /// Current key set snapshot.
    current: RwLock<Arc<JwkSet>>,
}

impl Default for SigningKeySet {
    fn default() -> Self {
        Self::from_jwks(JwkSet {
            keys: Vec::new(),
        })
    }
}

impl SigningKeySet {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a key set seeded with `jwks`.
    #[must_use]
    pub fn from_jwks(jwks: JwkSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(jwks)),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<JwkSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the current set.
    pub fn replace(&self, jwks: JwkSet) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(jwks);
    }

    /// Returns the number of keys in the current set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().keys.len()
    }

    /// Returns true when no keys are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Fetching
// ============================================================================

/// Where the issuer publishes its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Direct key set URL.
    Jwks(String),
    /// Discovery document whose `jwks_uri` names the key set.
    Discovery(String),
}

impl KeySource {
    /// Returns the configured URL for audit records.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Jwks(url) | Self::Discovery(url) => url,
        }
    }
}

/// Discovery document subset.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    /// Key set location.
    jwks_uri: String,
}

/// HTTP fetcher for the issuer key set.
#[derive(Debug, Clone)]
pub struct KeySetFetcher {
    /// Key location.
    source: KeySource,
    /// HTTP client with request timeouts.
    client: Client,
}

impl KeySetFetcher {
    /// Builds a fetcher for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Client`] when the HTTP client cannot be built.
    pub fn new(source: KeySource, timeout: Duration) -> Result<Self, KeySetError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .redirect(Policy::none())
            .user_agent(format!("agent-gate/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| KeySetError::Client(err.to_string()))?;
        Ok(Self {
            source,
            client,
        })
    }

    /// Returns the key location.
    #[must_use]
    pub const fn source(&self) -> &KeySource {
        &self.source
    }

    /// Fetches the key set.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError`] on transport, status, decode, or empty-set
    /// failures.
    pub async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let jwks_url = match &self.source {
            KeySource::Jwks(url) => url.clone(),
            KeySource::Discovery(url) => {
                let document: DiscoveryDocument = self.get_document(url).await?;
                let trimmed = document.jwks_uri.trim();
                let parsed = Url::parse(trimmed)
                    .map_err(|err| KeySetError::Discovery(format!("invalid jwks_uri: {err}")))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(KeySetError::Discovery("jwks_uri must use http(s)".to_string()));
                }
                trimmed.to_string()
            }
        };
        let jwks: JwkSet = self.get_document(&jwks_url).await?;
        if jwks.keys.is_empty() {
            return Err(KeySetError::Empty);
        }
        Ok(jwks)
    }

    /// Issues a bounded GET and decodes the JSON body.
    async fn get_document<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, KeySetError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| KeySetError::Network(err.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status(status.as_u16()));
        }
        let bytes = read_response_limited(&mut response, MAX_KEY_DOCUMENT_BYTES)
            .await
            .map_err(|err| match err {
                ResponseReadError::Transport(message) => KeySetError::Network(message),
                other => KeySetError::Decode(other.to_string()),
            })?;
        serde_json::from_slice(&bytes).map_err(|err| KeySetError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Refresher
// ============================================================================

/// Periodic key set refresher.
pub struct KeySetRefresher {
    /// Key fetcher.
    fetcher: KeySetFetcher,
    /// Shared key set updated on success.
    keys: Arc<SigningKeySet>,
    /// Audit sink for refresh outcomes.
    audit: Arc<dyn AuditSink>,
    /// Interval between refreshes.
    interval: Duration,
    /// First retry delay while the key set is empty.
    retry_backoff: Duration,
}

impl KeySetRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(
        fetcher: KeySetFetcher,
        keys: Arc<SigningKeySet>,
        audit: Arc<dyn AuditSink>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            keys,
            audit,
            interval,
            retry_backoff: DEFAULT_KEY_RETRY_BACKOFF,
        }
    }

    /// Sets the first retry delay used while no keys are loaded.
    #[must_use]
    pub const fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Fetches once and replaces the key set on success.
    ///
    /// Returns the number of loaded keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError`] when the fetch fails; the previous set stays
    /// in place.
    pub async fn refresh_once(&self) -> Result<usize, KeySetError> {
        let source = self.fetcher.source().url();
        match self.fetcher.fetch().await {
            Ok(jwks) => {
                let count = jwks.keys.len();
                self.keys.replace(jwks);
                self.audit.record_key_set(&KeySetAuditEvent::new(source, count, None));
                Ok(count)
            }
            Err(err) => {
                self.audit.record_key_set(&KeySetAuditEvent::new(
                    source,
                    self.keys.len(),
                    Some(err.to_string()),
                ));
                Err(err)
            }
        }
    }

    /// Refreshes every interval until `shutdown` flips to true or its sender
    /// is dropped.
    ///
    /// While the key set is empty the wait starts at the retry backoff and
    /// doubles after each failure, capped at [`MAX_KEY_RETRY_BACKOFF`] and the
    /// interval. A success resets it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = self.retry_backoff;
        loop {
            let wait = if self.keys.is_empty() {
                backoff.min(self.interval)
            } else {
                self.interval
            };
            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    match self.refresh_once().await {
                        Ok(_) => backoff = self.retry_backoff,
                        Err(_) if self.keys.is_empty() => {
                            backoff = backoff.saturating_mul(2).min(MAX_KEY_RETRY_BACKOFF);
                        }
                        Err(_) => {}
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
