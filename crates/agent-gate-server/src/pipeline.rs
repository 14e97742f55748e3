// crates/agent-gate-server/src/pipeline.rs
// ============================================================================
// Module: Security Event Pipeline
// Description: Owns the key refresher, the event queue, and the dispatcher.
// Purpose: Start and stop asynchronous security event processing as a unit.
// Dependencies: agent-gate-core, tokio
// ============================================================================

//! ## Overview
//! [`SecurityEventPipeline::start`] loads the signing keys once, then spawns
//! the dispatcher and the periodic key refresher. Both tasks watch a single
//! shutdown signal. [`SecurityEventPipeline::shutdown`] raises it and waits
//! for both; the dispatcher drains events that were already queued.
//!
//! A failed initial key load is audited and not fatal: bundles are rejected
//! until a retry succeeds. Retries start at `key_retry_backoff` rather than
//! waiting a full refresh interval.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use agent_gate_core::AccountDirectory;
use agent_gate_core::AuditSink;
use agent_gate_core::RevocationLedger;
use agent_gate_core::SessionInvalidator;
use axum::Router;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dispatch::EventDispatcher;
use crate::keys::DEFAULT_KEY_FETCH_TIMEOUT;
use crate::keys::DEFAULT_KEY_RETRY_BACKOFF;
use crate::keys::DEFAULT_REFRESH_INTERVAL;
use crate::keys::KeySetError;
use crate::keys::KeySetFetcher;
use crate::keys::KeySetRefresher;
use crate::keys::KeySource;
use crate::keys::SigningKeySet;
use crate::replay::DEFAULT_BUNDLE_MAX_AGE;
use crate::replay::ReplayGuard;
use crate::token::BundleVerifier;
use crate::webhook::WebhookState;
use crate::webhook::webhook_router;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Required bundle issuer.
    pub issuer: String,
    /// Accepted audiences; empty disables the audience check.
    pub audiences: Vec<String>,
    /// Key location.
    pub key_source: KeySource,
    /// Interval between key refreshes.
    pub refresh_interval: Duration,
    /// Timeout for key requests.
    pub key_fetch_timeout: Duration,
    /// First retry delay while no keys are loaded.
    pub key_retry_backoff: Duration,
    /// Dispatcher queue capacity.
    pub queue_capacity: usize,
    /// Accepted webhook media types.
    pub accepted_content_types: Vec<String>,
    /// Maximum webhook body size.
    pub max_body_bytes: usize,
    /// Oldest accepted bundle age; also how long `jti` values are held.
    pub bundle_max_age: Duration,
}

impl PipelineSettings {
    /// Creates settings with default intervals, capacity, and media types.
    #[must_use]
    pub fn new(issuer: impl Into<String>, key_source: KeySource) -> Self {
        Self {
            issuer: issuer.into(),
            audiences: Vec::new(),
            key_source,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            key_fetch_timeout: DEFAULT_KEY_FETCH_TIMEOUT,
            key_retry_backoff: DEFAULT_KEY_RETRY_BACKOFF,
            queue_capacity: 256,
            accepted_content_types: vec![
                "application/secevent+jwt".to_string(),
                "application/jwt".to_string(),
            ],
            max_body_bytes: 64 * 1024,
            bundle_max_age: DEFAULT_BUNDLE_MAX_AGE,
        }
    }
}

/// Collaborators mutated by dispatched events.
#[derive(Clone)]
pub struct PipelineCollaborators {
    /// Account state.
    pub accounts: Arc<dyn AccountDirectory>,
    /// Session layer hook.
    pub sessions: Arc<dyn SessionInvalidator>,
    /// Forced logout signals.
    pub ledger: Arc<RevocationLedger>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Running security event pipeline.
pub struct SecurityEventPipeline {
    /// Receiver state shared with the HTTP router.
    webhook: Arc<WebhookState>,
    /// Shared signing keys.
    keys: Arc<SigningKeySet>,
    /// Shutdown signal for both tasks.
    shutdown: watch::Sender<bool>,
    /// Dispatcher task.
    dispatcher: JoinHandle<()>,
    /// Key refresher task.
    refresher: JoinHandle<()>,
}

impl SecurityEventPipeline {
    /// Loads keys and spawns the dispatcher and the key refresher.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Client`] when the key fetch client cannot be
    /// built. Fetch failures are audited and do not fail startup.
    pub async fn start(
        settings: PipelineSettings,
        collaborators: PipelineCollaborators,
    ) -> Result<Self, KeySetError> {
        let keys = Arc::new(SigningKeySet::new());
        let fetcher = KeySetFetcher::new(settings.key_source.clone(), settings.key_fetch_timeout)?;
        let refresher = KeySetRefresher::new(
            fetcher,
            Arc::clone(&keys),
            Arc::clone(&collaborators.audit),
            settings.refresh_interval,
        )
        .with_retry_backoff(settings.key_retry_backoff);
        let _ = refresher.refresh_once().await;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let verifier = BundleVerifier::new(
            settings.issuer.clone(),
            settings.audiences.clone(),
            Arc::clone(&keys),
        );
        let webhook = WebhookState::new(
            verifier,
            sender,
            &settings.accepted_content_types,
            settings.max_body_bytes,
            Arc::clone(&collaborators.audit),
        )
        .with_replay_guard(ReplayGuard::new(settings.bundle_max_age));
        let webhook = Arc::new(webhook);
        let dispatcher = EventDispatcher::new(
            collaborators.accounts,
            collaborators.sessions,
            collaborators.ledger,
            collaborators.audit,
        );
        let dispatcher = tokio::spawn(dispatcher.run(receiver, shutdown_rx.clone()));
        let refresher = tokio::spawn(refresher.run(shutdown_rx));
        Ok(Self {
            webhook,
            keys,
            shutdown,
            dispatcher,
            refresher,
        })
    }

    /// Returns the receiver state.
    #[must_use]
    pub fn webhook(&self) -> Arc<WebhookState> {
        Arc::clone(&self.webhook)
    }

    /// Returns the shared signing keys.
    #[must_use]
    pub const fn keys(&self) -> &Arc<SigningKeySet> {
        &self.keys
    }

    /// Builds the HTTP router serving `webhook_path` and `/healthz`.
    #[must_use]
    pub fn router(&self, webhook_path: &str) -> Router {
        webhook_router(webhook_path, self.webhook())
    }

    /// Signals shutdown and waits for both tasks.
    ///
    /// Events queued before the call are applied before this returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.dispatcher.await;
        let _ = self.refresher.await;
    }
}
