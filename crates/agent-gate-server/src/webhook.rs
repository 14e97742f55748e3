// crates/agent-gate-server/src/webhook.rs
// ============================================================================
// Module: Security Event Webhook
// Description: HTTP receiver for signed security event bundles.
// Purpose: Validate, verify, and enqueue inbound events.
// Dependencies: agent-gate-core, axum, tokio
// ============================================================================

//! ## Overview
//! The receiver checks, in order: a non-empty body (406), an accepted content
//! type (415), the body size limit (413), the bundle signature and claims
//! (406), and the replay guard (406 outside the `iat` window). A redelivered
//! `jti` is acknowledged with 202 and nothing is queued. A fresh bundle has
//! every non-verification event queued for the dispatcher and is
//! acknowledged with 202. Verification pings are
//! acknowledged at receipt and never queued. When the queue cannot take the
//! whole bundle, nothing is queued, the `jti` is released, and the issuer is
//! told to retry (503).
//!
//! Security posture: request bodies are untrusted; rejection reasons are
//! audited but never returned to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use agent_gate_core::AuditSink;
use agent_gate_core::SecurityEvent;
use agent_gate_core::SecurityEventKind;
use agent_gate_core::audit::SecurityEventAuditEvent;
use agent_gate_core::audit::SecurityEventAuditParams;
use agent_gate_core::audit::WebhookAuditEvent;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use axum::routing::post;
use tokio::sync::mpsc;

use crate::replay::DEFAULT_BUNDLE_MAX_AGE;
use crate::replay::ReplayError;
use crate::replay::ReplayGuard;
use crate::token::BundleVerifier;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Health check route.
pub const HEALTH_PATH: &str = "/healthz";

/// Slack added to the transport body limit so oversize bodies reach the
/// receiver and are audited.
const TRANSPORT_LIMIT_SLACK: usize = 1024;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared receiver state.
pub struct WebhookState {
    /// Bundle verifier.
    verifier: BundleVerifier,
    /// Dispatcher queue.
    sender: mpsc::Sender<SecurityEvent>,
    /// Accepted media types, lower-cased.
    accepted_content_types: Vec<String>,
    /// Maximum body size in bytes.
    max_body_bytes: usize,
    /// Bundle freshness and uniqueness guard.
    replay: ReplayGuard,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl WebhookState {
    /// Creates receiver state with a wall-clock replay guard and the default
    /// bundle age.
    #[must_use]
    pub fn new(
        verifier: BundleVerifier,
        sender: mpsc::Sender<SecurityEvent>,
        accepted_content_types: &[String],
        max_body_bytes: usize,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            verifier,
            sender,
            accepted_content_types: accepted_content_types
                .iter()
                .map(|value| value.trim().to_ascii_lowercase())
                .collect(),
            max_body_bytes,
            replay: ReplayGuard::new(DEFAULT_BUNDLE_MAX_AGE),
            audit,
        }
    }

    /// Replaces the replay guard.
    #[must_use]
    pub fn with_replay_guard(mut self, replay: ReplayGuard) -> Self {
        self.replay = replay;
        self
    }

    /// Returns the bundle verifier.
    #[must_use]
    pub const fn verifier(&self) -> &BundleVerifier {
        &self.verifier
    }

    /// Processes one request and returns the response status.
    pub fn receive(&self, headers: &HeaderMap, body: &[u8]) -> StatusCode {
        match self.evaluate(headers, body) {
            Ok(Receipt::Queued {
                jti,
                queued,
            }) => {
                self.audit.record_webhook(&WebhookAuditEvent::accepted(
                    StatusCode::ACCEPTED.as_u16(),
                    jti,
                    queued,
                    body.len(),
                ));
                StatusCode::ACCEPTED
            }
            Ok(Receipt::Duplicate(jti)) => {
                self.audit.record_webhook(&WebhookAuditEvent::duplicate(
                    StatusCode::ACCEPTED.as_u16(),
                    jti,
                    body.len(),
                ));
                StatusCode::ACCEPTED
            }
            Err(rejection) => {
                self.audit.record_webhook(&WebhookAuditEvent::rejected(
                    rejection.status.as_u16(),
                    rejection.reason,
                    body.len(),
                ));
                rejection.status
            }
        }
    }

    /// Applies the receiver checks and queues events.
    fn evaluate(&self, headers: &HeaderMap, body: &[u8]) -> Result<Receipt, Rejection> {
        if body.is_empty() {
            return Err(Rejection::new(StatusCode::NOT_ACCEPTABLE, "empty body"));
        }
        if !self.content_type_accepted(headers) {
            return Err(Rejection::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported content type",
            ));
        }
        if body.len() > self.max_body_bytes {
            return Err(Rejection::new(StatusCode::PAYLOAD_TOO_LARGE, "body exceeds size limit"));
        }
        let token = std::str::from_utf8(body)
            .map_err(|_| Rejection::new(StatusCode::NOT_ACCEPTABLE, "body must be utf-8"))?;
        let bundle = self
            .verifier
            .verify(token)
            .map_err(|err| Rejection::new(StatusCode::NOT_ACCEPTABLE, err.to_string()))?;
        match self.replay.admit(bundle.jti.as_deref(), bundle.issued_at) {
            Ok(()) => {}
            Err(ReplayError::Duplicate(jti)) => return Ok(Receipt::Duplicate(jti)),
            Err(ReplayError::Full) => {
                return Err(Rejection::new(StatusCode::SERVICE_UNAVAILABLE, "replay cache full"));
            }
            Err(err) => return Err(Rejection::new(StatusCode::NOT_ACCEPTABLE, err.to_string())),
        }

        let (pings, queued): (Vec<_>, Vec<_>) = bundle
            .events
            .into_iter()
            .partition(|event| event.kind == SecurityEventKind::Verification);
        for ping in &pings {
            self.audit.record_security_event(&SecurityEventAuditEvent::new(
                SecurityEventAuditParams {
                    kind: ping.kind.label(),
                    event_uri: None,
                    subject: None,
                    action: "none",
                    outcome: "acknowledged",
                    error: None,
                },
            ));
        }
        let count = queued.len();
        if count > 0 {
            let Ok(permits) = self.sender.try_reserve_many(count) else {
                if let Some(jti) = bundle.jti.as_deref() {
                    self.replay.release(jti);
                }
                return Err(Rejection::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "event queue unavailable",
                ));
            };
            for (permit, event) in permits.zip(queued) {
                permit.send(event);
            }
        }
        Ok(Receipt::Queued {
            jti: bundle.jti,
            queued: count,
        })
    }

    /// Returns true when the request media type is accepted.
    fn content_type_accepted(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()) else {
            return false;
        };
        let media_type = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        self.accepted_content_types.iter().any(|accepted| *accepted == media_type)
    }
}

/// Accepted request summary.
#[derive(Debug)]
enum Receipt {
    /// Events were queued.
    Queued {
        /// Bundle identifier.
        jti: Option<String>,
        /// Number of queued events.
        queued: usize,
    },
    /// The bundle was already received; nothing was queued.
    Duplicate(String),
}

/// Rejected request summary.
#[derive(Debug)]
struct Rejection {
    /// Response status.
    status: StatusCode,
    /// Audited reason.
    reason: String,
}

impl Rejection {
    /// Creates a rejection.
    fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the receiver router serving `webhook_path` and the health check.
#[must_use]
pub fn webhook_router(webhook_path: &str, state: Arc<WebhookState>) -> Router {
    let transport_limit = state.max_body_bytes.saturating_add(TRANSPORT_LIMIT_SLACK);
    Router::new()
        .route(webhook_path, post(handle_security_event))
        .layer(DefaultBodyLimit::max(transport_limit))
        .with_state(state)
        .merge(health_router())
}

/// Builds a router serving only the health check.
#[must_use]
pub fn health_router() -> Router {
    Router::new().route(HEALTH_PATH, get(handle_health))
}

/// Handles security event deliveries.
async fn handle_security_event(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.receive(&headers, &body)
}

/// Handles health checks.
async fn handle_health() -> StatusCode {
    StatusCode::OK
}
