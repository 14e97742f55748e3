// crates/agent-gate-core/src/audit.rs
// ============================================================================
// Module: Agent Gate Audit Logging
// Description: Structured audit events for authorization and security events.
// Purpose: Emit redacted JSON-line audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are the only logging surface of the trust engine. Each event
//! is a flat serde struct with an `event` discriminator and a millisecond
//! timestamp, written as one JSON line by an [`AuditSink`]. API keys and raw
//! bundle tokens are never part of an event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::core::time::Clock;
use crate::core::time::SystemClock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authorization decision summary.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Agent under evaluation.
    pub agent: String,
    /// Final verdict.
    pub permitted: bool,
    /// Decision reason label.
    pub reason: &'static str,
    /// Providers that denied or failed to resolve.
    pub denied_by: Vec<String>,
    /// Providers evaluated from cache after the fan-out deadline.
    pub deadline_fallback: Vec<String>,
}

impl AuthorizeAuditEvent {
    /// Creates an authorization audit event stamped with the current time.
    #[must_use]
    pub fn new(agent: &str, permitted: bool, reason: &'static str) -> Self {
        Self {
            event: "authorize_decision",
            timestamp_ms: now_ms(),
            agent: agent.to_string(),
            permitted,
            reason,
            denied_by: Vec::new(),
            deadline_fallback: Vec::new(),
        }
    }
}

/// Outcome of a single provider check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCheckOutcome {
    /// Decided on a freshly fetched record.
    Fresh,
    /// Decided on a cached record within its TTL.
    Cached,
    /// Refresh failed and no negative evidence was cached.
    FailOpen,
    /// Refresh failed and cached negative evidence denied the agent.
    FailSecure,
    /// Decided from cache only after the orchestrator deadline.
    Offline,
}

/// Provider check audit event.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCheckAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Provider identifier.
    pub provider: String,
    /// Agent under evaluation.
    pub agent: String,
    /// How the verdict was reached.
    pub outcome: ProviderCheckOutcome,
    /// Provider verdict.
    pub permitted: bool,
    /// True when the rate limiter wait expired and the call proceeded anyway.
    pub rate_limit_bypassed: bool,
    /// Refresh or cache error, when one occurred.
    pub error: Option<String>,
}

/// Inputs required to construct a provider check audit event.
pub struct ProviderCheckAuditParams {
    /// Provider identifier.
    pub provider: String,
    /// Agent under evaluation.
    pub agent: String,
    /// How the verdict was reached.
    pub outcome: ProviderCheckOutcome,
    /// Provider verdict.
    pub permitted: bool,
    /// True when the rate limiter wait expired.
    pub rate_limit_bypassed: bool,
    /// Refresh or cache error, when one occurred.
    pub error: Option<String>,
}

impl ProviderCheckAuditEvent {
    /// Creates a provider check audit event stamped with the current time.
    #[must_use]
    pub fn new(params: ProviderCheckAuditParams) -> Self {
        Self {
            event: "provider_check",
            timestamp_ms: now_ms(),
            provider: params.provider,
            agent: params.agent,
            outcome: params.outcome,
            permitted: params.permitted,
            rate_limit_bypassed: params.rate_limit_bypassed,
            error: params.error,
        }
    }
}

/// Security event dispatch audit record.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEventAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Security event kind label.
    pub kind: &'static str,
    /// Event type URI for unrecognized kinds.
    pub event_uri: Option<String>,
    /// Affected agent, when the event carried a subject.
    pub subject: Option<String>,
    /// Action label (`lock`, `unlock`, `force_logout`, ...).
    pub action: &'static str,
    /// Outcome label (`applied`, `skipped`, `failed`, `ignored`).
    pub outcome: &'static str,
    /// Collaborator error, when the action failed.
    pub error: Option<String>,
}

/// Inputs required to construct a security event audit record.
pub struct SecurityEventAuditParams {
    /// Security event kind label.
    pub kind: &'static str,
    /// Event type URI for unrecognized kinds.
    pub event_uri: Option<String>,
    /// Affected agent.
    pub subject: Option<String>,
    /// Action label.
    pub action: &'static str,
    /// Outcome label.
    pub outcome: &'static str,
    /// Collaborator error.
    pub error: Option<String>,
}

impl SecurityEventAuditEvent {
    /// Creates a security event audit record stamped with the current time.
    #[must_use]
    pub fn new(params: SecurityEventAuditParams) -> Self {
        Self {
            event: "security_event",
            timestamp_ms: now_ms(),
            kind: params.kind,
            event_uri: params.event_uri,
            subject: params.subject,
            action: params.action,
            outcome: params.outcome,
            error: params.error,
        }
    }
}

/// Webhook receipt audit record.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// True when the bundle was acknowledged.
    pub accepted: bool,
    /// HTTP status returned to the issuer.
    pub status: u16,
    /// Rejection reason, when rejected.
    pub reason: Option<String>,
    /// Bundle identifier (`jti`) when decoded.
    pub jti: Option<String>,
    /// Number of events placed on the dispatch queue.
    pub queued: usize,
    /// Request body size in bytes.
    pub body_bytes: usize,
}

impl WebhookAuditEvent {
    /// Creates an acknowledgement record.
    #[must_use]
    pub fn accepted(status: u16, jti: Option<String>, queued: usize, body_bytes: usize) -> Self {
        Self {
            event: "webhook_receipt",
            timestamp_ms: now_ms(),
            accepted: true,
            status,
            reason: None,
            jti,
            queued,
            body_bytes,
        }
    }

    /// Creates a rejection record.
    #[must_use]
    pub fn rejected(status: u16, reason: impl Into<String>, body_bytes: usize) -> Self {
        Self {
            event: "webhook_receipt",
            timestamp_ms: now_ms(),
            accepted: false,
            status,
            reason: Some(reason.into()),
            jti: None,
            queued: 0,
            body_bytes,
        }
    }

    /// Creates a record for a redelivered bundle acknowledged without
    /// queueing.
    #[must_use]
    pub fn duplicate(status: u16, jti: impl Into<String>, body_bytes: usize) -> Self {
        Self {
            event: "webhook_receipt",
            timestamp_ms: now_ms(),
            accepted: true,
            status,
            reason: Some("duplicate bundle".to_string()),
            jti: Some(jti.into()),
            queued: 0,
            body_bytes,
        }
    }
}

/// Signing key set refresh audit record.
#[derive(Debug, Clone, Serialize)]
pub struct KeySetAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Key set source URL.
    pub source: String,
    /// True when the refresh replaced the key set.
    pub ok: bool,
    /// Number of keys in effect after the refresh attempt.
    pub key_count: usize,
    /// Refresh error, when the refresh failed.
    pub error: Option<String>,
}

impl KeySetAuditEvent {
    /// Creates a key set refresh record stamped with the current time.
    #[must_use]
    pub fn new(source: &str, key_count: usize, error: Option<String>) -> Self {
        Self {
            event: "key_set_refresh",
            timestamp_ms: now_ms(),
            source: source.to_string(),
            ok: error.is_none(),
            key_count,
            error,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for trust engine events.
pub trait AuditSink: Send + Sync {
    /// Record an authorization decision.
    fn record_authorize(&self, _event: &AuthorizeAuditEvent) {}

    /// Record a provider check.
    fn record_provider_check(&self, _event: &ProviderCheckAuditEvent) {}

    /// Record a dispatched security event.
    fn record_security_event(&self, _event: &SecurityEventAuditEvent) {}

    /// Record a webhook receipt.
    fn record_webhook(&self, _event: &WebhookAuditEvent) {}

    /// Record a key set refresh attempt.
    fn record_key_set(&self, _event: &KeySetAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event line to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_authorize(&self, event: &AuthorizeAuditEvent) {
        Self::emit(event);
    }

    fn record_provider_check(&self, event: &ProviderCheckAuditEvent) {
        Self::emit(event);
    }

    fn record_security_event(&self, event: &SecurityEventAuditEvent) {
        Self::emit(event);
    }

    fn record_webhook(&self, event: &WebhookAuditEvent) {
        Self::emit(event);
    }

    fn record_key_set(&self, event: &KeySetAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event line.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_authorize(&self, event: &AuthorizeAuditEvent) {
        self.emit(event);
    }

    fn record_provider_check(&self, event: &ProviderCheckAuditEvent) {
        self.emit(event);
    }

    fn record_security_event(&self, event: &SecurityEventAuditEvent) {
        self.emit(event);
    }

    fn record_webhook(&self, event: &WebhookAuditEvent) {
        self.emit(event);
    }

    fn record_key_set(&self, event: &KeySetAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {}

/// Audit sink that keeps serialized events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    /// Recorded events as JSON values.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Returns recorded events whose `event` field equals `name`.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Stores one serialized event.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut guard) = self.events.lock()
        {
            guard.push(value);
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_authorize(&self, event: &AuthorizeAuditEvent) {
        self.emit(event);
    }

    fn record_provider_check(&self, event: &ProviderCheckAuditEvent) {
        self.emit(event);
    }

    fn record_security_event(&self, event: &SecurityEventAuditEvent) {
        self.emit(event);
    }

    fn record_webhook(&self, event: &WebhookAuditEvent) {
        self.emit(event);
    }

    fn record_key_set(&self, event: &KeySetAuditEvent) {
        self.emit(event);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time in unix milliseconds.
fn now_ms() -> i64 {
    SystemClock.now().as_unix_millis()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
