// crates/agent-gate-providers/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Local HTTP stub server and provider builders.
// Purpose: Exercise trust sources against scripted upstream responses.
// Dependencies: agent-gate-core, agent-gate-providers, tiny_http
// ============================================================================

//! ## Overview
//! [`StubServer`] answers every request with a scripted status and body and
//! records request URLs, so tests can count upstream lookups.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(clippy::unwrap_used, reason = "Fixtures fail fast on setup errors.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use agent_gate_core::AuditSink;
use agent_gate_core::Clock;
use agent_gate_core::InMemoryTrustCache;
use agent_gate_core::ManualClock;
use agent_gate_core::MemoryAuditSink;
use agent_gate_core::Timestamp;
use agent_gate_core::TrustCache;
use agent_gate_providers::CachePolicy;
use agent_gate_providers::CachedTrustProvider;
use agent_gate_providers::HttpSourceConfig;
use agent_gate_providers::TrustSource;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use tiny_http::StatusCode;

// ============================================================================
// SECTION: Stub Server
// ============================================================================

/// Scripted reply.
#[derive(Debug, Clone)]
pub struct Reply {
    /// HTTP status.
    pub status: u16,
    /// JSON body.
    pub body: String,
    /// Stream the body with chunked encoding and no `Content-Length`.
    pub chunked: bool,
}

impl Reply {
    /// 200 with a JSON body.
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            chunked: false,
        }
    }

    /// 200 with a raw body.
    pub fn raw(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            chunked: false,
        }
    }

    /// 200 with a raw body streamed without a declared length.
    pub fn chunked(body: impl Into<String>) -> Self {
        Self {
            chunked: true,
            ..Self::raw(body)
        }
    }

    /// Status-only reply with an empty JSON object.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: "{}".to_string(),
            chunked: false,
        }
    }
}

/// Local HTTP server with a replaceable scripted reply.
pub struct StubServer {
    /// Base URL (`http://127.0.0.1:port`).
    pub base_url: String,
    /// Current reply.
    reply: Arc<Mutex<Reply>>,
    /// Raw request URLs received.
    requests: Arc<Mutex<Vec<String>>>,
    /// Stop flag for the serving thread.
    stop: Arc<AtomicBool>,
}

impl StubServer {
    /// Starts a server answering with `reply`.
    pub fn start(reply: Reply) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let reply = Arc::new(Mutex::new(reply));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (thread_reply, thread_requests, thread_stop) =
            (Arc::clone(&reply), Arc::clone(&requests), Arc::clone(&stop));
        thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(25)) else {
                    continue;
                };
                thread_requests.lock().unwrap().push(request.url().to_string());
                let current = thread_reply.lock().unwrap().clone();
                let header =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let length = (!current.chunked).then_some(current.body.len());
                let response = Response::new(
                    StatusCode(current.status),
                    vec![header],
                    Cursor::new(current.body.into_bytes()),
                    length,
                    None,
                );
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            reply,
            requests,
            stop,
        }
    }

    /// Replaces the scripted reply.
    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Returns the number of requests served.
    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Returns the raw URLs received.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Returns a base URL on which nothing listens.
pub fn closed_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ============================================================================
// SECTION: Provider Fixtures
// ============================================================================

/// Start time used by fixtures.
pub const START: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

/// Cached provider plus the collaborators tests inspect.
pub struct Fixture<S> {
    /// Provider under test.
    pub provider: CachedTrustProvider<S>,
    /// Backing cache.
    pub cache: Arc<InMemoryTrustCache>,
    /// Controllable clock.
    pub clock: Arc<ManualClock>,
    /// Captured audit events.
    pub audit: Arc<MemoryAuditSink>,
}

/// Connection settings pointing at `base_url` with a short timeout.
pub fn http_config(base_url: &str) -> HttpSourceConfig {
    let mut config = HttpSourceConfig::new(base_url, "test-key");
    config.timeout = Duration::from_millis(1_500);
    config
}

/// Wraps `source` with in-memory collaborators and a manual clock.
pub fn fixture<S: TrustSource>(source: S) -> Fixture<S> {
    let cache = Arc::new(InMemoryTrustCache::new());
    let clock = Arc::new(ManualClock::new(START));
    let audit = Arc::new(MemoryAuditSink::new());
    let provider = CachedTrustProvider::new(
        source,
        Arc::clone(&cache) as Arc<dyn TrustCache>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        CachePolicy::default(),
    );
    Fixture {
        provider,
        cache,
        clock,
        audit,
    }
}
