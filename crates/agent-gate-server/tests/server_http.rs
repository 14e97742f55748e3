//! End-to-end HTTP tests for agent-gate-server.
// crates/agent-gate-server/tests/server_http.rs
// ============================================================================
// Module: Server HTTP Tests
// Description: Serve the webhook over a real listener and authorize after it.
// Purpose: Exercise configuration, routing, dispatch, and authorization together.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use agent_gate_config::AgentGateConfig;
use agent_gate_core::AccountDirectory;
use agent_gate_core::AgentId;
use agent_gate_core::AuditSink;
use agent_gate_core::InMemoryAccountDirectory;
use agent_gate_core::InMemoryTrustCache;
use agent_gate_core::MemoryAuditSink;
use agent_gate_core::core::events::ACCOUNT_DISABLED_URI;
use agent_gate_server::AgentGateServer;
use agent_gate_server::ServerError;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::common::KeyServer;
use crate::common::PRIMARY_X;
use crate::common::Reply;

/// Running server plus the handles a test inspects.
struct Running {
    /// Base URL of the bound listener.
    base_url: String,
    /// Shutdown trigger.
    shutdown: oneshot::Sender<()>,
    /// Serve task.
    task: tokio::task::JoinHandle<Result<(), ServerError>>,
}

async fn spawn(server: AgentGateServer) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve_with_listener(listener, async move {
        let _ = shutdown_rx.await;
    }));
    Running {
        base_url,
        shutdown,
        task,
    }
}

fn pipeline_config(jwks_url: String) -> AgentGateConfig {
    let mut config = AgentGateConfig::default();
    config.security_events.enabled = true;
    config.security_events.issuer = common::ISSUER.to_string();
    config.security_events.audiences = vec![common::AUDIENCE.to_string()];
    config.security_events.jwks_url = Some(jwks_url);
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_event_over_http_denies_later_authorization() {
    let keys = KeyServer::start();
    keys.set("/certs", Reply::ok(&common::jwks_json(&[("primary", PRIMARY_X)])));
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let server = AgentGateServer::with_components(
        pipeline_config(keys.url("/certs")),
        Arc::new(InMemoryTrustCache::new()),
        Arc::clone(&accounts) as Arc<dyn AccountDirectory>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
    )
    .unwrap();
    let authorizer = server.authorizer();
    let ledger = server.ledger();
    let webhook_path = server.config().server.webhook_path.clone();
    let agent = AgentId::new("a1");
    assert!(authorizer.is_permitted(&agent).await);

    let running = spawn(server).await;
    let client = reqwest::Client::new();
    let health = client.get(format!("{}/healthz", running.base_url)).send().await.unwrap();
    assert_eq!(health.status().as_u16(), 200);

    let bundle = common::primary_bundle(json!({
        ACCOUNT_DISABLED_URI: common::entry("a1", Some("hijacked")),
    }));
    let delivered = client
        .post(format!("{}{webhook_path}", running.base_url))
        .header("content-type", "application/secevent+jwt")
        .body(bundle)
        .send()
        .await
        .unwrap();
    assert_eq!(delivered.status().as_u16(), 202);

    let wrong_type = client
        .post(format!("{}{webhook_path}", running.base_url))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_type.status().as_u16(), 415);

    running.shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), running.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(accounts.is_locked(&agent).unwrap());
    assert!(ledger.is_logged_out(&agent));
    assert!(!authorizer.is_permitted(&agent).await);
    let decisions = audit.events_named("authorize_decision");
    assert_eq!(decisions.last().unwrap()["reason"], json!("locked"));
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_disabled_serves_health_only() {
    let server = AgentGateServer::with_components(
        AgentGateConfig::default(),
        Arc::new(InMemoryTrustCache::new()),
        Arc::new(InMemoryAccountDirectory::new()),
        Arc::new(MemoryAuditSink::new()),
    )
    .unwrap();
    let webhook_path = server.config().server.webhook_path.clone();
    let running = spawn(server).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/healthz", running.base_url)).send().await.unwrap();
    assert_eq!(health.status().as_u16(), 200);
    let webhook = client
        .post(format!("{}{webhook_path}", running.base_url))
        .header("content-type", "application/secevent+jwt")
        .body("a.b.c")
        .send()
        .await
        .unwrap();
    assert_eq!(webhook.status().as_u16(), 404);

    running.shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), running.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[test]
fn invalid_configuration_is_rejected_before_startup() {
    let mut config = AgentGateConfig::default();
    config.security_events.enabled = true;
    let Err(err) = AgentGateServer::from_config(config) else {
        panic!("expected config error");
    };
    assert!(matches!(err, ServerError::Config(_)));
    assert!(err.to_string().contains("security_events.issuer"));
}

#[test]
fn sqlite_store_backs_the_account_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut config: AgentGateConfig = toml_config(&format!(
        "[store]\ntype = \"sqlite\"\npath = \"{}\"\n\n[audit]\nsink = \"none\"\n",
        dir.path().join("agent-gate.db").display()
    ));
    config.authorizer.deadline_ms = 1_000;
    let server = AgentGateServer::from_config(config).unwrap();
    let agent = AgentId::new("a1");
    server.accounts().lock_account(&agent, "manual").unwrap();
    assert!(server.accounts().is_locked(&agent).unwrap());
}

/// Writes `contents` to a temp file and loads it through the config loader.
fn toml_config(contents: &str) -> AgentGateConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent-gate.toml");
    std::fs::write(&path, contents).unwrap();
    AgentGateConfig::load(Some(&path)).unwrap()
}
