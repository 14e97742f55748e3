//! Server, store, and audit config validation tests for agent-gate-config.
// crates/agent-gate-config/tests/server_validation.rs
// =============================================================================
// Module: Server Config Validation Tests
// Description: Validate listener, store, and audit settings.
// Purpose: Ensure local resources are configured safely.
// =============================================================================

use agent_gate_config::AuditSinkKind;
use agent_gate_config::StoreConfig;
use common::TestResult;
use common::assert_invalid;

mod common;

#[test]
fn server_rejects_invalid_bind() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "not-an-address".to_string();
    assert_invalid(config.validate(), "server.bind must be a socket address")
}

#[test]
fn server_rejects_zero_body_limit() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "server.max_body_bytes must be between 1")
}

#[test]
fn webhook_path_must_be_absolute_and_not_health() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.webhook_path = "events".to_string();
    assert_invalid(config.validate(), "server.webhook_path must start with '/'")?;
    config.server.webhook_path = "/healthz".to_string();
    assert_invalid(config.validate(), "server.webhook_path must not be /healthz")?;
    config.server.webhook_path = "/events?x=1".to_string();
    assert_invalid(config.validate(), "server.webhook_path contains invalid characters")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let config = common::config_from_toml("[store]\ntype = \"sqlite\"\npath = \"  \"\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "store.path must be non-empty")
}

#[test]
fn sqlite_store_parses_pragmas() -> TestResult {
    let config = common::config_from_toml(
        "[store]\ntype = \"sqlite\"\npath = \"gate.db\"\njournal_mode = \"delete\"\n",
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    match config.store {
        StoreConfig::Sqlite(store) if store.path.ends_with("gate.db") => Ok(()),
        other => Err(format!("unexpected store {other:?}")),
    }
}

#[test]
fn file_audit_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkKind::File;
    assert_invalid(config.validate(), "audit.path is required")?;
    config.audit.path = Some("audit.jsonl".to_string());
    config.validate().map_err(|err| err.to_string())
}
