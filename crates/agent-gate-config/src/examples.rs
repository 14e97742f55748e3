// crates/agent-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `agent-gate.toml`. The output is deterministic and must
//! pass [`crate::AgentGateConfig::validate`].

/// Returns a canonical example `agent-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 65536
webhook_path = "/security/events"

[authorizer]
deadline_ms = 5000

[providers.reputation]
enabled = true
base_url = "https://reputation.example.com/api/v1"
api_key = "replace-me"
timeout_ms = 3000
rate_per_sec = 5.0
burst = 10
rate_limit_wait_ms = 1000
cache_ttl_secs = 3600

[providers.community]
enabled = true
base_url = "https://community.example.com/api"
api_key = "replace-me"
timeout_ms = 3000
rate_per_sec = 2.0
burst = 5
rate_limit_wait_ms = 1000
cache_ttl_secs = 3600

[security_events]
enabled = true
issuer = "https://accounts.example.com/"
audiences = ["agent-gate-client-id"]
discovery_url = "https://accounts.example.com/.well-known/risc-configuration"
# jwks_url = "https://accounts.example.com/oauth2/v3/certs"
refresh_interval_secs = 3600
queue_capacity = 256
accepted_content_types = ["application/secevent+jwt", "application/jwt"]
bundle_max_age_secs = 86400

[store]
type = "sqlite"
path = "agent-gate.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[audit]
sink = "stderr"
# path = "agent-gate-audit.jsonl"
"#,
    )
}
