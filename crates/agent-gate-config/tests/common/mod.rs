// crates/agent-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for agent-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use agent_gate_config::AgentGateConfig;
use agent_gate_config::ConfigError;
use agent_gate_config::ProviderConfig;

/// Result type shared by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into an `AgentGateConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<AgentGateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<AgentGateConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a valid enabled provider section pointing at `base_url`.
pub fn provider(base_url: &str) -> Result<ProviderConfig, toml::de::Error> {
    toml::from_str(&format!("base_url = \"{base_url}\"\napi_key = \"key\"\n"))
}

/// Returns a config with security events enabled and a direct key set URL.
pub fn security_events_config() -> Result<AgentGateConfig, toml::de::Error> {
    config_from_toml(
        r#"
[security_events]
enabled = true
issuer = "https://accounts.example.com/"
audiences = ["client"]
jwks_url = "https://accounts.example.com/certs"
"#,
    )
}

/// Asserts that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
