// crates/agent-gate-providers/src/reputation.rs
// ============================================================================
// Module: Reputation Trust Source
// Description: Lookup against the reputation service's agent trust endpoint.
// Purpose: Map quarantine, flag, blacklist, and ban signals onto trust records.
// Dependencies: agent-gate-core, crate::http, serde
// ============================================================================

//! ## Overview
//! `GET {base_url}/agent/{agent}/trust?apikey=...` returns a status envelope.
//! A 404 or an `ok` envelope without data means the service has never seen
//! the agent. An `error` envelope is an upstream failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use agent_gate_core::AgentId;
use agent_gate_core::ProviderId;
use agent_gate_core::Timestamp;
use agent_gate_core::TrustRecord;
use async_trait::async_trait;
use serde::Deserialize;

use crate::http::HttpSourceConfig;
use crate::http::ProviderHttpClient;
use crate::source::ProviderError;
use crate::source::TrustSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Provider identifier.
pub const REPUTATION_PROVIDER_ID: &str = "reputation";

/// Agent is quarantined.
pub const FLAG_QUARANTINED: &str = "quarantined";
/// Agent is flagged for review.
pub const FLAG_FLAGGED: &str = "flagged";
/// Agent is blacklisted.
pub const FLAG_BLACKLISTED: &str = "blacklisted";
/// Agent is banned network-wide.
pub const FLAG_BANNED: &str = "banned";

/// Flags that block an agent.
const BLOCKING_FLAGS: [&str; 4] = [FLAG_QUARANTINED, FLAG_FLAGGED, FLAG_BLACKLISTED, FLAG_BANNED];

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    /// `ok` or `error`.
    status: String,
    /// Error detail when `status` is `error`.
    #[serde(default)]
    message: Option<String>,
    /// Trust payload when known.
    #[serde(default)]
    data: Option<TrustData>,
}

/// Trust payload.
#[derive(Debug, Deserialize)]
struct TrustData {
    /// Display name.
    #[serde(default)]
    agent: String,
    /// Quarantine flag.
    #[serde(default)]
    quarantine: bool,
    /// Review flag.
    #[serde(default)]
    flagged: bool,
    /// Blacklist flag.
    #[serde(default)]
    blacklisted: bool,
    /// Network ban flag.
    #[serde(default)]
    banned_by_nia: bool,
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// Reputation service trust source.
#[derive(Debug, Clone)]
pub struct ReputationSource {
    /// Provider identifier.
    id: ProviderId,
    /// HTTP client bound to the service base URL.
    http: ProviderHttpClient,
}

impl ReputationSource {
    /// Builds a source for the given connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when the client cannot be built.
    pub fn new(config: &HttpSourceConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            id: ProviderId::new(REPUTATION_PROVIDER_ID),
            http: ProviderHttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl TrustSource for ReputationSource {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn fetch(
        &self,
        agent: &AgentId,
        fetched_at: Timestamp,
    ) -> Result<TrustRecord, ProviderError> {
        let envelope: Option<Envelope> =
            self.http.get_json(&["agent", agent.as_str(), "trust"], "apikey").await?;
        let Some(envelope) = envelope else {
            return Ok(TrustRecord::unknown(fetched_at));
        };
        match envelope.status.as_str() {
            "ok" => {}
            "error" => {
                return Err(ProviderError::Upstream(
                    envelope.message.unwrap_or_else(|| "unspecified error".to_string()),
                ));
            }
            other => return Err(ProviderError::Decode(format!("unexpected status: {other}"))),
        }
        let Some(data) = envelope.data.filter(|data| !data.agent.is_empty()) else {
            return Ok(TrustRecord::unknown(fetched_at));
        };
        Ok(TrustRecord::known(data.agent, fetched_at)
            .with_flag(FLAG_QUARANTINED, data.quarantine)
            .with_flag(FLAG_FLAGGED, data.flagged)
            .with_flag(FLAG_BLACKLISTED, data.blacklisted)
            .with_flag(FLAG_BANNED, data.banned_by_nia))
    }

    fn blocks(&self, record: &TrustRecord) -> bool {
        record.any_flag(&BLOCKING_FLAGS)
    }
}
