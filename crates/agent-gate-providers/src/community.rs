// crates/agent-gate-providers/src/community.rs
// ============================================================================
// Module: Community Trust Source
// Description: Lookup against the community verification service.
// Purpose: Map the community's smurf signal onto trust records.
// Dependencies: agent-gate-core, crate::http, serde
// ============================================================================

//! ## Overview
//! `GET {base_url}/api/user/status/{agent}?key=...` answers with a flat
//! object. A 404 or `success: false` means the community does not know the
//! agent; only the `smurf` flag blocks.

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
pub const COMMUNITY_PROVIDER_ID: &str = "community";

/// Agent operates an alternate account to evade restrictions.
pub const FLAG_SMURF: &str = "smurf";
/// Agent completed community verification.
pub const FLAG_VERIFIED: &str = "verified";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Status response.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    /// False when the community does not know the agent.
    #[serde(default = "default_success")]
    success: bool,
    /// Display name.
    #[serde(default)]
    agent: Option<String>,
    /// Smurf flag.
    #[serde(default)]
    smurf: bool,
    /// Verification flag.
    #[serde(default)]
    verified: bool,
}

/// Missing `success` reads as success.
const fn default_success() -> bool {
    true
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// Community verification trust source.
#[derive(Debug, Clone)]
pub struct CommunitySource {
    /// Provider identifier.
    id: ProviderId,
    /// HTTP client bound to the service base URL.
    http: ProviderHttpClient,
}

impl CommunitySource {
    /// Builds a source for the given connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when the client cannot be built.
    pub fn new(config: &HttpSourceConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            id: ProviderId::new(COMMUNITY_PROVIDER_ID),
            http: ProviderHttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl TrustSource for CommunitySource {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn fetch(
        &self,
        agent: &AgentId,
        fetched_at: Timestamp,
    ) -> Result<TrustRecord, ProviderError> {
        let response: Option<StatusResponse> =
            self.http.get_json(&["api", "user", "status", agent.as_str()], "key").await?;
        let Some(response) = response.filter(|response| response.success) else {
            return Ok(TrustRecord::unknown(fetched_at));
        };
        // Some deployments omit the display name; fall back to the lookup key.
        let name = response
            .agent
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| agent.as_str().to_string());
        Ok(TrustRecord::known(name, fetched_at)
            .with_flag(FLAG_SMURF, response.smurf)
            .with_flag(FLAG_VERIFIED, response.verified))
    }

    fn blocks(&self, record: &TrustRecord) -> bool {
        record.flag(FLAG_SMURF)
    }
}
