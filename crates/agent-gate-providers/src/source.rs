// crates/agent-gate-providers/src/source.rs
// ============================================================================
// Module: Trust Sources
// Description: Provider-specific lookup and blocking predicate contract.
// Purpose: Separate what a provider knows from how its answers are cached.
// Dependencies: agent-gate-core, async-trait
// ============================================================================

//! ## Overview
//! A [`TrustSource`] knows how to ask one external service about one agent
//! and how to read the answer. Caching, rate limiting, and fail-open policy
//! live in [`crate::CachedTrustProvider`], which wraps any source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use agent_gate_core::AgentId;
use agent_gate_core::ProviderId;
use agent_gate_core::Timestamp;
use agent_gate_core::TrustRecord;
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Provider lookup failures.
///
/// These never leave the provider; they select the failure branch of the
/// caching policy and are written to the audit log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport failure or timeout.
    #[error("provider network error: {0}")]
    Network(String),
    /// Unexpected HTTP status.
    #[error("provider returned status {0}")]
    Status(u16),
    /// Response body could not be decoded.
    #[error("provider response decode error: {0}")]
    Decode(String),
    /// Provider reported an error in its response envelope.
    #[error("provider upstream error: {0}")]
    Upstream(String),
    /// Provider configuration is unusable.
    #[error("provider configuration error: {0}")]
    Config(String),
}

// ============================================================================
// SECTION: Trust Source
// ============================================================================

/// External reputation lookup for one provider.
#[async_trait]
pub trait TrustSource: Send + Sync {
    /// Returns the provider identifier.
    fn provider_id(&self) -> &ProviderId;

    /// Fetches a fresh record for `agent`, stamped with `fetched_at`.
    ///
    /// Agents unknown to the provider yield [`TrustRecord::unknown`].
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the lookup fails.
    async fn fetch(&self, agent: &AgentId, fetched_at: Timestamp)
    -> Result<TrustRecord, ProviderError>;

    /// Returns true when the record's flags block the agent.
    fn blocks(&self, record: &TrustRecord) -> bool;
}
