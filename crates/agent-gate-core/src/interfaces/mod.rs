// crates/agent-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Agent Gate Interfaces
// Description: Contracts for trust providers, caches, and account collaborators.
// Purpose: Define the seams between the trust engine and external systems.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! The trust engine integrates with storage, session management, and external
//! reputation services only through these traits. Storage and account
//! collaborators are synchronous (as the storage backends are); trust
//! providers are asynchronous because they reach the network.
//!
//! Security posture: provider answers and stored records are untrusted; the
//! engine decides how much weight each signal carries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::ProviderId;
use crate::core::trust::TrustRecord;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage and collaborator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Storage backend error.
    #[error("store error: {0}")]
    Store(String),
    /// Stored data failed validation.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Referenced account does not exist.
    #[error("account not found: {0}")]
    NotFound(String),
}

// ============================================================================
// SECTION: Trust Provider
// ============================================================================

/// One external reputation service consulted during authorization.
///
/// Implementations never surface errors: internal failures degrade to the
/// provider's fail-open-unless-cached-negative policy.
#[async_trait]
pub trait TrustProvider: Send + Sync {
    /// Returns the provider identifier.
    fn provider_id(&self) -> &ProviderId;

    /// Returns whether the agent is permitted by this provider.
    async fn authorize(&self, agent: &AgentId) -> bool;

    /// Returns the verdict using only locally cached evidence (no network).
    async fn authorize_offline(&self, agent: &AgentId) -> bool;
}

// ============================================================================
// SECTION: Trust Cache
// ============================================================================

/// Durable per-provider, per-agent trust record storage.
pub trait TrustCache: Send + Sync {
    /// Loads the cached record for `agent` from `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    fn load(
        &self,
        provider: &ProviderId,
        agent: &AgentId,
    ) -> Result<Option<TrustRecord>, StoreError>;

    /// Replaces the cached record for `agent` from `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be written.
    fn store(
        &self,
        provider: &ProviderId,
        agent: &AgentId,
        record: &TrustRecord,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Account Collaborators
// ============================================================================

/// Local account state consulted and mutated by the trust engine.
pub trait AccountDirectory: Send + Sync {
    /// Returns true when the agent has an account record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    fn is_known_agent(&self, agent: &AgentId) -> Result<bool, StoreError>;

    /// Creates the account record for a first-time agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the account cannot be created.
    fn bootstrap_first_login(&self, agent: &AgentId) -> Result<(), StoreError>;

    /// Returns true when a security event locked the account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    fn is_locked(&self, agent: &AgentId) -> Result<bool, StoreError>;

    /// Returns true when the agent self-identified as disqualified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    fn is_self_disqualified(&self, agent: &AgentId) -> Result<bool, StoreError>;

    /// Locks the account, recording `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the account cannot be updated.
    fn lock_account(&self, agent: &AgentId, reason: &str) -> Result<(), StoreError>;

    /// Unlocks the account, recording `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the account cannot be updated.
    fn unlock_account(&self, agent: &AgentId, reason: &str) -> Result<(), StoreError>;

    /// Deletes the account and everything attached to it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the account cannot be deleted.
    fn delete_account(&self, agent: &AgentId) -> Result<(), StoreError>;

    /// Revokes every push-notification token registered for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when tokens cannot be revoked.
    fn revoke_all_push_tokens(&self, agent: &AgentId) -> Result<(), StoreError>;
}

/// Session layer hook that terminates an agent's live sessions.
pub trait SessionInvalidator: Send + Sync {
    /// Invalidates every active session for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when sessions cannot be invalidated.
    fn invalidate_active_sessions(&self, agent: &AgentId) -> Result<(), StoreError>;
}
