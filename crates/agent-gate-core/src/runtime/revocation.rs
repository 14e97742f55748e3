// crates/agent-gate-core/src/runtime/revocation.rs
// ============================================================================
// Module: Revocation Ledger
// Description: One-shot forced-logout and credential revocation signals.
// Purpose: Let the session layer observe revocations exactly once.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The ledger holds pending revocation signals in two independent namespaces:
//! agents (forced logout) and credentials (revoked tokens). Reading a signal
//! clears it, so each signal is observed at most once. The ledger is not a
//! durable deny-list; it lives for the process lifetime only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::CredentialId;

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Consume-once revocation signal store.
///
/// # Invariants
/// - Agent and credential keys never collide, even when their strings match.
/// - An `is_*` call returning `true` clears the signal under the same lock.
#[derive(Debug, Default)]
pub struct RevocationLedger {
    /// Agents with a pending forced logout.
    logouts: Mutex<BTreeSet<AgentId>>,
    /// Credentials with a pending revocation.
    credentials: Mutex<BTreeSet<CredentialId>>,
}

impl RevocationLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the agent for forced logout.
    pub fn logout(&self, agent: &AgentId) {
        self.logouts.lock().unwrap_or_else(PoisonError::into_inner).insert(agent.clone());
    }

    /// Returns true once if the agent has a pending forced logout.
    #[must_use]
    pub fn is_logged_out(&self, agent: &AgentId) -> bool {
        self.logouts.lock().unwrap_or_else(PoisonError::into_inner).remove(agent)
    }

    /// Marks the credential as revoked.
    pub fn revoke_credential(&self, credential: &CredentialId) {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential.clone());
    }

    /// Returns true once if the credential has a pending revocation.
    #[must_use]
    pub fn is_revoked_credential(&self, credential: &CredentialId) -> bool {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner).remove(credential)
    }
}
