// crates/agent-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: Agent Gate In-Memory Backends
// Description: In-memory trust cache, account directory, and session hook.
// Purpose: Provide deterministic collaborator implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! These implementations back the `memory` store mode and the test suites.
//! State is volatile and lost on restart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::ProviderId;
use crate::core::trust::TrustRecord;
use crate::interfaces::AccountDirectory;
use crate::interfaces::SessionInvalidator;
use crate::interfaces::StoreError;
use crate::interfaces::TrustCache;

// ============================================================================
// SECTION: Trust Cache
// ============================================================================

/// In-memory trust record cache.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrustCache {
    /// Records keyed by (provider, agent).
    records: Arc<Mutex<BTreeMap<(ProviderId, AgentId), TrustRecord>>>,
}

impl InMemoryTrustCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrustCache for InMemoryTrustCache {
    fn load(
        &self,
        provider: &ProviderId,
        agent: &AgentId,
    ) -> Result<Option<TrustRecord>, StoreError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Store("trust cache mutex poisoned".to_string()))?;
        Ok(guard.get(&(provider.clone(), agent.clone())).cloned())
    }

    fn store(
        &self,
        provider: &ProviderId,
        agent: &AgentId,
        record: &TrustRecord,
    ) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Store("trust cache mutex poisoned".to_string()))?
            .insert((provider.clone(), agent.clone()), record.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Account Directory
// ============================================================================

/// Snapshot of one in-memory account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    /// True when a security event locked the account.
    pub locked: bool,
    /// Reason recorded by the last lock or unlock.
    pub lock_reason: Option<String>,
    /// True when the agent self-identified as disqualified.
    pub self_disqualified: bool,
    /// Registered push-notification tokens.
    pub push_tokens: BTreeSet<String>,
}

/// In-memory account directory.
///
/// # Invariants
/// - Lock and unlock create the account when it does not exist yet, so a
///   lock issued before first login still applies.
/// - Delete and token revocation are idempotent.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountDirectory {
    /// Accounts keyed by agent.
    accounts: Arc<Mutex<BTreeMap<AgentId, AccountState>>>,
}

impl InMemoryAccountDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory lock is poisoned.
    pub fn insert_account(&self, agent: &AgentId, state: AccountState) -> Result<(), StoreError> {
        self.guard()?.insert(agent.clone(), state);
        Ok(())
    }

    /// Registers a push-notification token for an existing or new account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory lock is poisoned.
    pub fn register_push_token(&self, agent: &AgentId, token: &str) -> Result<(), StoreError> {
        self.guard()?.entry(agent.clone()).or_default().push_tokens.insert(token.to_string());
        Ok(())
    }

    /// Returns a snapshot of the account, if present.
    #[must_use]
    pub fn account(&self, agent: &AgentId) -> Option<AccountState> {
        self.guard().ok().and_then(|guard| guard.get(agent).cloned())
    }

    /// Acquires the directory lock.
    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<AgentId, AccountState>>, StoreError> {
        self.accounts
            .lock()
            .map_err(|_| StoreError::Store("account directory mutex poisoned".to_string()))
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn is_known_agent(&self, agent: &AgentId) -> Result<bool, StoreError> {
        Ok(self.guard()?.contains_key(agent))
    }

    fn bootstrap_first_login(&self, agent: &AgentId) -> Result<(), StoreError> {
        self.guard()?.entry(agent.clone()).or_default();
        Ok(())
    }

    fn is_locked(&self, agent: &AgentId) -> Result<bool, StoreError> {
        Ok(self.guard()?.get(agent).is_some_and(|account| account.locked))
    }

    fn is_self_disqualified(&self, agent: &AgentId) -> Result<bool, StoreError> {
        Ok(self.guard()?.get(agent).is_some_and(|account| account.self_disqualified))
    }

    fn lock_account(&self, agent: &AgentId, reason: &str) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let account = guard.entry(agent.clone()).or_default();
        account.locked = true;
        account.lock_reason = Some(reason.to_string());
        Ok(())
    }

    fn unlock_account(&self, agent: &AgentId, reason: &str) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let account = guard.entry(agent.clone()).or_default();
        account.locked = false;
        account.lock_reason = Some(reason.to_string());
        Ok(())
    }

    fn delete_account(&self, agent: &AgentId) -> Result<(), StoreError> {
        self.guard()?.remove(agent);
        Ok(())
    }

    fn revoke_all_push_tokens(&self, agent: &AgentId) -> Result<(), StoreError> {
        if let Some(account) = self.guard()?.get_mut(agent) {
            account.push_tokens.clear();
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Session Invalidator
// ============================================================================

/// Session invalidator that records invalidation counts per agent.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionInvalidator {
    /// Invalidation counts keyed by agent.
    invalidations: Arc<Mutex<BTreeMap<AgentId, usize>>>,
}

impl InMemorySessionInvalidator {
    /// Creates an invalidator with no recorded invalidations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times sessions were invalidated for the agent.
    #[must_use]
    pub fn invalidation_count(&self, agent: &AgentId) -> usize {
        self.invalidations.lock().ok().and_then(|guard| guard.get(agent).copied()).unwrap_or(0)
    }
}

impl SessionInvalidator for InMemorySessionInvalidator {
    fn invalidate_active_sessions(&self, agent: &AgentId) -> Result<(), StoreError> {
        *self
            .invalidations
            .lock()
            .map_err(|_| StoreError::Store("session invalidator mutex poisoned".to_string()))?
            .entry(agent.clone())
            .or_insert(0) += 1;
        Ok(())
    }
}
