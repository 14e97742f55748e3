// crates/agent-gate-core/src/core/trust.rs
// ============================================================================
// Module: Trust Records
// Description: Cached per-provider, per-agent reputation snapshots.
// Purpose: Carry provider flags and freshness metadata between network lookups.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`TrustRecord`] is the last successful answer a provider gave about an
//! agent. Records are overwritten wholesale on refresh and never merged.
//! Invariants:
//! - An empty `agent` means the provider has never seen the agent; such a
//!   record is never treated as blocked.
//! - A record is stale once [`TRUST_RECORD_TTL`] has elapsed since `fetched_at`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum age of a cached trust record before a network refresh is required.
pub const TRUST_RECORD_TTL: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// SECTION: Trust Record
// ============================================================================

/// Provider-specific trust snapshot for one agent.
///
/// # Invariants
/// - `agent` is empty when the provider does not know the agent.
/// - Flags absent from `flags` read as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    /// Display name reported by the provider (empty = unknown to the provider).
    #[serde(default)]
    pub agent: String,
    /// Time the record was fetched from the provider.
    pub fetched_at: Timestamp,
    /// Provider-specific boolean flags.
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl TrustRecord {
    /// Builds a record for an agent the provider does not know.
    #[must_use]
    pub fn unknown(fetched_at: Timestamp) -> Self {
        Self {
            agent: String::new(),
            fetched_at,
            flags: BTreeMap::new(),
        }
    }

    /// Builds a record for a known agent with no flags set.
    #[must_use]
    pub fn known(agent: impl Into<String>, fetched_at: Timestamp) -> Self {
        Self {
            agent: agent.into(),
            fetched_at,
            flags: BTreeMap::new(),
        }
    }

    /// Returns a copy with `flag` set to `value`.
    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.flags.insert(flag.into(), value);
        self
    }

    /// Returns true when the provider has seen this agent.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !self.agent.is_empty()
    }

    /// Returns the value of a flag, defaulting to `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Returns true when any of `names` is set.
    #[must_use]
    pub fn any_flag(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.flag(name))
    }

    /// Returns true when the record must be refreshed before a new decision.
    #[must_use]
    pub fn is_stale(&self, now: Timestamp, ttl: Duration) -> bool {
        now.saturating_since(self.fetched_at) >= ttl
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
