// crates/agent-gate-server/src/replay.rs
// ============================================================================
// Module: Bundle Replay Guard
// Description: Freshness window and identifier cache for inbound bundles.
// Purpose: Apply each signed bundle at most once.
// Dependencies: agent-gate-core
// ============================================================================

//! ## Overview
//! A bundle is admitted when its `iat` lies inside the acceptance window and
//! its `jti` has not been admitted before. Admitted identifiers are kept
//! until their bundle falls out of the window, after which the `iat` check
//! alone rejects it, so the cache never needs to outlive the window.
//!
//! Invariants:
//! - An identifier is held from admission until `iat + max_age`.
//! - The cache never holds more than `capacity` identifiers; a full cache
//!   rejects new bundles instead of evicting live ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use agent_gate_core::Clock;
use agent_gate_core::SystemClock;
use agent_gate_core::Timestamp;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum bundle age.
pub const DEFAULT_BUNDLE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Tolerated issuer clock skew for `iat` values in the future.
pub const MAX_ISSUED_AT_SKEW: Duration = Duration::from_secs(5 * 60);

/// Default number of identifiers held at once.
pub const DEFAULT_REPLAY_CAPACITY: usize = 100_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a verified bundle is not admitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The bundle carries no `jti`.
    #[error("bundle has no jti")]
    MissingJti,
    /// The bundle carries no `iat`.
    #[error("bundle has no iat")]
    MissingIssuedAt,
    /// `iat` is older than the acceptance window.
    #[error("bundle is older than the acceptance window")]
    Stale,
    /// `iat` is further in the future than the tolerated skew.
    #[error("bundle is issued in the future")]
    FromFuture,
    /// The `jti` was already admitted.
    #[error("bundle already received: {0}")]
    Duplicate(String),
    /// The identifier cache is full of live entries.
    #[error("replay cache is full")]
    Full,
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Admitted identifiers and their expiry.
#[derive(Debug, Default)]
struct Seen {
    /// Expiry by identifier.
    by_jti: HashMap<String, Timestamp>,
    /// Identifiers ordered by expiry.
    by_expiry: BTreeSet<(Timestamp, String)>,
}

impl Seen {
    /// Drops identifiers whose expiry is at or before `now`.
    fn prune(&mut self, now: Timestamp) {
        while let Some((expires, _)) = self.by_expiry.first()
            && *expires <= now
        {
            if let Some((_, jti)) = self.by_expiry.pop_first() {
                self.by_jti.remove(&jti);
            }
        }
    }
}

/// Bundle freshness and uniqueness guard.
pub struct ReplayGuard {
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Oldest accepted bundle age.
    max_age: Duration,
    /// Maximum number of live identifiers.
    capacity: usize,
    /// Admitted identifiers.
    seen: Mutex<Seen>,
}

impl ReplayGuard {
    /// Creates a guard using wall-clock time.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self::with_clock(max_age, DEFAULT_REPLAY_CAPACITY, Arc::new(SystemClock))
    }

    /// Creates a guard with an explicit capacity and clock.
    #[must_use]
    pub fn with_clock(max_age: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            max_age,
            capacity,
            seen: Mutex::new(Seen::default()),
        }
    }

    /// Admits a bundle identified by `jti` and issued at `issued_at` (unix
    /// seconds).
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] when either claim is missing, `issued_at` is
    /// outside the window, the identifier was already admitted, or the cache
    /// is full.
    pub fn admit(&self, jti: Option<&str>, issued_at: Option<i64>) -> Result<(), ReplayError> {
        let jti =
            jti.map(str::trim).filter(|jti| !jti.is_empty()).ok_or(ReplayError::MissingJti)?;
        let issued_at = issued_at
            .map(|secs| Timestamp::from_unix_millis(secs.saturating_mul(1_000)))
            .ok_or(ReplayError::MissingIssuedAt)?;
        let now = self.clock.now();
        if issued_at.saturating_since(now) > MAX_ISSUED_AT_SKEW {
            return Err(ReplayError::FromFuture);
        }
        let expires = issued_at.saturating_add(self.max_age);
        if expires <= now {
            return Err(ReplayError::Stale);
        }

        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.prune(now);
        if seen.by_jti.contains_key(jti) {
            return Err(ReplayError::Duplicate(jti.to_string()));
        }
        if seen.by_jti.len() >= self.capacity {
            return Err(ReplayError::Full);
        }
        seen.by_jti.insert(jti.to_string(), expires);
        seen.by_expiry.insert((expires, jti.to_string()));
        drop(seen);
        Ok(())
    }

    /// Forgets an admitted identifier so a redelivery is accepted.
    pub fn release(&self, jti: &str) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(expires) = seen.by_jti.remove(jti.trim()) {
            seen.by_expiry.remove(&(expires, jti.trim().to_string()));
        }
    }

    /// Returns the number of identifiers currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).by_jti.len()
    }

    /// Returns true when no identifiers are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
