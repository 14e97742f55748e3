// crates/agent-gate-providers/src/cached.rs
// ============================================================================
// Module: Cached Trust Provider
// Description: TTL cache, rate limiting, and fail-open policy around a source.
// Purpose: Implement the provider decision algorithm once for every source.
// Dependencies: agent-gate-core, crate::{rate_limit, source}
// ============================================================================

//! ## Overview
//! [`CachedTrustProvider`] answers from the trust cache while the cached
//! record is fresh and refreshes it from the source otherwise. Refresh
//! failures degrade to the cached record's negative signal only:
//! - no cached record, or the provider never knew the agent: permit;
//! - a cached record that blocks: deny;
//! - the cache could not be read: deny, since a blocking record may exist.
//!
//! A successful fetch decides on its own even when the cache read failed.
//! Cache write failures are audited and the fresh record is still used for
//! the decision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use agent_gate_core::AgentId;
use agent_gate_core::AuditSink;
use agent_gate_core::Clock;
use agent_gate_core::ProviderId;
use agent_gate_core::TRUST_RECORD_TTL;
use agent_gate_core::TrustCache;
use agent_gate_core::TrustProvider;
use agent_gate_core::TrustRecord;
use agent_gate_core::audit::ProviderCheckAuditEvent;
use agent_gate_core::audit::ProviderCheckAuditParams;
use agent_gate_core::audit::ProviderCheckOutcome;
use async_trait::async_trait;

use crate::rate_limit::TokenBucket;
use crate::source::TrustSource;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Caching and pacing policy for one provider.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Maximum age of a cached record.
    pub ttl: Duration,
    /// Refill rate of the provider's token bucket.
    pub rate_per_sec: f64,
    /// Token bucket capacity.
    pub burst: u32,
    /// Longest wait for a rate limiter token before proceeding anyway.
    pub rate_limit_wait: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: TRUST_RECORD_TTL,
            rate_per_sec: 5.0,
            burst: 10,
            rate_limit_wait: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Trust provider backed by a cache, a rate limiter, and a [`TrustSource`].
pub struct CachedTrustProvider<S> {
    /// Network lookup and blocking predicate.
    source: S,
    /// Durable record cache.
    cache: Arc<dyn TrustCache>,
    /// Time source for freshness checks.
    clock: Arc<dyn Clock>,
    /// Audit sink for per-provider checks.
    audit: Arc<dyn AuditSink>,
    /// Outbound request pacing.
    limiter: TokenBucket,
    /// Caching policy.
    policy: CachePolicy,
}

impl<S: TrustSource> CachedTrustProvider<S> {
    /// Wraps `source` with the given cache and policy.
    #[must_use]
    pub fn new(
        source: S,
        cache: Arc<dyn TrustCache>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            source,
            cache,
            clock,
            audit,
            limiter: TokenBucket::new(policy.rate_per_sec, policy.burst),
            policy,
        }
    }

    /// Returns the wrapped source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Loads the cached record, returning the read error separately.
    fn cached_record(&self, agent: &AgentId) -> (Option<TrustRecord>, Option<String>) {
        match self.cache.load(self.source.provider_id(), agent) {
            Ok(record) => (record, None),
            Err(err) => (None, Some(err.to_string())),
        }
    }

    /// Returns true when the record exists, names the agent, and blocks.
    fn blocked_by(&self, record: Option<&TrustRecord>) -> bool {
        record.is_some_and(|record| record.is_known() && self.source.blocks(record))
    }

    /// Emits one provider check audit event.
    fn audit_check(&self, agent: &AgentId, check: CheckReport) {
        self.audit.record_provider_check(&ProviderCheckAuditEvent::new(ProviderCheckAuditParams {
            provider: self.source.provider_id().to_string(),
            agent: agent.to_string(),
            outcome: check.outcome,
            permitted: check.permitted,
            rate_limit_bypassed: check.rate_limit_bypassed,
            error: check.error,
        }));
    }
}

#[async_trait]
impl<S: TrustSource> TrustProvider for CachedTrustProvider<S> {
    fn provider_id(&self) -> &ProviderId {
        self.source.provider_id()
    }

    async fn authorize(&self, agent: &AgentId) -> bool {
        let now = self.clock.now();
        let (cached, read_error) = self.cached_record(agent);
        if let Some(record) = cached.as_ref().filter(|record| {
            record.is_known() && !record.is_stale(now, self.policy.ttl)
        }) {
            let permitted = !self.source.blocks(record);
            self.audit_check(agent, CheckReport::new(ProviderCheckOutcome::Cached, permitted));
            return permitted;
        }

        let rate_limit_bypassed = !self.limiter.acquire_within(self.policy.rate_limit_wait).await;
        match self.source.fetch(agent, self.clock.now()).await {
            Ok(fresh) => {
                let write_error = self
                    .cache
                    .store(self.source.provider_id(), agent, &fresh)
                    .err()
                    .map(|err| err.to_string());
                let permitted = !self.blocked_by(Some(&fresh));
                self.audit_check(agent, CheckReport {
                    outcome: ProviderCheckOutcome::Fresh,
                    permitted,
                    rate_limit_bypassed,
                    error: write_error.or(read_error),
                });
                permitted
            }
            Err(err) => {
                let permitted = read_error.is_none() && !self.blocked_by(cached.as_ref());
                let outcome = if permitted {
                    ProviderCheckOutcome::FailOpen
                } else {
                    ProviderCheckOutcome::FailSecure
                };
                let error = match read_error {
                    Some(read_error) => format!("{err}; cache read failed: {read_error}"),
                    None => err.to_string(),
                };
                self.audit_check(agent, CheckReport {
                    outcome,
                    permitted,
                    rate_limit_bypassed,
                    error: Some(error),
                });
                permitted
            }
        }
    }

    async fn authorize_offline(&self, agent: &AgentId) -> bool {
        let (cached, read_error) = self.cached_record(agent);
        let permitted = read_error.is_none() && !self.blocked_by(cached.as_ref());
        let mut report = CheckReport::new(ProviderCheckOutcome::Offline, permitted);
        report.error = read_error;
        self.audit_check(agent, report);
        permitted
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Audit fields for one check.
struct CheckReport {
    /// How the verdict was reached.
    outcome: ProviderCheckOutcome,
    /// Verdict.
    permitted: bool,
    /// Rate limiter wait expired.
    rate_limit_bypassed: bool,
    /// Error encountered, if any.
    error: Option<String>,
}

impl CheckReport {
    /// Creates a report without bypass or error.
    const fn new(outcome: ProviderCheckOutcome, permitted: bool) -> Self {
        Self {
            outcome,
            permitted,
            rate_limit_bypassed: false,
            error: None,
        }
    }
}
