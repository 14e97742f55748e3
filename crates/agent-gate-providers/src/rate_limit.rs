// crates/agent-gate-providers/src/rate_limit.rs
// ============================================================================
// Module: Provider Rate Limiter
// Description: Token bucket pacing outbound provider lookups.
// Purpose: Keep request rates under upstream quotas without blocking decisions.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! One [`TokenBucket`] is owned by each provider. Limiting is advisory: a
//! caller that cannot obtain a token within its wait budget proceeds anyway,
//! and the bypass is reported so it can be audited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

// ============================================================================
// SECTION: Token Bucket
// ============================================================================

/// Mutable bucket state.
#[derive(Debug)]
struct TokenBucketState {
    /// Tokens currently available (fractional).
    tokens: f64,
    /// Last refill instant.
    last_refill: Instant,
}

/// Token bucket supporting fractional refill rates.
///
/// # Invariants
/// - `tokens` never exceeds `capacity`.
/// - A non-positive rate disables limiting.
#[derive(Debug)]
pub struct TokenBucket {
    /// Refill rate in tokens per second.
    rate_per_sec: f64,
    /// Maximum tokens held.
    capacity: f64,
    /// Guarded bucket state.
    state: Mutex<TokenBucketState>,
}

impl TokenBucket {
    /// Creates a full bucket.
    #[must_use]
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            rate_per_sec: rate_per_sec.max(0.0),
            capacity,
            state: Mutex::new(TokenBucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        if self.rate_per_sec <= 0.0 {
            return;
        }
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let needed = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64((needed / self.rate_per_sec).max(0.0)))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Takes a token, waiting at most `max_wait`.
    ///
    /// Returns `false` when the wait budget expired without a token.
    pub async fn acquire_within(&self, max_wait: Duration) -> bool {
        tokio::time::timeout(max_wait, self.acquire()).await.is_ok()
    }

    /// Adds tokens for the time elapsed since the last refill.
    fn refill(&self, state: &mut TokenBucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        state.tokens = elapsed.mul_add(self.rate_per_sec, state.tokens).min(self.capacity);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
