// crates/agent-gate-providers/src/lib.rs
// ============================================================================
// Module: Agent Gate Providers
// Description: Built-in trust providers for Agent Gate.
// Purpose: Provide cached, rate-limited reputation lookups.
// Dependencies: agent-gate-core, reqwest, serde, tokio
// ============================================================================

//! ## Overview
//! This crate implements the trust provider decision algorithm once
//! ([`CachedTrustProvider`]) and plugs concrete reputation services into it
//! through [`TrustSource`]. New services implement [`TrustSource`] and are
//! registered; the orchestrator does not change.
//! Security posture: provider responses are untrusted; network failures never
//! deny an agent without cached negative evidence.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod builtin;
pub mod cached;
pub mod community;
pub mod http;
pub mod rate_limit;
pub mod reputation;
pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builtin::BuiltinProviderError;
pub use builtin::BuiltinProviderSettings;
pub use builtin::BuiltinProviders;
pub use builtin::ProviderContext;
pub use builtin::register_builtin_providers;
pub use cached::CachePolicy;
pub use cached::CachedTrustProvider;
pub use community::COMMUNITY_PROVIDER_ID;
pub use community::CommunitySource;
pub use http::DEFAULT_PROVIDER_TIMEOUT;
pub use http::HttpSourceConfig;
pub use http::ProviderHttpClient;
pub use http::ResponseReadError;
pub use http::read_response_limited;
pub use rate_limit::TokenBucket;
pub use reputation::REPUTATION_PROVIDER_ID;
pub use reputation::ReputationSource;
pub use source::ProviderError;
pub use source::TrustSource;
