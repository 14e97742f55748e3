// crates/agent-gate-server/src/lib.rs
// ============================================================================
// Module: Agent Gate Server Library
// Description: Security event pipeline and runtime assembly.
// Purpose: Host the webhook receiver, key refresh, and event dispatch.
// Dependencies: agent-gate-{config, core, providers, store-sqlite}, axum, jsonwebtoken
// ============================================================================

//! ## Overview
//! The server crate owns everything driven by the identity issuer: the
//! signing key cache, bundle verification, the webhook receiver, and the
//! serial dispatcher that mutates account state. [`AgentGateServer`] wires
//! those together with the authorizer from validated configuration.
//! Security posture: webhook bodies and fetched key documents are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dispatch;
pub mod keys;
pub mod pipeline;
pub mod replay;
pub mod server;
pub mod token;
pub mod webhook;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dispatch::DispatchOutcome;
pub use dispatch::EventDispatcher;
pub use keys::KeySetError;
pub use keys::KeySetFetcher;
pub use keys::KeySetRefresher;
pub use keys::KeySource;
pub use keys::MAX_KEY_DOCUMENT_BYTES;
pub use keys::SigningKeySet;
pub use pipeline::PipelineCollaborators;
pub use pipeline::PipelineSettings;
pub use pipeline::SecurityEventPipeline;
pub use replay::ReplayError;
pub use replay::ReplayGuard;
pub use server::AgentGateServer;
pub use server::ServerError;
pub use token::BundleError;
pub use token::BundleVerifier;
pub use token::VerifiedBundle;
pub use webhook::WebhookState;
pub use webhook::webhook_router;
