// crates/agent-gate-config/src/lib.rs
// ============================================================================
// Module: Agent Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for agent-gate.toml semantics.
// Dependencies: agent-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `agent-gate-config` defines the configuration model for the Agent Gate
//! server and CLI. Validation is strict and fails closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
