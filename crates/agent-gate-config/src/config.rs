// crates/agent-gate-config/src/config.rs
// ============================================================================
// Module: Agent Gate Configuration
// Description: Configuration loading and validation for Agent Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: agent-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed.
//! Security posture: config inputs are untrusted; provider API keys are never
//! echoed back in validation errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use agent_gate_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "agent-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "AGENT_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the webhook listener.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default webhook route.
pub(crate) const DEFAULT_WEBHOOK_PATH: &str = "/security/events";
/// Route reserved for the health check.
pub(crate) const HEALTH_PATH: &str = "/healthz";
/// Maximum webhook path length.
pub(crate) const MAX_WEBHOOK_PATH_LENGTH: usize = 256;
/// Default maximum webhook body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
/// Maximum allowed webhook body size in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Minimum timeout or deadline in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum timeout or deadline in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 30_000;
/// Default fan-out deadline in milliseconds.
pub(crate) const DEFAULT_DEADLINE_MS: u64 = 5_000;
/// Default provider request timeout in milliseconds.
pub(crate) const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 3_000;
/// Default provider refill rate.
pub(crate) const DEFAULT_RATE_PER_SEC: f64 = 5.0;
/// Maximum provider refill rate.
pub(crate) const MAX_RATE_PER_SEC: f64 = 10_000.0;
/// Default provider burst.
pub(crate) const DEFAULT_BURST: u32 = 10;
/// Maximum provider burst.
pub(crate) const MAX_BURST: u32 = 10_000;
/// Default wait for a rate limiter token in milliseconds.
pub(crate) const DEFAULT_RATE_LIMIT_WAIT_MS: u64 = 1_000;
/// Minimum cache TTL and key refresh interval in seconds.
pub(crate) const MIN_INTERVAL_SECS: u64 = 60;
/// Maximum cache TTL and key refresh interval in seconds.
pub(crate) const MAX_INTERVAL_SECS: u64 = 86_400;
/// Default cache TTL and key refresh interval in seconds.
pub(crate) const DEFAULT_INTERVAL_SECS: u64 = 3_600;
/// Maximum API key length.
pub(crate) const MAX_API_KEY_LENGTH: usize = 512;
/// Maximum URL length.
pub(crate) const MAX_URL_LENGTH: usize = 2048;
/// Default security event queue capacity.
pub(crate) const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Maximum security event queue capacity.
pub(crate) const MAX_QUEUE_CAPACITY: usize = 65_536;
/// Default oldest accepted security event bundle in seconds.
pub(crate) const DEFAULT_BUNDLE_MAX_AGE_SECS: u64 = 86_400;
/// Maximum accepted bundle age in seconds.
pub(crate) const MAX_BUNDLE_MAX_AGE_SECS: u64 = 7 * 86_400;
/// Maximum number of configured audiences.
pub(crate) const MAX_AUDIENCES: usize = 32;
/// Maximum number of accepted content types.
pub(crate) const MAX_CONTENT_TYPES: usize = 16;
/// Maximum busy timeout for the `SQLite` store in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Agent Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentGateConfig {
    /// Webhook listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authorization orchestrator configuration.
    #[serde(default)]
    pub authorizer: AuthorizerSection,
    /// Built-in trust providers.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Security event pipeline configuration.
    #[serde(default)]
    pub security_events: SecurityEventsConfig,
    /// Trust cache and account store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AgentGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.authorizer.validate()?;
        self.providers.validate()?;
        self.security_events.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Webhook listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted webhook body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Route that receives security event bundles.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            webhook_path: default_webhook_path(),
        }
    }
}

impl ServerConfig {
    /// Validates listener configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_MAX_BODY_BYTES}"
            )));
        }
        let path = self.webhook_path.as_str();
        if !path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "server.webhook_path must start with '/'".to_string(),
            ));
        }
        if path.len() > MAX_WEBHOOK_PATH_LENGTH {
            return Err(ConfigError::Invalid("server.webhook_path exceeds max length".to_string()));
        }
        if path.chars().any(|ch| ch.is_whitespace() || ch.is_control() || ch == '?' || ch == '#')
        {
            return Err(ConfigError::Invalid(
                "server.webhook_path contains invalid characters".to_string(),
            ));
        }
        if path == HEALTH_PATH || path == "/" {
            return Err(ConfigError::Invalid(format!(
                "server.webhook_path must not be {path}"
            )));
        }
        Ok(())
    }

    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind must be a socket address".to_string()))
    }
}

// ============================================================================
// SECTION: Authorizer
// ============================================================================

/// Authorization orchestrator configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AuthorizerSection {
    /// Overall provider fan-out deadline in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for AuthorizerSection {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl AuthorizerSection {
    /// Validates orchestrator configuration.
    fn validate(self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "authorizer.deadline_ms",
            self.deadline_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )
    }

    /// Returns the fan-out deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

// ============================================================================
// SECTION: Providers
// ============================================================================

/// Built-in trust provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    /// Primary reputation service.
    #[serde(default)]
    pub reputation: Option<ProviderConfig>,
    /// Secondary community service.
    #[serde(default)]
    pub community: Option<ProviderConfig>,
}

impl ProvidersConfig {
    /// Validates every configured provider.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.reputation {
            provider.validate("providers.reputation")?;
        }
        if let Some(provider) = &self.community {
            provider.validate("providers.community")?;
        }
        Ok(())
    }
}

/// Settings for one HTTP trust provider.
///
/// # Invariants
/// - Disabled providers are not validated beyond their shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Whether the provider participates in decisions.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// API base URL.
    #[serde(default)]
    pub base_url: String,
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Token bucket refill rate.
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,
    /// Token bucket capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Longest wait for a rate limiter token in milliseconds.
    #[serde(default = "default_rate_limit_wait_ms")]
    pub rate_limit_wait_ms: u64,
    /// Cached record lifetime in seconds.
    #[serde(default = "default_interval_secs")]
    pub cache_ttl_secs: u64,
}

impl ProviderConfig {
    /// Validates one provider section.
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        validate_url(&format!("{section}.base_url"), &self.base_url)?;
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::Invalid(format!("{section}.api_key must be non-empty")));
        }
        if key.len() > MAX_API_KEY_LENGTH {
            return Err(ConfigError::Invalid(format!("{section}.api_key exceeds max length")));
        }
        validate_timeout_range(
            &format!("{section}.timeout_ms"),
            self.timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        if !self.rate_per_sec.is_finite()
            || self.rate_per_sec <= 0.0
            || self.rate_per_sec > MAX_RATE_PER_SEC
        {
            return Err(ConfigError::Invalid(format!(
                "{section}.rate_per_sec must be greater than 0 and at most {MAX_RATE_PER_SEC}"
            )));
        }
        if self.burst == 0 || self.burst > MAX_BURST {
            return Err(ConfigError::Invalid(format!(
                "{section}.burst must be between 1 and {MAX_BURST}"
            )));
        }
        validate_timeout_range(
            &format!("{section}.rate_limit_wait_ms"),
            self.rate_limit_wait_ms,
            0,
            MAX_TIMEOUT_MS,
        )?;
        validate_interval_range(
            &format!("{section}.cache_ttl_secs"),
            self.cache_ttl_secs,
        )
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the longest rate limiter wait.
    #[must_use]
    pub const fn rate_limit_wait(&self) -> Duration {
        Duration::from_millis(self.rate_limit_wait_ms)
    }

    /// Returns the cached record lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

// ============================================================================
// SECTION: Security Events
// ============================================================================

/// Security event pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityEventsConfig {
    /// Whether the webhook and dispatcher run.
    #[serde(default)]
    pub enabled: bool,
    /// Required `iss` claim.
    #[serde(default)]
    pub issuer: String,
    /// Accepted `aud` values; empty disables the audience check.
    #[serde(default)]
    pub audiences: Vec<String>,
    /// Discovery document naming the key set.
    #[serde(default)]
    pub discovery_url: Option<String>,
    /// Direct key set location.
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// Key set refresh interval in seconds.
    #[serde(default = "default_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Bounded dispatcher queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Accepted webhook media types.
    #[serde(default = "default_accepted_content_types")]
    pub accepted_content_types: Vec<String>,
    /// Oldest accepted bundle `iat` in seconds; redelivered `jti` values are
    /// remembered for this long.
    #[serde(default = "default_bundle_max_age_secs")]
    pub bundle_max_age_secs: u64,
}

impl Default for SecurityEventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: String::new(),
            audiences: Vec::new(),
            discovery_url: None,
            jwks_url: None,
            refresh_interval_secs: default_interval_secs(),
            queue_capacity: default_queue_capacity(),
            accepted_content_types: default_accepted_content_types(),
            bundle_max_age_secs: default_bundle_max_age_secs(),
        }
    }
}

impl SecurityEventsConfig {
    /// Validates pipeline configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "security_events.issuer must be non-empty".to_string(),
            ));
        }
        if self.audiences.len() > MAX_AUDIENCES {
            return Err(ConfigError::Invalid(format!(
                "security_events.audiences exceeds {MAX_AUDIENCES} entries"
            )));
        }
        if self.audiences.iter().any(|audience| audience.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "security_events.audiences entries must be non-empty".to_string(),
            ));
        }
        match (&self.discovery_url, &self.jwks_url) {
            (Some(url), None) => validate_url("security_events.discovery_url", url)?,
            (None, Some(url)) => validate_url("security_events.jwks_url", url)?,
            _ => {
                return Err(ConfigError::Invalid(
                    "security_events requires exactly one of discovery_url or jwks_url"
                        .to_string(),
                ));
            }
        }
        validate_interval_range(
            "security_events.refresh_interval_secs",
            self.refresh_interval_secs,
        )?;
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "security_events.queue_capacity must be between 1 and {MAX_QUEUE_CAPACITY}"
            )));
        }
        if !(MIN_INTERVAL_SECS ..= MAX_BUNDLE_MAX_AGE_SECS).contains(&self.bundle_max_age_secs) {
            return Err(ConfigError::Invalid(format!(
                "security_events.bundle_max_age_secs must be between {MIN_INTERVAL_SECS} and \
                 {MAX_BUNDLE_MAX_AGE_SECS}"
            )));
        }
        if self.accepted_content_types.is_empty() {
            return Err(ConfigError::Invalid(
                "security_events.accepted_content_types must be non-empty".to_string(),
            ));
        }
        if self.accepted_content_types.len() > MAX_CONTENT_TYPES {
            return Err(ConfigError::Invalid(format!(
                "security_events.accepted_content_types exceeds {MAX_CONTENT_TYPES} entries"
            )));
        }
        for value in &self.accepted_content_types {
            let trimmed = value.trim();
            if trimmed.is_empty() || trimmed.contains(';') || !trimmed.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "security_events.accepted_content_types entry is not a media type: {trimmed}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the key set refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Returns the oldest accepted bundle age.
    #[must_use]
    pub const fn bundle_max_age(&self) -> Duration {
        Duration::from_secs(self.bundle_max_age_secs)
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Trust cache and account store selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Volatile in-memory store.
    #[default]
    Memory,
    /// Durable `SQLite` store.
    Sqlite(SqliteStoreConfig),
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Memory => Ok(()),
            Self::Sqlite(config) => {
                validate_path_string("store.path", &config.path.to_string_lossy())?;
                if config.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
                    )));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => Err(ConfigError::Invalid(
                "audit.path is required when audit.sink = \"file\"".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Validates an interval in seconds against the shared bounds.
fn validate_interval_range(field: &str, value_secs: u64) -> Result<(), ConfigError> {
    if !(MIN_INTERVAL_SECS ..= MAX_INTERVAL_SECS).contains(&value_secs) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds",
        )));
    }
    Ok(())
}

/// Validates an outbound URL.
///
/// Only absolute http(s) URLs are accepted; plain http is limited to
/// loopback hosts.
fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let (secure, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        (false, rest)
    } else {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    if authority.contains('@') {
        return Err(ConfigError::Invalid(format!("{field} must not embed credentials")));
    }
    if !secure && !is_loopback_authority(authority) {
        return Err(ConfigError::Invalid(format!(
            "{field} must use https unless the host is loopback"
        )));
    }
    Ok(())
}

/// Returns true when the URL authority names a loopback host.
fn is_loopback_authority(authority: &str) -> bool {
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        authority.rsplit_once(':').map_or(authority, |(host, _)| host)
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|addr| addr.is_loopback())
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default webhook body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default webhook route.
fn default_webhook_path() -> String {
    DEFAULT_WEBHOOK_PATH.to_string()
}

/// Default fan-out deadline.
const fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

/// Default boolean flag set to true.
const fn default_true() -> bool {
    true
}

/// Default provider request timeout.
const fn default_provider_timeout_ms() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

/// Default provider refill rate.
const fn default_rate_per_sec() -> f64 {
    DEFAULT_RATE_PER_SEC
}

/// Default provider burst.
const fn default_burst() -> u32 {
    DEFAULT_BURST
}

/// Default rate limiter wait.
const fn default_rate_limit_wait_ms() -> u64 {
    DEFAULT_RATE_LIMIT_WAIT_MS
}

/// Default cache TTL and key refresh interval.
const fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Default security event queue capacity.
const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Default oldest accepted bundle age.
const fn default_bundle_max_age_secs() -> u64 {
    DEFAULT_BUNDLE_MAX_AGE_SECS
}

/// Default accepted webhook media types.
fn default_accepted_content_types() -> Vec<String> {
    vec!["application/secevent+jwt".to_string(), "application/jwt".to_string()]
}

// ============================================================================
// SECTION: Tests
// ============================================================================
