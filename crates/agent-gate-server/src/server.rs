// crates/agent-gate-server/src/server.rs
// ============================================================================
// Module: Agent Gate Server
// Description: Assembles the authorizer and the security event pipeline.
// Purpose: Build every runtime component from validated configuration.
// Dependencies: agent-gate-{config, core, providers, store-sqlite}, axum, tokio
// ============================================================================

//! ## Overview
//! [`AgentGateServer::from_config`] validates the configuration, opens the
//! selected store, builds the audit sink, registers the enabled built-in
//! providers, and constructs the [`Authorizer`]. [`AgentGateServer::serve`]
//! starts the security event pipeline when enabled and serves the webhook and
//! health routes until the shutdown future resolves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use agent_gate_config::AgentGateConfig;
use agent_gate_config::AuditSinkKind;
use agent_gate_config::ProviderConfig;
use agent_gate_config::StoreConfig;
use agent_gate_core::AccountDirectory;
use agent_gate_core::AuditSink;
use agent_gate_core::Authorizer;
use agent_gate_core::AuthorizerConfig;
use agent_gate_core::FileAuditSink;
use agent_gate_core::InMemoryAccountDirectory;
use agent_gate_core::InMemorySessionInvalidator;
use agent_gate_core::InMemoryTrustCache;
use agent_gate_core::NoopAuditSink;
use agent_gate_core::ProviderRegistry;
use agent_gate_core::RevocationLedger;
use agent_gate_core::SessionInvalidator;
use agent_gate_core::StderrAuditSink;
use agent_gate_core::SystemClock;
use agent_gate_core::TrustCache;
use agent_gate_providers::BuiltinProviderSettings;
use agent_gate_providers::BuiltinProviders;
use agent_gate_providers::CachePolicy;
use agent_gate_providers::HttpSourceConfig;
use agent_gate_providers::ProviderContext;
use agent_gate_providers::register_builtin_providers;
use agent_gate_store_sqlite::SqliteTrustStore;
use tokio::net::TcpListener;

use crate::keys::DEFAULT_KEY_FETCH_TIMEOUT;
use crate::keys::DEFAULT_KEY_RETRY_BACKOFF;
use crate::keys::KeySource;
use crate::pipeline::PipelineCollaborators;
use crate::pipeline::PipelineSettings;
use crate::pipeline::SecurityEventPipeline;
use crate::webhook::health_router;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Assembled Agent Gate runtime.
pub struct AgentGateServer {
    /// Validated configuration.
    config: AgentGateConfig,
    /// Authorization entry point.
    authorizer: Arc<Authorizer>,
    /// Account state shared with the pipeline.
    accounts: Arc<dyn AccountDirectory>,
    /// Session layer hook shared with the pipeline.
    sessions: Arc<dyn SessionInvalidator>,
    /// Forced logout signals.
    ledger: Arc<RevocationLedger>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl AgentGateServer {
    /// Builds the runtime from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the configuration is invalid or a
    /// component cannot be initialized.
    pub fn from_config(config: AgentGateConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config)?;
        let (cache, accounts) = build_store(&config)?;
        Self::with_components(config, cache, accounts, audit)
    }

    /// Builds the runtime around caller-supplied storage and audit backends.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the configuration is invalid or a
    /// provider cannot be registered.
    pub fn with_components(
        config: AgentGateConfig,
        cache: Arc<dyn TrustCache>,
        accounts: Arc<dyn AccountDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let mut registry = ProviderRegistry::new();
        let context = ProviderContext {
            cache,
            clock: Arc::new(SystemClock),
            audit: Arc::clone(&audit),
        };
        register_builtin_providers(&mut registry, &builtin_providers(&config), &context)
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let authorizer = Arc::new(Authorizer::new(
            Arc::new(registry),
            Arc::clone(&accounts),
            Arc::clone(&audit),
            AuthorizerConfig {
                deadline: config.authorizer.deadline(),
            },
        ));
        Ok(Self {
            config,
            authorizer,
            accounts,
            sessions: Arc::new(InMemorySessionInvalidator::new()),
            ledger: Arc::new(RevocationLedger::new()),
            audit,
        })
    }

    /// Returns the authorization entry point.
    #[must_use]
    pub fn authorizer(&self) -> Arc<Authorizer> {
        Arc::clone(&self.authorizer)
    }

    /// Returns the revocation ledger consulted by the session layer.
    #[must_use]
    pub fn ledger(&self) -> Arc<RevocationLedger> {
        Arc::clone(&self.ledger)
    }

    /// Returns the account directory.
    #[must_use]
    pub fn accounts(&self) -> Arc<dyn AccountDirectory> {
        Arc::clone(&self.accounts)
    }

    /// Returns the validated configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentGateConfig {
        &self.config
    }

    /// Starts the security event pipeline when it is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Init`] when the key fetch client cannot be
    /// built.
    pub async fn start_pipeline(&self) -> Result<Option<SecurityEventPipeline>, ServerError> {
        let Some(settings) = pipeline_settings(&self.config) else {
            return Ok(None);
        };
        let collaborators = PipelineCollaborators {
            accounts: Arc::clone(&self.accounts),
            sessions: Arc::clone(&self.sessions),
            ledger: Arc::clone(&self.ledger),
            audit: Arc::clone(&self.audit),
        };
        SecurityEventPipeline::start(settings, collaborators)
            .await
            .map(Some)
            .map_err(|err| ServerError::Init(err.to_string()))
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding, pipeline startup, or serving
    /// fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_with_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// stops the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when pipeline startup or serving fails.
    pub async fn serve_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pipeline = self.start_pipeline().await?;
        let app = pipeline
            .as_ref()
            .map_or_else(health_router, |pipeline| {
                pipeline.router(&self.config.server.webhook_path)
            });
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()));
        if let Some(pipeline) = pipeline {
            pipeline.shutdown().await;
        }
        served
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the configured audit sink.
fn build_audit_sink(config: &AgentGateConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    match config.audit.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config.audit.path.as_deref().ok_or_else(|| {
                ServerError::Config("audit.path is required for the file sink".to_string())
            })?;
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit sink: {err}")))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Trust cache and account directory pair.
type StorePair = (Arc<dyn TrustCache>, Arc<dyn AccountDirectory>);

/// Opens the configured store.
fn build_store(config: &AgentGateConfig) -> Result<StorePair, ServerError> {
    match &config.store {
        StoreConfig::Memory => {
            Ok((Arc::new(InMemoryTrustCache::new()), Arc::new(InMemoryAccountDirectory::new())))
        }
        StoreConfig::Sqlite(sqlite) => {
            let store =
                SqliteTrustStore::new(sqlite).map_err(|err| ServerError::Init(err.to_string()))?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
    }
}

/// Maps enabled provider sections onto built-in provider settings.
fn builtin_providers(config: &AgentGateConfig) -> BuiltinProviders {
    BuiltinProviders {
        reputation: config.providers.reputation.as_ref().and_then(provider_settings),
        community: config.providers.community.as_ref().and_then(provider_settings),
    }
}

/// Maps one provider section, skipping disabled providers.
fn provider_settings(section: &ProviderConfig) -> Option<BuiltinProviderSettings> {
    if !section.enabled {
        return None;
    }
    let mut http = HttpSourceConfig::new(section.base_url.trim(), section.api_key.trim());
    http.timeout = section.timeout();
    Some(BuiltinProviderSettings {
        http,
        policy: CachePolicy {
            ttl: section.cache_ttl(),
            rate_per_sec: section.rate_per_sec,
            burst: section.burst,
            rate_limit_wait: section.rate_limit_wait(),
        },
    })
}

/// Maps the security event section onto pipeline settings.
fn pipeline_settings(config: &AgentGateConfig) -> Option<PipelineSettings> {
    let section = &config.security_events;
    if !section.enabled {
        return None;
    }
    let key_source = match (&section.jwks_url, &section.discovery_url) {
        (Some(url), _) => KeySource::Jwks(url.trim().to_string()),
        (None, Some(url)) => KeySource::Discovery(url.trim().to_string()),
        (None, None) => return None,
    };
    Some(PipelineSettings {
        issuer: section.issuer.trim().to_string(),
        audiences: section.audiences.iter().map(|audience| audience.trim().to_string()).collect(),
        key_source,
        refresh_interval: section.refresh_interval(),
        key_fetch_timeout: DEFAULT_KEY_FETCH_TIMEOUT,
        key_retry_backoff: DEFAULT_KEY_RETRY_BACKOFF,
        queue_capacity: section.queue_capacity,
        accepted_content_types: section.accepted_content_types.clone(),
        max_body_bytes: config.server.max_body_bytes,
        bundle_max_age: section.bundle_max_age(),
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
