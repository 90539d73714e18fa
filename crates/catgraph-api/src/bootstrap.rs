//! # Gateway Bootstrap
//!
//! Builds [`AppState`] from a [`GatewayConfig`] at startup:
//!
//! 1. **Load policies**: `POLICY_FILE` or the built-in reference policy.
//!    Any policy error aborts startup.
//! 2. **Identity service**: when `AUTH_URL` is set, one client serves both
//!    token lookups and user field resolvers.
//! 3. **Cat store**: Postgres when `DATABASE_URL` is set, otherwise in memory.
//! 4. **Limiter**: fresh table sized by `LIMITER_MAX_ENTRIES`.

use std::sync::Arc;

use catgraph_admission::{ConfigurationError, IdentityResolver, LimiterConfig, PolicySet, WindowLimiter};
use catgraph_auth_client::{AuthApiError, AuthClient, AuthServiceConfig, ConfigError};

use crate::auth::AuthServiceIdentityProvider;
use crate::config::GatewayConfig;
use crate::state::AppState;
use crate::store::{init_pool, CatStore, MemoryCatStore, PgCatStore};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The policy document is missing or invalid.
    #[error(transparent)]
    Policy(#[from] ConfigurationError),

    #[error("invalid identity service configuration: {0}")]
    AuthConfig(#[from] ConfigError),

    #[error("failed to build identity service client: {0}")]
    AuthClient(#[from] AuthApiError),

    #[error("database initialization failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Load the configured policy set.
pub fn load_policies(config: &GatewayConfig) -> Result<PolicySet, ConfigurationError> {
    match &config.policy_file {
        Some(path) => PolicySet::from_path(path),
        None => PolicySet::reference(),
    }
}

/// Build the application state described by `config`.
pub async fn bootstrap(config: &GatewayConfig) -> Result<AppState, BootstrapError> {
    let policies = load_policies(config)?;
    tracing::info!(
        fields = policies.len(),
        source = %config
            .policy_file
            .as_ref()
            .map_or_else(|| "built-in reference".to_string(), |p| p.display().to_string()),
        "policies loaded"
    );

    let auth = match &config.auth_url {
        Some(url) => {
            let mut auth_config = AuthServiceConfig::parse(url)?;
            auth_config.timeout_secs = config.auth_timeout_secs;
            tracing::info!(url = %auth_config.base_url, "identity service configured");
            Some(AuthClient::new(auth_config)?)
        }
        None => {
            tracing::warn!("AUTH_URL not set: all callers are anonymous and user fields are unavailable");
            None
        }
    };

    let identity = match &auth {
        Some(client) => IdentityResolver::new(Arc::new(AuthServiceIdentityProvider::new(client.clone()))),
        None => IdentityResolver::anonymous_only(),
    }
    .with_timeout(config.identity_timeout);

    let cats: Arc<dyn CatStore> = match &config.database_url {
        Some(url) => Arc::new(PgCatStore::new(init_pool(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set: cats are kept in memory");
            Arc::new(MemoryCatStore::new())
        }
    };

    let limiter = WindowLimiter::new(LimiterConfig {
        max_entries: config.limiter_max_entries,
        ..LimiterConfig::default()
    });

    Ok(AppState::new(Arc::new(policies), limiter, identity, cats, auth))
}
