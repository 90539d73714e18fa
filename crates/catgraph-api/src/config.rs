//! # Gateway Configuration
//!
//! Read from the environment at startup. The CLI overrides individual
//! values with flags before building the application.

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

/// Runtime configuration of the gateway.
///
/// Custom `Debug` redacts `database_url`, which usually carries a password.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Port to listen on. `PORT`, default 8080.
    pub port: u16,
    /// Identity service base URL. `AUTH_URL`; when unset every caller is
    /// anonymous and user fields answer `SERVICE_UNAVAILABLE`.
    pub auth_url: Option<String>,
    /// Timeout for identity service resolver calls. `AUTH_TIMEOUT_SECS`, default 10.
    pub auth_timeout_secs: u64,
    /// Bound on the per-request identity lookup. `IDENTITY_TIMEOUT_MS`, default 5000.
    pub identity_timeout: Duration,
    /// Policy document. `POLICY_FILE`; the built-in reference policy when unset.
    pub policy_file: Option<PathBuf>,
    /// Postgres connection string. `DATABASE_URL`; in-memory store when unset.
    pub database_url: Option<Zeroizing<String>>,
    /// Interval of the limiter's idle sweep. `LIMITER_SWEEP_SECS`, default 30.
    pub limiter_sweep: Duration,
    /// Limiter table size that triggers an inline sweep. `LIMITER_MAX_ENTRIES`.
    pub limiter_max_entries: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_url: None,
            auth_timeout_secs: catgraph_auth_client::config::DEFAULT_TIMEOUT_SECS,
            identity_timeout: catgraph_admission::identity::DEFAULT_LOOKUP_TIMEOUT,
            policy_file: None,
            database_url: None,
            limiter_sweep: Duration::from_secs(30),
            limiter_max_entries: catgraph_admission::LimiterConfig::default().max_entries,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("auth_url", &self.auth_url)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .field("identity_timeout", &self.identity_timeout)
            .field("policy_file", &self.policy_file)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("limiter_sweep", &self.limiter_sweep)
            .field("limiter_max_entries", &self.limiter_max_entries)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables. Unparseable numbers
    /// fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            auth_url: non_empty("AUTH_URL"),
            auth_timeout_secs: parsed("AUTH_TIMEOUT_SECS").unwrap_or(defaults.auth_timeout_secs),
            identity_timeout: parsed("IDENTITY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.identity_timeout),
            policy_file: non_empty("POLICY_FILE").map(PathBuf::from),
            database_url: non_empty("DATABASE_URL").map(Zeroizing::new),
            limiter_sweep: parsed("LIMITER_SWEEP_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.limiter_sweep),
            limiter_max_entries: parsed("LIMITER_MAX_ENTRIES")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.limiter_max_entries),
        }
    }
}
