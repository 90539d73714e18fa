//! Identity service client configuration.

use url::Url;

/// Default request timeout for identity service calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the identity service lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    /// Base URL, e.g. `http://localhost:3000/api/v1`.
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AuthServiceConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Parse a base URL string, keeping the default timeout.
    pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl("AUTH_URL".to_string(), e.to_string()))?;
        Ok(Self::new(url))
    }

    /// Load configuration from environment variables.
    ///
    /// - `AUTH_URL` (required)
    /// - `AUTH_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("AUTH_URL").map_err(|_| ConfigError::MissingUrl)?;
        let mut config = Self::parse(&raw)?;
        config.timeout_secs = std::env::var("AUTH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(config)
    }

    /// `{base_url}/{path}` without doubling the slash.
    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("AUTH_URL environment variable is required")]
    MissingUrl,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
