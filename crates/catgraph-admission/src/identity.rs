//! # Identity Context
//!
//! Turns the raw credential of an inbound request into an
//! [`IdentityContext`] exactly once per request. The context is immutable
//! and is passed by reference to every field resolution of that request.
//!
//! Resolution never fails. A missing token gives an anonymous context; a
//! token the upstream service rejects, or a lookup that errors or times out,
//! also gives an anonymous context. Whether anonymity blocks a field is the
//! rule tree's decision, not this module's.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::IdentityLookupError;

/// Rate-limit identity shared by every caller without a subject id.
pub const ANONYMOUS: &str = "anonymous";

/// Default bound on the single upstream identity lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// The caller of one request.
///
/// Custom `Debug` redacts the token to keep credentials out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityContext {
    subject_id: Option<String>,
    role: Option<String>,
    token: Option<String>,
    request_id: String,
}

impl IdentityContext {
    /// A caller with no verified identity.
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            subject_id: None,
            role: None,
            token: None,
            request_id: request_id.into(),
        }
    }

    /// A caller verified by the identity service.
    pub fn authenticated(
        request_id: impl Into<String>,
        subject_id: impl Into<String>,
        role: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            role: Some(role.into()),
            token: Some(token.into()),
            request_id: request_id.into(),
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// The verified bearer token, forwarded by resolvers that call the
    /// identity service on the caller's behalf.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject_id.is_none()
    }

    /// Identity half of the limiter key.
    pub fn rate_limit_identity(&self) -> &str {
        self.subject_id.as_deref().unwrap_or(ANONYMOUS)
    }
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("subject_id", &self.subject_id)
            .field("role", &self.role)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// What the identity service says about a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamIdentity {
    pub subject_id: String,
    pub role: String,
}

/// The external authentication collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the subject behind `token`. Called at most once per request.
    async fn lookup(&self, token: &str) -> Result<UpstreamIdentity, IdentityLookupError>;
}

/// Extract the credential from an `Authorization` header value.
///
/// Only the `Bearer` scheme (case-insensitive) is recognised; anything else,
/// or an empty credential, counts as no token.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Fixed token table. Used for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, UpstreamIdentity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        token: impl Into<String>,
        subject_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        self.tokens.insert(
            token.into(),
            UpstreamIdentity {
                subject_id: subject_id.into(),
                role: role.into(),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn lookup(&self, token: &str) -> Result<UpstreamIdentity, IdentityLookupError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityLookupError::Rejected("unknown token".into()))
    }
}

/// Builds one [`IdentityContext`] per request.
#[derive(Clone)]
pub struct IdentityResolver {
    provider: Option<Arc<dyn IdentityProvider>>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider: Some(provider),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// A resolver with no upstream: every caller is anonymous.
    pub fn anonymous_only() -> Self {
        Self {
            provider: None,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the caller under a freshly generated request id.
    pub async fn resolve(&self, bearer: Option<&str>) -> IdentityContext {
        self.resolve_with_request_id(bearer, Uuid::new_v4().to_string())
            .await
    }

    /// Resolve the caller. One upstream call at most, never retried.
    pub async fn resolve_with_request_id(
        &self,
        bearer: Option<&str>,
        request_id: String,
    ) -> IdentityContext {
        let Some(token) = bearer.filter(|t| !t.is_empty()) else {
            return IdentityContext::anonymous(request_id);
        };
        let Some(provider) = self.provider.as_ref() else {
            tracing::debug!(%request_id, "no identity provider configured, caller is anonymous");
            return IdentityContext::anonymous(request_id);
        };

        match tokio::time::timeout(self.timeout, provider.lookup(token)).await {
            Ok(Ok(identity)) => {
                tracing::debug!(
                    %request_id,
                    subject_id = %identity.subject_id,
                    role = %identity.role,
                    "caller identified"
                );
                IdentityContext::authenticated(request_id, identity.subject_id, identity.role, token)
            }
            Ok(Err(IdentityLookupError::Rejected(reason))) => {
                tracing::info!(%request_id, %reason, "bearer token rejected, caller is anonymous");
                IdentityContext::anonymous(request_id)
            }
            Ok(Err(err @ IdentityLookupError::Unavailable(_))) => {
                tracing::warn!(%request_id, error = %err, "identity lookup failed, caller is anonymous");
                IdentityContext::anonymous(request_id)
            }
            Err(_) => {
                tracing::warn!(
                    %request_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "identity lookup timed out, caller is anonymous"
                );
                IdentityContext::anonymous(request_id)
            }
        }
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("provider", &self.provider.as_ref().map(|_| "dyn IdentityProvider"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
