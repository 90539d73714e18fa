//! # Application State
//!
//! Shared across all request handlers via Axum's `State` extractor. All
//! fields are cheap to clone.

use std::sync::Arc;

use catgraph_admission::{IdentityResolver, PolicySet, ResolverGate, WindowLimiter};
use catgraph_auth_client::AuthClient;

use crate::graph::FieldRegistry;
use crate::middleware::metrics::ApiMetrics;
use crate::resolvers;
use crate::store::{CatStore, MemoryCatStore};

#[derive(Clone)]
pub struct AppState {
    /// Admission gate wrapping every field resolver.
    pub gate: ResolverGate,
    /// Bearer token to identity context, once per request.
    pub identity: IdentityResolver,
    pub cats: Arc<dyn CatStore>,
    /// Identity service client; `None` when `AUTH_URL` is unset.
    pub auth: Option<AuthClient>,
    pub metrics: ApiMetrics,
    pub registry: Arc<FieldRegistry>,
}

impl AppState {
    pub fn new(
        policies: Arc<PolicySet>,
        limiter: WindowLimiter,
        identity: IdentityResolver,
        cats: Arc<dyn CatStore>,
        auth: Option<AuthClient>,
    ) -> Self {
        Self {
            gate: ResolverGate::new(policies, limiter),
            identity,
            cats,
            auth,
            metrics: ApiMetrics::new(),
            registry: Arc::new(resolvers::registry()),
        }
    }

    /// In-memory store, default limiter, anonymous callers only.
    pub fn in_memory(policies: PolicySet) -> Self {
        Self::new(
            Arc::new(policies),
            WindowLimiter::default(),
            IdentityResolver::anonymous_only(),
            Arc::new(MemoryCatStore::new()),
            None,
        )
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_cats(mut self, cats: Arc<dyn CatStore>) -> Self {
        self.cats = cats;
        self
    }

    pub fn with_auth_client(mut self, auth: AuthClient) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("policies", &self.gate.policies().len())
            .field("fields", &self.registry.len())
            .field("auth", &self.auth.as_ref().map(|c| c.config().base_url.as_str()))
            .finish_non_exhaustive()
    }
}
