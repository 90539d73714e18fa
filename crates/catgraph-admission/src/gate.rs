//! # Resolver Gate
//!
//! Wraps a field's resolver so that it runs only after the field's rule tree
//! admits the caller. A denied field never polls its resolver future, so no
//! upstream or store I/O happens on its behalf.
//!
//! Fields without a policy are unguarded and always run.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::RuleEngine;
use crate::error::Denial;
use crate::identity::IdentityContext;
use crate::limiter::WindowLimiter;
use crate::metrics::AdmissionMetrics;
use crate::policy::PolicySet;
use crate::rule::Verdict;

/// Outcome of a gated resolution that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum GateError<E> {
    #[error(transparent)]
    Denied(Denial),
    #[error("resolver failed: {0}")]
    Resolver(E),
}

impl<E> GateError<E> {
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Denied(denial) => Some(denial),
            Self::Resolver(_) => None,
        }
    }
}

/// Shared admission entry point. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ResolverGate {
    policies: Arc<PolicySet>,
    engine: RuleEngine,
    metrics: AdmissionMetrics,
}

impl ResolverGate {
    pub fn new(policies: Arc<PolicySet>, limiter: WindowLimiter) -> Self {
        Self {
            policies,
            engine: RuleEngine::new(limiter),
            metrics: AdmissionMetrics::new(),
        }
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn metrics(&self) -> &AdmissionMetrics {
        &self.metrics
    }

    pub fn limiter(&self) -> &WindowLimiter {
        self.engine.limiter()
    }

    /// Whether admitting `field_path` needs the resource owner first.
    pub fn requires_owner(&self, field_path: &str) -> bool {
        self.policies
            .get(field_path)
            .is_some_and(|policy| policy.rule.requires_ownership())
    }

    /// Decide admission for one field resolution.
    pub fn admit(
        &self,
        field_path: &str,
        ctx: &IdentityContext,
        resource_owner: Option<&str>,
    ) -> Result<(), Denial> {
        self.admit_at(field_path, ctx, resource_owner, Instant::now())
    }

    /// [`admit`](Self::admit) with an explicit clock.
    pub fn admit_at(
        &self,
        field_path: &str,
        ctx: &IdentityContext,
        resource_owner: Option<&str>,
        now: Instant,
    ) -> Result<(), Denial> {
        let Some(policy) = self.policies.get(field_path) else {
            self.metrics.record_unguarded();
            return Ok(());
        };

        match self
            .engine
            .evaluate_at(&policy.rule, field_path, ctx, resource_owner, now)
        {
            Verdict::Allow => {
                self.metrics.record_admitted();
                tracing::debug!(
                    field = field_path,
                    request_id = ctx.request_id(),
                    "field admitted"
                );
                Ok(())
            }
            Verdict::Deny(reason) => {
                let denial = Denial::new(field_path, reason);
                self.metrics.record_denied(denial.kind);
                tracing::info!(
                    field = field_path,
                    reason = %denial.kind,
                    detail = %denial.detail,
                    request_id = ctx.request_id(),
                    "field denied"
                );
                Err(denial)
            }
        }
    }

    /// Run `resolver` only if `field_path` admits `ctx`.
    pub async fn guard<T, E, F, Fut>(
        &self,
        field_path: &str,
        ctx: &IdentityContext,
        resolver: F,
    ) -> Result<T, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit(field_path, ctx, None).map_err(GateError::Denied)?;
        resolver().await.map_err(GateError::Resolver)
    }

    /// Like [`guard`](Self::guard) for fields whose policy may check
    /// ownership. `owner_lookup` runs only when the policy needs the owner;
    /// a lookup that finds nothing leaves the owner unknown, which the
    /// ownership predicate denies.
    pub async fn guard_owned<T, E, L, LFut, F, Fut>(
        &self,
        field_path: &str,
        ctx: &IdentityContext,
        owner_lookup: L,
        resolver: F,
    ) -> Result<T, GateError<E>>
    where
        L: FnOnce() -> LFut,
        LFut: Future<Output = Result<Option<String>, E>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let owner = if self.requires_owner(field_path) {
            owner_lookup().await.map_err(GateError::Resolver)?
        } else {
            None
        };
        self.admit(field_path, ctx, owner.as_deref())
            .map_err(GateError::Denied)?;
        resolver().await.map_err(GateError::Resolver)
    }
}
