//! # Rule Engine
//!
//! Depth-first, short-circuiting evaluation of a [`RuleNode`] tree against
//! one caller. Rate-limit nodes consume budget as they are reached, so the
//! order of children in `and`/`or` is part of the policy: a node that is
//! never reached never consumes.

use std::time::Instant;

use crate::identity::IdentityContext;
use crate::limiter::{LimitDecision, LimitKey, WindowLimiter};
use crate::rule::{DenyReason, RuleNode, Verdict};

/// Evaluates rule trees, consulting a shared [`WindowLimiter`].
#[derive(Debug, Clone)]
pub struct RuleEngine {
    limiter: WindowLimiter,
}

impl RuleEngine {
    pub fn new(limiter: WindowLimiter) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &WindowLimiter {
        &self.limiter
    }

    /// Evaluate `rule` for `ctx` calling `field_path`.
    ///
    /// `resource_owner` must already be resolved by the caller when the tree
    /// contains `RequireOwnership`; `None` means "no owner known", which
    /// denies.
    pub fn evaluate(
        &self,
        rule: &RuleNode,
        field_path: &str,
        ctx: &IdentityContext,
        resource_owner: Option<&str>,
    ) -> Verdict {
        self.evaluate_at(rule, field_path, ctx, resource_owner, Instant::now())
    }

    /// [`evaluate`](Self::evaluate) with an explicit clock for the limiter.
    pub fn evaluate_at(
        &self,
        rule: &RuleNode,
        field_path: &str,
        ctx: &IdentityContext,
        resource_owner: Option<&str>,
        now: Instant,
    ) -> Verdict {
        match rule {
            RuleNode::Allow => Verdict::Allow,
            RuleNode::Deny => Verdict::Deny(DenyReason::Forbidden),
            RuleNode::RequireRole(role) => {
                if ctx.role() == Some(role.as_str()) {
                    Verdict::Allow
                } else {
                    Verdict::Deny(DenyReason::RoleMismatch)
                }
            }
            RuleNode::RequireOwnership => match (ctx.subject_id(), resource_owner) {
                (Some(subject), Some(owner)) if subject == owner => Verdict::Allow,
                _ => Verdict::Deny(DenyReason::NotOwner),
            },
            RuleNode::RateLimited {
                window,
                max_count,
                next,
            } => {
                let key = LimitKey::new(ctx.rate_limit_identity(), field_path);
                match self
                    .limiter
                    .check_and_consume_at(&key, *window, *max_count, now)
                {
                    LimitDecision::Denied => Verdict::Deny(DenyReason::RateLimitExceeded),
                    LimitDecision::Allowed => {
                        self.evaluate_at(next, field_path, ctx, resource_owner, now)
                    }
                }
            }
            RuleNode::And(children) => {
                for child in children {
                    let verdict = self.evaluate_at(child, field_path, ctx, resource_owner, now);
                    if !verdict.is_allow() {
                        return verdict;
                    }
                }
                Verdict::Allow
            }
            RuleNode::Or(children) => {
                // No children means no way in.
                let mut last = Verdict::Deny(DenyReason::Forbidden);
                for child in children {
                    last = self.evaluate_at(child, field_path, ctx, resource_owner, now);
                    if last.is_allow() {
                        return Verdict::Allow;
                    }
                }
                last
            }
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(WindowLimiter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FIELD: &str = "Mutation.updateCat";

    fn user(id: &str, role: &str) -> IdentityContext {
        IdentityContext::authenticated("req-1", id, role, "tok")
    }

    fn anon() -> IdentityContext {
        IdentityContext::anonymous("req-1")
    }

    #[test]
    fn leaves() {
        let engine = RuleEngine::default();
        let ctx = user("u1", "user");
        assert_eq!(engine.evaluate(&RuleNode::Allow, FIELD, &ctx, None), Verdict::Allow);
        assert_eq!(
            engine.evaluate(&RuleNode::Deny, FIELD, &ctx, None),
            Verdict::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn require_role_matches_exactly() {
        let engine = RuleEngine::default();
        let admin_rule = RuleNode::require_role("admin");
        assert_eq!(
            engine.evaluate(&admin_rule, FIELD, &user("a", "admin"), None),
            Verdict::Allow
        );
        assert_eq!(
            engine.evaluate(&admin_rule, FIELD, &user("u", "user"), None),
            Verdict::Deny(DenyReason::RoleMismatch)
        );
        assert_eq!(
            engine.evaluate(&admin_rule, FIELD, &user("u", "administrator"), None),
            Verdict::Deny(DenyReason::RoleMismatch)
        );
        assert_eq!(
            engine.evaluate(&admin_rule, FIELD, &anon(), None),
            Verdict::Deny(DenyReason::RoleMismatch)
        );
    }

    #[test]
    fn require_ownership_truth_table() {
        let engine = RuleEngine::default();
        let rule = RuleNode::RequireOwnership;
        let cases: [(IdentityContext, Option<&str>, Verdict); 5] = [
            (user("u1", "user"), Some("u1"), Verdict::Allow),
            (user("u1", "user"), Some("u2"), Verdict::Deny(DenyReason::NotOwner)),
            (user("u1", "user"), None, Verdict::Deny(DenyReason::NotOwner)),
            (anon(), Some("u1"), Verdict::Deny(DenyReason::NotOwner)),
            (anon(), None, Verdict::Deny(DenyReason::NotOwner)),
        ];
        for (ctx, owner, expected) in cases {
            assert_eq!(
                engine.evaluate(&rule, FIELD, &ctx, owner),
                expected,
                "subject={:?} owner={owner:?}",
                ctx.subject_id()
            );
        }
    }

    #[test]
    fn empty_composites() {
        let engine = RuleEngine::default();
        let ctx = user("u1", "user");
        assert_eq!(engine.evaluate(&RuleNode::And(vec![]), FIELD, &ctx, None), Verdict::Allow);
        assert_eq!(
            engine.evaluate(&RuleNode::Or(vec![]), FIELD, &ctx, None),
            Verdict::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn and_returns_first_denial() {
        let engine = RuleEngine::default();
        let rule = RuleNode::And(vec![
            RuleNode::Allow,
            RuleNode::require_role("admin"),
            RuleNode::Deny,
        ]);
        assert_eq!(
            engine.evaluate(&rule, FIELD, &user("u1", "user"), None),
            Verdict::Deny(DenyReason::RoleMismatch)
        );
    }

    #[test]
    fn or_returns_last_denial_when_nothing_allows() {
        let engine = RuleEngine::default();
        let rule = RuleNode::Or(vec![RuleNode::Deny, RuleNode::RequireOwnership]);
        assert_eq!(
            engine.evaluate(&rule, FIELD, &user("u1", "user"), Some("u2")),
            Verdict::Deny(DenyReason::NotOwner)
        );
    }

    #[test]
    fn and_short_circuits_before_rate_limit() {
        let engine = RuleEngine::default();
        let rule = RuleNode::And(vec![
            RuleNode::require_role("admin"),
            RuleNode::rate_limit(Duration::from_secs(1), 5),
        ]);
        let ctx = anon();
        for _ in 0..10 {
            assert_eq!(
                engine.evaluate(&rule, FIELD, &ctx, None),
                Verdict::Deny(DenyReason::RoleMismatch)
            );
        }
        assert!(engine.limiter().is_empty(), "limiter must not be consulted");
    }

    #[test]
    fn or_short_circuits_on_first_allow() {
        let engine = RuleEngine::default();
        let rule = RuleNode::Or(vec![
            RuleNode::Allow,
            RuleNode::rate_limit(Duration::from_secs(1), 1),
        ]);
        let ctx = user("u1", "user");
        for _ in 0..3 {
            assert_eq!(engine.evaluate(&rule, FIELD, &ctx, None), Verdict::Allow);
        }
        assert!(engine.limiter().is_empty());
    }

    #[test]
    fn rate_limit_denial_skips_next() {
        let engine = RuleEngine::default();
        let rule = RuleNode::rate_limit_then(Duration::from_secs(1), 1, RuleNode::RequireOwnership);
        let ctx = user("u1", "user");
        let t0 = Instant::now();
        assert_eq!(
            engine.evaluate_at(&rule, FIELD, &ctx, Some("u2"), t0),
            Verdict::Deny(DenyReason::NotOwner)
        );
        assert_eq!(
            engine.evaluate_at(&rule, FIELD, &ctx, Some("u1"), t0),
            Verdict::Deny(DenyReason::RateLimitExceeded)
        );
    }

    #[test]
    fn rate_limit_keys_by_subject_and_field() {
        let engine = RuleEngine::default();
        let rule = RuleNode::rate_limit(Duration::from_secs(1), 1);
        let t0 = Instant::now();
        let u1 = user("u1", "user");
        let u2 = user("u2", "user");
        assert!(engine.evaluate_at(&rule, FIELD, &u1, None, t0).is_allow());
        assert!(!engine.evaluate_at(&rule, FIELD, &u1, None, t0).is_allow());
        assert!(engine.evaluate_at(&rule, FIELD, &u2, None, t0).is_allow());
        assert!(engine.evaluate_at(&rule, "Query.cats", &u1, None, t0).is_allow());
    }

    #[test]
    fn anonymous_callers_share_a_bucket() {
        let engine = RuleEngine::default();
        let rule = RuleNode::rate_limit(Duration::from_secs(1), 1);
        let t0 = Instant::now();
        let first = IdentityContext::anonymous("req-a");
        let second = IdentityContext::anonymous("req-b");
        assert!(engine.evaluate_at(&rule, FIELD, &first, None, t0).is_allow());
        assert_eq!(
            engine.evaluate_at(&rule, FIELD, &second, None, t0),
            Verdict::Deny(DenyReason::RateLimitExceeded)
        );
    }
}
