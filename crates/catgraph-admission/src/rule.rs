//! # Rule Trees
//!
//! A field's policy is a small boolean tree. The variant set is closed so the
//! evaluator in [`crate::engine`] matches exhaustively; a new rule kind is a
//! compiler-checked addition, not a plugin.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::DenialKind;

/// One node of a field's rule tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleNode {
    /// Always admits.
    Allow,
    /// Always denies with [`DenyReason::Forbidden`].
    Deny,
    /// Admits iff the caller's role equals the given role.
    RequireRole(String),
    /// Admits iff the caller's subject id equals the resource owner id.
    RequireOwnership,
    /// Consumes one unit of the caller's budget for this field, then
    /// evaluates `next`.
    RateLimited {
        window: Duration,
        max_count: u32,
        next: Box<RuleNode>,
    },
    /// Admits iff every child admits. Empty admits.
    And(Vec<RuleNode>),
    /// Admits iff any child admits. Empty denies.
    Or(Vec<RuleNode>),
}

impl RuleNode {
    /// `rateLimit(window, max_count)` followed by `allow`.
    pub fn rate_limit(window: Duration, max_count: u32) -> Self {
        Self::RateLimited {
            window,
            max_count,
            next: Box::new(Self::Allow),
        }
    }

    /// `rateLimit(window, max_count)` followed by `next`.
    pub fn rate_limit_then(window: Duration, max_count: u32, next: RuleNode) -> Self {
        Self::RateLimited {
            window,
            max_count,
            next: Box::new(next),
        }
    }

    pub fn require_role(role: impl Into<String>) -> Self {
        Self::RequireRole(role.into())
    }

    /// Whether evaluating this tree may need the resource owner.
    pub fn requires_ownership(&self) -> bool {
        match self {
            Self::RequireOwnership => true,
            Self::RateLimited { next, .. } => next.requires_ownership(),
            Self::And(children) | Self::Or(children) => {
                children.iter().any(RuleNode::requires_ownership)
            }
            Self::Allow | Self::Deny | Self::RequireRole(_) => false,
        }
    }

    /// Number of `RateLimited` nodes in the tree.
    pub fn rate_limit_count(&self) -> usize {
        match self {
            Self::RateLimited { next, .. } => 1 + next.rate_limit_count(),
            Self::And(children) | Self::Or(children) => {
                children.iter().map(RuleNode::rate_limit_count).sum()
            }
            Self::Allow | Self::Deny | Self::RequireRole(_) | Self::RequireOwnership => 0,
        }
    }

    /// Every role named by a `RequireRole` node, in tree order.
    pub fn roles(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_roles(&mut out);
        out
    }

    fn collect_roles<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::RequireRole(role) => out.push(role),
            Self::RateLimited { next, .. } => next.collect_roles(out),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_roles(out);
                }
            }
            Self::Allow | Self::Deny | Self::RequireOwnership => {}
        }
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
            Self::RequireRole(role) => write!(f, "requireRole({role:?})"),
            Self::RequireOwnership => f.write_str("requireOwnership"),
            Self::RateLimited {
                window,
                max_count,
                next,
            } => {
                write!(
                    f,
                    "rateLimit({}, {max_count})",
                    humantime::format_duration(*window)
                )?;
                if **next != Self::Allow {
                    write!(f, " -> {next}")?;
                }
                Ok(())
            }
            Self::And(children) => write_list(f, "and", children),
            Self::Or(children) => write_list(f, "or", children),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, children: &[RuleNode]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

/// Why a rule tree denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DenyReason {
    #[serde(rename = "forbidden")]
    Forbidden,
    #[serde(rename = "role mismatch")]
    RoleMismatch,
    #[serde(rename = "not owner")]
    NotOwner,
    #[serde(rename = "rate limit exceeded")]
    RateLimitExceeded,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::RoleMismatch => "role mismatch",
            Self::NotOwner => "not owner",
            Self::RateLimitExceeded => "rate limit exceeded",
        }
    }

    /// Rate-limit denials and authorization denials are reported differently.
    pub fn kind(&self) -> DenialKind {
        match self {
            Self::RateLimitExceeded => DenialKind::RateLimitExceeded,
            Self::Forbidden | Self::RoleMismatch | Self::NotOwner => DenialKind::Unauthorized,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a rule tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}
