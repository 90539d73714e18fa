//! # Admission Error Types
//!
//! Three families, matching how each failure is handled:
//!
//! - [`Denial`]: a per-field verdict. Recoverable, never fatal, never
//!   aborts sibling fields.
//! - [`IdentityLookupError`]: the upstream identity lookup failed. Absorbed
//!   into an anonymous identity by the resolver; callers never see it.
//! - [`ConfigurationError`]: the policy document is unusable. Fatal at
//!   startup.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::rule::DenyReason;

/// Coarse classification of a denial, as reported on the error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DenialKind {
    /// A `rateLimit` node ran out of budget for this window.
    #[serde(rename = "rate_limited")]
    RateLimitExceeded,
    /// A role, ownership, or explicit `deny` rule failed.
    #[serde(rename = "forbidden")]
    Unauthorized,
}

impl DenialKind {
    /// Wire name used in error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "rate_limited",
            Self::Unauthorized => "forbidden",
        }
    }
}

impl std::fmt::Display for DenialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured denial produced by the gate instead of running a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} on {field_path}: {detail}")]
pub struct Denial {
    #[serde(rename = "reason")]
    pub kind: DenialKind,
    #[serde(rename = "detail")]
    pub detail: DenyReason,
    pub field_path: String,
}

impl Denial {
    pub fn new(field_path: impl Into<String>, detail: DenyReason) -> Self {
        Self {
            kind: detail.kind(),
            detail,
            field_path: field_path.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == DenialKind::RateLimitExceeded
    }
}

/// Failure of the upstream identity lookup.
#[derive(Debug, Error)]
pub enum IdentityLookupError {
    /// The identity service answered and refused the token.
    #[error("token rejected: {0}")]
    Rejected(String),
    /// The identity service could not be reached, timed out, or answered
    /// with something unusable.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while loading a policy document.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("policy document is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid field path '{0}': expected TypeName.fieldName")]
    InvalidFieldPath(String),

    #[error("field path '{0}' is configured more than once")]
    DuplicateField(String),

    #[error("rule at {at} requires undefined role '{role}'")]
    UndefinedRole { role: String, at: String },

    #[error("rule at {at} uses undefined named rule '{name}'")]
    UndefinedRule { name: String, at: String },

    #[error("named rules form a cycle: {0}")]
    CyclicRule(String),

    #[error("invalid rule at {at}: {message}")]
    InvalidRule { at: String, message: String },

    #[error("field '{0}' has more than one rate_limit node")]
    MultipleRateLimits(String),
}
