//! # Response Documents
//!
//! Every executed document answers 200 with `data` and, when anything went
//! wrong, `errors`. A failed or denied field is `null` in `data` and has one
//! entry in `errors` whose `path` locates it.
//!
//! Admission denials carry `extensions.reason` (`rate_limited` or
//! `forbidden`), `extensions.detail` and `extensions.fieldPath`, so callers
//! can tell a throttled call from a refused one.

use serde::Serialize;
use serde_json::{Map, Value};

use catgraph_admission::{Denial, DenialKind, DenyReason, GateError};

use crate::resolvers::ResolveError;

#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Step in an error path: a response key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub message: String,
    pub path: Vec<PathSegment>,
    pub extensions: ErrorExtensions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorExtensions {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DenyReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

impl FieldError {
    pub fn from_denial(denial: Denial, path: Vec<PathSegment>) -> Self {
        let (code, message) = match denial.kind {
            DenialKind::RateLimitExceeded => ("RATE_LIMITED", "rate limit exceeded"),
            DenialKind::Unauthorized => ("FORBIDDEN", "not authorized"),
        };
        Self {
            message: message.to_string(),
            path,
            extensions: ErrorExtensions {
                code,
                reason: Some(denial.kind),
                detail: Some(denial.detail),
                field_path: Some(denial.field_path),
            },
        }
    }

    pub fn from_resolver(err: &ResolveError, field_path: &str, path: Vec<PathSegment>) -> Self {
        if err.is_internal() {
            tracing::error!(field = field_path, error = %err, "resolver failed");
        } else {
            tracing::debug!(field = field_path, error = %err, "resolver returned an error");
        }
        Self {
            message: err.public_message(),
            path,
            extensions: ErrorExtensions {
                code: err.code(),
                reason: None,
                detail: None,
                field_path: None,
            },
        }
    }

    pub fn from_gate(err: GateError<ResolveError>, field_path: &str, path: Vec<PathSegment>) -> Self {
        match err {
            GateError::Denied(denial) => Self::from_denial(denial, path),
            GateError::Resolver(err) => Self::from_resolver(&err, field_path, path),
        }
    }
}
