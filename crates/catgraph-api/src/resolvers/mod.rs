//! # Resolvers
//!
//! The real work behind each field. Cat fields read and write the
//! [`CatStore`](crate::store::CatStore); user fields proxy the identity
//! service through [`AuthClient`](catgraph_auth_client::AuthClient).
//!
//! Resolvers never check roles, ownership or rate limits. By the time one
//! runs, the gate has admitted the caller.

pub mod cats;
pub mod users;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use catgraph_auth_client::AuthApiError;

use crate::graph::FieldRegistry;
use crate::store::StoreError;

/// Errors a resolver reports for its field.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    BadUserInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthenticated(String),

    /// The identity service answered with something unusable.
    #[error("identity service error: {0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadUserInput(_) => "BAD_USER_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Store(_) | Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Internal(_))
    }

    /// Message returned to the client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Store(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream(_) => "identity service error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthApiError> for ResolveError {
    fn from(err: AuthApiError) -> Self {
        if err.is_unauthorized() {
            return Self::Unauthenticated("the identity service rejected the credentials".into());
        }
        if err.is_not_found() {
            return Self::NotFound("not found in the identity service".into());
        }
        match err {
            AuthApiError::ApiError { status, body, .. } if (400..500).contains(&status) => {
                Self::BadUserInput(if body.is_empty() {
                    format!("identity service rejected the request ({status})")
                } else {
                    body
                })
            }
            unreachable @ AuthApiError::Http { .. } => {
                tracing::warn!(error = %unreachable, "identity service unreachable");
                Self::Unavailable("identity service unreachable".into())
            }
            other => {
                tracing::warn!(error = %other, "identity service call failed");
                Self::Upstream(other.to_string())
            }
        }
    }
}

/// The full field registry: every `Query`, `Mutation` and `Cat` field.
pub fn registry() -> FieldRegistry {
    let mut registry = FieldRegistry::new();
    cats::register(&mut registry);
    users::register(&mut registry);
    registry
}

/// Deserialize argument `name`.
pub(crate) fn arg<T: DeserializeOwned>(args: &Map<String, Value>, name: &str) -> Result<T, ResolveError> {
    let value = args
        .get(name)
        .cloned()
        .ok_or_else(|| ResolveError::BadUserInput(format!("missing argument '{name}'")))?;
    serde_json::from_value(value)
        .map_err(|e| ResolveError::BadUserInput(format!("invalid argument '{name}': {e}")))
}

/// Deserialize the whole argument map as `T`.
pub(crate) fn args_as<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T, ResolveError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ResolveError::BadUserInput(format!("invalid arguments: {e}")))
}

pub(crate) fn uuid_arg(args: &Map<String, Value>, name: &str) -> Result<Uuid, ResolveError> {
    let raw: String = arg(args, name)?;
    Uuid::parse_str(&raw).map_err(|_| ResolveError::BadUserInput(format!("'{raw}' is not a valid id")))
}

pub(crate) fn to_json<T: Serialize>(value: T) -> Result<Value, ResolveError> {
    serde_json::to_value(value).map_err(|e| ResolveError::Internal(e.to_string()))
}
