//! # Caller Identity
//!
//! [`identity_middleware`] resolves the bearer token once per request and
//! stores the resulting [`IdentityContext`] in request extensions. Handlers
//! take it with the [`Caller`] extractor. A missing, rejected or
//! unverifiable token yields an anonymous context; the request is never
//! refused here, field policies decide what an anonymous caller may do.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use catgraph_admission::identity::bearer_token;
use catgraph_admission::{IdentityContext, IdentityLookupError, IdentityProvider, UpstreamIdentity};
use catgraph_auth_client::AuthClient;

use crate::error::AppError;
use crate::middleware::tracing_layer::REQUEST_ID_HEADER;
use crate::state::AppState;

/// The resolved caller of the current request.
#[derive(Debug, Clone)]
pub struct Caller(pub IdentityContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("caller identity was not resolved".into()))
    }
}

/// Resolve the caller and attach [`Caller`] to the request.
pub async fn identity_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let token = bearer_token(
        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .map(str::to_string);

    let ctx = state
        .identity
        .resolve_with_request_id(token.as_deref(), request_id)
        .await;
    request.extensions_mut().insert(Caller(ctx));
    next.run(request).await
}

/// [`IdentityProvider`] backed by the identity service's `GET /users/token`.
#[derive(Debug, Clone)]
pub struct AuthServiceIdentityProvider {
    client: AuthClient,
}

impl AuthServiceIdentityProvider {
    pub fn new(client: AuthClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityProvider for AuthServiceIdentityProvider {
    async fn lookup(&self, token: &str) -> Result<UpstreamIdentity, IdentityLookupError> {
        match self.client.check_token(token).await {
            Ok(user) => Ok(UpstreamIdentity {
                subject_id: user.id,
                role: user.role.unwrap_or_default(),
            }),
            Err(err) if err.is_client_error() => Err(IdentityLookupError::Rejected(err.to_string())),
            Err(err) => Err(IdentityLookupError::Unavailable(err.to_string())),
        }
    }
}
