//! # catgraph-api: Axum Transport for the catgraph Gateway
//!
//! A single query endpoint over cats (stored here) and users (owned by a
//! remote identity service). Every field resolution is admitted by
//! `catgraph-admission` before its resolver runs.
//!
//! ## API Surface
//!
//! | Route                | Module                    | Purpose                    |
//! |----------------------|---------------------------|----------------------------|
//! | `POST /query`        | [`routes`], [`graph`]     | Execute a query document   |
//! | `GET /metrics`       | [`routes`]                | Request/admission counters |
//! | `GET /health/*`      | here                      | Liveness and readiness     |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Cors → TraceLayer → MetricsMiddleware → IdentityMiddleware → Handler
//! ```

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod geo;
pub mod graph;
pub mod middleware;
pub mod model;
pub mod resolvers;
pub mod routes;
pub mod state;
pub mod store;

use axum::extract::State;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the identity middleware
/// so they never call the identity service.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    let api = Router::new()
        .merge(routes::router())
        .layer(from_fn_with_state(state.clone(), auth::identity_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(metrics))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new()
        .merge(health)
        .merge(api)
        .layer(CorsLayer::permissive())
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the cat store answers.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state
        .cats
        .ping()
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    Ok("ready")
}
