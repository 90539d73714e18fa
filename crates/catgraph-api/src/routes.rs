//! HTTP routes of the gateway.
//!
//! `POST /query` takes a JSON selection document, not GraphQL text:
//!
//! ```text
//! { "selections": [ { "field": "Query.catById", "alias": "c",
//!                     "args": { "id": "..." }, "select": ["owner"] } ] }
//! ```
//!
//! The answer keeps the GraphQL response shape: `data` keyed by alias or
//! field name, plus `errors` with `path` and `extensions.code`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use catgraph_admission::AdmissionSnapshot;

use crate::auth::Caller;
use crate::error::AppError;
use crate::graph::{execute, GraphResponse, QueryDocument};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/query", post(query))
        .route("/metrics", get(metrics))
}

/// `POST /query`: execute one selection document.
async fn query(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<QueryDocument>, JsonRejection>,
) -> Result<Json<GraphResponse>, AppError> {
    let Json(document) = body?;
    let response = execute(&state, &caller, document).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct MetricsReport {
    pub requests: u64,
    pub errors: u64,
    pub admission: AdmissionSnapshot,
    pub limiter_entries: usize,
}

/// `GET /metrics`: request and admission counters.
async fn metrics(State(state): State<AppState>) -> Json<MetricsReport> {
    Json(MetricsReport {
        requests: state.metrics.requests(),
        errors: state.metrics.errors(),
        admission: state.gate.metrics().snapshot(),
        limiter_entries: state.gate.limiter().len(),
    })
}
