//! # Integration Tests for catgraph-api
//!
//! Drives the full router with `tower::ServiceExt::oneshot`: admission
//! scenarios over HTTP, document validation, health probes, metrics, and
//! identity-service-backed fields against a wiremock server.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catgraph_admission::identity::StaticIdentityProvider;
use catgraph_admission::{IdentityResolver, PolicySet};
use catgraph_api::model::{Cat, Point};
use catgraph_api::state::AppState;
use catgraph_api::store::MemoryCatStore;
use catgraph_auth_client::{AuthClient, AuthServiceConfig};

fn cat(name: &str, owner: &str, lng: f64, lat: f64) -> Cat {
    Cat {
        id: Uuid::new_v4(),
        cat_name: name.to_string(),
        weight: 4.2,
        birthdate: Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap(),
        filename: format!("{name}.jpg"),
        location: Point::new(lng, lat),
        owner: owner.to_string(),
    }
}

fn static_identity() -> IdentityResolver {
    IdentityResolver::new(Arc::new(
        StaticIdentityProvider::new()
            .with_token("alice-token", "alice", "user")
            .with_token("bob-token", "bob", "user")
            .with_token("root-token", "root", "admin"),
    ))
}

fn state_with(cats: Vec<Cat>) -> AppState {
    AppState::in_memory(PolicySet::reference().unwrap())
        .with_identity(static_identity())
        .with_cats(Arc::new(MemoryCatStore::with_cats(cats)))
}

fn test_app(cats: Vec<Cat>) -> Router {
    catgraph_api::app(state_with(cats))
}

fn query(token: Option<&str>, document: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(document.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn one(field: &str, args: Value) -> Value {
    json!({ "selections": [{ "field": field, "args": args }] })
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let app = test_app(vec![]);
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/health/liveness")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = test_app(vec![]);
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/health/readiness")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");
}

// -- Admission Scenarios ------------------------------------------------------

#[tokio::test]
async fn test_owner_update_is_rate_limited_after_five_calls() {
    let mine = cat("Misu", "bob", 24.94, 60.17);
    let id = mine.id.to_string();
    let app = test_app(vec![mine]);

    for call in 1..=5 {
        let (status, body) = send(
            &app,
            query(
                Some("bob-token"),
                one("Mutation.updateCat", json!({ "id": id, "weight": 4.0 + f64::from(call) })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("errors").is_none(), "call {call}: {body}");
        assert_eq!(body["data"]["updateCat"]["weight"], json!(4.0 + f64::from(call)));
    }

    let (status, body) = send(
        &app,
        query(Some("bob-token"), one("Mutation.updateCat", json!({ "id": id, "weight": 99.0 }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updateCat"], Value::Null);
    let error = &body["errors"][0];
    assert_eq!(error["extensions"]["code"], "RATE_LIMITED");
    assert_eq!(error["extensions"]["reason"], "rate_limited");
    assert_eq!(error["extensions"]["fieldPath"], "Mutation.updateCat");
    assert_eq!(error["path"], json!(["updateCat"]));
}

#[tokio::test]
async fn test_non_owner_cannot_update() {
    let theirs = cat("Misu", "bob", 24.94, 60.17);
    let id = theirs.id.to_string();
    let app = test_app(vec![theirs]);

    let (_, body) = send(
        &app,
        query(Some("alice-token"), one("Mutation.updateCat", json!({ "id": id, "cat_name": "Mine" }))),
    )
    .await;
    assert_eq!(body["data"]["updateCat"], Value::Null);
    assert_eq!(body["errors"][0]["extensions"]["code"], "FORBIDDEN");
    assert_eq!(body["errors"][0]["extensions"]["detail"], "not owner");

    let (_, body) = send(&app, query(None, one("Query.catById", json!({ "id": id })))).await;
    assert_eq!(body["data"]["catById"]["cat_name"], "Misu");
}

#[tokio::test]
async fn test_admin_fields_check_role() {
    let victim = cat("Misu", "bob", 24.94, 60.17);
    let id = victim.id.to_string();
    let app = test_app(vec![victim]);

    let (_, body) = send(
        &app,
        query(Some("alice-token"), one("Mutation.deleteCatAsAdmin", json!({ "id": id }))),
    )
    .await;
    assert_eq!(body["data"]["deleteCatAsAdmin"], Value::Null);
    assert_eq!(body["errors"][0]["extensions"]["code"], "FORBIDDEN");
    assert_eq!(body["errors"][0]["extensions"]["detail"], "role mismatch");

    let (_, body) = send(
        &app,
        query(Some("root-token"), one("Mutation.deleteCatAsAdmin", json!({ "id": id }))),
    )
    .await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["deleteCatAsAdmin"]["id"], json!(id));
}

#[tokio::test]
async fn test_anonymous_cannot_create() {
    let app = test_app(vec![]);
    let args = json!({
        "cat_name": "Pekka",
        "weight": 5.0,
        "birthdate": "2020-01-01T00:00:00Z",
        "filename": "pekka.jpg",
        "location": { "type": "Point", "coordinates": [24.9, 60.2] }
    });

    let (_, body) = send(&app, query(None, one("Mutation.createCat", args.clone()))).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "FORBIDDEN");

    let (_, body) = send(&app, query(Some("alice-token"), one("Mutation.createCat", args))).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["createCat"]["owner"], "alice");
}

#[tokio::test]
async fn test_unknown_token_is_anonymous() {
    let app = test_app(vec![]);
    let (status, body) = send(
        &app,
        query(Some("forged-token"), one("Mutation.createCat", json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"][0]["extensions"]["code"], "FORBIDDEN");
    assert_eq!(body["errors"][0]["extensions"]["detail"], "role mismatch");
}

#[tokio::test]
async fn test_sibling_fields_fail_independently() {
    let app = test_app(vec![cat("Misu", "bob", 24.94, 60.17)]);
    let document = json!({
        "selections": [
            { "field": "Query.cats" },
            { "field": "Query.userById", "args": { "id": "bob" } }
        ]
    });

    let (status, body) = send(&app, query(None, document)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cats"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["userById"], Value::Null);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"][0]["extensions"]["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["errors"][0]["path"], json!(["userById"]));
}

#[tokio::test]
async fn test_aliases_share_one_budget() {
    let app = test_app(vec![]);
    let selections: Vec<Value> = (0..6)
        .map(|i| json!({ "field": "Query.cats", "alias": format!("page{i}") }))
        .collect();

    let (_, body) = send(&app, query(None, json!({ "selections": selections }))).await;
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["extensions"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_cats_by_area() {
    let helsinki = cat("Helsinki", "bob", 24.94, 60.17);
    let tokyo = cat("Tokyo", "bob", 139.69, 35.68);
    let app = test_app(vec![helsinki, tokyo]);

    let (_, body) = send(
        &app,
        query(
            None,
            one(
                "Query.catsByArea",
                json!({
                    "topRight": { "lat": 61.0, "lng": 26.0 },
                    "bottomLeft": { "lat": 59.0, "lng": 23.0 }
                }),
            ),
        ),
    )
    .await;
    let cats = body["data"]["catsByArea"].as_array().unwrap();
    assert_eq!(cats.len(), 1);
    assert_eq!(cats[0]["cat_name"], "Helsinki");
}

// -- Document Validation ------------------------------------------------------

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app(vec![]);
    let request = Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_field_is_bad_request() {
    let app = test_app(vec![]);
    let (status, body) = send(&app, query(None, one("Query.dogs", json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("Query.dogs"));
}

#[tokio::test]
async fn test_only_the_query_route_executes_documents() {
    let state = state_with(vec![]);
    let app = catgraph_api::app(state.clone());
    let request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header("content-type", "application/json")
        .body(Body::from(one("Query.cats", json!({})).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(state.gate.metrics().snapshot().admitted, 0);

    let (status, body) = send(&app, query(None, one("Query.cats", json!({})))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["cats"].is_array());
}

#[tokio::test]
async fn test_mixed_operations_are_rejected_before_admission() {
    let state = state_with(vec![]);
    let app = catgraph_api::app(state.clone());
    let document = json!({
        "selections": [
            { "field": "Query.cats" },
            { "field": "Mutation.deleteCat", "args": { "id": Uuid::new_v4() } }
        ]
    });

    let (status, _) = send(&app, query(None, document)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let snapshot = state.gate.metrics().snapshot();
    assert_eq!(snapshot.admitted + snapshot.rate_limited + snapshot.forbidden, 0);
}

// -- Metrics ------------------------------------------------------------------

#[tokio::test]
async fn test_metrics_report_admission_counts() {
    let app = test_app(vec![]);
    send(&app, query(None, one("Query.cats", json!({})))).await;
    send(&app, query(None, one("Mutation.createCat", json!({})))).await;

    let (status, body) = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"], 2);
    assert_eq!(body["errors"], 0);
    assert_eq!(body["admission"]["admitted"], 1);
    assert_eq!(body["admission"]["forbidden"], 1);
    // createCat spends its budget before the role check.
    assert_eq!(body["limiter_entries"], 2);
}

// -- Identity Service ---------------------------------------------------------

async fn auth_client(server: &MockServer) -> AuthClient {
    let config = AuthServiceConfig::parse(&format!("{}/api/v1", server.uri())).unwrap();
    AuthClient::new(config).unwrap()
}

#[tokio::test]
async fn test_cat_owner_resolves_through_identity_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "bob",
            "user_name": "Bob",
            "email": "bob@example.com"
        })))
        .mount(&server)
        .await;

    let mine = cat("Misu", "bob", 24.94, 60.17);
    let id = mine.id.to_string();
    let state = state_with(vec![mine]).with_auth_client(auth_client(&server).await);
    let app = catgraph_api::app(state);

    let document = json!({
        "selections": [
            { "field": "Query.catById", "args": { "id": id }, "select": ["owner"] }
        ]
    });
    let (_, body) = send(&app, query(None, document)).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["catById"]["owner"]["user_name"], "Bob");
}

#[tokio::test]
async fn test_missing_owner_is_a_child_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let state = state_with(vec![cat("Misu", "ghost", 24.94, 60.17)])
        .with_auth_client(auth_client(&server).await);
    let app = catgraph_api::app(state);

    let document = json!({
        "selections": [{ "field": "Query.cats", "select": ["owner"] }]
    });
    let (_, body) = send(&app, query(None, document)).await;
    assert_eq!(body["data"]["cats"][0]["cat_name"], "Misu");
    assert_eq!(body["data"]["cats"][0]["owner"], Value::Null);
    assert_eq!(body["errors"][0]["path"], json!(["cats", 0, "owner"]));
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_identity_service_tokens_authenticate_callers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/token"))
        .and(header("authorization", "Bearer carol-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "carol",
            "user_name": "Carol",
            "role": "user"
        })))
        .mount(&server)
        .await;

    let client = auth_client(&server).await;
    let identity = IdentityResolver::new(Arc::new(
        catgraph_api::auth::AuthServiceIdentityProvider::new(client.clone()),
    ));
    let state = state_with(vec![])
        .with_identity(identity)
        .with_auth_client(client);
    let app = catgraph_api::app(state);

    let args = json!({
        "cat_name": "Pekka",
        "weight": 5.0,
        "birthdate": "2020-01-01T00:00:00Z",
        "filename": "pekka.jpg",
        "location": { "coordinates": [24.9, 60.2] }
    });
    let (_, body) = send(&app, query(Some("carol-token"), one("Mutation.createCat", args.clone()))).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["createCat"]["owner"], "carol");

    // wiremock answers 404 for other tokens: rejected, so anonymous.
    let (_, body) = send(&app, query(Some("stale-token"), one("Mutation.createCat", args))).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "FORBIDDEN");
}
