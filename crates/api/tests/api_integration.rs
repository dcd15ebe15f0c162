//! API integration tests.
//!
//! These drive the full router against the in-memory store and ledger.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::Utc;
use polling_api::{AppState, app};
use polling_core::{PollLocks, PollService, StaticTokenAuthenticator, VoteService};
use polling_db::{MemoryPollStore, MemoryVoteLedger, models::User};
use serde_json::{Value, json};
use tower::ServiceExt;

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";

fn user(id: &str) -> User {
    let now = Utc::now();
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: id.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Create test app state with in-memory storage.
fn create_test_state() -> AppState {
    let store = Arc::new(MemoryPollStore::new());
    let ledger = Arc::new(MemoryVoteLedger::new());
    let locks = PollLocks::new();

    let mut users = HashMap::new();
    users.insert(ALICE.to_string(), user("alice"));
    users.insert(BOB.to_string(), user("bob"));

    AppState {
        poll_service: PollService::new(store.clone(), ledger.clone(), locks.clone()),
        vote_service: VoteService::new(store, ledger, locks),
        authenticator: Arc::new(StaticTokenAuthenticator::new(users)),
    }
}

fn create_test_router() -> Router {
    app(create_test_state())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, value)
}

async fn create_poll(app: &Router, body: Value) -> Value {
    let (status, value) = send(app, "POST", "/api/polls", Some(ALICE), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    value["data"].clone()
}

fn option_id(poll: &Value, i: usize) -> String {
    poll["options"][i]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = create_test_router();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_create_requires_auth() {
    let app = create_test_router();
    let body = json!({"title": "Q", "options": ["a", "b"]});

    let (status, value) = send(&app, "POST", "/api/polls", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["success"], false);

    let (status, _) = send(&app, "POST", "/api/polls", Some("bogus"), Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_validation_reports_fields() {
    let app = create_test_router();
    let (status, body) = send(
        &app,
        "POST",
        "/api/polls",
        Some(ALICE),
        Some(json!({"title": "", "options": ["only one"]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["title", "options"]);
}

#[tokio::test]
async fn test_create_get_and_vote() {
    let app = create_test_router();
    let poll = create_poll(
        &app,
        json!({"title": "Best editor?", "description": "Pick one", "options": ["Vim", "Emacs"]}),
    )
    .await;
    let id = poll["id"].as_str().unwrap();
    assert_eq!(poll["totalVotes"], 0);
    assert_eq!(poll["isActive"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/polls/{id}/vote"),
        Some(BOB),
        Some(json!({"optionIds": [option_id(&poll, 0)]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["poll"]["totalVotes"], 1);
    assert_eq!(body["data"]["vote"]["userId"], "bob");
    assert_eq!(body["data"]["results"]["results"][0]["percentage"], 100);

    let (status, body) = send(&app, "GET", &format!("/api/polls/{id}"), Some(BOB), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Best editor?");
    assert_eq!(body["data"]["isExpired"], false);
    assert_eq!(body["data"]["voterStatus"]["hasVoted"], true);
    assert_eq!(body["data"]["voterStatus"]["canVote"], false);
    assert_eq!(body["data"]["results"][1]["percentage"], 0);

    let (status, body) = send(&app, "GET", &format!("/api/polls/{id}/results"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalVotes"], 1);
}

#[tokio::test]
async fn test_vote_errors_map_to_status_codes() {
    let app = create_test_router();
    let poll = create_poll(&app, json!({"title": "Q", "options": ["a", "b"]})).await;
    let id = poll["id"].as_str().unwrap();
    let uri = format!("/api/polls/{id}/vote");
    let first = json!({"optionIds": [option_id(&poll, 0)]});

    // Named poll without a voter
    let (status, body) = send(&app, "POST", &uri, None, Some(first.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "USER_ID_REQUIRED");

    let (status, _) = send(&app, "POST", &uri, Some(BOB), Some(first.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &uri, Some(BOB), Some(first)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_VOTED");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(ALICE),
        Some(json!({"optionIds": [option_id(&poll, 0), option_id(&poll, 1)]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MULTIPLE_NOT_ALLOWED");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(ALICE),
        Some(json!({"optionIds": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "optionIds");

    let (status, body) = send(
        &app,
        "POST",
        "/api/polls/missing/vote",
        Some(ALICE),
        Some(json!({"optionIds": ["x"]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "POLL_NOT_FOUND");
}

#[tokio::test]
async fn test_closed_poll_rejects_votes() {
    let app = create_test_router();
    let poll = create_poll(&app, json!({"title": "Q", "options": ["a", "b"]})).await;
    let id = poll["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/polls/{id}"),
        Some(ALICE),
        Some(json!({"isActive": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/polls/{id}/vote"),
        Some(BOB),
        Some(json!({"optionIds": [option_id(&poll, 1)]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "POLL_INACTIVE");
}

#[tokio::test]
async fn test_update_and_delete_require_owner() {
    let app = create_test_router();
    let poll = create_poll(&app, json!({"title": "Q", "options": ["a", "b"]})).await;
    let uri = format!("/api/polls/{}", poll["id"].as_str().unwrap());

    let (status, body) = send(&app, "PATCH", &uri, Some(BOB), Some(json!({"title": "Mine"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, "DELETE", &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "DELETE", &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Poll deleted successfully");

    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_paginates_and_filters() {
    let app = create_test_router();
    for i in 0..3 {
        create_poll(
            &app,
            json!({"title": format!("Alice poll {i}"), "options": ["a", "b"]}),
        )
        .await;
    }
    let (status, _) = send(
        &app,
        "POST",
        "/api/polls",
        Some(BOB),
        Some(json!({"title": "Bob's anonymous poll", "options": ["a", "b"], "isAnonymous": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/polls?page=2&limit=3", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 4);
    assert_eq!(body["data"]["pagination"]["totalPages"], 2);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/api/polls?filter=anonymous", None, None).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (_, body) = send(&app, "GET", "/api/polls?search=ALICE", None, None).await;
    assert_eq!(body["data"]["pagination"]["total"], 3);

    let (status, body) = send(&app, "GET", "/api/polls/mine", Some(BOB), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (status, _) = send(&app, "GET", "/api/polls/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/api/polls?limit=500", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "limit");
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_router();
    let (status, _) = send(&app, "GET", "/nonexistent/endpoint", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let app = create_test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/polls")
                .method("POST")
                .header("Authorization", format!("Bearer {ALICE}"))
                .header("Content-Type", "application/json")
                .body(Body::from("invalid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}
