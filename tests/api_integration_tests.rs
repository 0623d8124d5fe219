//! API Integration Tests
//!
//! Tests the HTTP API endpoints with a real database.
//!
//! Tests are serialized because they share a global test pool.
//!
//! Note: The `more-di` DI framework doesn't support injecting custom pools.
//! We work around this by using `DatabaseConnection::set_test_pool()` to set
//! a global pool that the DI-created DatabaseConnection will use.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use matchflow::{
    api,
    core::notifications::ChannelNotificationDispatcher,
    core::services::{WorkflowMeetingService, WorkflowSuggestionService},
    infrastructure::database::DatabaseConnection,
    infrastructure::repositories::DbSuggestionRepository,
};
use serde_json::{Value, json};
use serial_test::serial;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU32, Ordering};
use tower::ServiceExt;
use uuid::Uuid;

/// Counter for unique test database URIs
static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Setup test database with migrations and returns pool
/// Uses in-memory SQLite for test isolation
async fn setup_test_db() -> SqlitePool {
    let db_num = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_url = format!("sqlite:file:matchdb{}?mode=memory&cache=shared", db_num);

    let pool = SqlitePool::connect(&db_url).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    DatabaseConnection::set_test_pool(pool.clone());

    pool
}

fn cleanup_test_db() {
    DatabaseConnection::clear_test_pool();
}

fn create_test_app() -> axum::Router {
    let provider = ServiceCollection::new()
        .add(DatabaseConnection::transient())
        .add(DbSuggestionRepository::scoped())
        .add(ChannelNotificationDispatcher::transient())
        .add(WorkflowSuggestionService::scoped())
        .add(WorkflowMeetingService::scoped())
        .build_provider()
        .unwrap();

    axum::Router::new()
        .nest("/suggestions", api::suggestions::router())
        .with_provider(provider)
}

struct Participants {
    matchmaker: Uuid,
    first: Uuid,
    second: Uuid,
}

impl Participants {
    fn new() -> Self {
        Participants {
            matchmaker: Uuid::new_v4(),
            first: Uuid::new_v4(),
            second: Uuid::new_v4(),
        }
    }
}

/// Sends one request through a fresh app and returns the status with the JSON body, if any.
async fn send(method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("X-User-ID", user.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = create_test_app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn create_suggestion(people: &Participants) -> Value {
    let (status, json) = send(
        Method::POST,
        "/suggestions",
        Some(people.matchmaker),
        Some(json!({
            "firstPartyId": people.first,
            "secondPartyId": people.second,
            "matchingReason": "both love hiking",
            "internalNotes": "ask about relocation"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json
}

async fn put_status(id: &str, user: Uuid, status: &str) -> (StatusCode, Value) {
    send(
        Method::PUT,
        &format!("/suggestions/{id}/status"),
        Some(user),
        Some(json!({ "status": status })),
    )
    .await
}

#[tokio::test]
#[serial]
async fn test_list_suggestions_requires_auth() {
    let _pool = setup_test_db().await;

    let (status, _) = send(Method::GET, "/suggestions", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_create_suggestion() {
    let _pool = setup_test_db().await;
    let people = Participants::new();

    let json = create_suggestion(&people).await;

    assert_eq!(json["status"], "PENDING_FIRST_PARTY");
    assert_eq!(json["category"], "PENDING");
    assert_eq!(json["priority"], "MEDIUM");
    assert_eq!(json["firstPartyId"], people.first.to_string());
    assert_eq!(json["internalNotes"], "ask about relocation");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_create_suggestion_with_same_parties() {
    let _pool = setup_test_db().await;
    let matchmaker = Uuid::new_v4();
    let party = Uuid::new_v4();

    let (status, json) = send(
        Method::POST,
        "/suggestions",
        Some(matchmaker),
        Some(json!({ "firstPartyId": party, "secondPartyId": party })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_get_suggestion_visibility() {
    let _pool = setup_test_db().await;
    let people = Participants::new();
    let created = create_suggestion(&people).await;
    let uri = format!("/suggestions/{}", created["id"].as_str().unwrap());

    let (status, json) = send(Method::GET, &uri, Some(people.second), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], created["id"]);
    assert!(json.get("internalNotes").is_none());

    let (status, json) = send(Method::GET, &uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    let (status, json) = send(
        Method::GET,
        &format!("/suggestions/{}", Uuid::new_v4()),
        Some(people.first),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_update_status_error_codes() {
    let _pool = setup_test_db().await;
    let people = Participants::new();
    let created = create_suggestion(&people).await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = put_status(id, people.first, "MAYBE_LATER").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    let (status, json) = put_status(id, people.second, "FIRST_PARTY_APPROVED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    let (status, json) = put_status(id, people.matchmaker, "DATING").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "ILLEGAL_TRANSITION");

    let (status, json) = put_status(id, people.first, "FIRST_PARTY_APPROVED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "PENDING_SECOND_PARTY");

    // the client still holds the original timestamp
    let (status, json) = send(
        Method::PUT,
        &format!("/suggestions/{id}/status"),
        Some(people.matchmaker),
        Some(json!({
            "status": "CANCELLED",
            "expectedUpdatedAt": created["updatedAt"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_list_suggestions_by_category() {
    let _pool = setup_test_db().await;
    let people = Participants::new();
    let created = create_suggestion(&people).await;
    let id = created["id"].as_str().unwrap();
    put_status(id, people.first, "FIRST_PARTY_DECLINED").await;
    create_suggestion(&Participants {
        matchmaker: people.matchmaker,
        first: Uuid::new_v4(),
        second: people.first,
    })
    .await;

    let (status, json) = send(
        Method::GET,
        "/suggestions?category=HISTORY",
        Some(people.first),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let suggestions = json["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["id"], created["id"]);
    assert_eq!(suggestions[0]["category"], "HISTORY");

    let (_, json) = send(Method::GET, "/suggestions", Some(people.first), None).await;
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 2);

    let (status, json) = send(
        Method::GET,
        "/suggestions?category=archived",
        Some(people.first),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_available_actions() {
    let _pool = setup_test_db().await;
    let people = Participants::new();
    let created = create_suggestion(&people).await;
    let uri = format!("/suggestions/{}/actions", created["id"].as_str().unwrap());

    let (status, json) = send(Method::GET, &uri, Some(people.first), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["actions"],
        json!([
            { "status": "FIRST_PARTY_APPROVED" },
            { "status": "FIRST_PARTY_DECLINED" }
        ])
    );

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_first_date_feedback_flow() {
    let _pool = setup_test_db().await;
    let people = Participants::new();
    let created = create_suggestion(&people).await;
    let id = created["id"].as_str().unwrap();

    put_status(id, people.first, "FIRST_PARTY_APPROVED").await;
    put_status(id, people.second, "SECOND_PARTY_APPROVED").await;
    let (status, json) = put_status(id, people.matchmaker, "CONTACT_DETAILS_SHARED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["category"], "ACTIVE");

    let (status, meeting) = send(
        Method::POST,
        &format!("/suggestions/{id}/meetings"),
        Some(people.first),
        Some(json!({
            "scheduledDate": "2030-05-01T18:00:00Z",
            "location": "Botanical garden"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(meeting["status"], "SCHEDULED");
    let meeting_id = meeting["id"].as_str().unwrap();

    let (status, json) = send(
        Method::POST,
        &format!("/suggestions/{id}/meetings/{meeting_id}/feedback"),
        Some(people.first),
        Some(json!({ "wantsSecondDate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "INVALID_MEETING_STATE");

    let (status, json) = send(
        Method::PUT,
        &format!("/suggestions/{id}/meetings/{meeting_id}/status"),
        Some(people.second),
        Some(json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meeting"]["status"], "COMPLETED");
    assert_eq!(json["suggestion"]["status"], "AWAITING_FIRST_DATE_FEEDBACK");

    let feedback_uri = format!("/suggestions/{id}/meetings/{meeting_id}/feedback");
    let (status, json) = send(
        Method::POST,
        &feedback_uri,
        Some(people.second),
        Some(json!({ "wantsSecondDate": true, "notes": "great conversation" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "THINKING_AFTER_DATE");

    let (status, json) = send(
        Method::POST,
        &feedback_uri,
        Some(people.second),
        Some(json!({ "wantsSecondDate": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "ALREADY_SUBMITTED");

    let (status, json) = send(
        Method::POST,
        &feedback_uri,
        Some(people.first),
        Some(json!({ "wantsSecondDate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "PROCEEDING_TO_SECOND_DATE");

    let (status, json) = send(
        Method::GET,
        &format!("/suggestions/{id}/meetings"),
        Some(people.matchmaker),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meetings"][0]["feedback"].as_array().unwrap().len(), 2);

    let (_, json) = send(
        Method::GET,
        &format!("/suggestions/{id}/history"),
        Some(people.first),
        None,
    )
    .await;
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 7);
    assert_eq!(history[4]["toStatus"], "AWAITING_FIRST_DATE_FEEDBACK");
    assert_eq!(history[4]["actingRole"], "system");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_create_suggestion_for_busy_party() {
    let _pool = setup_test_db().await;
    let people = Participants::new();
    let created = create_suggestion(&people).await;
    let id = created["id"].as_str().unwrap();

    put_status(id, people.first, "FIRST_PARTY_APPROVED").await;
    put_status(id, people.second, "SECOND_PARTY_APPROVED").await;
    let (status, _) = put_status(id, people.matchmaker, "CONTACT_DETAILS_SHARED").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        Method::POST,
        "/suggestions",
        Some(people.matchmaker),
        Some(json!({
            "firstPartyId": Uuid::new_v4(),
            "secondPartyId": people.second
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "ACTIVE_SUGGESTION_EXISTS");

    let (_, json) = send(Method::GET, "/suggestions", Some(people.matchmaker), None).await;
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 1);

    cleanup_test_db();
}
