//! HTTP API integration tests, driven through the router in-process

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vantage_core::storage::test_utils::create_test_store;
use vantage_core::{seed, ApiServer, ApiServerConfig, LibsqlStore, SessionSigner};

async fn test_router() -> (Router, Arc<LibsqlStore>) {
    let store = create_test_store().await;
    seed::seed_users(store.as_ref()).await.unwrap();
    let server = ApiServer::new(
        ApiServerConfig::default(),
        store.clone(),
        SessionSigner::new(b"test-secret".to_vec(), 24),
    );
    (server.router(), store)
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with_auth(router, method, uri, body, None).await
}

async fn send_with_auth(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Create a two-participant form (one subject, one evaluator) and return
/// its id from the creation payload.
async fn create_form(router: &Router, users: &[Value], allow_multiple: bool) -> String {
    let body = json!({
        "title": "Q3 Review",
        "description": "Quarterly peer review",
        "allowMultipleResponses": allow_multiple,
        "subjectMatrix": [{
            "subjectId": users[0]["id"],
            "subjectName": users[0]["name"],
            "subjectEmail": users[0]["email"],
            "evaluators": [{
                "evaluatorId": users[1]["id"],
                "evaluatorName": users[1]["name"],
                "evaluatorEmail": users[1]["email"],
                "position": 1,
            }],
        }],
        "questions": [{
            "text": "How did the quarter go?",
            "type": "textarea",
            "canSubjectAnswer": true,
            "evaluatorPositions": [1],
        }],
        "createdBy": users[2]["id"],
    });
    let (status, payload) = send(router, "POST", "/api/forms/enhanced", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["form"]["totalAssignments"], 2);
    assert_eq!(payload["form"]["questionsCount"], 1);
    payload["form"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_backend_and_uptime() {
    let (router, _store) = test_router().await;
    let (status, payload) = send(&router, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "healthy");
    assert_eq!(payload["database"], "libsql");
    assert!(payload["uptime"].as_f64().is_some());
}

#[tokio::test]
async fn login_succeeds_with_seeded_credentials() {
    let (router, _store) = test_router().await;
    let (status, payload) = send(
        &router,
        "POST",
        "/api/auth/login",
        Some(json!({ "email": "alex.johnson@company.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["user"]["name"], "Alex Johnson");
    assert!(payload["user"].get("passwordHash").is_none());
    assert!(!payload["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let (router, _store) = test_router().await;
    let (status, payload) = send(
        &router,
        "POST",
        "/api/auth/login",
        Some(json!({ "email": "alex.johnson@company.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload["success"], false);
    assert_eq!(payload["message"], "Invalid credentials");
}

#[tokio::test]
async fn users_endpoint_lists_roster_without_credentials() {
    let (router, _store) = test_router().await;
    let (status, payload) = send(&router, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let users = payload.as_array().unwrap();
    assert_eq!(users.len(), 21);
    for user in users {
        assert!(user.get("passwordHash").is_none());
        assert!(user["email"].as_str().unwrap().contains('@'));
    }
}

#[tokio::test]
async fn form_creation_validation() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();

    // Missing required fields
    let (status, payload) = send(
        &router,
        "POST",
        "/api/forms/enhanced",
        Some(json!({ "title": "No questions" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"].as_str().unwrap().contains("required"));

    // Empty subject matrix
    let (status, payload) = send(
        &router,
        "POST",
        "/api/forms/enhanced",
        Some(json!({
            "title": "Nobody",
            "questions": [],
            "subjectMatrix": [],
            "createdBy": users[0]["id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .contains("At least one subject is required"));

    // Unknown creator
    let (status, payload) = send(
        &router,
        "POST",
        "/api/forms/enhanced",
        Some(json!({
            "title": "Ghost",
            "questions": [],
            "subjectMatrix": [{
                "subjectId": users[0]["id"],
                "subjectName": users[0]["name"],
                "subjectEmail": users[0]["email"],
                "evaluators": [],
            }],
            "createdBy": uuid::Uuid::new_v4().to_string(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(payload["error"].as_str().unwrap().contains("Creator not found"));
}

#[tokio::test]
async fn evaluation_round_trip_through_the_api() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();
    let form_id = create_form(&router, users, false).await;

    // Collect the generated assignments and their tokens
    let (status, assignments) = send(
        &router,
        "GET",
        &format!("/api/forms/{}/assignments", form_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let assignments = assignments.as_array().unwrap();
    assert_eq!(assignments.len(), 2);

    let subject_token = assignments
        .iter()
        .find(|a| a["participantType"] == "subject")
        .unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(subject_token.len(), 64);

    // Resolve the subject's view
    let (status, view) = send(
        &router,
        "GET",
        &format!("/api/enhanced-evaluate/{}", subject_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let questions = view["form"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(view["allowMultipleResponses"], false);
    assert!(view.get("existingResponse").is_none());
    let question_id = questions[0]["id"].as_str().unwrap().to_string();

    // Submit
    let (status, payload) = send(
        &router,
        "POST",
        &format!("/api/enhanced-evaluate/{}", subject_token),
        Some(json!({ "responses": { (question_id.as_str()): "A strong quarter" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["updated"], false);

    // Resolving again surfaces the stored response
    let (_, view) = send(
        &router,
        "GET",
        &format!("/api/enhanced-evaluate/{}", subject_token),
        None,
    )
    .await;
    assert_eq!(
        view["existingResponse"]["responses"][question_id.as_str()],
        "A strong quarter"
    );

    // Resubmission conflicts when the form disallows it
    let (status, payload) = send(
        &router,
        "POST",
        &format!("/api/enhanced-evaluate/{}", subject_token),
        Some(json!({ "responses": { (question_id.as_str()): "Changed my mind" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(payload["error"].as_str().unwrap().contains("already submitted"));

    // The report shows one response and a completed summary row
    let (status, report) = send(
        &router,
        "GET",
        &format!("/api/forms/{}/responses", form_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["responses"].as_array().unwrap().len(), 1);
    assert_eq!(report["questionStats"][0]["answered"], 1);
    // One of the two assignments (subject + evaluator) has answered
    assert_eq!(report["questionStats"][0]["responseRate"], 0.5);
    let completed: Vec<_> = report["summary"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|row| row["hasResponse"] == true)
        .collect();
    assert_eq!(completed.len(), 1);
}

#[tokio::test]
async fn invalid_evaluation_token_is_not_found() {
    let (router, _store) = test_router().await;
    let (status, payload) = send(
        &router,
        "GET",
        "/api/enhanced-evaluate/definitely-not-a-token",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(payload["error"].as_str().unwrap().contains("Invalid"));
}

#[tokio::test]
async fn user_workspace_and_notifications() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();
    create_form(&router, users, false).await;

    let subject_id = users[0]["id"].as_str().unwrap();
    let (status, workspace) = send(
        &router,
        "GET",
        &format!("/api/users/{}/forms", subject_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(workspace["assignedSummary"]["total"], 1);
    assert_eq!(workspace["assignedSummary"]["pending"], 1);
    assert_eq!(workspace["assignedForms"][0]["myRole"], "subject");
    assert_eq!(workspace["assignedForms"][0]["myStatus"], "pending");

    // A malformed user id gets the empty workspace, not an error
    let (status, workspace) = send(&router, "GET", "/api/users/garbage/forms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(workspace["assignedSummary"]["total"], 0);
    assert!(workspace["createdForms"].as_array().unwrap().is_empty());

    // The subject got a self-evaluation notification
    let (status, notifications) = send(
        &router,
        "GET",
        &format!("/api/notifications/{}", subject_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["title"], "New Self-Evaluation Request");
    assert_eq!(notifications[0]["read"], false);

    // Mark it read
    let notification_id = notifications[0]["id"].as_str().unwrap();
    let (status, payload) = send(
        &router,
        "PUT",
        &format!("/api/notifications/{}/read", notification_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);

    let (_, notifications) = send(
        &router,
        "GET",
        &format!("/api/notifications/{}", subject_id),
        None,
    )
    .await;
    assert_eq!(notifications[0]["read"], true);

    // Garbage user ids get an empty list
    let (status, notifications) = send(&router, "GET", "/api/notifications/garbage", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(notifications.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_and_delete_forms() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();
    let form_id = create_form(&router, users, false).await;

    let (status, duplicate) = send(
        &router,
        "POST",
        &format!("/api/forms/{}/duplicate", form_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(duplicate["title"], "Q3 Review (Copy)");
    assert_eq!(duplicate["status"], "draft");

    let (_, forms) = send(&router, "GET", "/api/forms", None).await;
    assert_eq!(forms.as_array().unwrap().len(), 2);

    // Duplicates carry no assignments until regenerated
    let duplicate_id = duplicate["id"].as_str().unwrap();
    let (_, assignments) = send(
        &router,
        "GET",
        &format!("/api/forms/{}/assignments", duplicate_id),
        None,
    )
    .await;
    assert!(assignments.as_array().unwrap().is_empty());

    let (status, payload) = send(
        &router,
        "DELETE",
        &format!("/api/forms/{}", form_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);

    let (status, _) = send(&router, "GET", &format!("/api/forms/{}", form_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn form_update_regenerates_assignments() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();
    let form_id = create_form(&router, users, false).await;

    let (_, before) = send(
        &router,
        "GET",
        &format!("/api/forms/{}/assignments", form_id),
        None,
    )
    .await;
    let old_token = before.as_array().unwrap()[0]["token"]
        .as_str()
        .unwrap()
        .to_string();

    // Update with two evaluators for the subject
    let body = json!({
        "title": "Q3 Review (revised)",
        "subjectMatrix": [{
            "subjectId": users[0]["id"],
            "subjectName": users[0]["name"],
            "subjectEmail": users[0]["email"],
            "evaluators": [
                {
                    "evaluatorId": users[1]["id"],
                    "evaluatorName": users[1]["name"],
                    "evaluatorEmail": users[1]["email"],
                    "position": 1,
                },
                {
                    "evaluatorId": users[3]["id"],
                    "evaluatorName": users[3]["name"],
                    "evaluatorEmail": users[3]["email"],
                    "position": 2,
                },
            ],
        }],
        "questions": [{
            "text": "How did the quarter go?",
            "canSubjectAnswer": true,
            "evaluatorPositions": [1, 2],
        }],
        "createdBy": users[2]["id"],
    });
    let (status, payload) = send(
        &router,
        "PUT",
        &format!("/api/forms/enhanced/{}", form_id),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["assignmentsCreated"], 3);

    // The old token no longer resolves
    let (status, _) = send(
        &router,
        "GET",
        &format!("/api/enhanced-evaluate/{}", old_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_data_requires_a_session() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();
    create_form(&router, users, false).await;

    // No credentials
    let (status, _) = send(&router, "DELETE", "/api/admin/clear-data", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A forged token
    let (status, _) = send_with_auth(
        &router,
        "DELETE",
        "/api/admin/clear-data",
        None,
        Some("not.a.token"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A real session from login
    let (_, login) = send(
        &router,
        "POST",
        "/api/auth/login",
        Some(json!({ "email": "alex.johnson@company.com", "password": "password123" })),
    )
    .await;
    let session = login["token"].as_str().unwrap();

    let (status, payload) = send_with_auth(
        &router,
        "DELETE",
        "/api/admin/clear-data",
        None,
        Some(session),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);

    let (_, stats) = send(&router, "GET", "/api/dashboard/stats", None).await;
    assert_eq!(stats["totalForms"], 0);
    // Users survive the wipe
    assert_eq!(stats["totalUsers"], 21);
}

#[tokio::test]
async fn dashboard_counts_pending_assignments() {
    let (router, _store) = test_router().await;
    let (_, users) = send(&router, "GET", "/api/users", None).await;
    let users = users.as_array().unwrap();
    let form_id = create_form(&router, users, false).await;

    let (_, stats) = send(&router, "GET", "/api/dashboard/stats", None).await;
    assert_eq!(stats["totalForms"], 1);
    assert_eq!(stats["totalEvaluations"], 0);
    assert_eq!(stats["pendingEvaluations"], 2);

    // Complete one assignment and watch the pending count drop
    let (_, assignments) = send(
        &router,
        "GET",
        &format!("/api/forms/{}/assignments", form_id),
        None,
    )
    .await;
    let token = assignments.as_array().unwrap()[0]["token"]
        .as_str()
        .unwrap()
        .to_string();
    let (_, view) = send(
        &router,
        "GET",
        &format!("/api/enhanced-evaluate/{}", token),
        None,
    )
    .await;
    let question_id = view["form"]["questions"][0]["id"].as_str().unwrap().to_string();
    send(
        &router,
        "POST",
        &format!("/api/enhanced-evaluate/{}", token),
        Some(json!({ "responses": { (question_id.as_str()): "Done" } })),
    )
    .await;

    let (_, stats) = send(&router, "GET", "/api/dashboard/stats", None).await;
    assert_eq!(stats["totalEvaluations"], 1);
    assert_eq!(stats["pendingEvaluations"], 1);
}
