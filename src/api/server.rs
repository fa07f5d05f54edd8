//! HTTP API server
//!
//! All routes live under `/api`. The route strings and camelCase JSON
//! field names are load-bearing: existing clients depend on them. Error
//! bodies are `{"error": ...}` with the status mapped from the failure
//! kind; the login handler alone answers `{"success": false, "message"}`
//! on a bad credential.

use crate::analytics::{AnalyticsService, UserWorkspace};
use crate::auth::{CredentialVerifier, SessionSigner, Sha256Verifier};
use crate::error::VantageError;
use crate::evaluation::{EvaluationService, SubmissionMeta};
use crate::fanout;
use crate::storage::Store;
use crate::token::AccessToken;
use crate::types::{
    CreatorInfo, Form, FormId, FormStatus, Notification, NotificationId, ParticipantType,
    Question, SubjectEntry, UserId,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 5000).into(),
        }
    }
}

/// API server state
#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    evaluations: Arc<EvaluationService>,
    analytics: Arc<AnalyticsService>,
    verifier: Arc<dyn CredentialVerifier>,
    sessions: Arc<SessionSigner>,
    /// For the uptime figure in health responses
    started: Instant,
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server over a storage backend
    pub fn new(config: ApiServerConfig, store: Arc<dyn Store>, sessions: SessionSigner) -> Self {
        let state = AppState {
            evaluations: Arc::new(EvaluationService::new(store.clone())),
            analytics: Arc::new(AnalyticsService::new(store.clone())),
            store,
            verifier: Arc::new(Sha256Verifier),
            sessions: Arc::new(sessions),
            started: Instant::now(),
        };
        Self { config, state }
    }

    /// Build the router (exposed for in-process testing)
    pub fn router(&self) -> Router {
        Self::build_router(self.state.clone())
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/auth/login", post(login_handler))
            .route("/api/users", get(list_users_handler))
            // Form lifecycle
            .route("/api/forms/enhanced", post(create_form_handler))
            .route("/api/forms/enhanced/:form_id", put(update_form_handler))
            .route("/api/forms", get(list_forms_handler))
            .route(
                "/api/forms/:form_id",
                get(get_form_handler)
                    .put(update_form_handler)
                    .delete(delete_form_handler),
            )
            .route("/api/forms/:form_id/duplicate", post(duplicate_form_handler))
            // Token-gated evaluation access
            .route(
                "/api/enhanced-evaluate/:token",
                get(resolve_evaluation_handler).post(submit_evaluation_handler),
            )
            // Reporting
            .route("/api/users/:user_id/forms", get(user_forms_handler))
            .route("/api/forms/:form_id/assignments", get(form_assignments_handler))
            .route("/api/forms/:form_id/responses", get(form_responses_handler))
            // Notifications
            .route("/api/notifications/:user_id", get(list_notifications_handler))
            .route(
                "/api/notifications/:notification_id/read",
                put(mark_notification_read_handler),
            )
            // Admin
            .route("/api/dashboard/stats", get(dashboard_stats_handler))
            .route("/api/admin/clear-data", delete(clear_data_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start serving with dynamic port allocation
    ///
    /// Tries the configured address first, then the next ten ports when
    /// the primary is taken.
    pub async fn serve(self) -> anyhow::Result<()> {
        let router = Self::build_router(self.state.clone());

        match tokio::net::TcpListener::bind(self.config.addr).await {
            Ok(listener) => {
                info!("API server listening on http://{}", self.config.addr);
                axum::serve(listener, router).await?;
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                warn!(
                    "Port {} in use, trying alternative ports...",
                    self.config.addr.port()
                );
            }
            Err(e) => return Err(e.into()),
        }

        let base_port = self.config.addr.port();
        for offset in 1..=10 {
            let alt_addr = SocketAddr::new(self.config.addr.ip(), base_port + offset);
            match tokio::net::TcpListener::bind(alt_addr).await {
                Ok(listener) => {
                    info!("API server listening on http://{}", alt_addr);
                    axum::serve(listener, router).await?;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(anyhow::anyhow!(
            "All ports ({}-{}) are in use",
            base_port,
            base_port + 10
        ))
    }
}

impl IntoResponse for VantageError {
    fn into_response(self) -> Response {
        let status = match &self {
            VantageError::NotFound(_) => StatusCode::NOT_FOUND,
            VantageError::Validation(_) | VantageError::InvalidId(_) => StatusCode::BAD_REQUEST,
            VantageError::Conflict(_) => StatusCode::CONFLICT,
            VantageError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ========== Health & auth ==========

async fn health_handler(State(state): State<AppState>) -> Response {
    let database = match state.store.health_check().await {
        Ok(()) => "libsql",
        Err(e) => {
            warn!("Health check failed: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response();
        }
    };
    Json(json!({
        "status": "healthy",
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, VantageError> {
    let user = state.store.find_user_by_email(&req.email).await?;

    let user = match user {
        Some(user) if state.verifier.verify(&req.password, &user.password_hash) => user,
        _ => {
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "message": "Invalid credentials" })),
            )
                .into_response());
        }
    };

    let token = state.sessions.issue(user.id)?;
    Ok(Json(json!({
        "success": true,
        "user": user.profile(),
        "token": token,
    }))
    .into_response())
}

async fn list_users_handler(State(state): State<AppState>) -> Result<Response, VantageError> {
    let users = state.store.list_users().await?;
    let profiles: Vec<_> = users.iter().map(|u| u.profile()).collect();
    Ok(Json(profiles).into_response())
}

// ========== Form lifecycle ==========

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormRequest {
    title: Option<String>,
    description: Option<String>,
    due_date: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    allow_late_submissions: bool,
    #[serde(default)]
    allow_multiple_responses: bool,
    #[serde(default = "default_notify")]
    notify_on_completion: bool,
    subject_matrix: Option<Vec<SubjectEntry>>,
    questions: Option<Vec<Question>>,
    created_by: Option<String>,
}

fn default_notify() -> bool {
    true
}

struct ValidatedForm {
    title: String,
    description: String,
    due_date: Option<chrono::DateTime<Utc>>,
    allow_late_submissions: bool,
    allow_multiple_responses: bool,
    notify_on_completion: bool,
    subject_matrix: Vec<SubjectEntry>,
    questions: Vec<Question>,
    created_by: UserId,
}

fn validate_form_request(req: FormRequest) -> Result<ValidatedForm, VantageError> {
    let (title, questions, subject_matrix, created_by) =
        match (req.title, req.questions, req.subject_matrix, req.created_by) {
            (Some(t), Some(q), Some(m), Some(c)) if !t.is_empty() => (t, q, m, c),
            _ => {
                return Err(VantageError::Validation(
                    "Title, questions, subjectMatrix, and createdBy are required".to_string(),
                ))
            }
        };

    if subject_matrix.is_empty() {
        return Err(VantageError::Validation(
            "At least one subject is required".to_string(),
        ));
    }

    let created_by = UserId::from_string(&created_by)?;

    // Clients may omit question ids; answers key off them, so fill in
    // unique ones here
    let questions = questions
        .into_iter()
        .map(|mut q| {
            if q.id.is_empty() {
                q.id = generate_question_id();
            }
            q
        })
        .collect();

    Ok(ValidatedForm {
        title,
        description: req.description.unwrap_or_default(),
        due_date: req.due_date,
        allow_late_submissions: req.allow_late_submissions,
        allow_multiple_responses: req.allow_multiple_responses,
        notify_on_completion: req.notify_on_completion,
        subject_matrix,
        questions,
        created_by,
    })
}

fn generate_question_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("q_{}_{}", Utc::now().timestamp_millis(), suffix)
}

async fn create_form_handler(
    State(state): State<AppState>,
    Json(req): Json<FormRequest>,
) -> Result<Response, VantageError> {
    let validated = validate_form_request(req)?;

    let creator = state
        .store
        .get_user(validated.created_by)
        .await
        .map_err(|_| VantageError::NotFound("Creator not found".to_string()))?;

    let now = Utc::now();
    let form = Form {
        id: FormId::new(),
        title: validated.title,
        description: validated.description,
        due_date: validated.due_date,
        allow_late_submissions: validated.allow_late_submissions,
        allow_multiple_responses: validated.allow_multiple_responses,
        notify_on_completion: validated.notify_on_completion,
        form_type: "enhanced".to_string(),
        subject_matrix: validated.subject_matrix,
        questions: validated.questions,
        created_by: creator.id,
        creator: Some(CreatorInfo {
            name: creator.name.clone(),
            email: creator.email.clone(),
            department: creator.department.clone(),
        }),
        created_at: now,
        updated_at: now,
        status: FormStatus::Active,
    };

    let assignments = fanout::generate_assignments(&form, now);
    let notifications = fanout::build_notifications(&form, &assignments, now);
    state
        .store
        .create_form(&form, &assignments, &notifications)
        .await?;

    let subject_count = form.subject_matrix.len();
    let evaluator_count = assignments
        .iter()
        .filter(|a| a.participant_type == ParticipantType::Evaluator)
        .count();

    info!(
        "Created form '{}' with {} assignments ({} subjects, {} evaluators)",
        form.title,
        assignments.len(),
        subject_count,
        evaluator_count
    );

    Ok(Json(json!({
        "success": true,
        "form": {
            "id": form.id,
            "title": form.title,
            "description": form.description,
            "formType": form.form_type,
            "questionsCount": form.questions.len(),
            "subjectsCount": subject_count,
            "totalAssignments": assignments.len(),
            "subjectAssignments": subject_count,
            "evaluatorAssignments": evaluator_count,
            "createdAt": form.created_at,
        },
        "message": "Enhanced form created successfully",
    }))
    .into_response())
}

async fn update_form_handler(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    Json(req): Json<FormRequest>,
) -> Result<Response, VantageError> {
    let form_id = FormId::from_string(&form_id)?;
    let existing = state.store.get_form(form_id).await?;
    let validated = validate_form_request(req)?;

    let now = Utc::now();
    let form = Form {
        id: existing.id,
        title: validated.title,
        description: validated.description,
        due_date: validated.due_date,
        allow_late_submissions: validated.allow_late_submissions,
        allow_multiple_responses: validated.allow_multiple_responses,
        notify_on_completion: validated.notify_on_completion,
        form_type: existing.form_type,
        subject_matrix: validated.subject_matrix,
        questions: validated.questions,
        created_by: existing.created_by,
        creator: existing.creator,
        created_at: existing.created_at,
        updated_at: now,
        status: existing.status,
    };

    // Regeneration invalidates every outstanding token; prior responses
    // and notifications go with them
    let assignments = fanout::generate_assignments(&form, now);
    let notifications = fanout::build_notifications(&form, &assignments, now);
    state
        .store
        .replace_form(&form, &assignments, &notifications)
        .await?;

    info!(
        "Updated form {} with {} regenerated assignments",
        form.id,
        assignments.len()
    );

    Ok(Json(json!({
        "success": true,
        "message": "Form updated successfully",
        "assignmentsCreated": assignments.len(),
    }))
    .into_response())
}

async fn attach_creator(state: &AppState, form: &mut Form) {
    if form.creator.is_none() {
        if let Ok(user) = state.store.get_user(form.created_by).await {
            form.creator = Some(CreatorInfo {
                name: user.name,
                email: user.email,
                department: user.department,
            });
        }
    }
}

async fn list_forms_handler(State(state): State<AppState>) -> Result<Response, VantageError> {
    let mut forms = state.store.list_forms().await?;
    for form in &mut forms {
        attach_creator(&state, form).await;
    }
    Ok(Json(forms).into_response())
}

async fn get_form_handler(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> Result<Response, VantageError> {
    let form_id = FormId::from_string(&form_id)?;
    let mut form = state.store.get_form(form_id).await?;
    attach_creator(&state, &mut form).await;
    Ok(Json(form).into_response())
}

async fn delete_form_handler(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> Result<Response, VantageError> {
    let form_id = FormId::from_string(&form_id)?;
    state.store.delete_form_cascade(form_id).await?;
    Ok(Json(json!({ "success": true })).into_response())
}

async fn duplicate_form_handler(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> Result<Response, VantageError> {
    let form_id = FormId::from_string(&form_id)?;
    let original = state.store.get_form(form_id).await?;

    let now = Utc::now();
    let mut duplicate = original;
    duplicate.id = FormId::new();
    duplicate.title = format!("{} (Copy)", duplicate.title);
    duplicate.created_at = now;
    duplicate.updated_at = now;
    // Starts as a draft; activating it later regenerates assignments
    duplicate.status = FormStatus::Draft;

    state.store.insert_form(&duplicate).await?;
    info!("Duplicated form {} as {}", form_id, duplicate.id);
    Ok(Json(duplicate).into_response())
}

// ========== Evaluation access ==========

async fn resolve_evaluation_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, VantageError> {
    let token = AccessToken::new(token);
    let resolved = state.evaluations.resolve(&token).await?;

    let allow_multiple = resolved.form.allow_multiple_responses;
    let mut body = json!({
        "form": resolved.form,
        "assignment": resolved.assignment,
        "participantInfo": resolved.participant_info,
        "allowMultipleResponses": allow_multiple,
        "token": token,
    });
    if let Some(existing) = resolved.existing_response {
        body["existingResponse"] = json!({
            "responses": existing.answers,
            "submittedAt": existing.submitted_at,
            "status": "completed",
        });
    }
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    responses: Option<serde_json::Map<String, serde_json::Value>>,
}

async fn submit_evaluation_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, VantageError> {
    let answers = req
        .responses
        .ok_or_else(|| VantageError::Validation("Responses are required".to_string()))?;

    let meta = SubmissionMeta {
        ip_address: header_value(&headers, "x-forwarded-for"),
        user_agent: header_value(&headers, header::USER_AGENT.as_str()),
    };

    let token = AccessToken::new(token);
    let outcome = state.evaluations.submit(&token, answers, meta).await?;

    let message = if outcome.updated {
        "Evaluation updated successfully"
    } else {
        "Evaluation submitted successfully"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "responseId": outcome.response_id,
        "updated": outcome.updated,
    }))
    .into_response())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// ========== Reporting ==========

async fn user_forms_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, VantageError> {
    // A malformed id gets the empty workspace rather than an error;
    // clients probe with arbitrary ids
    let user_id = match UserId::from_string(&user_id) {
        Ok(id) => id,
        Err(_) => return Ok(Json(UserWorkspace::empty()).into_response()),
    };
    let workspace = state.analytics.user_workspace(user_id).await?;
    Ok(Json(workspace).into_response())
}

async fn form_assignments_handler(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> Result<Response, VantageError> {
    let form_id = FormId::from_string(&form_id)?;
    let assignments = state.store.list_assignments_for_form(form_id).await?;
    Ok(Json(assignments).into_response())
}

async fn form_responses_handler(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> Result<Response, VantageError> {
    let form_id = FormId::from_string(&form_id)?;
    let report = state.analytics.form_report(form_id).await?;
    Ok(Json(report).into_response())
}

// ========== Notifications ==========

const NOTIFICATION_LIMIT: u32 = 100;

async fn list_notifications_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, VantageError> {
    let user_id = match UserId::from_string(&user_id) {
        Ok(id) => id,
        Err(_) => return Ok(Json(Vec::<Notification>::new()).into_response()),
    };
    let notifications = state
        .store
        .list_notifications_for_user(user_id, NOTIFICATION_LIMIT)
        .await?;
    Ok(Json(notifications).into_response())
}

async fn mark_notification_read_handler(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<Response, VantageError> {
    let notification_id = NotificationId::from_string(&notification_id)?;
    state
        .store
        .mark_notification_read(notification_id, Utc::now())
        .await?;
    Ok(Json(json!({ "success": true })).into_response())
}

// ========== Admin ==========

async fn dashboard_stats_handler(
    State(state): State<AppState>,
) -> Result<Response, VantageError> {
    let stats = state.analytics.dashboard_stats().await?;
    Ok(Json(stats).into_response())
}

async fn clear_data_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, VantageError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            VantageError::Unauthorized("Missing or malformed Authorization header".to_string())
        })?;
    let user_id = state.sessions.verify(token)?;

    let deleted = state.store.clear_all_data().await?;
    info!("User {} cleared {} documents", user_id, deleted);

    Ok(Json(json!({
        "success": true,
        "message": format!("Cleared {} documents from evaluation collections", deleted),
        "collections": ["forms", "assignments", "responses", "notifications"],
    }))
    .into_response())
}
