//! REST API server for the financial tutor
//!
//! Exposes the budget simulator, savings goals, learning paths, the
//! health assessment, and the chatbot tutor via HTTP endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::budget::{self, BudgetSummary};
use crate::error::TutorError;
use crate::fanout;
use crate::generation::{KnowledgeLevel, LearningPathRequest, StructuredGenerator, TextModel};
use crate::models::{BudgetDraft, ChatMessage, ExpenseEntry, Goal, HealthSnapshot};
use crate::store::{paths, DocumentStore};
use crate::sync::{delete_detached, write_detached, DraftAutosave, FailurePolicy, LogOnly};

/// Generic localized failure message for model calls; details stay in logs.
const GENERATION_FAILURE_MESSAGE: &str =
    "Lo siento, algo salió mal. Por favor, intenta de nuevo más tarde.";

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BudgetRequest {
    pub user_id: Option<String>,
    pub income: f64,
    pub expenses: Vec<ExpenseEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub user_id: Option<String>,
    pub name: String,
    pub target_amount: f64,
    pub saved_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct HealthAssessmentRequest {
    pub income: f64,
    pub expenses: f64,
    pub debt: f64,
    pub savings: f64,
    pub goals: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLearningPathRequest {
    pub user_id: Option<String>,
    pub current_knowledge_level: String,
    pub financial_goals: String,
    pub financial_background: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn DocumentStore>,
    pub generator: StructuredGenerator,
    pub autosave: Arc<DraftAutosave>,
    pub failure_policy: Arc<dyn FailurePolicy>,
}

impl ApiState {
    pub fn new(store: Arc<dyn DocumentStore>, model: Arc<dyn TextModel>) -> Self {
        let failure_policy: Arc<dyn FailurePolicy> = Arc::new(LogOnly);
        Self {
            generator: StructuredGenerator::new(model),
            autosave: Arc::new(DraftAutosave::new(store.clone(), failure_policy.clone())),
            failure_policy,
            store,
        }
    }
}

/// =============================
/// Helpers: User Identity
/// =============================

/// Derive a stable UUID from a free-form identity-provider subject.
fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn resolve_user_id(value: Option<&str>) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string("anonymous-user"),
    }
}

fn internal_error(err: &TutorError) -> (StatusCode, Json<ApiResponse>) {
    let status = match err {
        TutorError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TutorError::NotFound(_) => StatusCode::NOT_FOUND,
        TutorError::Transport(_) | TutorError::Http(_) | TutorError::MalformedOutput(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(err.to_string())))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Budget Endpoints
/// =============================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetView {
    budget: Option<BudgetDraft>,
    summary: Option<BudgetSummary>,
}

async fn get_budget(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(query.user_id.as_deref());

    let docs = match state.store.list(&paths::user_budgets(user_id)).await {
        Ok(docs) => docs,
        Err(e) => return internal_error(&e),
    };

    let budget: Option<BudgetDraft> = docs.first().and_then(|doc| doc.deserialize().ok());
    let summary = budget.as_ref().map(budget::summarize);

    (
        StatusCode::OK,
        Json(ApiResponse::success(BudgetView { budget, summary })),
    )
}

/// Optimistic write: validation and the derived summary are synchronous,
/// the store write proceeds detached and is never awaited here.
async fn put_budget(
    State(state): State<ApiState>,
    Json(req): Json<BudgetRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(req.user_id.as_deref());
    let draft = BudgetDraft {
        income: req.income,
        expenses: req.expenses,
    };

    if let Err(e) = draft.validate() {
        return internal_error(&e);
    }

    let summary = budget::summarize(&draft);

    let scheduled = match state.autosave.push_budget(user_id, &draft).await {
        Ok(scheduled) => scheduled,
        Err(e) => return internal_error(&e),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "summary": summary,
            "scheduledWrite": scheduled,
        }))),
    )
}

/// =============================
/// Goal Endpoints
/// =============================

async fn list_goals(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(query.user_id.as_deref());

    match state.store.list(&paths::user_goals(user_id)).await {
        Ok(docs) => {
            let goals: Vec<Goal> = docs.iter().filter_map(|doc| doc.deserialize().ok()).collect();
            (StatusCode::OK, Json(ApiResponse::success(goals)))
        }
        Err(e) => internal_error(&e),
    }
}

async fn create_goal(
    State(state): State<ApiState>,
    Json(req): Json<GoalRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(req.user_id.as_deref());
    let doc = paths::user_goals(user_id).new_doc();
    let goal = Goal {
        id: doc.id(),
        name: req.name,
        target_amount: req.target_amount,
        saved_amount: req.saved_amount,
    };

    if let Err(e) = goal.validate() {
        return internal_error(&e);
    }

    let mut data = match serde_json::to_value(&goal) {
        Ok(data) => data,
        Err(e) => return internal_error(&e.into()),
    };
    if let serde_json::Value::Object(ref mut map) = data {
        map.remove("id");
        map.insert(
            "userId".to_string(),
            serde_json::Value::String(user_id.to_string()),
        );
    }

    info!("Scheduling goal create {} for user {}", doc.id(), user_id);
    write_detached(state.store.clone(), state.failure_policy.clone(), doc.clone(), data);

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({
            "id": doc.id(),
            "completed": goal.is_completed(),
        }))),
    )
}

async fn delete_goal(
    State(state): State<ApiState>,
    Path(goal_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(query.user_id.as_deref());
    let doc = paths::user_goals(user_id).doc(goal_id);

    info!("Scheduling goal delete {} for user {}", goal_id, user_id);
    delete_detached(state.store.clone(), state.failure_policy.clone(), doc);

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({ "id": goal_id }))),
    )
}

/// =============================
/// Tutor Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.query.trim().is_empty() {
        return internal_error(&TutorError::Validation(
            "La pregunta no puede estar vacía.".to_string(),
        ));
    }

    match state.generator.chat(&req.query, &req.history).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "answer": answer.answer,
            }))),
        ),
        Err(e) => {
            error!("Tutor chat failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(GENERATION_FAILURE_MESSAGE.to_string())),
            )
        }
    }
}

/// =============================
/// Financial Health Endpoint
/// =============================

async fn recommendations_handler(
    State(state): State<ApiState>,
    Json(req): Json<HealthAssessmentRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let snapshot = HealthSnapshot {
        income: req.income,
        expenses: req.expenses,
        debt: req.debt,
        savings: req.savings,
        goals: req.goals,
    };

    match state.generator.recommend(&snapshot).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "recommendations": result.recommendations,
            }))),
        ),
        Err(e) => {
            error!("Health recommendations failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(GENERATION_FAILURE_MESSAGE.to_string())),
            )
        }
    }
}

/// =============================
/// Learning Path Endpoints
/// =============================

async fn create_learning_path(
    State(state): State<ApiState>,
    Json(req): Json<CreateLearningPathRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(req.user_id.as_deref());

    let level: KnowledgeLevel = match req.current_knowledge_level.parse() {
        Ok(level) => level,
        Err(e) => return internal_error(&e),
    };
    if req.financial_goals.trim().len() < 10 {
        return internal_error(&TutorError::Validation(
            "Tus metas deben tener al menos 10 caracteres.".to_string(),
        ));
    }
    if req.financial_background.trim().len() < 10 {
        return internal_error(&TutorError::Validation(
            "Tu contexto debe tener al menos 10 caracteres.".to_string(),
        ));
    }

    let request = LearningPathRequest {
        level,
        financial_goals: req.financial_goals.clone(),
        financial_background: req.financial_background,
    };

    // Generation gates the response; nothing is persisted on failure.
    let generated = match state.generator.learning_path(&request).await {
        Ok(generated) => generated,
        Err(e) => {
            error!("Learning path generation failed: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(GENERATION_FAILURE_MESSAGE.to_string())),
            );
        }
    };

    let name = format!("Ruta de aprendizaje para {}", level);
    let description = format!("Metas: {}", req.financial_goals);

    match fanout::persist_learning_path(
        state.store.as_ref(),
        user_id,
        &name,
        &description,
        &generated,
    )
    .await
    {
        Ok(persisted) => (StatusCode::CREATED, Json(ApiResponse::success(persisted))),
        Err(e) => {
            warn!("Learning path persistence failed: {}", e);
            internal_error(&e)
        }
    }
}

async fn get_learning_path(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(query.user_id.as_deref());

    match fanout::load_active_learning_path(state.store.as_ref(), user_id).await {
        Ok(path) => (StatusCode::OK, Json(ApiResponse::success(path))),
        Err(e) => internal_error(&e),
    }
}

async fn delete_learning_path_handler(
    State(state): State<ApiState>,
    Path(path_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = resolve_user_id(query.user_id.as_deref());

    match fanout::delete_learning_path(state.store.as_ref(), user_id, path_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "id": path_id }))),
        ),
        Err(e) => internal_error(&e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/budget", get(get_budget).put(put_budget))
        .route("/api/goals", get(list_goals).post(create_goal))
        .route("/api/goals/:goal_id", delete(delete_goal))
        .route("/api/tutor/chat", post(chat_handler))
        .route("/api/health/recommendations", post(recommendations_handler))
        .route(
            "/api/learning-path",
            get(get_learning_path).post(create_learning_path),
        )
        .route("/api/learning-path/:path_id", delete(delete_learning_path_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_uuid_is_deterministic() {
        let a = stable_uuid_from_string("firebase-uid-abc123");
        let b = stable_uuid_from_string("firebase-uid-abc123");
        assert_eq!(a, b);
        assert_ne!(a, stable_uuid_from_string("firebase-uid-xyz789"));
    }

    #[test]
    fn test_resolve_user_id_accepts_uuid_and_free_form() {
        let direct = Uuid::new_v4();
        assert_eq!(resolve_user_id(Some(&direct.to_string())), direct);

        let derived = resolve_user_id(Some("provider|user-42"));
        assert_eq!(derived, stable_uuid_from_string("provider|user-42"));

        assert_eq!(
            resolve_user_id(None),
            stable_uuid_from_string("anonymous-user")
        );
    }
}
