//! HTTP surface for a hosted Tamalebot agent.
//!
//! Endpoints:
//!
//! - `GET  /health`        — liveness + identity
//! - `POST /message`       — run one turn `{text, chatId?}`
//! - `POST /clear`         — forget a conversation
//! - `GET  /logs`          — audit journal read-back
//! - `GET  /memory/stats`  — conversation counters
//!
//! Every response carries permissive CORS headers; OPTIONS pre-flights are
//! answered directly. Externally surfaced error messages are capped at 200
//! characters and never include stack traces.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tamalebot_agent::{AgentLoop, ConversationStore, TurnSerializer};
use tamalebot_security::{AuditDecision, AuditJournal, EntryFilter};
use tracing::{error, info};

const MAX_ERROR_LEN: usize = 200;
const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 200;
const DEFAULT_CHAT_ID: &str = "default";

/// Shared state for the HTTP surface.
pub struct AppState {
    pub agent_id: String,
    pub agent_name: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub agent: Arc<AgentLoop>,
    pub conversations: Arc<dyn ConversationStore>,
    pub turns: TurnSerializer,
    pub audit: Arc<AuditJournal>,
}

pub type SharedState = Arc<AppState>;

/// Build the router with all routes and the CORS layer.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/message", post(message_handler))
        .route("/clear", post(clear_handler))
        .route("/logs", get(logs_handler))
        .route("/memory/stats", get(memory_stats_handler))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Permissive CORS: answer pre-flights directly, stamp everything else.
async fn cors(request: axum::extract::Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Cap an externally surfaced error message.
fn external_error(message: &str) -> String {
    let mut out: String = message.chars().take(MAX_ERROR_LEN).collect();
    if message.chars().count() > MAX_ERROR_LEN {
        out.push('…');
    }
    out
}

// ── /health ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    agent_id: String,
    agent_name: String,
    model: String,
    uptime: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent_id: state.agent_id.clone(),
        agent_name: state.agent_name.clone(),
        model: state.model.clone(),
        uptime: (Utc::now() - state.started_at).num_seconds(),
    })
}

// ── /message ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    chat_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageStats {
    tool_calls: usize,
    iterations: usize,
    input_tokens: u64,
    output_tokens: u64,
    tokens: u64,
}

#[derive(Serialize)]
struct MessageResponse {
    text: String,
    stats: MessageStats,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn message_handler(
    State(state): State<SharedState>,
    Json(request): Json<MessageRequest>,
) -> Response {
    let Some(text) = request.text.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing required field: text".into(),
            }),
        )
            .into_response();
    };
    let chat_id = request.chat_id.unwrap_or_else(|| DEFAULT_CHAT_ID.into());

    // One turn at a time per conversation, in submission order.
    let _turn_guard = state.turns.acquire(&chat_id).await;

    let mut history = state.conversations.load(&chat_id).await;
    match state.agent.run_turn(&mut history, &text).await {
        Ok(outcome) => {
            state.conversations.save(&chat_id, &history).await;
            info!(
                chat_id,
                iterations = outcome.iterations,
                tool_calls = outcome.tool_call_count,
                "Turn complete"
            );
            Json(MessageResponse {
                text: outcome.text,
                stats: MessageStats {
                    tool_calls: outcome.tool_call_count,
                    iterations: outcome.iterations,
                    input_tokens: outcome.input_tokens,
                    output_tokens: outcome.output_tokens,
                    tokens: outcome.input_tokens + outcome.output_tokens,
                },
            })
            .into_response()
        }
        Err(e) => {
            // Provider failure: report a short error, leave history unsaved.
            error!(chat_id, error = %e, "Turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: external_error(&e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

// ── /clear ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearRequest {
    #[serde(default)]
    chat_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    cleared: bool,
    chat_id: String,
}

async fn clear_handler(
    State(state): State<SharedState>,
    Json(request): Json<ClearRequest>,
) -> Json<ClearResponse> {
    let chat_id = request.chat_id.unwrap_or_else(|| DEFAULT_CHAT_ID.into());
    let _turn_guard = state.turns.acquire(&chat_id).await;
    state.conversations.clear(&chat_id).await;
    Json(ClearResponse {
        cleared: true,
        chat_id,
    })
}

// ── /logs ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    decision: Option<String>,
}

#[derive(Serialize)]
struct LogsResponse {
    entries: Vec<tamalebot_security::AuditEntry>,
    total: usize,
}

async fn logs_handler(
    State(state): State<SharedState>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let decision = match query.decision.as_deref() {
        Some("allowed") => Some(AuditDecision::Allowed),
        Some("blocked") => Some(AuditDecision::Blocked),
        Some(other) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: external_error(&format!(
                        "Invalid decision filter '{other}' (use allowed or blocked)"
                    )),
                }),
            )
                .into_response();
        }
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);

    let all = state.audit.entries(&EntryFilter {
        limit: None,
        agent_id: None,
        decision,
    });
    let total = all.len();
    let entries = if all.len() > limit {
        all[all.len() - limit..].to_vec()
    } else {
        all
    };
    Json(LogsResponse { entries, total }).into_response()
}

// ── /memory/stats ─────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryStatsResponse {
    conversation_count: usize,
    total_messages: usize,
}

async fn memory_stats_handler(State(state): State<SharedState>) -> Json<MemoryStatsResponse> {
    let stats = state.conversations.stats().await;
    Json(MemoryStatsResponse {
        conversation_count: stats.conversation_count,
        total_messages: stats.total_messages,
    })
}
