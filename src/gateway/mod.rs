mod sse;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditStore;
use crate::catalog::CatalogStore;
use crate::confirmation::ConfirmationGate;
use crate::credentials::CredentialResolver;
use crate::errors::{BrokerError, BrokerResult};
use crate::executor::{Executor, ExecutorContext, clean_args, summarize_success};
use crate::mcp::McpClientPool;
use crate::model::{ActionRecord, ActionStatus, Method};
use crate::pagination::PaginationRegistry;
use crate::runner::TurnRunner;
use crate::utils::tool_identifier;

pub use sse::chat_handler;

/// Everything an HTTP handler needs to serve one request. Built
/// once at startup and shared across every connection via axum's `State`
/// extractor — the same collaborators `TurnRunner` already holds, plus the
/// pieces the non-chat endpoints dispatch against directly.
#[derive(Clone)]
pub struct GatewayState {
    pub catalog: Arc<CatalogStore>,
    pub credentials: Arc<CredentialResolver>,
    pub executor: Arc<Executor>,
    pub mcp_pool: Arc<McpClientPool>,
    pub gate: Arc<ConfirmationGate>,
    pub audit: Arc<AuditStore>,
    pub pagination: Arc<PaginationRegistry>,
    pub runner: Arc<TurnRunner>,
}

/// Build the full axum router for the broker's external interfaces.
/// `POST /chat` is the only streaming endpoint; everything else is a
/// plain request/response JSON handler.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/{chatId}/approvals", post(approval_handler))
        .route("/tools/execute", post(execute_handler))
        .route("/tools/paginate", post(paginate_handler))
        .route("/activity", get(activity_handler))
        .route("/workspace/chats/{chatId}", get(chat_history_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

/// Caller identity handed off by the external authentication provider
///. The broker trusts a reverse proxy /
/// gateway in front of it to have already authenticated the request and
/// injected these headers; a request missing either is `unauthorized`.
struct AuthContext {
    user_id: Uuid,
    org_id: Uuid,
}

fn extract_auth(headers: &HeaderMap) -> BrokerResult<AuthContext> {
    let user_id = header_uuid(headers, "x-user-id").ok_or(BrokerError::Unauthorized)?;
    let org_id = header_uuid(headers, "x-org-id").ok_or(BrokerError::Unauthorized)?;
    Ok(AuthContext { user_id, org_id })
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| Uuid::parse_str(s).ok())
}

/// Normalized error envelope every handler returns on failure:
/// `{ "error": { "kind": ..., "message": ... } }` with
/// the status code `BrokerError::http_status` assigns to that kind.
struct ApiError(BrokerError);

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        ApiError(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(BrokerError::Internal(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if matches!(self.0, BrokerError::Internal(_)) {
            warn!("internal_error: {:#}", self.0);
        }
        let body = json!({ "error": { "kind": self.0.kind(), "message": self.0.to_string() } });
        (status, Json(body)).into_response()
    }
}

/// `{ approvalId, approved }` frame delivered through a side
/// channel rather than literally multiplexed onto the open `/chat`
/// response body — HTTP/1.1 SSE is one-way. The decision still resolves
/// on the same logical Turn and its effects stream out over the open
/// `/chat` connection (DESIGN.md records this as an implementation
/// decision for the ambiguous "same stream channel" wording).
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    #[serde(rename = "approvalId")]
    pub approval_id: String,
    pub approved: bool,
}

async fn approval_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(_chat_id): Path<Uuid>,
    Json(body): Json<ApprovalRequest>,
) -> Result<Json<Value>, ApiError> {
    extract_auth(&headers)?;
    let resolved = state.gate.resolve(&body.approval_id, body.approved);
    Ok(Json(json!({ "ok": resolved })))
}

/// `POST /tools/execute` — body `{ toolId, params, agentId }`.
/// Direct execution bypassing the model, used for explicit slash
/// commands. A dangerous/confirmation-gated Operation is never executed
/// here without the caller re-submitting `confirmed: true` — there is no
/// model-driven stream to suspend against in this path.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(rename = "toolId")]
    pub tool_id: String,
    #[serde(default)]
    pub params: Value,
    #[serde(rename = "agentId")]
    pub agent_id: Uuid,
    #[serde(default)]
    pub confirmed: bool,
}

async fn execute_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<Value>, ApiError> {
    let auth = extract_auth(&headers)?;

    let Some(op) = state.catalog.operation_by_tool_id(&body.tool_id) else {
        return Ok(Json(json!({ "ok": false, "error": format!("unknown tool '{}'", body.tool_id) })));
    };

    if ConfirmationGate::requires_confirmation(&op) && !body.confirmed {
        return Ok(Json(json!({ "ok": false, "requiresConfirmation": true })));
    }

    let Some(source) = state.catalog.source(op.source_id) else {
        return Ok(Json(json!({ "ok": false, "error": "source no longer bound" })));
    };
    let credential = state.credentials.resolve(auth.user_id, source.id, &source.display_name)?;
    let exec_ctx = ExecutorContext { source: &source, credential: &credential, user_id: auth.user_id };
    let cleaned = clean_args(&body.params);
    let hints = state.catalog.hints_for_source(&source);

    let exec = if op.method == Method::Mcp {
        crate::mcp::dispatch_mcp(&state.mcp_pool, &op, cleaned, &exec_ctx, hints.as_ref()).await.map(|(r, _)| r)?
    } else {
        state.executor.dispatch_http(&op, cleaned, &exec_ctx, hints.as_ref()).await?
    };

    let status = if exec.is_success() { ActionStatus::Completed } else { ActionStatus::Failed };
    append_action_record(&state.audit, &op, auth.org_id, auth.user_id, body.agent_id, &exec, status, false);

    if exec.is_success() {
        Ok(Json(json!({ "ok": true, "result": exec.body })))
    } else {
        Ok(Json(json!({ "ok": false, "error": exec.error_message.unwrap_or_default() })))
    }
}

/// `POST /tools/paginate` — body `{ toolId, input, sourceId }`.
/// Silent re-execution: the Model is never re-engaged, but a dispatch
/// still happened, so it still writes an ActionRecord flagged
/// `paginated=true` like every other executed Operation.
#[derive(Debug, Deserialize)]
pub struct PaginateRequest {
    #[serde(rename = "toolId")]
    pub tool_id: String,
    #[serde(default)]
    pub input: Value,
    #[serde(rename = "sourceId")]
    pub source_id: Uuid,
}

async fn paginate_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<PaginateRequest>,
) -> Result<Json<Value>, ApiError> {
    let auth = extract_auth(&headers)?;

    let op = state
        .catalog
        .operation_by_tool_id(&body.tool_id)
        .ok_or_else(|| BrokerError::InvalidSpec(format!("unknown tool '{}'", body.tool_id)))?;
    let source = state
        .catalog
        .source(body.source_id)
        .ok_or_else(|| BrokerError::Forbidden("source not bound".into()))?;

    let credential = state.credentials.resolve(auth.user_id, source.id, &source.display_name)?;
    let exec_ctx = ExecutorContext { source: &source, credential: &credential, user_id: auth.user_id };
    let cleaned = clean_args(&body.input);
    let hints = state.catalog.hints_for_source(&source);
    let exec = state.executor.dispatch_http(&op, cleaned, &exec_ctx, hints.as_ref()).await?;

    let agent_id = Uuid::nil();
    let status = if exec.is_success() { ActionStatus::Completed } else { ActionStatus::Failed };
    append_action_record(&state.audit, &op, auth.org_id, auth.user_id, agent_id, &exec, status, true);

    let summary = summarize_success(&exec.body);
    Ok(Json(json!({
        "_actionchat": {
            "tool_id": body.tool_id,
            "tool_name": op.display_name,
            "source_id": source.id,
            "source_name": source.display_name,
            "method": op.method.as_str(),
            "url": exec.url,
            "request_body": body.input,
            "response_status": exec.status,
            "response_body": exec.body,
            "duration_ms": exec.duration_ms,
            "error_message": exec.error_message,
        },
        "result": summary,
    })))
}

fn append_action_record(
    audit: &AuditStore,
    op: &crate::model::Operation,
    org_id: Uuid,
    user_id: Uuid,
    agent_id: Uuid,
    exec: &crate::executor::ExecResult,
    status: ActionStatus,
    paginated: bool,
) {
    let record = ActionRecord {
        id: Uuid::new_v4(),
        org_id,
        user_id,
        agent_id,
        tool_id: tool_identifier(&op.display_name, op.id),
        source_id: op.source_id,
        operation_id: op.id,
        method: op.method.as_str().to_string(),
        url: exec.url.clone(),
        request_body: None,
        response_status: Some(exec.status),
        response_body: Some(ActionRecord::cap_response_body(&exec.body.to_string())),
        duration_ms: exec.duration_ms,
        status,
        error_message: exec.error_message.clone(),
        created_at: chrono::Utc::now(),
        paginated,
    };
    if let Err(e) = audit.append_action(&record) {
        warn!("failed to append action record for direct tool execution: {e}");
    }
}

/// `GET /activity?status=&limit=&offset=`.
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

async fn activity_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Value>, ApiError> {
    let auth = extract_auth(&headers)?;
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let records = state.audit.list_activity(auth.org_id, status, query.limit, query.offset)?;
    Ok(Json(json!({ "records": records })))
}

fn parse_status(s: &str) -> BrokerResult<ActionStatus> {
    match s {
        "pending_confirmation" => Ok(ActionStatus::PendingConfirmation),
        "confirmed" => Ok(ActionStatus::Confirmed),
        "rejected" => Ok(ActionStatus::Rejected),
        "executing" => Ok(ActionStatus::Executing),
        "completed" => Ok(ActionStatus::Completed),
        "failed" => Ok(ActionStatus::Failed),
        other => Err(BrokerError::InvalidSpec(format!("unknown activity status '{other}'"))),
    }
}

/// `GET /workspace/chats/{chatId}`. Signed-URL refresh for
/// attachments is the object store's responsibility (out of scope, §1) —
/// this handler returns the persisted Turn/message/toolCalls shape verbatim.
async fn chat_history_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    extract_auth(&headers)?;
    if !state.audit.chat_exists(chat_id)? {
        return Err(BrokerError::Forbidden(format!("chat '{chat_id}' not found")).into());
    }
    let turns = state.audit.chat_turns(chat_id)?;
    Ok(Json(json!({ "chatId": chat_id, "turns": turns })))
}

/// Liveness probe: reports audit DB connectivity, the MCP connection
/// pool's current size, and whether an embedding provider is attached for
/// semantic tool selection. `status` degrades to `"degraded"` (never
/// `"ok"`) when the audit DB round trip fails, since every tool dispatch
/// depends on it for persistence.
async fn health_handler(State(state): State<GatewayState>) -> Json<Value> {
    let db_connected = state.audit.ping().is_ok();
    let status = if db_connected { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "operationCount": state.catalog.all_operations().len(),
        "db_connected": db_connected,
        "mcp_pool": state.mcp_pool.connection_count().await,
        "embeddings_ready": state.runner.embeddings_ready(),
    }))
}
