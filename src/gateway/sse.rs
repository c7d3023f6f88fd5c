use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{ApiError, GatewayState, extract_auth};

/// One entry of `POST /chat`'s `messages[]` array. Only the
/// `role="user"` entries carry anything `TurnRunner` acts on today — the
/// runner persists and replays prior Turns itself via `AuditStore`, so the
/// assistant/tool history a client resends is accepted but not re-parsed.
#[derive(Debug, Deserialize)]
pub struct ChatMessageIn {
    pub role: String,
    pub content: String,
}

/// `POST /chat` body: `{ chatId?, agentId, messages: [...] }`.
/// `chatId` omitted or unknown starts a fresh chat; the runner mints one.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "agentId")]
    pub agent_id: Uuid,
    #[serde(rename = "chatId")]
    pub chat_id: Option<Uuid>,
    pub messages: Vec<ChatMessageIn>,
}

/// Streams one Turn's `TurnEvent`s as server-sent events. A
/// literal `POST /chat` with a JSON request body rules out a
/// WebSocket upgrade (that needs a GET with `Connection: Upgrade`) — SSE
/// is the one-way equivalent axum and the rest of this stack already
/// speak fluently. Approval decisions arrive out of band on
/// `POST /chat/{chatId}/approvals`; their effect (the suspended
/// tool call resuming or finishing) still shows up as events on this
/// same open stream.
pub async fn chat_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let auth = extract_auth(&headers)?;
    if state.catalog.agent(body.agent_id).is_none() {
        return Err(crate::errors::BrokerError::Forbidden(format!("unknown agent '{}'", body.agent_id)).into());
    }

    let user_message = body
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .ok_or_else(|| crate::errors::BrokerError::InvalidSpec("messages[] must contain at least one user entry".into()))?;

    // Minted here rather than left to the runner so `X-Chat-Id`
    // is known before the SSE response's headers are written.
    let chat_id = body.chat_id.unwrap_or_else(Uuid::new_v4);
    let rx = state.runner.clone().run_turn(body.agent_id, auth.user_id, Some(chat_id), user_message);
    let stream = ReceiverStream::new(rx).map(|event| -> Result<Event, Infallible> {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event_name(&event)).data(data))
    });

    let sse: Sse<_> = Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"));
    let mut response = sse.into_response();
    if let Ok(value) = HeaderValue::from_str(&chat_id.to_string()) {
        response.headers_mut().insert("X-Chat-Id", value);
    }
    Ok(response)
}

fn event_name(event: &crate::runner::TurnEvent) -> &'static str {
    use crate::runner::TurnEvent;
    match event {
        TurnEvent::ChatStarted { .. } => "chat_started",
        TurnEvent::AssistantDelta { .. } => "assistant_delta",
        TurnEvent::ToolState { .. } => "tool_state",
        TurnEvent::ApprovalRequested { .. } => "approval_requested",
        TurnEvent::ToolResult { .. } => "tool_result",
        TurnEvent::Done => "done",
        TurnEvent::Error { .. } => "error",
    }
}
