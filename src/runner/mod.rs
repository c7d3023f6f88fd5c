mod schema;

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::audit::AuditStore;
use crate::catalog::CatalogStore;
use crate::confirmation::{ApprovalOutcome, ConfirmationGate, apply_outcome};
use crate::credentials::CredentialResolver;
use crate::embeddings::EmbeddingProvider;
use crate::executor::{Executor, ExecutorContext, clean_args, summarize_success};
use crate::mcp::{McpClientPool, dispatch_mcp};
use crate::model::{ActionRecord, ActionStatus, Agent, AgentSourceLink, InvocationState, Method, Operation, ToolInvocation, Turn};
use crate::pagination::{PaginatedInvocation, PaginationRegistry};
use crate::provider::{Message, ModelClient, ToolCallRequest, ToolDefinition};
use crate::selector::{SEARCH_TOOLS_NAME, ToolSelector};
use crate::utils::tool_identifier;

pub use schema::{operation_json_schema, validate_args};

/// A Turn's side channel to whatever transport is relaying it to the user
/// (the gateway's SSE stream). One event per state change worth
/// surfacing live, cheaper than re-deriving it from the persisted Turn.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    ChatStarted { chat_id: Uuid, turn_id: Uuid },
    AssistantDelta { text: String },
    ToolState { tool_call_id: String, operation_id: Uuid, state: InvocationState },
    ApprovalRequested { tool_call_id: String, approval_id: String },
    ToolResult { tool_call_id: String, result: Value },
    Done,
    Error { message: String },
}

/// A Turn rarely needs more than two or three tool-calling round trips; this
/// bounds a runaway model from looping forever against the same Source.
const MAX_MODEL_STEPS: usize = 8;

/// Bookkeeping shared by every tool call within one Turn, carried alongside
/// `&mut Turn` so helper methods don't need half a dozen separate arguments.
struct TurnContext<'a> {
    turn: &'a mut Turn,
    org_id: Uuid,
    agent_id: Uuid,
    messages: Vec<Message>,
}

/// Orchestrates one user message through tool selection, model planning,
/// dispatch, and persistence — the per-turn control-flow loop.
/// Long-lived and shared across chats — nothing here is per-Turn state
/// except what's built fresh inside `run`.
pub struct TurnRunner {
    catalog: Arc<CatalogStore>,
    credentials: Arc<CredentialResolver>,
    executor: Arc<Executor>,
    mcp_pool: Arc<McpClientPool>,
    gate: Arc<ConfirmationGate>,
    audit: Arc<AuditStore>,
    model: Arc<ModelClient>,
    selector: ToolSelector,
    pagination: Arc<PaginationRegistry>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
}

impl TurnRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<CatalogStore>,
        credentials: Arc<CredentialResolver>,
        executor: Arc<Executor>,
        mcp_pool: Arc<McpClientPool>,
        gate: Arc<ConfirmationGate>,
        audit: Arc<AuditStore>,
        model: Arc<ModelClient>,
        pagination: Arc<PaginationRegistry>,
        k_cap: usize,
    ) -> Self {
        Self {
            catalog,
            credentials,
            executor,
            mcp_pool,
            gate,
            audit,
            model,
            selector: ToolSelector::new(k_cap),
            pagination,
            embeddings: None,
        }
    }

    /// Attach a query-time embedder; omitted, every Turn falls
    /// back to the Tool Selector's lexical scoring path.
    pub fn with_embeddings(mut self, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Whether a query-time embedder is attached; when false, Tool
    /// Selector falls back to lexical scoring for every Turn.
    pub fn embeddings_ready(&self) -> bool {
        self.embeddings.is_some()
    }

    fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        let service = self.embeddings.as_ref()?;
        match service.embed_query(text) {
            Ok(vec) => Some(vec),
            Err(e) => {
                warn!("query embedding failed, falling back to lexical selection: {e}");
                None
            }
        }
    }

    /// Kick off a Turn in the background, returning the event channel the
    /// caller streams to its client. The Turn keeps running (and gets
    /// persisted) even if the caller drops its receiver early.
    pub fn run_turn(self: Arc<Self>, agent_id: Uuid, user_id: Uuid, chat_id: Option<Uuid>, user_message: String) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(64);
        let chat_id = chat_id.unwrap_or_else(Uuid::new_v4);
        tokio::spawn(async move {
            self.run(chat_id, agent_id, user_id, user_message, tx).await;
        });
        rx
    }

    async fn run(&self, chat_id: Uuid, agent_id: Uuid, user_id: Uuid, user_message: String, tx: mpsc::Sender<TurnEvent>) {
        let Some(agent) = self.catalog.agent(agent_id) else {
            let _ = tx.send(TurnEvent::Error { message: format!("unknown agent '{agent_id}'") }).await;
            return;
        };

        let mut turn = Turn::new(chat_id, agent_id, user_id, user_message);
        let _ = tx.send(TurnEvent::ChatStarted { chat_id, turn_id: turn.turn_id }).await;

        let span = info_span!("turn", chat_id = %chat_id, turn_id = %turn.turn_id, agent_id = %agent_id);
        self.run_inner(&agent, &mut turn, &tx).instrument(span).await;

        if let Err(e) = self.audit.persist_turn(&turn) {
            warn!("failed to persist turn {}: {e}", turn.turn_id);
        }
        let _ = tx.send(TurnEvent::Done).await;
    }

    async fn run_inner(&self, agent: &Agent, turn: &mut Turn, tx: &mpsc::Sender<TurnEvent>) {
        let links = self.catalog.links_for_agent(agent.id);
        let all_operations = self.catalog.all_operations();
        let mut ctx = TurnContext {
            messages: vec![Message::system(agent.system_prompt.clone()), Message::user(turn.user_message.clone())],
            org_id: agent.org_id,
            agent_id: agent.id,
            turn,
        };

        for _step in 0..MAX_MODEL_STEPS {
            let query_embedding = self.embed_query(&ctx.turn.user_message);
            let selected_ids = self.selector.select(&links, &all_operations, &ctx.turn.user_message, query_embedding.as_deref());
            let mut name_to_op: std::collections::HashMap<String, Operation> = std::collections::HashMap::new();
            let mut tool_defs = Vec::with_capacity(selected_ids.len() + 1);
            for id in &selected_ids {
                if let Some(op) = all_operations.iter().find(|o| o.id == *id) {
                    let name = tool_identifier(&op.display_name, op.id);
                    tool_defs.push(ToolDefinition { name: name.clone(), description: op.description.clone(), parameters: operation_json_schema(op) });
                    name_to_op.insert(name, op.clone());
                }
            }
            tool_defs.push(ToolDefinition {
                name: SEARCH_TOOLS_NAME.to_string(),
                description: "Search the full catalog of available tools beyond the ones already offered.".to_string(),
                parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
            });

            let response = match self.model.step(&ctx.messages, &tool_defs).await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.send(TurnEvent::Error { message: format!("model step failed: {e}") }).await;
                    return;
                }
            };

            if let Some(content) = &response.content {
                let _ = tx.send(TurnEvent::AssistantDelta { text: content.clone() }).await;
                ctx.turn.assistant_reply = Some(content.clone());
            }

            ctx.messages.push(Message {
                role: "assistant".into(),
                content: response.content.clone().unwrap_or_default(),
                tool_calls: if response.has_tool_calls() { Some(response.tool_calls.clone()) } else { None },
                tool_call_id: None,
            });

            if !response.has_tool_calls() {
                return;
            }

            for call in &response.tool_calls {
                if let Some(existing) = ctx.turn.find_invocation(&call.id) {
                    if existing.state.is_terminal() {
                        let summary = existing.output.as_ref().map(summarize_success).unwrap_or_default();
                        ctx.messages.push(Message::tool_result(call.id.clone(), summary));
                        continue;
                    }
                }

                if call.name == SEARCH_TOOLS_NAME {
                    self.handle_search(&links, &all_operations, call, &mut ctx, tx).await;
                    continue;
                }

                let Some(op) = name_to_op.get(&call.name).cloned() else {
                    ctx.messages.push(Message::tool_result(call.id.clone(), "unknown tool name; call search_tools to discover valid tools".to_string()));
                    continue;
                };

                self.handle_tool_call(op, call, &mut ctx, tx).await;
            }
        }

        warn!("turn {} hit the model step cap without a final reply", ctx.turn.turn_id);
    }

    async fn handle_search(
        &self,
        links: &[AgentSourceLink],
        all_operations: &[Operation],
        call: &ToolCallRequest,
        ctx: &mut TurnContext<'_>,
        tx: &mpsc::Sender<TurnEvent>,
    ) {
        let query = call.arguments.get("query").and_then(Value::as_str).unwrap_or("");
        let query_embedding = self.embed_query(query);
        let hits = self.selector.search(links, all_operations, query, query_embedding.as_deref());
        let result = json!({ "hits": hits });

        let mut inv = ToolInvocation::new(call.id.clone(), Uuid::nil(), call.arguments.clone());
        let _ = inv.transition(InvocationState::InputAvailable);
        let _ = inv.transition(InvocationState::OutputAvailable);
        inv.output = Some(result.clone());
        ctx.turn.invocations.push(inv);

        let _ = tx.send(TurnEvent::ToolResult { tool_call_id: call.id.clone(), result: result.clone() }).await;
        ctx.messages.push(Message::tool_result(call.id.clone(), result.to_string()));
    }

    async fn handle_tool_call(&self, op: Operation, call: &ToolCallRequest, ctx: &mut TurnContext<'_>, tx: &mpsc::Sender<TurnEvent>) {
        let user_id = ctx.turn.user_id;
        let mut invocation = ToolInvocation::new(call.id.clone(), op.id, call.arguments.clone());
        let _ = invocation.transition(InvocationState::InputAvailable);
        let _ = tx.send(TurnEvent::ToolState { tool_call_id: invocation.tool_call_id.clone(), operation_id: op.id, state: invocation.state }).await;

        if let Err(e) = validate_args(&op, &invocation.arguments) {
            invocation.output = Some(json!({"error": e.clone()}));
            let _ = invocation.transition(InvocationState::OutputError);
            self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Failed, None, None, false, &op.path).await;
            ctx.messages.push(Message::tool_result(call.id.clone(), e));
            ctx.turn.invocations.push(invocation);
            return;
        }

        if ConfirmationGate::requires_confirmation(&op) {
            let (approval_id, rx) = match self.gate.open(&mut invocation) {
                Ok(pair) => pair,
                Err(e) => {
                    invocation.output = Some(json!({"error": e}));
                    ctx.messages.push(Message::tool_result(call.id.clone(), "failed to open approval gate".to_string()));
                    ctx.turn.invocations.push(invocation);
                    return;
                }
            };
            let _ = tx.send(TurnEvent::ApprovalRequested { tool_call_id: invocation.tool_call_id.clone(), approval_id: approval_id.clone() }).await;

            let outcome = self.gate.await_decision(&approval_id, rx).await;
            if let Err(e) = apply_outcome(&mut invocation, outcome) {
                warn!("{e}");
            }

            match outcome {
                ApprovalOutcome::Rejected => {
                    self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Rejected, None, None, false, &op.path).await;
                    let _ = tx
                        .send(TurnEvent::ToolResult { tool_call_id: invocation.tool_call_id.clone(), result: invocation.output.clone().unwrap_or(Value::Null) })
                        .await;
                    ctx.messages.push(Message::tool_result(call.id.clone(), "Rejected by user.".to_string()));
                    ctx.turn.invocations.push(invocation);
                    return;
                }
                ApprovalOutcome::Timeout => {
                    self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::PendingConfirmation, None, None, false, &op.path).await;
                    ctx.messages.push(Message::tool_result(call.id.clone(), "Still awaiting approval; will resume once decided.".to_string()));
                    ctx.turn.invocations.push(invocation);
                    return;
                }
                ApprovalOutcome::Approved => {}
            }
        }

        let Some(source) = self.catalog.source(op.source_id) else {
            invocation.output = Some(json!({"error": "source no longer bound"}));
            let _ = invocation.transition(InvocationState::OutputError);
            self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Failed, None, None, false, &op.path).await;
            ctx.messages.push(Message::tool_result(call.id.clone(), "source no longer bound".to_string()));
            ctx.turn.invocations.push(invocation);
            return;
        };

        let credential = match self.credentials.resolve(user_id, source.id, &source.display_name) {
            Ok(c) => c,
            Err(e) => {
                invocation.output = Some(json!({"error": e.to_string()}));
                let _ = invocation.transition(InvocationState::OutputError);
                self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Failed, None, None, false, &op.path).await;
                ctx.messages.push(Message::tool_result(call.id.clone(), e.to_string()));
                ctx.turn.invocations.push(invocation);
                return;
            }
        };

        let exec_ctx = ExecutorContext { source: &source, credential: &credential, user_id };
        let cleaned = clean_args(&invocation.arguments);
        let hints = self.catalog.hints_for_source(&source);

        let dispatch_outcome = if op.method == Method::Mcp {
            match dispatch_mcp(&self.mcp_pool, &op, cleaned.clone(), &exec_ctx, hints.as_ref()).await {
                Ok((result, warning)) => {
                    if let Some(w) = warning {
                        info!("{w}");
                    }
                    Ok(result)
                }
                Err(e) => Err(e),
            }
        } else {
            self.executor.dispatch_http(&op, cleaned.clone(), &exec_ctx, hints.as_ref()).await
        };

        match dispatch_outcome {
            Ok(exec) if exec.is_success() => {
                invocation.output = Some(exec.body.clone());
                invocation.duration_ms = Some(exec.duration_ms);
                invocation.upstream_status = Some(exec.status);
                let _ = invocation.transition(InvocationState::OutputAvailable);

                let state = PaginatedInvocation::from_first_response(cleaned.clone(), &exec.body);
                if state.has_more() {
                    self.pagination.insert(ctx.turn.chat_id, invocation.tool_call_id.clone(), state).await;
                }

                self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Completed, Some(exec.status), Some(exec.body.to_string()), false, &exec.url).await;
                let summary = summarize_success(&exec.body);
                let envelope = json!({
                    "_actionchat": {
                        "tool_id": tool_identifier(&op.display_name, op.id),
                        "tool_name": op.display_name,
                        "source_id": op.source_id,
                        "source_name": source.display_name,
                        "method": op.method.as_str(),
                        "url": exec.url,
                        "request_body": invocation.arguments,
                        "response_status": exec.status,
                        "response_body": exec.body,
                        "duration_ms": exec.duration_ms,
                        "error_message": exec.error_message,
                    },
                    "result": exec.body,
                });
                let _ = tx.send(TurnEvent::ToolState { tool_call_id: invocation.tool_call_id.clone(), operation_id: op.id, state: invocation.state }).await;
                let _ = tx.send(TurnEvent::ToolResult { tool_call_id: invocation.tool_call_id.clone(), result: envelope }).await;
                ctx.messages.push(Message::tool_result(call.id.clone(), summary));
            }
            Ok(exec) => {
                let err = exec.error_message.clone().unwrap_or_else(|| format!("upstream returned {}", exec.status));
                invocation.output = Some(json!({"error": err}));
                invocation.duration_ms = Some(exec.duration_ms);
                invocation.upstream_status = Some(exec.status);
                let _ = invocation.transition(InvocationState::OutputError);
                self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Failed, Some(exec.status), Some(exec.body.to_string()), false, &exec.url).await;
                let _ = tx.send(TurnEvent::ToolState { tool_call_id: invocation.tool_call_id.clone(), operation_id: op.id, state: invocation.state }).await;
                ctx.messages.push(Message::tool_result(call.id.clone(), err));
            }
            Err(e) => {
                invocation.output = Some(json!({"error": e.to_string()}));
                let _ = invocation.transition(InvocationState::OutputError);
                self.record_action(&op, &invocation, user_id, ctx.org_id, ctx.agent_id, ActionStatus::Failed, None, None, false, &op.path).await;
                let _ = tx.send(TurnEvent::ToolState { tool_call_id: invocation.tool_call_id.clone(), operation_id: op.id, state: invocation.state }).await;
                ctx.messages.push(Message::tool_result(call.id.clone(), e.to_string()));
            }
        }

        ctx.turn.invocations.push(invocation);
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_action(
        &self,
        op: &Operation,
        invocation: &ToolInvocation,
        user_id: Uuid,
        org_id: Uuid,
        agent_id: Uuid,
        status: ActionStatus,
        upstream_status: Option<u16>,
        response_body: Option<String>,
        paginated: bool,
        url: &str,
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
            url: url.to_string(),
            request_body: serde_json::to_string(&invocation.arguments).ok(),
            response_status: upstream_status,
            response_body: response_body.map(|b| ActionRecord::cap_response_body(&b)),
            duration_ms: invocation.duration_ms.unwrap_or(0),
            status,
            error_message: invocation.output.as_ref().and_then(|v| v.get("error")).and_then(Value::as_str).map(String::from),
            created_at: Utc::now(),
            paginated,
        };
        if let Err(e) = self.audit.append_action(&record) {
            warn!("failed to append action record for tool_call {}: {e}", invocation.tool_call_id);
        }
    }
}
