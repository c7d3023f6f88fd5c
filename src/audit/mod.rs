use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;
use uuid::Uuid;

use crate::model::{ActionRecord, ActionStatus, ToolInvocation, Turn};

/// Append-only ActionRecord and Turn/message persistence. Every dispatch —
/// successful, failed, rejected, or
/// pending — writes exactly one ActionRecord; past records are never
/// mutated, only inserted. Mirrors the connection/PRAGMA/schema shape of
/// the agent's own SQLite memory store, scoped down to what this audit
/// trail actually needs.
pub struct AuditStore {
    conn: std::sync::Mutex<Connection>,
    db_path: String,
}

impl Clone for AuditStore {
    fn clone(&self) -> Self {
        let conn = Connection::open(&self.db_path)
            .unwrap_or_else(|e| panic!("failed to re-open audit DB at {}: {e}", self.db_path));
        if let Err(e) = conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        ) {
            warn!("failed to set PRAGMAs on cloned audit DB connection: {e}");
        }
        Self {
            conn: std::sync::Mutex::new(conn),
            db_path: self.db_path.clone(),
        }
    }
}

impl AuditStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create audit DB parent directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path).with_context(|| format!("failed to open audit DB at {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        )?;

        let store = Self {
            conn: std::sync::Mutex::new(conn),
            db_path: db_path.to_string_lossy().to_string(),
        };
        store.ensure_schema().with_context(|| format!("failed to initialize audit DB schema at {}", db_path.display()))?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS action_records (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                tool_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                operation_id TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                request_body TEXT,
                response_status INTEGER,
                response_body TEXT,
                duration_ms INTEGER NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                created_at TEXT NOT NULL,
                paginated INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_action_records_org ON action_records(org_id);
             CREATE INDEX IF NOT EXISTS idx_action_records_status ON action_records(status);
             CREATE INDEX IF NOT EXISTS idx_action_records_created ON action_records(created_at);",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS turns (
                turn_id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                user_message TEXT NOT NULL,
                assistant_reply TEXT,
                tool_calls_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_turns_chat ON turns(chat_id, created_at);",
        )?;

        Ok(())
    }

    /// Write one ActionRecord. Append-only: callers mint a fresh
    /// `ActionRecord.id` per dispatch attempt rather than updating an
    /// existing row.
    pub fn append_action(&self, record: &ActionRecord) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;
        conn.execute(
            "INSERT INTO action_records
             (id, org_id, user_id, agent_id, tool_id, source_id, operation_id, method, url,
              request_body, response_status, response_body, duration_ms, status, error_message,
              created_at, paginated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                record.org_id.to_string(),
                record.user_id.to_string(),
                record.agent_id.to_string(),
                record.tool_id,
                record.source_id.to_string(),
                record.operation_id.to_string(),
                record.method,
                record.url,
                record.request_body,
                record.response_status,
                record.response_body,
                record.duration_ms as i64,
                status_token(record.status),
                record.error_message,
                record.created_at.to_rfc3339(),
                record.paginated as i64,
            ],
        )?;
        Ok(())
    }

    /// `GET /activity?status=&limit=&offset=`, scoped to the
    /// caller's org — an org never sees another org's ActionRecords.
    pub fn list_activity(&self, org_id: Uuid, status: Option<ActionStatus>, limit: u32, offset: u32) -> Result<Vec<ActionRecord>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;

        let sql = "SELECT id, org_id, user_id, agent_id, tool_id, source_id, operation_id, method, url,
                          request_body, response_status, response_body, duration_ms, status, error_message,
                          created_at, paginated
                   FROM action_records
                   WHERE org_id = ?1 AND (?2 IS NULL OR status = ?2)
                   ORDER BY created_at DESC
                   LIMIT ?3 OFFSET ?4";
        let mut stmt = conn.prepare(sql)?;
        let status_param = status.map(status_token);
        let rows = stmt.query_map(params![org_id.to_string(), status_param, limit, offset], row_to_action_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Persist a Turn at completion, in insertion order, carrying the
    /// `toolCalls[]` snapshot needed to replay history without
    /// re-executing upstreams.
    pub fn persist_turn(&self, turn: &Turn) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;
        let tool_calls_json = serde_json::to_string(&turn.invocations)?;
        conn.execute(
            "INSERT INTO turns (turn_id, chat_id, agent_id, user_id, user_message, assistant_reply, tool_calls_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(turn_id) DO UPDATE SET
                assistant_reply = excluded.assistant_reply,
                tool_calls_json = excluded.tool_calls_json",
            params![
                turn.turn_id.to_string(),
                turn.chat_id.to_string(),
                turn.agent_id.to_string(),
                turn.user_id.to_string(),
                turn.user_message,
                turn.assistant_reply,
                tool_calls_json,
                turn.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// `GET /workspace/chats/{chatId}`: every Turn for a chat,
    /// strictly ordered by creation, with invocations restored from their
    /// persisted snapshot.
    pub fn chat_turns(&self, chat_id: Uuid) -> Result<Vec<Turn>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;
        let mut stmt = conn.prepare(
            "SELECT turn_id, chat_id, agent_id, user_id, user_message, assistant_reply, tool_calls_json, created_at
             FROM turns WHERE chat_id = ? ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![chat_id.to_string()], |row| {
            let turn_id: String = row.get(0)?;
            let chat_id: String = row.get(1)?;
            let agent_id: String = row.get(2)?;
            let user_id: String = row.get(3)?;
            let user_message: String = row.get(4)?;
            let assistant_reply: Option<String> = row.get(5)?;
            let tool_calls_json: String = row.get(6)?;
            let created_at: String = row.get(7)?;
            Ok((turn_id, chat_id, agent_id, user_id, user_message, assistant_reply, tool_calls_json, created_at))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (turn_id, chat_id, agent_id, user_id, user_message, assistant_reply, tool_calls_json, created_at) = row?;
            let invocations: Vec<ToolInvocation> = serde_json::from_str(&tool_calls_json)
                .map_err(|e| anyhow::anyhow!("corrupt tool_calls_json for turn {turn_id}: {e}"))?;
            turns.push(Turn {
                chat_id: parse_uuid(&chat_id)?,
                turn_id: parse_uuid(&turn_id)?,
                agent_id: parse_uuid(&agent_id)?,
                user_id: parse_uuid(&user_id)?,
                user_message,
                invocations,
                assistant_reply,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(turns)
    }

    /// Whether any turn exists for `chat_id`, used by the gateway to
    /// distinguish "empty chat" from "unknown chat" (404).
    pub fn chat_exists(&self, chat_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM turns WHERE chat_id = ? LIMIT 1", params![chat_id.to_string()], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// A trivial round trip against the DB connection, for liveness checks.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("audit DB lock poisoned: {e}"))?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn status_token(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::PendingConfirmation => "pending_confirmation",
        ActionStatus::Confirmed => "confirmed",
        ActionStatus::Rejected => "rejected",
        ActionStatus::Executing => "executing",
        ActionStatus::Completed => "completed",
        ActionStatus::Failed => "failed",
    }
}

fn parse_status(token: &str) -> rusqlite::Result<ActionStatus> {
    match token {
        "pending_confirmation" => Ok(ActionStatus::PendingConfirmation),
        "confirmed" => Ok(ActionStatus::Confirmed),
        "rejected" => Ok(ActionStatus::Rejected),
        "executing" => Ok(ActionStatus::Executing),
        "completed" => Ok(ActionStatus::Completed),
        "failed" => Ok(ActionStatus::Failed),
        other => Err(rusqlite::Error::InvalidColumnType(0, format!("unknown action status '{other}'"), rusqlite::types::Type::Text)),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid UUID '{s}' in audit DB"))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn row_to_action_record(row: &rusqlite::Row) -> rusqlite::Result<ActionRecord> {
    let status_str: String = row.get(13)?;
    let created_at_str: String = row.get(15)?;
    Ok(ActionRecord {
        id: parse_row_uuid(row, 0)?,
        org_id: parse_row_uuid(row, 1)?,
        user_id: parse_row_uuid(row, 2)?,
        agent_id: parse_row_uuid(row, 3)?,
        tool_id: row.get(4)?,
        source_id: parse_row_uuid(row, 5)?,
        operation_id: parse_row_uuid(row, 6)?,
        method: row.get(7)?,
        url: row.get(8)?,
        request_body: row.get(9)?,
        response_status: row.get(10)?,
        response_body: row.get(11)?,
        duration_ms: row.get::<_, i64>(12)? as u64,
        status: parse_status(&status_str)?,
        error_message: row.get(14)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::InvalidColumnType(15, e.to_string(), rusqlite::types::Type::Text))?,
        paginated: row.get::<_, i64>(16)? != 0,
    })
}

fn parse_row_uuid(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| rusqlite::Error::InvalidColumnType(idx, e.to_string(), rusqlite::types::Type::Text))
}
