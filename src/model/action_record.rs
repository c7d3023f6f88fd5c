use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    PendingConfirmation,
    Confirmed,
    Rejected,
    Executing,
    Completed,
    Failed,
}

/// The durable audit entry written for every dispatched Operation
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub tool_id: String,
    pub source_id: Uuid,
    pub operation_id: Uuid,
    pub method: String,
    pub url: String,
    pub request_body: Option<String>,
    pub response_status: Option<u16>,
    /// Capped to ~64 KiB — enforced by the writer, not this type.
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub status: ActionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paginated: bool,
}

/// Max stored response body size.
pub const RESPONSE_BODY_CAP: usize = 64 * 1024;

impl ActionRecord {
    /// Truncate `body` to `RESPONSE_BODY_CAP` bytes on a UTF-8 boundary.
    pub fn cap_response_body(body: &str) -> String {
        if body.len() <= RESPONSE_BODY_CAP {
            return body.to_string();
        }
        let mut end = RESPONSE_BODY_CAP;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}
