use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tool_invocation::ToolInvocation;

/// One user message -> zero or more tool invocations -> one assistant reply.
/// Owns its ToolInvocations by index (Design Notes: arena, no back-pointers —
/// PageCache instances live keyed by `tool_call_id` in the owning
/// `TurnRunner`, not inside this struct, so a Turn stays `Clone`-able for
/// persistence without dragging live cache state along).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub chat_id: Uuid,
    pub turn_id: Uuid,
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub user_message: String,
    pub invocations: Vec<ToolInvocation>,
    pub assistant_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(chat_id: Uuid, agent_id: Uuid, user_id: Uuid, user_message: impl Into<String>) -> Self {
        Self {
            chat_id,
            turn_id: Uuid::new_v4(),
            agent_id,
            user_id,
            user_message: user_message.into(),
            invocations: Vec::new(),
            assistant_reply: None,
            created_at: Utc::now(),
        }
    }

    /// Find (or note the absence of) an invocation by `toolCallId`, used to
    /// dedupe re-emitted tool calls across model steps.
    pub fn find_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.invocations.iter().find(|i| i.tool_call_id == tool_call_id)
    }

    pub fn find_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.invocations.iter_mut().find(|i| i.tool_call_id == tool_call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dedupes_by_tool_call_id() {
        let mut turn = Turn::new(Uuid::nil(), Uuid::nil(), Uuid::nil(), "hi");
        turn.invocations
            .push(ToolInvocation::new("call_1", Uuid::nil(), json!({})));
        assert!(turn.find_invocation("call_1").is_some());
        assert!(turn.find_invocation("call_2").is_none());
    }
}
