use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::PaginatedInvocation;

/// Shared pagination state keyed by `(chatId, toolCallId)`.
/// A `PaginatedInvocation` is seeded from a Turn's first list-shaped
/// response and must outlive that Turn's streaming connection — a later
/// `POST /tools/paginate` call arrives on its own HTTP request, long after
/// the chat stream that created the cache has closed.
#[derive(Default)]
pub struct PaginationRegistry {
    entries: Mutex<HashMap<(Uuid, String), Arc<Mutex<PaginatedInvocation>>>>,
}

impl PaginationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, chat_id: Uuid, tool_call_id: String, state: PaginatedInvocation) {
        self.entries
            .lock()
            .await
            .insert((chat_id, tool_call_id), Arc::new(Mutex::new(state)));
    }

    pub async fn get(&self, chat_id: Uuid, tool_call_id: &str) -> Option<Arc<Mutex<PaginatedInvocation>>> {
        self.entries.lock().await.get(&(chat_id, tool_call_id.to_string())).cloned()
    }

    /// Drop pagination state for a chat once it's no longer useful (e.g. the
    /// owning Turn failed before a cache was ever seeded).
    pub async fn remove(&self, chat_id: Uuid, tool_call_id: &str) {
        self.entries.lock().await.remove(&(chat_id, tool_call_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let registry = PaginationRegistry::new();
        let chat_id = Uuid::new_v4();
        let state = PaginatedInvocation::from_first_response(json!({"limit": 2}), &json!({"data": [], "has_more": false}));
        registry.insert(chat_id, "call_1".into(), state).await;

        assert!(registry.get(chat_id, "call_1").await.is_some());
        assert!(registry.get(chat_id, "call_2").await.is_none());
    }

    #[tokio::test]
    async fn remove_drops_entry() {
        let registry = PaginationRegistry::new();
        let chat_id = Uuid::new_v4();
        let state = PaginatedInvocation::from_first_response(json!({}), &json!({"data": []}));
        registry.insert(chat_id, "call_1".into(), state).await;
        registry.remove(chat_id, "call_1").await;
        assert!(registry.get(chat_id, "call_1").await.is_none());
    }
}
