use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    ReadWrite,
}

/// A per-org configuration binding a system prompt, a model choice, and a
/// set of Sources (GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub org_id: Uuid,
    pub display_name: String,
    pub system_prompt: String,
    pub model: String,
}

/// Connects an Agent to a Source with a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSourceLink {
    pub agent_id: Uuid,
    pub source_id: Uuid,
    pub permission: Permission,
}
