use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redact_debug;

/// How a Source's Operations were (or will be) derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Openapi,
    Mcp,
    /// Legal, empty source. Produces zero Operations until ingested;
    /// indistinguishable from a fresh bind.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthKind {
    None,
    Bearer,
    ApiKey,
    Basic,
    HeaderPair,
    Passthrough,
}

/// Field names / labels describing how a Source's auth is shaped.
/// Never holds secret values — those live in `Credential`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default, rename = "headerName")]
    pub header_name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

redact_debug!(AuthConfig, header_name, labels,);

/// A bound upstream API service. Every Source belongs to exactly one org;
/// a Source may be linked to many Agents via `AgentSourceLink`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub org_id: Uuid,
    pub display_name: String,
    /// HTTP base URL, or MCP server URI, depending on `source_kind`.
    pub base_url: String,
    pub source_kind: SourceKind,
    pub auth_kind: AuthKind,
    #[serde(default)]
    pub auth_config: Option<AuthConfig>,
    /// Shared catalog entry carrying `runtimeHints`.
    #[serde(default)]
    pub template_ref: Option<Uuid>,
}

redact_debug!(
    Source,
    id,
    org_id,
    display_name,
    base_url,
    source_kind,
    auth_kind,
    auth_config,
    template_ref,
);

impl Source {
    /// `source.baseUrl` stripped of trailing slashes.
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
