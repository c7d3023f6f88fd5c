use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use rmcp::RoleClient;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{Peer, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::ServiceExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{BrokerError, BrokerResult};
use crate::model::{Credential, Source, SourceKind};

/// Pool key: `(sourceId, last-8-chars-of-credential-token)`. A credential
/// rotation mints a new key rather
/// than reusing a stale connection under the old token.
type PoolKey = (Uuid, String);

fn credential_tail(credential: &Credential) -> String {
    let raw = credential
        .token
        .as_deref()
        .or(credential.api_key.as_deref())
        .or(credential.header_value.as_deref())
        .unwrap_or("");
    let keep = raw.len().min(8);
    raw[raw.len() - keep..].to_string()
}

struct PooledConnection {
    service: RunningService<RoleClient, ()>,
}

/// Long-lived MCP connections, opened lazily and reused across dispatches
///. Only HTTP-transport MCP servers are
/// supported; stdio is rejected at bind time, not discovered lazily, since
/// `Source.baseUrl` is the only URI this pool ever sees.
pub struct McpClientPool {
    connections: Mutex<HashMap<PoolKey, Arc<PooledConnection>>>,
}

impl McpClientPool {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Number of currently pooled (source, credential) connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Lazily open (or reuse) the connection for `(source, credential)`.
    pub async fn get_or_connect(&self, source: &Source, credential: &Credential) -> BrokerResult<Peer<RoleClient>> {
        if source.source_kind != SourceKind::Mcp {
            return Err(BrokerError::McpUnsupportedTransport(format!(
                "source '{}' is not an MCP source",
                source.display_name
            )));
        }
        if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
            return Err(BrokerError::McpUnsupportedTransport(source.base_url.clone()));
        }

        let key: PoolKey = (source.id, credential_tail(credential));

        {
            let connections = self.connections.lock().await;
            if let Some(conn) = connections.get(&key) {
                return Ok(conn.service.peer().clone());
            }
        }

        let transport = StreamableHttpClientTransport::from_uri(source.base_url_trimmed());
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| BrokerError::UpstreamTransport(format!("MCP handshake failed for '{}': {e}", source.display_name)))?;
        let peer = service.peer().clone();

        let mut connections = self.connections.lock().await;
        connections
            .entry(key)
            .or_insert_with(|| Arc::new(PooledConnection { service }));
        info!(source = %source.display_name, "mcp connection opened");

        Ok(peer)
    }

    /// Close every connection belonging to `source_id`.
    pub async fn evict_source(&self, source_id: Uuid) {
        let mut connections = self.connections.lock().await;
        let stale: Vec<PoolKey> = connections.keys().filter(|(sid, _)| *sid == source_id).cloned().collect();
        for key in stale {
            if let Some(conn) = connections.remove(&key) {
                if let Ok(conn) = Arc::try_unwrap(conn) {
                    if let Err(e) = conn.service.cancel().await {
                        warn!(source_id = %source_id, "error cancelling mcp connection: {e}");
                    }
                }
            }
        }
    }

    /// Close every connection in the pool, for process shutdown.
    pub async fn shutdown(&self) {
        let mut connections = self.connections.lock().await;
        for (_, conn) in connections.drain() {
            if let Ok(conn) = Arc::try_unwrap(conn) {
                if let Err(e) = conn.service.cancel().await {
                    warn!("error cancelling mcp connection during shutdown: {e}");
                }
            }
        }
    }
}

impl Default for McpClientPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `callTool` request for one dispatch.
pub fn call_tool_request(tool_name: &str, args: serde_json::Value) -> CallToolRequestParams {
    let arguments = match args {
        serde_json::Value::Object(map) => Some(map),
        serde_json::Value::Null => None,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("input".to_string(), other);
            Some(map)
        }
    };
    CallToolRequestParams {
        meta: None,
        name: Cow::Owned(tool_name.to_string()),
        arguments,
        task: None,
    }
}
