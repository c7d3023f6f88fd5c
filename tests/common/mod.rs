//! Shared fixtures for the wiremock-backed end-to-end tests: a Stripe-shaped
//! dispatch, a dangerous-operation confirmation gate, and a cursor
//! pagination cycle.

use std::sync::Arc;
use std::time::Duration;

use actionbroker::adapters::AdapterRegistry;
use actionbroker::audit::AuditStore;
use actionbroker::catalog::CatalogStore;
use actionbroker::confirmation::ConfirmationGate;
use actionbroker::config::ProviderConfig;
use actionbroker::credentials::{CredentialResolver, InMemoryCredentialStore};
use actionbroker::executor::Executor;
use actionbroker::gateway::GatewayState;
use actionbroker::mcp::McpClientPool;
use actionbroker::model::{AuthKind, Credential, Method, ParamLocation, ParamSpec, ParameterSchema, RiskLevel, Source, SourceKind};
use actionbroker::pagination::PaginationRegistry;
use actionbroker::provider::ModelClient;
use actionbroker::runner::TurnRunner;
use chrono::Utc;
use uuid::Uuid;

/// `Executor::dispatch_http` runs its URL through `validate_url`, which
/// blocks loopback addresses by default. wiremock always binds to
/// 127.0.0.1, so every test in this module needs the escape hatch.
pub fn allow_loopback() {
    unsafe { std::env::set_var("ACTIONBROKER_ALLOW_LOOPBACK", "1") };
}

pub fn source(base_url: &str, auth_kind: AuthKind) -> Source {
    Source {
        id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        display_name: "test-source".into(),
        base_url: base_url.to_string(),
        source_kind: SourceKind::Openapi,
        auth_kind,
        auth_config: None,
        template_ref: None,
    }
}

pub fn credential(user_id: Uuid, source_id: Uuid) -> Credential {
    Credential {
        id: Uuid::new_v4(),
        user_id,
        source_id,
        token: Some("sk_test_abc123".into()),
        api_key: Some("sk_test_abc123".into()),
        username: None,
        password: None,
        header_name: None,
        header_value: None,
        active: true,
        created_at: Utc::now(),
        rotated_at: None,
    }
}

pub fn op_with_params(source_id: Uuid, method: Method, path: &str, params: &[(&str, ParamLocation)], risk: RiskLevel, requires_confirmation: bool) -> actionbroker::model::Operation {
    let mut schema = ParameterSchema::new();
    for (name, loc) in params {
        schema.insert((*name).to_string(), ParamSpec { location: *loc, schema: serde_json::json!({"type": "string"}) });
    }
    actionbroker::model::Operation {
        id: Uuid::new_v4(),
        source_id,
        operation_id: path.trim_start_matches('/').replace('/', "_"),
        display_name: path.trim_start_matches('/').to_string(),
        description: "test operation".into(),
        method,
        path: path.to_string(),
        mcp_tool_name: None,
        parameter_schema: schema,
        request_body_schema: None,
        risk_level: risk,
        requires_confirmation,
        tags: vec![],
        embedding: None,
    }
}

/// Replicates `tool_identifier` (a crate-private helper) so tests can
/// predict the wire-level tool id for an `Operation` they built themselves.
pub fn tool_id(op: &actionbroker::model::Operation) -> String {
    let mut sanitized = String::new();
    let mut last_was_underscore = false;
    for ch in op.display_name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        if mapped == '_' && last_was_underscore {
            continue;
        }
        last_was_underscore = mapped == '_';
        sanitized.push(mapped);
        if sanitized.len() >= 55 {
            break;
        }
    }
    let sanitized = sanitized.trim_matches('_');
    let short: String = op.id.simple().to_string().chars().take(8).collect();
    format!("{sanitized}_{short}")
}

/// Assembles a `GatewayState` with every collaborator wired the way
/// `main::run` does, against a fresh on-disk audit DB under `tempfile`'s
/// managed temp dir. The returned `TempDir` must be kept alive for as long
/// as the state is used — dropping it deletes the backing SQLite file. The
/// returned credential store is the same one backing `GatewayState`'s
/// resolver, so tests can seed a Credential before dispatching.
pub fn gateway_state() -> (GatewayState, tempfile::TempDir, Arc<InMemoryCredentialStore>) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(CatalogStore::new());
    let credential_store = Arc::new(InMemoryCredentialStore::new());
    let credentials = Arc::new(CredentialResolver::new(credential_store.clone(), Duration::from_secs(300)));
    let executor = Arc::new(Executor::new(AdapterRegistry::default(), 50));
    let mcp_pool = Arc::new(McpClientPool::new());
    let gate = Arc::new(ConfirmationGate::new(Duration::from_secs(300)));
    let audit = Arc::new(AuditStore::new(dir.path().join("audit.db")).unwrap());
    let model = Arc::new(ModelClient::new(ProviderConfig::default()));
    let pagination = Arc::new(PaginationRegistry::new());
    let runner = Arc::new(TurnRunner::new(
        catalog.clone(),
        credentials.clone(),
        executor.clone(),
        mcp_pool.clone(),
        gate.clone(),
        audit.clone(),
        model,
        pagination.clone(),
        12,
    ));
    (
        GatewayState { catalog, credentials, executor, mcp_pool, gate, audit, pagination, runner },
        dir,
        credential_store,
    )
}
