use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::mcp::RuntimeHints;
use crate::model::{Agent, AgentSourceLink, Operation, Source};
use crate::utils::tool_identifier;

/// In-memory catalog of Sources/Operations/Agents/AgentSourceLinks.
/// A SQLite-backed implementation would sit behind the same shape
/// against the audit database's connection pool; the broker ships this
/// one for tests and small single-process deployments, mirroring
/// `credentials::InMemoryCredentialStore`'s role for the Credential table.
#[derive(Default)]
pub struct CatalogStore {
    sources: RwLock<HashMap<Uuid, Source>>,
    /// Operations keyed by their own id, independent of source.
    operations: RwLock<HashMap<Uuid, Operation>>,
    agents: RwLock<HashMap<Uuid, Agent>>,
    links: RwLock<Vec<AgentSourceLink>>,
    /// Keyed by a Source's `template_ref`, not by Source id — many Sources
    /// of the same vendor template share one hint set.
    hints: RwLock<HashMap<Uuid, RuntimeHints>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_source(&self, source: Source) {
        self.sources.write().unwrap().insert(source.id, source);
    }

    pub fn source(&self, id: Uuid) -> Option<Source> {
        self.sources.read().unwrap().get(&id).cloned()
    }

    /// Replace every Operation belonging to `source_id` with `operations`
    /// (re-ingestion semantics: a Source re-bind supersedes its prior
    /// catalog entirely rather than accumulating stale rows).
    pub fn ingest_operations(&self, source_id: Uuid, operations: Vec<Operation>) {
        let mut store = self.operations.write().unwrap();
        store.retain(|_, op| op.source_id != source_id);
        for op in operations {
            store.insert(op.id, op);
        }
    }

    pub fn operation(&self, id: Uuid) -> Option<Operation> {
        self.operations.read().unwrap().get(&id).cloned()
    }

    pub fn operations_for_source(&self, source_id: Uuid) -> Vec<Operation> {
        self.operations
            .read()
            .unwrap()
            .values()
            .filter(|op| op.source_id == source_id)
            .cloned()
            .collect()
    }

    pub fn all_operations(&self) -> Vec<Operation> {
        self.operations.read().unwrap().values().cloned().collect()
    }

    /// Resolve the stable `{sanitizedName}_{shortId}` tool identifier
    /// back to its Operation, for callers that only have the wire-level
    /// tool id (e.g. `POST /tools/execute`, `POST /tools/paginate`).
    pub fn operation_by_tool_id(&self, tool_id: &str) -> Option<Operation> {
        self.operations
            .read()
            .unwrap()
            .values()
            .find(|op| tool_identifier(&op.display_name, op.id) == tool_id)
            .cloned()
    }

    pub fn upsert_agent(&self, agent: Agent) {
        self.agents.write().unwrap().insert(agent.id, agent);
    }

    pub fn agent(&self, id: Uuid) -> Option<Agent> {
        self.agents.read().unwrap().get(&id).cloned()
    }

    /// Link an Agent to a Source with a capability, replacing any existing
    /// link for the same (agent, source) pair.
    pub fn link_agent_source(&self, link: AgentSourceLink) {
        let mut links = self.links.write().unwrap();
        links.retain(|l| !(l.agent_id == link.agent_id && l.source_id == link.source_id));
        links.push(link);
    }

    pub fn links_for_agent(&self, agent_id: Uuid) -> Vec<AgentSourceLink> {
        self.links
            .read()
            .unwrap()
            .iter()
            .filter(|l| l.agent_id == agent_id)
            .cloned()
            .collect()
    }

    pub fn upsert_hints(&self, template_ref: Uuid, hints: RuntimeHints) {
        self.hints.write().unwrap().insert(template_ref, hints);
    }

    /// Resolve a Source's `template_ref` (if any) into its `RuntimeHints`.
    pub fn hints_for_source(&self, source: &Source) -> Option<RuntimeHints> {
        let template_ref = source.template_ref?;
        self.hints.read().unwrap().get(&template_ref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthKind, Method, ParameterSchema, Permission, RiskLevel, SourceKind};

    fn source() -> Source {
        Source {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            display_name: "Stripe".into(),
            base_url: "https://api.stripe.com".into(),
            source_kind: SourceKind::Openapi,
            auth_kind: AuthKind::Bearer,
            auth_config: None,
            template_ref: None,
        }
    }

    fn op(source_id: Uuid) -> Operation {
        Operation {
            id: Uuid::new_v4(),
            source_id,
            operation_id: "list_customers".into(),
            display_name: "List Customers".into(),
            description: "lists customers".into(),
            method: Method::Get,
            path: "/v1/customers".into(),
            mcp_tool_name: None,
            parameter_schema: ParameterSchema::new(),
            request_body_schema: None,
            risk_level: RiskLevel::Safe,
            requires_confirmation: false,
            tags: vec![],
            embedding: None,
        }
    }

    #[test]
    fn ingest_replaces_prior_operations_for_source() {
        let store = CatalogStore::new();
        let src = source();
        store.upsert_source(src.clone());
        let first_op = op(src.id);
        store.ingest_operations(src.id, vec![first_op.clone()]);
        assert_eq!(store.operations_for_source(src.id).len(), 1);

        let second_op = op(src.id);
        store.ingest_operations(src.id, vec![second_op.clone()]);
        let ops = store.operations_for_source(src.id);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id, second_op.id);
    }

    #[test]
    fn links_scoped_per_agent() {
        let store = CatalogStore::new();
        let (agent_id, source_id) = (Uuid::new_v4(), Uuid::new_v4());
        store.link_agent_source(AgentSourceLink {
            agent_id,
            source_id,
            permission: Permission::Read,
        });
        assert_eq!(store.links_for_agent(agent_id).len(), 1);
        assert!(store.links_for_agent(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn relinking_same_pair_replaces_permission() {
        let store = CatalogStore::new();
        let (agent_id, source_id) = (Uuid::new_v4(), Uuid::new_v4());
        store.link_agent_source(AgentSourceLink { agent_id, source_id, permission: Permission::Read });
        store.link_agent_source(AgentSourceLink { agent_id, source_id, permission: Permission::ReadWrite });
        let links = store.links_for_agent(agent_id);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].permission, Permission::ReadWrite);
    }
}
