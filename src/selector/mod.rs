use uuid::Uuid;

use crate::embeddings::OperationIndex;
use crate::model::{AgentSourceLink, Method, Operation, Permission};

/// The name of the always-available built-in tool.
pub const SEARCH_TOOLS_NAME: &str = "search_tools";

/// One entry in `search_tools`'s result array.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchToolsHit {
    pub name: String,
    pub description: String,
    pub method: String,
    pub path: String,
    pub match_pct: f32,
}

/// Produces the ordered candidate Operation list an agent may call this
/// Turn.
pub struct ToolSelector {
    k_cap: usize,
}

impl ToolSelector {
    pub fn new(k_cap: usize) -> Self {
        Self { k_cap }
    }

    /// Step 1+2: operations reachable from `links`, honoring the read-only
    /// exposure invariant — a read-only link never exposes a write method.
    pub fn reachable_operations<'a>(
        links: &[AgentSourceLink],
        operations: &'a [Operation],
    ) -> Vec<&'a Operation> {
        operations
            .iter()
            .filter(|op| {
                links.iter().any(|link| {
                    link.source_id == op.source_id
                        && (link.permission == Permission::ReadWrite || op.method.is_read_only())
                })
            })
            .collect()
    }

    /// Steps 3+4: bound the candidate set to `k_cap` via k-NN (or the full
    /// set if already within budget) and append the built-in search tool.
    /// Returns operation ids in presentation order.
    pub fn select(
        &self,
        links: &[AgentSourceLink],
        all_operations: &[Operation],
        turn_text: &str,
        query_embedding: Option<&[f32]>,
    ) -> Vec<Uuid> {
        let reachable = Self::reachable_operations(links, all_operations);
        let owned: Vec<Operation> = reachable.into_iter().cloned().collect();

        let mut selected: Vec<Uuid> = if owned.len() > self.k_cap {
            let index = OperationIndex::new(&owned);
            index.top_k(turn_text, query_embedding, self.k_cap).into_iter().map(|(id, _)| id).collect()
        } else {
            owned.iter().map(|o| o.id).collect()
        };

        selected.dedup();
        selected
    }

    /// `search_tools`'s own execute body — reruns k-NN selection over the
    /// complete reachable set so the model can discover operations that
    /// didn't make the initial `K_cap` cut.
    pub fn search(
        &self,
        links: &[AgentSourceLink],
        all_operations: &[Operation],
        query: &str,
        query_embedding: Option<&[f32]>,
    ) -> Vec<SearchToolsHit> {
        let reachable = Self::reachable_operations(links, all_operations);
        let owned: Vec<Operation> = reachable.into_iter().cloned().collect();
        let index = OperationIndex::new(&owned);
        let ranked = index.top_k(query, query_embedding, owned.len().min(self.k_cap));

        ranked
            .into_iter()
            .filter_map(|(id, score)| owned.iter().find(|o| o.id == id).map(|op| (op, score)))
            .map(|(op, score)| SearchToolsHit {
                name: op.display_name.clone(),
                description: op.description.clone(),
                method: format!("{:?}", op.method).to_uppercase(),
                path: op.path.clone(),
                match_pct: score.clamp(0.0, 1.0) * 100.0,
            })
            .collect()
    }
}
