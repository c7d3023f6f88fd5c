use uuid::Uuid;

use crate::model::Operation;

use super::service::cosine_similarity;

/// k-NN over a set of Operations' embeddings, with a lexical fallback for
/// Operations whose embedding failed at ingestion time.
pub struct OperationIndex<'a> {
    operations: &'a [Operation],
}

impl<'a> OperationIndex<'a> {
    pub fn new(operations: &'a [Operation]) -> Self {
        Self { operations }
    }

    /// Rank `operations` by similarity to `query_embedding`, falling back to
    /// a lexical score for any Operation with no embedding. Returns at most
    /// `k` `(operation id, score)` pairs, most relevant first. Score is
    /// cosine similarity when both sides have an embedding (typically
    /// `-1.0..=1.0`), or token overlap otherwise (`0.0..=1.0`).
    pub fn top_k(&self, query_text: &str, query_embedding: Option<&[f32]>, k: usize) -> Vec<(Uuid, f32)> {
        let mut scored: Vec<(Uuid, f32)> = self
            .operations
            .iter()
            .map(|op| {
                let score = match (query_embedding, op.embedding.as_deref()) {
                    (Some(qe), Some(oe)) => cosine_similarity(qe, oe),
                    _ => lexical_score(query_text, op),
                };
                (op.id, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }
}

/// Token-overlap scoring used when an embedding is unavailable for either
/// side of the comparison, so an unembedded Operation stays callable by name.
fn lexical_score(query_text: &str, op: &Operation) -> f32 {
    let query_tokens: std::collections::HashSet<String> = tokenize(query_text);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let op_text = op.text_for_embedding();
    let op_tokens = tokenize(&op_text);
    let overlap = query_tokens.intersection(&op_tokens).count();
    overlap as f32 / query_tokens.len() as f32
}

fn tokenize(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Method, ParameterSchema, RiskLevel};

    fn op(name: &str, description: &str, embedding: Option<Vec<f32>>) -> Operation {
        Operation {
            id: Uuid::new_v4(),
            source_id: Uuid::nil(),
            operation_id: name.to_string(),
            display_name: name.to_string(),
            description: description.to_string(),
            method: Method::Get,
            path: "/x".into(),
            mcp_tool_name: None,
            parameter_schema: ParameterSchema::new(),
            request_body_schema: None,
            risk_level: RiskLevel::Safe,
            requires_confirmation: false,
            tags: vec![],
            embedding,
        }
    }

    #[test]
    fn embedding_similarity_orders_results() {
        let ops = vec![
            op("list_invoices", "list invoices", Some(vec![1.0, 0.0])),
            op("list_customers", "list customers", Some(vec![0.0, 1.0])),
        ];
        let index = OperationIndex::new(&ops);
        let results = index.top_k("invoice query", Some(&[1.0, 0.0]), 1);
        assert_eq!(results, vec![(ops[0].id, 1.0)]);
    }

    #[test]
    fn lexical_fallback_when_embedding_missing() {
        let ops = vec![
            op("list_invoices", "list customer invoices", None),
            op("list_widgets", "list unrelated widgets", None),
        ];
        let index = OperationIndex::new(&ops);
        let results = index.top_k("find invoices please", None, 1);
        assert_eq!(results[0].0, ops[0].id);
    }

    #[test]
    fn top_k_truncates() {
        let ops = vec![
            op("a", "a", Some(vec![1.0])),
            op("b", "b", Some(vec![1.0])),
            op("c", "c", Some(vec![1.0])),
        ];
        let index = OperationIndex::new(&ops);
        assert_eq!(index.top_k("x", Some(&[1.0]), 2).len(), 2);
    }
}
