mod index;
mod service;

pub use index::OperationIndex;
pub use service::{cosine_similarity, deserialize_embedding, serialize_embedding};

#[cfg(feature = "embeddings")]
pub use service::EmbeddingService;

/// Decouples the runner's query-time embedding lookup from the `embeddings`
/// feature flag — `TurnRunner` holds an `Option<Arc<dyn EmbeddingProvider>>`
/// whether or not fastembed is compiled in, and gets a lexical-only fallback
/// automatically when it's `None`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[cfg(feature = "embeddings")]
impl EmbeddingProvider for service::EmbeddingService {
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        service::EmbeddingService::embed_query(self, text)
    }
}
