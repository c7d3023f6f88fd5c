use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::info;

use crate::config::{EmbeddingModel as ConfiguredModel, ProviderConfig};

#[cfg(feature = "embeddings")]
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};

#[cfg(feature = "embeddings")]
enum Backend {
    /// fastembed, in-process (384/768-wide `Bge*` models).
    Local(TextEmbedding),
    /// The configured provider's OpenAI-compatible `/embeddings` endpoint
    /// (the 1536-wide `OpenAiTextEmbedding3Small` option — no local
    /// fastembed model ships at that width).
    Remote { http: reqwest::Client, base_url: String, api_key: String, model_name: String },
}

/// Embedding generation backing `EmbeddingProvider`. Width is
/// fixed per deployment by `ConfiguredModel`; the catalog only ever
/// populates the one column matching this width.
#[cfg(feature = "embeddings")]
pub struct EmbeddingService {
    backend: Backend,
    dimension: u32,
}

#[cfg(feature = "embeddings")]
impl EmbeddingService {
    /// `provider` supplies the base URL and API key for the remote backend;
    /// it is ignored when `model` runs locally through fastembed.
    pub fn new(model: ConfiguredModel, provider: &ProviderConfig) -> Result<Self> {
        let backend = match model {
            ConfiguredModel::BgeSmallEnV15 | ConfiguredModel::BgeBaseEnV15 => {
                let model_type = match model {
                    ConfiguredModel::BgeSmallEnV15 => FastEmbedModel::BGESmallENV15,
                    ConfiguredModel::BgeBaseEnV15 => FastEmbedModel::BGEBaseENV15,
                    ConfiguredModel::OpenAiTextEmbedding3Small => unreachable!(),
                };
                let embedder = TextEmbedding::try_new(InitOptions::new(model_type).with_show_download_progress(true))?;
                Backend::Local(embedder)
            }
            ConfiguredModel::OpenAiTextEmbedding3Small => Backend::Remote {
                http: reqwest::Client::builder()
                    .connect_timeout(std::time::Duration::from_secs(10))
                    .timeout(std::time::Duration::from_secs(30))
                    .build()?,
                base_url: provider.base_url.clone(),
                api_key: provider.api_key.clone(),
                model_name: "text-embedding-3-small".to_string(),
            },
        };
        info!("embedding model loaded: {:?}", model);
        Ok(Self { backend, dimension: model.dimension() })
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Embed multiple operation texts in one batch (catalog ingestion).
    pub fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            Backend::Local(model) => {
                let docs: Vec<String> = texts.iter().map(ToString::to_string).collect();
                Ok(model.embed(docs, None)?)
            }
            Backend::Remote { .. } => {
                let rt = tokio::runtime::Handle::try_current().context("embed_texts called off a tokio runtime")?;
                tokio::task::block_in_place(|| rt.block_on(self.embed_remote(texts)))
            }
        }
    }

    /// Embed a single turn-text query for k-NN selection.
    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[query])?.into_iter().next().ok_or_else(|| anyhow::anyhow!("empty embedding result"))
    }

    async fn embed_remote(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let Backend::Remote { http, base_url, api_key, model_name } = &self.backend else {
            unreachable!("embed_remote only called on the Remote backend")
        };
        let url = format!("{}/embeddings", base_url.trim_end_matches('/'));
        let body = json!({ "model": model_name, "input": texts });
        let response = http.post(&url).bearer_auth(api_key).json(&body).send().await.context("embedding provider request failed")?;

        let status = response.status();
        let payload: Value = response.json().await.context("embedding provider returned non-JSON body")?;
        if !status.is_success() {
            anyhow::bail!("embedding provider returned {status}: {payload}");
        }

        let data = payload["data"].as_array().context("embedding provider response missing 'data'")?;
        data.iter()
            .map(|row| {
                row["embedding"]
                    .as_array()
                    .context("embedding provider row missing 'embedding'")?
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32).context("embedding value is not a number"))
                    .collect()
            })
            .collect()
    }
}

/// Cosine similarity. fastembed vectors are already L2-normalized, so dot
/// product equals cosine similarity — kept as a separate named function
/// anyway since callers (selector k-NN) don't need to know that.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Serialize an embedding to little-endian bytes for SQLite BLOB storage.
pub fn serialize_embedding(v: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for &val in v {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Deserialize an embedding from little-endian bytes.
pub fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().expect("chunk is exactly 4 bytes");
            f32::from_le_bytes(arr)
        })
        .collect()
}
