use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_bind_addr() -> String {
    "127.0.0.1:8088".to_string()
}

fn default_embedding_dim() -> u32 {
    768
}

fn default_k_cap() -> usize {
    12
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_db_path() -> PathBuf {
    PathBuf::from("actionbroker.db")
}

fn default_true() -> bool {
    true
}

/// Provider connection details for the out-of-scope model collaborator
///.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_provider_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            model: default_provider_model(),
            api_key: String::new(),
        }
    }
}

crate::redact_debug!(ProviderConfig, base_url, model, redact(api_key));

/// Embedding model selection — the store must support both a 768-wide
/// and a 1536-wide column. The two local
/// `Bge*` variants run through fastembed; `OpenAiTextEmbedding3Small` is the
/// 1536-wide option and is served remotely through the configured provider's
/// OpenAI-compatible `/embeddings` endpoint, since no local fastembed model
/// ships at that width. Dimension must stay fixed for the lifetime of a
/// deployment's embedding store — changing it without re-indexing leaves
/// stale vectors of the wrong width.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingModel {
    BgeSmallEnV15,
    BgeBaseEnV15,
    OpenAiTextEmbedding3Small,
}

impl EmbeddingModel {
    pub fn dimension(self) -> u32 {
        match self {
            EmbeddingModel::BgeSmallEnV15 => 384,
            EmbeddingModel::BgeBaseEnV15 => 768,
            EmbeddingModel::OpenAiTextEmbedding3Small => 1536,
        }
    }

    /// Whether this model is generated locally by fastembed or fetched from
    /// the remote provider's `/embeddings` endpoint.
    pub fn is_remote(self) -> bool {
        matches!(self, EmbeddingModel::OpenAiTextEmbedding3Small)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub model: EmbeddingModel,
    #[serde(default = "default_embedding_dim")]
    pub dimension: u32,
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        EmbeddingModel::BgeBaseEnV15
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModel::default(),
            dimension: default_embedding_dim(),
        }
    }
}

/// Per-adapter toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptersConfig {
    #[serde(default = "default_true")]
    pub stripe_enabled: bool,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            stripe_enabled: true,
        }
    }
}

fn default_credential_ttl_secs() -> u64 {
    300
}

fn default_requests_per_second() -> u32 {
    5
}

/// Optional external command consulted by the Credential Resolver when no
/// stored row exists for a (user, Source) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialHelperSettings {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Executor and credential-cache tuning knobs that have no natural home
/// under `storage`/`adapters` — per-Source dispatch isolation, retry and
/// timeout settings, and the credential cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_credential_ttl_secs")]
    pub credential_cache_ttl_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default)]
    pub credential_helper: CredentialHelperSettings,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            credential_cache_ttl_secs: default_credential_ttl_secs(),
            requests_per_second: default_requests_per_second(),
            credential_helper: CredentialHelperSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub audit_db_path: PathBuf,
    #[serde(default = "default_embedding_db_path")]
    pub embedding_db_path: PathBuf,
}

fn default_embedding_db_path() -> PathBuf {
    PathBuf::from("embeddings.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audit_db_path: default_db_path(),
            embedding_db_path: default_embedding_db_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub adapters: AdaptersConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Tool Selector's bound on candidate Operations handed to the model
    /// per Turn.
    #[serde(default = "default_k_cap")]
    pub k_cap: usize,

    /// Seconds an `approval_requested` ToolInvocation waits before
    /// transitioning to `approval_timeout`.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            provider: ProviderConfig::default(),
            embedding: EmbeddingConfig::default(),
            storage: StorageConfig::default(),
            adapters: AdaptersConfig::default(),
            execution: ExecutionConfig::default(),
            k_cap: default_k_cap(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

crate::redact_debug!(
    Config,
    bind_addr,
    provider,
    embedding,
    storage,
    adapters,
    execution,
    k_cap,
    confirmation_timeout_secs
);

impl Config {
    /// Sanity checks that TOML deserialization alone can't express.
    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("invalid bind_addr: {}", self.bind_addr));
        }
        if self.k_cap == 0 {
            return Err("k_cap must be >= 1".to_string());
        }
        if self.embedding.dimension != self.embedding.model.dimension() {
            return Err(format!(
                "embedding.dimension ({}) does not match model {:?} ({})",
                self.embedding.dimension,
                self.embedding.model,
                self.embedding.model.dimension()
            ));
        }
        if self.execution.requests_per_second == 0 {
            return Err("execution.requests_per_second must be >= 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut cfg = Config::default();
        cfg.provider.api_key = "sk-super-secret".to_string();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("sk-super-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let mut cfg = Config::default();
        cfg.bind_addr = "not-an-addr".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_embedding_dim() {
        let mut cfg = Config::default();
        cfg.embedding.dimension = 1536;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_1536_when_model_matches() {
        let mut cfg = Config::default();
        cfg.embedding.model = EmbeddingModel::OpenAiTextEmbedding3Small;
        cfg.embedding.dimension = 1536;
        assert!(cfg.validate().is_ok());
    }
}
