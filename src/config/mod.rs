mod loader;
mod schema;
mod watcher;

pub use loader::{get_config_path, load_config};
pub use schema::{
    AdaptersConfig, Config, CredentialHelperSettings, EmbeddingConfig, EmbeddingModel, ExecutionConfig, ProviderConfig,
    StorageConfig,
};
pub use watcher::start_watching;
