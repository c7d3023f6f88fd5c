use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actionbroker::adapters::AdapterRegistry;
use actionbroker::audit::AuditStore;
use actionbroker::catalog::CatalogStore;
use actionbroker::config::{self, Config};
use actionbroker::confirmation::ConfirmationGate;
use actionbroker::credentials::{CredentialHelperConfig, CredentialResolver, InMemoryCredentialStore};
use actionbroker::executor::Executor;
use actionbroker::gateway::{self, GatewayState};
use actionbroker::mcp::McpClientPool;
use actionbroker::pagination::PaginationRegistry;
use actionbroker::provider::ModelClient;
use actionbroker::runner::TurnRunner;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "actionbroker")]
#[command(about = "Multi-tenant action broker between LLM agents and external APIs")]
struct Cli {
    /// Path to config.toml; defaults to the OS config dir or ACTIONBROKER_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actionbroker=debug".parse().unwrap());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::get_config_path);
    let cfg = config::load_config(Some(&config_path)).context("loading configuration")?;

    run(cfg, config_path).await
}

async fn run(cfg: Config, config_path: PathBuf) -> Result<()> {
    let catalog = Arc::new(CatalogStore::new());

    let credential_store = Arc::new(InMemoryCredentialStore::new());
    let mut credentials = CredentialResolver::new(credential_store, Duration::from_secs(cfg.execution.credential_cache_ttl_secs));
    if let Some(command) = cfg.execution.credential_helper.command.clone() {
        credentials = credentials.with_helper(CredentialHelperConfig { command, args: cfg.execution.credential_helper.args.clone() });
    }
    let credentials = Arc::new(credentials);

    let adapters = AdapterRegistry::with_builtins(cfg.adapters.stripe_enabled);
    let executor = Arc::new(Executor::new(adapters, cfg.execution.requests_per_second));
    let mcp_pool = Arc::new(McpClientPool::new());
    let gate = Arc::new(ConfirmationGate::new(Duration::from_secs(cfg.confirmation_timeout_secs)));
    let audit = Arc::new(AuditStore::new(&cfg.storage.audit_db_path).context("opening audit store")?);
    let model = Arc::new(ModelClient::new(cfg.provider.clone()));
    let pagination = Arc::new(PaginationRegistry::new());

    let mut runner = TurnRunner::new(
        catalog.clone(),
        credentials.clone(),
        executor.clone(),
        mcp_pool.clone(),
        gate.clone(),
        audit.clone(),
        model.clone(),
        pagination.clone(),
        cfg.k_cap,
    );
    runner = attach_embeddings(runner, &cfg);
    let runner = Arc::new(runner);

    // Hot-reload only feeds Source/Agent/Operation edits through the usual
    // catalog ingestion endpoints; it never swaps the Arc-wrapped
    // collaborators built above. A config change to e.g. `execution.*`
    // or `provider.*` requires a restart.
    match config::start_watching(&config_path, cfg.clone()) {
        Ok((mut rx, _handle)) => {
            tokio::spawn(async move {
                loop {
                    if rx.changed().await.is_err() {
                        break;
                    }
                    info!("configuration file changed; re-read (in-flight collaborators keep their original settings)");
                }
            });
        }
        Err(e) => warn!("config hot-reload disabled: {e:#}"),
    }

    let state = GatewayState { catalog, credentials, executor, mcp_pool, gate, audit, pagination, runner };
    let app = gateway::build_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await.with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!("actionbroker listening on {}", cfg.bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("server error")?;
    Ok(())
}

#[cfg(feature = "embeddings")]
fn attach_embeddings(runner: TurnRunner, cfg: &Config) -> TurnRunner {
    use actionbroker::embeddings::EmbeddingService;
    match EmbeddingService::new(cfg.embedding.model, &cfg.provider) {
        Ok(service) => runner.with_embeddings(Arc::new(service)),
        Err(e) => {
            warn!("embedding model failed to load, tool selection will be lexical-only: {e:#}");
            runner
        }
    }
}

#[cfg(not(feature = "embeddings"))]
fn attach_embeddings(runner: TurnRunner, _cfg: &Config) -> TurnRunner {
    runner
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            return;
        };
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received, draining in-flight requests");
}
