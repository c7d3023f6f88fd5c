use super::loader::load_config;
use super::schema::Config;
use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEBOUNCE_MS: u64 = 300;

/// Watches the config file's parent directory (to survive editor
/// write-to-temp-then-rename patterns) and broadcasts re-validated configs
/// over a `watch::Receiver`. An edit that fails to parse or validate is
/// logged and the previously active config is kept.
pub fn start_watching(
    config_path: &Path,
    initial: Config,
) -> Result<(watch::Receiver<Config>, JoinHandle<()>)> {
    let config_path = config_path
        .canonicalize()
        .with_context(|| format!("cannot canonicalize config path: {}", config_path.display()))?;
    let parent = config_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("config path has no parent directory"))?
        .to_path_buf();
    let filename = config_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("config path has no filename"))?
        .to_os_string();

    let (watch_tx, watch_rx) = watch::channel(initial);

    let (bridge_tx, mut bridge_rx) = tokio::sync::mpsc::channel(64);
    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res| {
            let _ = bridge_tx.blocking_send(res);
        },
        notify::Config::default(),
    )
    .context("failed to create config file watcher")?;
    watcher
        .watch(&parent, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch directory: {}", parent.display()))?;

    let watch_path = config_path.clone();
    let handle = tokio::spawn(async move {
        let _watcher = watcher;

        loop {
            let event = match bridge_rx.recv().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!("config watcher error: {e}");
                    continue;
                }
                None => {
                    debug!("config watcher channel closed, stopping");
                    break;
                }
            };

            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                continue;
            }
            let is_our_file = event
                .paths
                .iter()
                .any(|p| p.file_name().is_some_and(|f| f == filename));
            if !is_our_file {
                continue;
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(DEBOUNCE_MS)).await;
            while bridge_rx.try_recv().is_ok() {}

            match load_config(Some(&watch_path)) {
                Ok(new_config) => {
                    info!("config reloaded");
                    let _ = watch_tx.send(new_config);
                }
                Err(e) => warn!("config reload failed, keeping previous config: {e}"),
            }
        }
    });

    info!("config watcher started");
    Ok((watch_rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_and_can_be_aborted() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "bind_addr = \"127.0.0.1:8088\"\n").unwrap();
        let initial = Config::default();
        let (_rx, handle) = start_watching(tmp.path(), initial).unwrap();
        handle.abort();
    }
}
