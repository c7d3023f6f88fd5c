use super::schema::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn get_config_path() -> PathBuf {
    if let Ok(p) = std::env::var("ACTIONBROKER_CONFIG") {
        return PathBuf::from(p);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("actionbroker")
        .join("config.toml")
}

/// Env vars that override config fields after the TOML file is parsed,
/// mirroring the `OXICRAB_*` secret-override convention elsewhere in this
/// stack so containers/CI can inject values without touching the file.
macro_rules! apply_env_overrides {
    ($config:ident, $( $env:literal => $($path:ident).+ : $parse:expr );* $(;)?) => {
        $(
            if let Ok(val) = std::env::var($env) {
                if !val.is_empty() {
                    match $parse(&val) {
                        Ok(parsed) => $config.$($path).+ = parsed,
                        Err(e) => warn!("ignoring invalid {}: {}", $env, e),
                    }
                }
            }
        )*
    };
}

fn parse_string(s: &str) -> Result<String, String> {
    Ok(s.to_string())
}

fn parse_usize(s: &str) -> Result<usize, String> {
    s.parse().map_err(|_| format!("'{s}' is not a number"))
}

fn parse_u64(s: &str) -> Result<u64, String> {
    s.parse().map_err(|_| format!("'{s}' is not a number"))
}

fn apply_overrides(config: &mut Config) {
    apply_env_overrides! { config,
        "ACTIONBROKER_BIND_ADDR" => bind_addr: parse_string;
        "ACTIONBROKER_PROVIDER_BASE_URL" => provider.base_url: parse_string;
        "ACTIONBROKER_PROVIDER_MODEL" => provider.model: parse_string;
        "ACTIONBROKER_PROVIDER_API_KEY" => provider.api_key: parse_string;
        "ACTIONBROKER_K_CAP" => k_cap: parse_usize;
        "ACTIONBROKER_CONFIRMATION_TIMEOUT_SECS" => confirmation_timeout_secs: parse_u64;
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path();
    let path = path.unwrap_or(default_path.as_path());

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config TOML from {}", path.display()))?
    } else {
        Config::default()
    };

    apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration validation failed: {e}"))?;
    Ok(config)
}
