//! Configuration module
//!
//! `AppConfig` is read from `$NETAUTOMATE_CONFIG` or `~/.netautomate/config.json`
//! (defaults when the file is missing) and then overridden from the environment.

pub mod storage;
pub mod types;

use std::path::PathBuf;

pub use storage::{config_dir, config_file, JsonStore, StorageError};
pub use types::{AppConfig, BatchConfig, GatewayConfig, ServerConfig};

pub const ENV_CONFIG: &str = "NETAUTOMATE_CONFIG";
pub const ENV_BIND: &str = "NETAUTOMATE_BIND";
pub const ENV_DATA_DIR: &str = "NETAUTOMATE_DATA_DIR";

/// Load configuration from disk and the process environment
pub async fn load_config() -> Result<AppConfig, StorageError> {
    let path = match std::env::var(ENV_CONFIG) {
        Ok(path) => PathBuf::from(path),
        Err(_) => config_file()?,
    };

    tracing::info!("Loading configuration from {}", path.display());
    let config: AppConfig = JsonStore::with_path(path).load().await?;

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Apply `NETAUTOMATE_*` overrides on top of a loaded config
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
        config.server.bind = bind;
    }
    if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
        config.data_dir = PathBuf::from(dir);
    }
    config
}
