//! Satellite configuration.
//!
//! Built-in defaults are overridden by `<data_dir>/stlt.toml` (or the file
//! given with `--config`), which is in turn overridden by CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, error};

use drover_proto::constants::DR_STLT_PORT;
use drover_proto::defaults::{
    CONFIG_FILE_NAME, DEFAULT_DATA_DIR, DEFAULT_LISTEN_ADDR, DEFAULT_LOG_LEVEL,
    DEFAULT_UPDATE_STALL_TIMEOUT_SECS,
};
use drover_proto::{DrError, DrResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StltConfig {
    /// Expected name of the local node. The controller's authentication
    /// binds the actual name; a mismatch is logged.
    pub node_name: Option<String>,
    pub listen_addr: String,
    pub listen_port: u16,
    pub log_level: String,
    /// 0 disables the stall watchdog.
    pub update_stall_timeout_secs: u64,
    /// Regex of device names device management must leave alone. Informational.
    pub keep_res_pattern: Option<String>,
    pub data_dir: PathBuf,
}

impl Default for StltConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            listen_port: DR_STLT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            update_stall_timeout_secs: DEFAULT_UPDATE_STALL_TIMEOUT_SECS,
            keep_res_pattern: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

/// Load the config file at `path`. A missing file yields the defaults.
pub async fn load_config(path: &Path) -> DrResult<StltConfig> {
    if !path.exists() {
        debug!("no config file at {}, using defaults", path.display());
        return Ok(StltConfig::default());
    }
    let text = fs::read_to_string(path).await.map_err(|e| {
        error!("failed to read config from {}: {}", path.display(), e);
        DrError::from(e)
    })?;
    toml::from_str(&text).map_err(|e| {
        error!("malformed config file {}: {}", path.display(), e);
        DrError::from(e)
    })
}

/// Write `cfg` to `<dir>/stlt.toml`.
pub async fn save_config(dir: &Path, cfg: &StltConfig) -> DrResult<()> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(CONFIG_FILE_NAME);
    let text = toml::to_string_pretty(cfg)?;
    fs::write(&path, text).await.map_err(|e| {
        error!("failed to write config to {}: {}", path.display(), e);
        DrError::from(e)
    })?;
    debug!("saved config to {}", path.display());
    Ok(())
}

/// Default config file location inside `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "drover-stlt-{}-{}-{}",
            tag,
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = temp_dir("missing");
        let cfg = load_config(&config_path(&dir)).await.unwrap();
        assert_eq!(cfg, StltConfig::default());
        assert_eq!(cfg.listen_port, DR_STLT_PORT);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = temp_dir("roundtrip");
        let cfg = StltConfig {
            node_name: Some("alpha".into()),
            update_stall_timeout_secs: 0,
            data_dir: dir.clone(),
            ..StltConfig::default()
        };
        save_config(&dir, &cfg).await.unwrap();
        let loaded = load_config(&config_path(&dir)).await.unwrap();
        assert_eq!(loaded, cfg);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = temp_dir("partial");
        std::fs::write(config_path(&dir), "listen_port = 4000\n").unwrap();
        let cfg = load_config(&config_path(&dir)).await.unwrap();
        assert_eq!(cfg.listen_port, 4000);
        assert_eq!(cfg.log_level, DEFAULT_LOG_LEVEL);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_malformed_file_rejected() {
        let dir = temp_dir("malformed");
        std::fs::write(config_path(&dir), "listen_port = \"many\"\n").unwrap();
        assert!(matches!(
            load_config(&config_path(&dir)).await,
            Err(DrError::Config(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
