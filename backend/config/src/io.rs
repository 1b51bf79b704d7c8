//! Config file read/write with atomic backup rotation.

use crate::schema::PanelConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 5;

/// Resolve the ProxPanel config directory.
/// Priority: `PROXPANEL_CONFIG_DIR` env > `~/.proxpanel/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PROXPANEL_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".proxpanel"),
        None => PathBuf::from(".proxpanel"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config file as an untyped tree, before env substitution.
///
/// Returns `Ok(None)` if the file doesn't exist (first run).
pub async fn read_config_value(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;
    Ok((!value.is_null()).then_some(value))
}

/// Parse the config exactly as written, keeping `${VAR}` references.
///
/// Use this when the config is going to be written back.
pub async fn load_raw_config(path: &Path) -> Result<PanelConfig> {
    match read_config_value(path).await? {
        Some(value) => serde_json::from_value(value)
            .with_context(|| format!("Invalid config structure in: {}", path.display())),
        None => Ok(PanelConfig::default()),
    }
}

/// Write config to disk atomically (write to temp file, rename).
///
/// Creates a rolling backup of the previous config before overwriting.
pub async fn write_config(config: &PanelConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    if path.exists() {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// config.yaml.bak.1 → .bak.2 → ... → .bak.N
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = path.with_extension(format!("yaml.bak.{i}"));
        let new = path.with_extension(format!("yaml.bak.{}", i + 1));
        if old.exists() {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!("Failed to rotate backup {}: {}", old.display(), e);
            }
        }
    }

    let bak = path.with_extension("yaml.bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!("Failed to create backup {}: {}", bak.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AuthConfig, TokenConfig};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("proxpanel-config-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn missing_file_reads_as_defaults() {
        let dir = scratch_dir("missing");
        let path = config_file_path(&dir);
        assert!(read_config_value(&path).await.unwrap().is_none());
        assert_eq!(load_raw_config(&path).await.unwrap(), PanelConfig::default());
    }

    #[tokio::test]
    async fn write_then_read_keeps_env_references_and_rotates() {
        let dir = scratch_dir("write");
        let path = config_file_path(&dir);
        let mut config = PanelConfig {
            auth: Some(AuthConfig {
                tokens: vec![TokenConfig {
                    token: "${ADMIN_TOKEN}".into(),
                    username: "root".into(),
                    admin: true,
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };
        write_config(&config, &path).await.unwrap();
        assert_eq!(load_raw_config(&path).await.unwrap(), config);

        config.auth = None;
        write_config(&config, &path).await.unwrap();
        assert!(path.with_extension("yaml.bak.1").exists());
        assert!(load_raw_config(&path).await.unwrap().auth.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
