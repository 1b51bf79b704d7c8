//! Shared startup for subcommands that touch the database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use proxpanel_config::{PanelConfig, defaults::DEFAULT_DATABASE_PATH};
use proxpanel_rbac::{PermissionEngine, PermissionRegistry, SqliteRoleStore};
use tracing::debug;

pub struct PanelContext {
    pub config: PanelConfig,
    pub registry: Arc<PermissionRegistry>,
    pub store: Arc<SqliteRoleStore>,
}

impl PanelContext {
    /// Load config, start logging and open the role store.
    pub async fn open(config_path: &Path) -> Result<Self> {
        let config = proxpanel_config::load_and_prepare(config_path).await?;
        init_logging(&config);

        let registry = Arc::new(PermissionRegistry::builtin().context("Built-in permission catalog is inconsistent")?);
        let db_path = database_path(&config);
        let store = SqliteRoleStore::open(&db_path)
            .with_context(|| format!("Failed to open role database: {}", db_path.display()))?;
        debug!(config = %config_path.display(), db = %db_path.display(), "Panel context ready");

        Ok(Self {
            config,
            registry,
            store: Arc::new(store),
        })
    }

    pub fn engine(&self) -> PermissionEngine {
        PermissionEngine::new(self.registry.clone())
    }
}

pub fn database_path(config: &PanelConfig) -> PathBuf {
    config
        .database
        .as_ref()
        .and_then(|d| d.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
}

fn init_logging(config: &PanelConfig) {
    let logging = config.logging();
    proxpanel_logging::init_logger(
        logging.level.as_deref().unwrap_or("info"),
        logging.dir.as_deref(),
        logging.json.unwrap_or(true),
    );
}
