//! `proxpanel-config`: ProxPanel runtime configuration.
//!
//! Provides:
//! - Typed config schema (server, database, logging, rbac, auth tokens)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation report

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    MissingEnvVarError, collect_referenced_vars, contains_env_var_reference, resolve_env_vars, resolve_env_vars_with,
};
pub use io::{config_dir, config_file_path, load_raw_config, read_config_value, write_config};
pub use schema::{AuthConfig, DatabaseConfig, LoggingConfig, PanelConfig, RbacConfig, ServerConfig, TokenConfig};
pub use validation::{ConfigValidationError, ValidationReport, validate};

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Warnings
/// are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<PanelConfig> {
    load_and_prepare_with(path, &std::env::vars().collect()).await
}

/// [`load_and_prepare`] with an explicit environment.
pub async fn load_and_prepare_with(path: &Path, env: &HashMap<String, String>) -> Result<PanelConfig> {
    let config = match read_config_value(path).await? {
        Some(value) => {
            let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
            serde_json::from_value(value)
                .with_context(|| format!("Invalid config structure in: {}", path.display()))?
        }
        None => PanelConfig::default(),
    };
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!(
            "{} config error(s) in {}; first: {}",
            report.errors.len(),
            path.display(),
            report.errors[0]
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_yaml(name: &str, yaml: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("proxpanel-load-{name}-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = config_file_path(&dir);
        tokio::fs::write(&path, yaml).await.unwrap();
        path
    }

    #[tokio::test]
    async fn loads_substitutes_and_defaults() {
        let path = write_yaml(
            "ok",
            r#"
server:
  port: 8443
rbac:
  migrate_on_startup: false
auth:
  tokens:
    - token: "${PANEL_ADMIN_TOKEN}"
      username: root
      admin: true
    - token: demo-token-0123456789
      username: dana
      role: demo
"#,
        )
        .await;
        let env: HashMap<_, _> = [("PANEL_ADMIN_TOKEN".to_string(), "admin-token-0123456789".to_string())].into();

        let config = load_and_prepare_with(&path, &env).await.unwrap();
        assert_eq!(config.server().port, Some(8443));
        assert_eq!(config.server().bind.as_deref(), Some(defaults::DEFAULT_BIND));
        assert_eq!(config.rbac().migrate_on_startup, Some(false));
        assert_eq!(config.rbac().ensure_default_roles, Some(true));
        assert_eq!(config.tokens()[0].token, "admin-token-0123456789");
        assert_eq!(config.tokens()[1].role.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn invalid_config_fails_the_load() {
        let path = write_yaml(
            "bad",
            "auth:\n  tokens:\n    - token: abcdefabcdefabcdef\n      username: nobody\n",
        )
        .await;
        let err = load_and_prepare_with(&path, &HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("neither a role nor admin"));
    }

    #[tokio::test]
    async fn missing_env_var_fails_the_load() {
        let path = write_yaml("env", "database:\n  path: \"${PANEL_DB}\"\n").await;
        let err = load_and_prepare_with(&path, &HashMap::new()).await.unwrap_err();
        assert!(format!("{err:#}").contains("PANEL_DB"));
    }
}
