//! Config defaults: applies default values to a parsed config.

use crate::schema::{DatabaseConfig, LoggingConfig, PanelConfig, RbacConfig, ServerConfig};
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1";

pub const DEFAULT_PORT: u16 = 8000;

/// Relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "proxpanel.db";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: PanelConfig) -> PanelConfig {
    let config = apply_server_defaults(config);
    let config = apply_database_defaults(config);
    let config = apply_logging_defaults(config);
    apply_rbac_defaults(config)
}

fn apply_server_defaults(mut config: PanelConfig) -> PanelConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    config
}

fn apply_database_defaults(mut config: PanelConfig) -> PanelConfig {
    let database = config.database.get_or_insert_with(DatabaseConfig::default);
    database
        .path
        .get_or_insert_with(|| PathBuf::from(DEFAULT_DATABASE_PATH));
    config
}

fn apply_logging_defaults(mut config: PanelConfig) -> PanelConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(true);
    config
}

/// Migration, default-role repair and auditing are all on unless disabled.
fn apply_rbac_defaults(mut config: PanelConfig) -> PanelConfig {
    let rbac = config.rbac.get_or_insert_with(RbacConfig::default);
    rbac.migrate_on_startup.get_or_insert(true);
    rbac.ensure_default_roles.get_or_insert(true);
    rbac.audit.get_or_insert(true);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let config = apply_all_defaults(PanelConfig::default());
        assert_eq!(config.server().port, Some(DEFAULT_PORT));
        assert_eq!(config.server().bind.as_deref(), Some(DEFAULT_BIND));
        assert_eq!(
            config.database.unwrap().path,
            Some(PathBuf::from(DEFAULT_DATABASE_PATH))
        );
        assert_eq!(config.rbac.unwrap().migrate_on_startup, Some(true));
    }

    #[test]
    fn keeps_explicit_values() {
        let config = PanelConfig {
            server: Some(ServerConfig {
                bind: None,
                port: Some(9443),
            }),
            rbac: Some(RbacConfig {
                migrate_on_startup: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = apply_all_defaults(config);
        assert_eq!(config.server().port, Some(9443));
        assert_eq!(config.rbac().migrate_on_startup, Some(false));
        assert_eq!(config.rbac().ensure_default_roles, Some(true));
    }
}
