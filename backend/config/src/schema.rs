//! ProxPanel runtime configuration schema.
//!
//! Every section is optional in the file; [`crate::apply_all_defaults`]
//! fills in whatever is missing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the panel backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// HTTP listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// SQLite database holding roles and the RBAC audit log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Startup migration behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<RbacConfig>,

    /// Bearer tokens accepted by the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `proxpanel_rbac=debug,info`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for daily-rolling log files; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Write the file layer as NDJSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacConfig {
    /// Rewrite legacy dotted role permissions before serving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_on_startup: Option<bool>,
    /// Create or repair the system roles before serving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensure_default_roles: Option<bool>,
    /// Persist role changes and permission denials to the audit table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// One accepted bearer token and the principal it stands for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub username: String,
    /// Defaults to the token's 1-based position in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

impl PanelConfig {
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn rbac(&self) -> RbacConfig {
        self.rbac.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    pub fn tokens(&self) -> &[TokenConfig] {
        self.auth.as_ref().map(|a| a.tokens.as_slice()).unwrap_or_default()
    }
}
