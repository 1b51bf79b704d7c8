use thiserror::Error;

/// Top-level error type for the ProxPanel authorization stack.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("invalid permissions JSON for role '{role}': {source}")]
    InvalidPermissions {
        role: String,
        #[source]
        source: serde_json::Error,
    },
}
