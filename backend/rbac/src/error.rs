use thiserror::Error;

/// Failure to parse a `resource:action[:scope]` wire string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeParseError {
    #[error("malformed permission code '{0}': expected resource:action[:scope]")]
    Malformed(String),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("unknown scope '{0}'")]
    UnknownScope(String),

    #[error("non-canonical permission code '{0}': global scope is implicit")]
    ExplicitGlobal(String),
}

/// Errors raised while building the registry or legacy map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RbacError {
    #[error("legacy code '{0}' is mapped more than once")]
    DuplicateLegacyCode(String),

    #[error("legacy codes '{first}' and '{second}' both map to '{new_code}'")]
    ReverseMapCollision {
        new_code: String,
        first: String,
        second: String,
    },
}

/// Caller-visible authorization failure. Only the `check_*` entry points and
/// the guards produce these; `has_permission` always answers with a bool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Permission denied: {permission}")]
    Forbidden { permission: String },

    #[error("Permission denied: requires one of {permissions:?}")]
    ForbiddenAny { permissions: Vec<String> },
}

impl AuthzError {
    /// The HTTP status code an adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthzError::Unauthorized => 401,
            AuthzError::Forbidden { .. } | AuthzError::ForbiddenAny { .. } => 403,
        }
    }
}
