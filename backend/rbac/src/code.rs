//! Typed permission codes.
//!
//! A code is `(Resource, Action, Scope)` and serializes to the wire string
//! `resource:action` for global scope or `resource:action:scope` otherwise.
//! The string form is what gets stored on roles, logged, and used as keys in
//! the legacy map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodeParseError;

/// Separator of the structured scheme.
pub const CODE_SEPARATOR: char = ':';
/// Separator of the legacy dotted scheme.
pub const LEGACY_SEPARATOR: char = '.';

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cluster,
    Node,
    /// A Proxmox server.
    Server,
    Vm,
    Lxc,
    Storage,
    Network,
    Backup,
    Template,
    User,
    Role,
    Log,
    Setting,
    Ipam,
    Notification,
    Dashboard,
}

impl Resource {
    pub const ALL: [Resource; 16] = [
        Resource::Cluster,
        Resource::Node,
        Resource::Server,
        Resource::Vm,
        Resource::Lxc,
        Resource::Storage,
        Resource::Network,
        Resource::Backup,
        Resource::Template,
        Resource::User,
        Resource::Role,
        Resource::Log,
        Resource::Setting,
        Resource::Ipam,
        Resource::Notification,
        Resource::Dashboard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Cluster => "cluster",
            Resource::Node => "node",
            Resource::Server => "server",
            Resource::Vm => "vm",
            Resource::Lxc => "lxc",
            Resource::Storage => "storage",
            Resource::Network => "network",
            Resource::Backup => "backup",
            Resource::Template => "template",
            Resource::User => "user",
            Resource::Role => "role",
            Resource::Log => "log",
            Resource::Setting => "setting",
            Resource::Ipam => "ipam",
            Resource::Notification => "notification",
            Resource::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = CodeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == value)
            .ok_or_else(|| CodeParseError::UnknownResource(value.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    List,
    Create,
    Update,
    Delete,
    Start,
    Stop,
    Restart,
    Console,
    Migrate,
    Manage,
    Export,
    Execute,
    /// Wildcard: every action on the resource.
    #[serde(rename = "*")]
    All,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::View,
        Action::List,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Start,
        Action::Stop,
        Action::Restart,
        Action::Console,
        Action::Migrate,
        Action::Manage,
        Action::Export,
        Action::Execute,
        Action::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::List => "list",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Console => "console",
            Action::Migrate => "migrate",
            Action::Manage => "manage",
            Action::Export => "export",
            Action::Execute => "execute",
            Action::All => "*",
        }
    }

    /// Actions granted implicitly by holding `resource:manage`.
    pub fn implied_by_manage(self) -> bool {
        matches!(
            self,
            Action::View
                | Action::List
                | Action::Update
                | Action::Start
                | Action::Stop
                | Action::Restart
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CodeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == value)
            .ok_or_else(|| CodeParseError::UnknownAction(value.to_string()))
    }
}

/// Text of the action segment of a raw code, if it has one.
///
/// Works on unregistered codes too, which the engine needs for the
/// manage-implication rule.
pub fn action_segment(code: &str) -> Option<&str> {
    code.split(CODE_SEPARATOR).nth(1)
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Declared qualifier of a permission. Carried through checks but not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    #[serde(rename = "global")]
    Global,
    #[serde(rename = "org")]
    Organization,
    #[serde(rename = "workspace")]
    Workspace,
    #[serde(rename = "instance")]
    Instance,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Organization => "org",
            Scope::Workspace => "workspace",
            Scope::Instance => "instance",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CodeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "global" => Ok(Scope::Global),
            "org" => Ok(Scope::Organization),
            "workspace" => Ok(Scope::Workspace),
            "instance" => Ok(Scope::Instance),
            other => Err(CodeParseError::UnknownScope(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PermissionCode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionCode {
    pub resource: Resource,
    pub action: Action,
    pub scope: Scope,
}

impl PermissionCode {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self {
            resource,
            action,
            scope: Scope::Global,
        }
    }

    pub const fn scoped(resource: Resource, action: Action, scope: Scope) -> Self {
        Self {
            resource,
            action,
            scope,
        }
    }

    /// `resource:*` for this code's resource.
    pub const fn wildcard(resource: Resource) -> Self {
        Self::new(resource, Action::All)
    }

    /// `resource:manage` for this code's resource.
    pub const fn manage(resource: Resource) -> Self {
        Self::new(resource, Action::Manage)
    }

    /// Dotted `resource.action` form. The scope is not represented.
    pub fn legacy_code(&self) -> String {
        format!("{}{}{}", self.resource, LEGACY_SEPARATOR, self.action)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Global => write!(f, "{}:{}", self.resource, self.action),
            scope => write!(f, "{}:{}:{}", self.resource, self.action, scope),
        }
    }
}

impl FromStr for PermissionCode {
    type Err = CodeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split(CODE_SEPARATOR);
        let (Some(resource), Some(action)) = (parts.next(), parts.next()) else {
            return Err(CodeParseError::Malformed(value.to_string()));
        };
        let scope = parts.next();
        if parts.next().is_some() {
            return Err(CodeParseError::Malformed(value.to_string()));
        }

        let resource = resource.parse::<Resource>()?;
        let action = action.parse::<Action>()?;
        let scope = match scope {
            None => Scope::Global,
            Some("global") => return Err(CodeParseError::ExplicitGlobal(value.to_string())),
            Some(s) => s.parse::<Scope>()?,
        };
        Ok(Self::scoped(resource, action, scope))
    }
}

impl Serialize for PermissionCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PermissionCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
