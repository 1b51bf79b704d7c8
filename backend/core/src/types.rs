use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PanelError;

/// Permission flags as stored on a role.
///
/// Keys may be legacy dotted codes (`vms.view`), structured codes (`vm:view`),
/// or a transient mix of both. Values are explicit booleans.
pub type PermissionMap = BTreeMap<String, bool>;

/// A named bundle of permission flags assignable to principals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: PermissionMap,
    #[serde(default)]
    pub is_system: bool,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Grant every code in `codes` (value `true`).
    pub fn with_permissions<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.permissions.insert(code.into(), true);
        }
        self
    }

    /// Number of enabled flags.
    pub fn granted_count(&self) -> usize {
        self.permissions.values().filter(|enabled| **enabled).count()
    }
}

/// The authenticated actor whose permissions are evaluated.
///
/// `is_admin` is an unconditional bypass of every check, independent of `role`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub role: Option<Role>,
}

impl Principal {
    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: true,
            ..Default::default()
        }
    }

    pub fn with_role(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn without_role(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.name.as_str())
    }
}

/// A persisted role row. `permissions_json` is kept raw so that a corrupt
/// column can be detected (and skipped) by callers instead of failing a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permissions_json: String,
    pub is_system: bool,
}

impl RoleRecord {
    /// Parse the JSON permissions column. An empty column is an empty map.
    pub fn parse_permissions(&self) -> Result<PermissionMap, PanelError> {
        if self.permissions_json.trim().is_empty() {
            return Ok(PermissionMap::new());
        }
        serde_json::from_str(&self.permissions_json).map_err(|source| {
            PanelError::InvalidPermissions {
                role: self.name.clone(),
                source,
            }
        })
    }

    pub fn to_role(&self) -> Result<Role, PanelError> {
        Ok(Role {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            permissions: self.parse_permissions()?,
            is_system: self.is_system,
        })
    }
}

/// Values for inserting a new role row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permissions: PermissionMap,
    pub is_system: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> RoleRecord {
        RoleRecord {
            id: 1,
            name: "ops".into(),
            display_name: "Ops".into(),
            description: String::new(),
            permissions_json: json.into(),
            is_system: false,
        }
    }

    #[test]
    fn parses_mixed_permission_keys() {
        let role = record(r#"{"vms.view": true, "vm:start": false}"#).to_role().unwrap();
        assert_eq!(role.permissions.get("vms.view"), Some(&true));
        assert_eq!(role.permissions.get("vm:start"), Some(&false));
        assert_eq!(role.granted_count(), 1);
    }

    #[test]
    fn empty_column_is_empty_map() {
        assert!(record("  ").parse_permissions().unwrap().is_empty());
    }

    #[test]
    fn corrupt_column_names_the_role() {
        let err = record("{not json").parse_permissions().unwrap_err();
        assert!(err.to_string().contains("'ops'"));
    }

    #[test]
    fn non_boolean_values_are_rejected() {
        assert!(record(r#"{"vm:view": "yes"}"#).parse_permissions().is_err());
    }

    #[test]
    fn admin_principal_has_no_role() {
        let admin = Principal::admin("root");
        assert!(admin.is_admin);
        assert!(admin.role_name().is_none());
    }
}
