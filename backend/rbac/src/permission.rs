use serde::Serialize;

use crate::code::{Action, PermissionCode, Resource, Scope};

/// One grantable capability.
///
/// The canonical and legacy string forms are rendered once at construction so
/// lookups can hand out `&str` without allocating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permission {
    #[serde(skip)]
    typed: PermissionCode,
    code: String,
    legacy_code: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    /// Logically prerequisite codes. Documentation only, never enforced.
    pub requires: Vec<PermissionCode>,
}

impl Permission {
    pub fn new(
        code: PermissionCode,
        display_name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            code: code.to_string(),
            legacy_code: code.legacy_code(),
            typed: code,
            display_name: display_name.into(),
            description: description.into(),
            category: category.into(),
            requires: Vec::new(),
        }
    }

    pub fn requires(mut self, codes: impl IntoIterator<Item = PermissionCode>) -> Self {
        self.requires.extend(codes);
        self
    }

    /// Canonical `resource:action[:scope]` string.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Dotted `resource.action` string.
    pub fn legacy_code(&self) -> &str {
        &self.legacy_code
    }

    pub fn permission_code(&self) -> PermissionCode {
        self.typed
    }

    pub fn resource(&self) -> Resource {
        self.typed.resource
    }

    pub fn action(&self) -> Action {
        self.typed.action
    }

    pub fn scope(&self) -> Scope {
        self.typed.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_code_forms() {
        let p = Permission::new(
            PermissionCode::scoped(Resource::Vm, Action::Delete, Scope::Instance),
            "Delete VM",
            "Delete one VM",
            "Virtual Machines",
        );
        assert_eq!(p.code(), "vm:delete:instance");
        assert_eq!(p.legacy_code(), "vm.delete");
        assert_eq!(p.scope(), Scope::Instance);
    }

    #[test]
    fn serializes_canonical_code_and_requirements() {
        let p = Permission::new(
            PermissionCode::new(Resource::Vm, Action::Create),
            "Create VMs",
            "",
            "Virtual Machines",
        )
        .requires([
            PermissionCode::new(Resource::Vm, Action::View),
            PermissionCode::new(Resource::Template, Action::View),
        ]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["code"], "vm:create");
        assert_eq!(json["legacy_code"], "vm.create");
        assert_eq!(json["requires"], serde_json::json!(["vm:view", "template:view"]));
    }
}
