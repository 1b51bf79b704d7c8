//! Permission registry.
//!
//! Built once at process start (see [`PermissionRegistry::builtin`]) and then
//! shared read-only behind an `Arc`. There is no runtime registration after
//! the value has been handed to the engine.

use std::collections::HashMap;

use tracing::debug;

use crate::catalog::builtin_permissions;
use crate::code::Resource;
use crate::error::RbacError;
use crate::legacy::LegacyMap;
use crate::permission::Permission;

#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    permissions: Vec<Permission>,
    by_code: HashMap<String, usize>,
    /// `resource.action` of each registered permission -> canonical code.
    derived_legacy: HashMap<String, String>,
    category_order: Vec<String>,
    by_category: HashMap<String, Vec<usize>>,
    resource_order: Vec<Resource>,
    by_resource: HashMap<Resource, Vec<usize>>,
    legacy: LegacyMap,
}

impl PermissionRegistry {
    pub fn new(legacy: LegacyMap) -> Self {
        Self {
            legacy,
            ..Default::default()
        }
    }

    /// Registry holding the built-in catalog and legacy table.
    pub fn builtin() -> Result<Self, RbacError> {
        let mut registry = Self::new(LegacyMap::builtin()?);
        for permission in builtin_permissions() {
            registry.register(permission);
        }
        debug!(
            permissions = registry.len(),
            legacy_codes = registry.legacy.len(),
            "Permission registry built"
        );
        Ok(registry)
    }

    /// Insert a permission. Registering a code twice replaces the earlier
    /// definition in place (last write wins) and re-indexes it.
    pub fn register(&mut self, permission: Permission) {
        let code = permission.code().to_string();
        self.derived_legacy
            .insert(permission.legacy_code().to_string(), code.clone());

        let existing = self.by_code.get(&code).copied();
        let idx = match existing {
            Some(idx) => {
                let old = std::mem::replace(&mut self.permissions[idx], permission);
                unindex(&mut self.by_category, &mut self.category_order, &old.category, idx);
                unindex(&mut self.by_resource, &mut self.resource_order, &old.resource(), idx);
                idx
            }
            None => {
                self.permissions.push(permission);
                let idx = self.permissions.len() - 1;
                self.by_code.insert(code, idx);
                idx
            }
        };

        let permission = &self.permissions[idx];
        let category = permission.category.clone();
        let resource = permission.resource();
        index(&mut self.by_category, &mut self.category_order, category, idx);
        index(&mut self.by_resource, &mut self.resource_order, resource, idx);
    }

    /// Look up by canonical code, falling back to legacy resolution.
    pub fn get(&self, code: &str) -> Option<&Permission> {
        if let Some(&idx) = self.by_code.get(code) {
            return Some(&self.permissions[idx]);
        }
        self.by_code
            .get(self.resolve(code))
            .map(|&idx| &self.permissions[idx])
    }

    pub fn exists(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Canonical code for `code`, or `code` itself when nothing maps it.
    ///
    /// Order: registered code, static legacy table, derived `resource.action`
    /// form of a registered permission. Never fails.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        if self.by_code.contains_key(code) {
            return code;
        }
        if let Some(new) = self.legacy.to_new(code) {
            return new;
        }
        if let Some(new) = self.derived_legacy.get(code) {
            return new;
        }
        code
    }

    pub fn all(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Permission> {
        self.by_category
            .get(category)
            .map(|idxs| idxs.iter().map(|&i| &self.permissions[i]).collect())
            .unwrap_or_default()
    }

    pub fn by_resource(&self, resource: Resource) -> Vec<&Permission> {
        self.by_resource
            .get(&resource)
            .map(|idxs| idxs.iter().map(|&i| &self.permissions[i]).collect())
            .unwrap_or_default()
    }

    /// Categories in first-registration order.
    pub fn categories(&self) -> Vec<&str> {
        self.category_order.iter().map(String::as_str).collect()
    }

    /// Resources in first-registration order.
    pub fn resources(&self) -> Vec<Resource> {
        self.resource_order.clone()
    }

    /// Split `codes` into known (canonicalized) and unknown entries.
    pub fn validate<S: AsRef<str>>(&self, codes: &[S]) -> (Vec<String>, Vec<String>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for code in codes {
            let code = code.as_ref();
            match self.get(code) {
                Some(p) => valid.push(p.code().to_string()),
                None => invalid.push(code.to_string()),
            }
        }
        (valid, invalid)
    }

    pub fn legacy(&self) -> &LegacyMap {
        &self.legacy
    }
}

fn index<K>(map: &mut HashMap<K, Vec<usize>>, order: &mut Vec<K>, key: K, idx: usize)
where
    K: std::hash::Hash + Eq + Clone,
{
    let slot = map.entry(key.clone()).or_default();
    if slot.is_empty() {
        order.push(key);
    }
    if !slot.contains(&idx) {
        slot.push(idx);
    }
}

fn unindex<K>(map: &mut HashMap<K, Vec<usize>>, order: &mut Vec<K>, key: &K, idx: usize)
where
    K: std::hash::Hash + Eq,
{
    if let Some(slot) = map.get_mut(key) {
        slot.retain(|&i| i != idx);
        if slot.is_empty() {
            map.remove(key);
            order.retain(|k| k != key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LEGACY_PERMISSION_MAP;
    use crate::code::{Action, PermissionCode, Scope};

    fn registry() -> PermissionRegistry {
        PermissionRegistry::builtin().expect("builtin registry")
    }

    #[test]
    fn get_by_code_and_derived_legacy_code() {
        let reg = registry();
        for p in reg.all() {
            assert_eq!(reg.get(p.code()), Some(p));
            assert_eq!(reg.get(p.legacy_code()).map(Permission::code), Some(p.code()));
        }
    }

    #[test]
    fn resolve_every_static_legacy_code() {
        let reg = registry();
        for (old, new) in LEGACY_PERMISSION_MAP {
            assert_eq!(reg.resolve(old), *new);
        }
    }

    #[test]
    fn resolve_is_identity_for_unknown_codes() {
        let reg = registry();
        assert_eq!(reg.resolve("robot:fly"), "robot:fly");
        assert_eq!(reg.resolve("mystery.flag"), "mystery.flag");
        assert_eq!(reg.resolve(""), "");
    }

    #[test]
    fn get_through_static_legacy_table() {
        let reg = registry();
        assert_eq!(reg.get("vms.view").map(Permission::code), Some("vm:view"));
        assert_eq!(reg.get("settings.security").map(Permission::code), Some("setting:manage"));
        // Mapped, but the target is not a registered permission.
        assert_eq!(reg.resolve("proxmox.vm.manage"), "vm:manage");
        assert!(reg.get("proxmox.vm.manage").is_none());
        assert!(!reg.exists("proxmox.vm.manage"));
    }

    #[test]
    fn category_and_resource_indexes() {
        let reg = registry();
        let categories = reg.categories();
        assert_eq!(categories.first(), Some(&"Dashboard"));
        assert_eq!(categories.last(), Some(&"Notifications"));
        assert_eq!(categories.len(), 13);

        let vm_perms = reg.by_category("Virtual Machines");
        assert_eq!(vm_perms.len(), 10);
        assert!(vm_perms.iter().all(|p| p.resource() == Resource::Vm));
        assert_eq!(reg.by_resource(Resource::Lxc).len(), 9);
        assert!(reg.by_resource(Resource::Cluster).is_empty());
        assert!(reg.by_category("Nope").is_empty());
        assert!(!reg.resources().contains(&Resource::Network));
    }

    #[test]
    fn validate_canonicalizes_known_codes() {
        let reg = registry();
        let (valid, invalid) = reg.validate(&["vms.view", "vm:start", "robot:fly", "users.edit"]);
        assert_eq!(valid, vec!["vm:view", "vm:start", "user:update"]);
        assert_eq!(invalid, vec!["robot:fly"]);
    }

    #[test]
    fn duplicate_registration_replaces_in_place() {
        let mut reg = registry();
        let before = reg.len();
        reg.register(Permission::new(
            PermissionCode::new(Resource::Vm, Action::View),
            "Look at VMs",
            "",
            "Inventory",
        ));
        assert_eq!(reg.len(), before);
        assert_eq!(reg.get("vm:view").unwrap().display_name, "Look at VMs");
        assert_eq!(reg.by_category("Virtual Machines").len(), 9);
        assert_eq!(reg.by_category("Inventory").len(), 1);
        assert_eq!(reg.categories().last(), Some(&"Inventory"));
    }

    #[test]
    fn scoped_permissions_keep_distinct_codes() {
        let mut reg = PermissionRegistry::new(LegacyMap::default());
        reg.register(Permission::new(
            PermissionCode::scoped(Resource::Vm, Action::Delete, Scope::Instance),
            "Delete one VM",
            "",
            "Virtual Machines",
        ));
        assert!(reg.exists("vm:delete:instance"));
        assert!(!reg.exists("vm:delete"));
        assert_eq!(reg.resolve("vm.delete"), "vm:delete:instance");
    }
}
