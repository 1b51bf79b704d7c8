//! Conversion between legacy dotted and structured permission maps, and the
//! one-shot upgrade of persisted roles.

use std::collections::BTreeMap;

use anyhow::Result;
use proxpanel_core::PermissionMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::code::{CODE_SEPARATOR, LEGACY_SEPARATOR};
use crate::defaults::DEFAULT_ROLES;
use crate::legacy::LegacyMap;
use crate::registry::PermissionRegistry;
use crate::store::RoleStore;

/// `category -> { code -> display name }`.
pub type CategoryMap = BTreeMap<String, BTreeMap<String, String>>;

fn is_structured(key: &str) -> bool {
    key.contains(CODE_SEPARATOR)
}

/// A dotted `resource.action` key, as stored before structured codes.
pub fn is_legacy_key(key: &str) -> bool {
    key.contains(LEGACY_SEPARATOR) && !key.contains(CODE_SEPARATOR)
}

/// Rewrite legacy keys to structured codes.
///
/// Structured keys pass through with their value and win over any legacy alias
/// of the same code, whatever the key order. Mapped legacy keys are converted
/// only when enabled; a disabled legacy entry is dropped rather than kept as
/// `false`. Unknown keys survive only when enabled.
pub fn convert_permissions_to_new_format(legacy: &LegacyMap, old: &PermissionMap) -> PermissionMap {
    let mut converted: PermissionMap = old
        .iter()
        .filter(|(key, _)| is_structured(key))
        .map(|(key, enabled)| (key.clone(), *enabled))
        .collect();

    for (key, &enabled) in old.iter().filter(|(key, _)| !is_structured(key)) {
        if !enabled {
            continue;
        }
        match legacy.to_new(key) {
            Some(new) => {
                converted.entry(new.to_string()).or_insert(true);
            }
            None => {
                warn!(permission = %key, "Unknown permission format");
                converted.insert(key.clone(), true);
            }
        }
    }
    converted
}

/// Inverse of [`convert_permissions_to_new_format`] for legacy UIs. Disabled
/// entries are dropped; codes without a legacy name are kept as they are.
pub fn convert_permissions_to_legacy_format(legacy: &LegacyMap, new: &PermissionMap) -> PermissionMap {
    new.iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(key, _)| {
            let name = if is_structured(key) {
                legacy.to_legacy(key).unwrap_or(key.as_str())
            } else {
                key.as_str()
            };
            (name.to_string(), true)
        })
        .collect()
}

pub fn permission_categories(registry: &PermissionRegistry) -> CategoryMap {
    let mut categories = CategoryMap::new();
    for p in registry.all() {
        categories
            .entry(p.category.clone())
            .or_default()
            .insert(p.code().to_string(), p.display_name.clone());
    }
    categories
}

/// Same as [`permission_categories`] but keyed by legacy code where one exists.
pub fn permission_categories_legacy(registry: &PermissionRegistry) -> CategoryMap {
    let mut categories = CategoryMap::new();
    for p in registry.all() {
        let code = registry.legacy().to_legacy(p.code()).unwrap_or(p.code());
        categories
            .entry(p.category.clone())
            .or_default()
            .insert(code.to_string(), p.display_name.clone());
    }
    categories
}

/// Convert and persist one role's permissions.
pub async fn migrate_role_permissions(
    store: &dyn RoleStore,
    legacy: &LegacyMap,
    role_id: i64,
    old: &PermissionMap,
) -> Result<PermissionMap> {
    let converted = convert_permissions_to_new_format(legacy, old);
    store.update_permissions(role_id, &converted).await?;
    info!(role_id, "Migrated role permissions to new format");
    Ok(converted)
}

/// Upgrade every persisted role holding legacy keys.
///
/// Rows with an empty or unparseable permissions column are skipped. A row is
/// only rewritten, and counted, when conversion changes it, so a second run
/// returns zero.
pub async fn migrate_all_roles_to_new_format(store: &dyn RoleStore, legacy: &LegacyMap) -> Result<usize> {
    let mut migrated = 0;
    for record in store.list_roles().await? {
        let current = match record.parse_permissions() {
            Ok(map) => map,
            Err(e) => {
                warn!(role = %record.name, id = record.id, error = %e, "Skipping role with unreadable permissions");
                continue;
            }
        };
        if current.is_empty() {
            continue;
        }

        let has_new = current.keys().any(|k| is_structured(k));
        let has_old = current.keys().any(|k| is_legacy_key(k));
        if !has_old {
            continue;
        }

        let converted = convert_permissions_to_new_format(legacy, &current);
        if converted == current {
            continue;
        }
        store.update_permissions(record.id, &converted).await?;
        if has_new {
            info!(role = %record.name, id = record.id, "Merged and migrated mixed-format role");
        } else {
            info!(role = %record.name, id = record.id, "Migrated role to new permission format");
        }
        migrated += 1;
    }
    Ok(migrated)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DefaultRolesReport {
    pub created: usize,
    pub updated: usize,
    pub untouched: usize,
}

/// Make sure the baseline roles exist with structured permissions.
///
/// An existing row is overwritten only when its map is empty, unreadable, or
/// still holds legacy keys. Anything already fully structured is assumed to
/// have been edited on purpose and is left alone.
pub async fn ensure_default_roles_new_format(store: &dyn RoleStore) -> Result<DefaultRolesReport> {
    let mut report = DefaultRolesReport::default();
    for role in DEFAULT_ROLES {
        let Some(existing) = store.find_role_by_name(role.name).await? else {
            store.insert_role(role.to_new_role()).await?;
            info!(role = role.name, "Created role with new permission format");
            report.created += 1;
            continue;
        };

        let current = existing.parse_permissions().unwrap_or_else(|e| {
            warn!(role = role.name, error = %e, "Replacing unreadable default role permissions");
            PermissionMap::new()
        });
        if current.is_empty() || current.keys().any(|k| is_legacy_key(k)) {
            store
                .update_role(existing.id, role.display_name, role.description, &role.permission_map())
                .await?;
            info!(role = role.name, "Updated role with new permission format");
            report.updated += 1;
        } else {
            report.untouched += 1;
        }
    }
    Ok(report)
}
