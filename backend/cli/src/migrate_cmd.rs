//! `proxpanel migrate`

use std::path::Path;

use anyhow::Result;
use proxpanel_rbac::{
    LegacyMap, RoleStore, convert_permissions_to_new_format, ensure_default_roles_new_format, is_legacy_key,
    migrate_all_roles_to_new_format,
};

use crate::context::PanelContext;
use crate::terminal_output::{Column, note_info, note_success, note_warn, render_table};

pub async fn run(config_path: &Path, dry_run: bool) -> Result<()> {
    let ctx = PanelContext::open(config_path).await?;
    let legacy = ctx.registry.legacy();

    if dry_run {
        let pending = pending_migrations(ctx.store.as_ref(), legacy).await?;
        if pending.is_empty() {
            note_success("All roles already use structured permission codes");
        } else {
            note_info(&format!("{} role(s) would be rewritten:", pending.len()));
            let rows: Vec<Vec<String>> = pending
                .into_iter()
                .map(|p| vec![p.name, p.legacy_keys.to_string(), p.granted_after.to_string()])
                .collect();
            print!(
                "{}",
                render_table(
                    &[Column::left("Role"), Column::right("Legacy keys"), Column::right("Granted after")],
                    &rows
                )
            );
        }
        return Ok(());
    }

    let migrated = migrate_all_roles_to_new_format(ctx.store.as_ref(), legacy).await?;
    let report = ensure_default_roles_new_format(ctx.store.as_ref()).await?;
    note_success(&format!("Migrated {migrated} role(s) to structured permission codes"));
    note_info(&format!(
        "System roles: {} created, {} updated, {} untouched",
        report.created, report.updated, report.untouched
    ));
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub struct PendingMigration {
    pub name: String,
    pub legacy_keys: usize,
    pub granted_after: usize,
}

/// Roles that `migrate_all_roles_to_new_format` would rewrite.
pub async fn pending_migrations(store: &dyn RoleStore, legacy: &LegacyMap) -> Result<Vec<PendingMigration>> {
    let mut pending = Vec::new();
    for record in store.list_roles().await? {
        let old = match record.parse_permissions() {
            Ok(map) if !map.is_empty() => map,
            Ok(_) => continue,
            Err(e) => {
                note_warn(&format!("Skipping role '{}': {e}", record.name));
                continue;
            }
        };
        let legacy_keys = old.keys().filter(|k| is_legacy_key(k)).count();
        if legacy_keys == 0 {
            continue;
        }
        let converted = convert_permissions_to_new_format(legacy, &old);
        if converted != old {
            pending.push(PendingMigration {
                name: record.name,
                legacy_keys,
                granted_after: converted.values().filter(|v| **v).count(),
            });
        }
    }
    Ok(pending)
}
