//! `proxpanel roles`

use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Subcommand;
use proxpanel_core::{Principal, RoleRecord};
use proxpanel_rbac::{PermissionEngine, RoleStore, convert_permissions_to_legacy_format};

use crate::context::PanelContext;
use crate::terminal_output::{Column, granted_cell, note_warn, render_table};

#[derive(Debug, Subcommand)]
pub enum RolesCommand {
    /// List every stored role
    List,
    /// Show one role's effective permissions
    Show {
        name: String,
        /// Print the stored map in legacy dotted form
        #[arg(long)]
        legacy: bool,
    },
}

pub async fn run(config_path: &Path, command: RolesCommand) -> Result<()> {
    let ctx = PanelContext::open(config_path).await?;
    match command {
        RolesCommand::List => {
            let rows: Vec<Vec<String>> = ctx.store.list_roles().await?.iter().map(role_row).collect();
            print!(
                "{}",
                render_table(
                    &[
                        Column::right("ID"),
                        Column::left("Name"),
                        Column::left("Display name"),
                        Column::right("Granted"),
                        Column::left("System"),
                    ],
                    &rows
                )
            );
        }
        RolesCommand::Show { name, legacy } => {
            let record = ctx
                .store
                .find_role_by_name(&name)
                .await?
                .ok_or_else(|| anyhow!("Role '{name}' not found"))?;
            let role = record.to_role()?;
            println!("{} ({}): {}", record.display_name, record.name, record.description);

            if legacy {
                let map = convert_permissions_to_legacy_format(ctx.registry.legacy(), &role.permissions);
                println!("{}", serde_json::to_string_pretty(&map)?);
                return Ok(());
            }
            print!("{}", effective_table(&ctx.engine(), &Principal::with_role(record.name.clone(), role)));
        }
    }
    Ok(())
}

fn role_row(record: &RoleRecord) -> Vec<String> {
    let granted = match record.parse_permissions() {
        Ok(map) => map.values().filter(|v| **v).count().to_string(),
        Err(e) => {
            note_warn(&format!("Role '{}' has unreadable permissions: {e}", record.name));
            "?".to_string()
        }
    };
    vec![
        record.id.to_string(),
        record.name.clone(),
        record.display_name.clone(),
        granted,
        if record.is_system { "yes".into() } else { String::new() },
    ]
}

/// Permission matrix including implied grants (`manage`, wildcards).
fn effective_table(engine: &PermissionEngine, principal: &Principal) -> String {
    let held = engine.user_permissions(principal);
    let rows: Vec<Vec<String>> = engine
        .registry()
        .all()
        .iter()
        .map(|p| {
            let effective = engine.has_permission(principal, p.code());
            let direct = held.contains(p.code());
            let via = if effective && !direct { "implied" } else { "" };
            vec![
                p.category.clone(),
                p.code().to_string(),
                granted_cell(effective),
                via.to_string(),
            ]
        })
        .collect();
    render_table(
        &[
            Column::left("Category"),
            Column::left("Permission"),
            Column::left("Granted"),
            Column::left(""),
        ],
        &rows,
    )
}
