//! `proxpanel permissions`

use anyhow::{Context, Result, bail};
use proxpanel_rbac::PermissionRegistry;

use crate::terminal_output::{Column, render_table};

pub fn run(category: Option<&str>, legacy: bool) -> Result<()> {
    let registry = PermissionRegistry::builtin().context("Built-in permission catalog is inconsistent")?;
    print!("{}", catalog_table(&registry, category, legacy)?);
    Ok(())
}

fn catalog_table(registry: &PermissionRegistry, category: Option<&str>, legacy: bool) -> Result<String> {
    let permissions = match category {
        Some(name) => {
            let found = registry.by_category(name);
            if found.is_empty() {
                bail!(
                    "Unknown category '{name}'. Known: {}",
                    registry.categories().join(", ")
                );
            }
            found
        }
        None => registry.all().iter().collect(),
    };

    let mut columns = vec![Column::left("Category"), Column::left("Code")];
    if legacy {
        columns.push(Column::left("Legacy"));
    }
    columns.push(Column::left("Name"));

    let rows: Vec<Vec<String>> = permissions
        .into_iter()
        .map(|p| {
            let mut row = vec![p.category.clone(), p.code().to_string()];
            if legacy {
                row.push(registry.legacy().to_legacy(p.code()).unwrap_or("").to_string());
            }
            row.push(p.display_name.clone());
            row
        })
        .collect();
    Ok(render_table(&columns, &rows))
}
