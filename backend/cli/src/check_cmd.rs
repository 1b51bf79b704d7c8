//! `proxpanel check <role> <permission>`
//!
//! Exits non-zero when the role does not grant the permission, so the
//! command can gate scripts.

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use proxpanel_core::Principal;
use proxpanel_rbac::{PermissionEngine, RoleStore};

use crate::context::PanelContext;
use crate::terminal_output::{note_info, note_success, note_warn};

pub async fn run(config_path: &Path, role_name: &str, permission: &str) -> Result<()> {
    let ctx = PanelContext::open(config_path).await?;
    let record = ctx
        .store
        .find_role_by_name(role_name)
        .await?
        .ok_or_else(|| anyhow!("Role '{role_name}' not found"))?;
    let principal = Principal::with_role(format!("role:{role_name}"), record.to_role()?);

    let verdict = evaluate(&ctx.engine(), &principal, permission);
    if verdict.resolved != permission {
        note_info(&format!("'{permission}' resolves to '{}'", verdict.resolved));
    }
    if !verdict.registered {
        note_warn(&format!("'{}' is not in the permission catalog", verdict.resolved));
    }
    if !verdict.granted {
        bail!("Role '{role_name}' does not grant '{permission}'");
    }
    note_success(&format!("Role '{role_name}' grants '{permission}'"));
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct Verdict {
    resolved: String,
    registered: bool,
    granted: bool,
}

fn evaluate(engine: &PermissionEngine, principal: &Principal, permission: &str) -> Verdict {
    let registry = engine.registry();
    let resolved = registry.resolve(permission).to_string();
    Verdict {
        registered: registry.exists(&resolved),
        granted: engine.has_permission(principal, permission),
        resolved,
    }
}
