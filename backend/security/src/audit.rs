/// RBAC audit log: role lifecycle changes and denied permission checks.
///
/// Entries are stored in SQLite in the `rbac_audit` table with actor, action,
/// affected resource, a JSON detail blob and a timestamp.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Utc;
use proxpanel_core::{PermissionMap, Principal};
use proxpanel_rbac::PermissionDenial;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

const AUDIT_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS rbac_audit (
         id            TEXT PRIMARY KEY,
         level         TEXT NOT NULL,
         action        TEXT NOT NULL,
         message       TEXT NOT NULL,
         actor_id      INTEGER NOT NULL,
         actor         TEXT NOT NULL,
         resource_type TEXT,
         resource_id   TEXT,
         resource_name TEXT,
         request_path  TEXT,
         details       TEXT NOT NULL,
         success       INTEGER NOT NULL,
         timestamp     INTEGER NOT NULL
     );
     CREATE INDEX IF NOT EXISTS idx_rbac_audit_actor ON rbac_audit(actor_id);
     CREATE INDEX IF NOT EXISTS idx_rbac_audit_action ON rbac_audit(action);
     CREATE INDEX IF NOT EXISTS idx_rbac_audit_ts ON rbac_audit(timestamp);";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RbacAction {
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    RoleAssigned,
    PermissionDenied,
}

impl RbacAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RbacAction::RoleCreated => "role_created",
            RbacAction::RoleUpdated => "role_updated",
            RbacAction::RoleDeleted => "role_deleted",
            RbacAction::RoleAssigned => "role_assigned",
            RbacAction::PermissionDenied => "permission_denied",
        }
    }

    /// Human label for audit UIs.
    pub fn label(self) -> &'static str {
        match self {
            RbacAction::RoleCreated => "Role Created",
            RbacAction::RoleUpdated => "Role Updated",
            RbacAction::RoleDeleted => "Role Deleted",
            RbacAction::RoleAssigned => "Role Assigned to User",
            RbacAction::PermissionDenied => "Permission Denied",
        }
    }
}

impl fmt::Display for RbacAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RbacAction {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Ok(match value {
            "role_created" => RbacAction::RoleCreated,
            "role_updated" => RbacAction::RoleUpdated,
            "role_deleted" => RbacAction::RoleDeleted,
            "role_assigned" => RbacAction::RoleAssigned,
            "permission_denied" => RbacAction::PermissionDenied,
            other => anyhow::bail!("unknown RBAC audit action '{other}'"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacAuditEntry {
    pub id: Uuid,
    /// `info` or `warning`.
    pub level: String,
    pub action: RbacAction,
    pub message: String,
    pub actor_id: i64,
    pub actor: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub request_path: Option<String>,
    pub details: serde_json::Value,
    pub success: bool,
    pub timestamp: i64,
}

impl RbacAuditEntry {
    fn new(action: RbacAction, actor_id: i64, actor: &str, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            level: "info".into(),
            action,
            message,
            actor_id,
            actor: actor.to_string(),
            resource_type: None,
            resource_id: None,
            resource_name: None,
            request_path: None,
            details: json!({}),
            success: true,
            timestamp: Utc::now().timestamp(),
        }
    }

    fn resource(mut self, kind: &str, id: impl ToString, name: &str) -> Self {
        self.resource_type = Some(kind.to_string());
        self.resource_id = Some(id.to_string());
        self.resource_name = Some(name.to_string());
        self
    }

    fn warning(mut self) -> Self {
        self.level = "warning".into();
        self
    }
}

/// Permissions turned on and off between two versions of a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Walks the keys of `new`: enabled-and-previously-off is an addition,
/// disabled-and-previously-on is a removal.
pub fn role_diff(old: &PermissionMap, new: &PermissionMap) -> RoleDiff {
    let mut diff = RoleDiff::default();
    for (code, &enabled) in new {
        let was = old.get(code).copied().unwrap_or(false);
        if enabled && !was {
            diff.added.push(code.clone());
        } else if !enabled && was {
            diff.removed.push(code.clone());
        }
    }
    diff
}

fn enabled_count(map: &PermissionMap) -> usize {
    map.values().filter(|v| **v).count()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacAuditQuery {
    pub limit: usize,
    pub offset: usize,
    pub actor_id: Option<i64>,
    pub action: Option<RbacAction>,
}

impl Default for RbacAuditQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            actor_id: None,
            action: None,
        }
    }
}

pub struct RbacAuditLog {
    conn: Mutex<Connection>,
}

impl RbacAuditLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite audit database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(AUDIT_SCHEMA)
            .context("Failed to initialize rbac_audit schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(AUDIT_SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub async fn record(&self, entry: &RbacAuditEntry) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO rbac_audit (id, level, action, message, actor_id, actor, resource_type,
                                     resource_id, resource_name, request_path, details, success, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                entry.id.to_string(),
                entry.level,
                entry.action.as_str(),
                entry.message,
                entry.actor_id,
                entry.actor,
                entry.resource_type,
                entry.resource_id,
                entry.resource_name,
                entry.request_path,
                serde_json::to_string(&entry.details)?,
                entry.success,
                entry.timestamp,
            ],
        )?;
        Ok(())
    }

    pub async fn log_role_created(
        &self,
        role_id: i64,
        role_name: &str,
        permissions: &PermissionMap,
        actor: &Principal,
    ) -> Result<()> {
        let mut entry = RbacAuditEntry::new(
            RbacAction::RoleCreated,
            actor.id,
            &actor.username,
            format!("Role '{role_name}' created by {}", actor.username),
        )
        .resource("role", role_id, role_name);
        entry.details = json!({
            "permissions": permissions,
            "permissions_count": enabled_count(permissions),
        });
        self.record(&entry).await?;
        info!(role = role_name, actor = %actor.username, "RBAC audit: role created");
        Ok(())
    }

    /// Record a permission change and return the diff that was logged.
    pub async fn log_role_updated(
        &self,
        role_id: i64,
        role_name: &str,
        old: &PermissionMap,
        new: &PermissionMap,
        actor: &Principal,
    ) -> Result<RoleDiff> {
        let diff = role_diff(old, new);
        let mut entry = RbacAuditEntry::new(
            RbacAction::RoleUpdated,
            actor.id,
            &actor.username,
            format!(
                "Role '{role_name}' updated by {}: +{} -{} permissions",
                actor.username,
                diff.added.len(),
                diff.removed.len()
            ),
        )
        .resource("role", role_id, role_name);
        entry.details = json!({
            "permissions_added": diff.added,
            "permissions_removed": diff.removed,
            "old_permissions_count": enabled_count(old),
            "new_permissions_count": enabled_count(new),
        });
        self.record(&entry).await?;
        info!(
            role = role_name,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "RBAC audit: role updated"
        );
        Ok(diff)
    }

    pub async fn log_role_deleted(
        &self,
        role_id: i64,
        role_name: &str,
        actor: &Principal,
        affected_users: usize,
    ) -> Result<()> {
        let mut entry = RbacAuditEntry::new(
            RbacAction::RoleDeleted,
            actor.id,
            &actor.username,
            format!(
                "Role '{role_name}' deleted by {}, {affected_users} users affected",
                actor.username
            ),
        )
        .resource("role", role_id, role_name)
        .warning();
        entry.details = json!({ "affected_users": affected_users });
        self.record(&entry).await?;
        warn!(role = role_name, affected_users, "RBAC audit: role deleted");
        Ok(())
    }

    pub async fn log_role_assigned(
        &self,
        target_id: i64,
        target_username: &str,
        role_id: i64,
        role_name: &str,
        old_role_name: Option<&str>,
        actor: &Principal,
    ) -> Result<()> {
        let mut message = format!("Role '{role_name}' assigned to user '{target_username}'");
        if let Some(old) = old_role_name {
            message.push_str(&format!(" (was: {old})"));
        }
        message.push_str(&format!(" by {}", actor.username));

        let mut entry = RbacAuditEntry::new(RbacAction::RoleAssigned, actor.id, &actor.username, message)
            .resource("user", target_id, target_username);
        entry.details = json!({
            "new_role_id": role_id,
            "new_role_name": role_name,
            "old_role_name": old_role_name,
            "target_user_id": target_id,
            "target_username": target_username,
        });
        self.record(&entry).await?;
        info!(target = target_username, role = role_name, "RBAC audit: role assigned");
        Ok(())
    }

    pub async fn log_permission_denied(&self, denial: &PermissionDenial, request_path: Option<&str>) -> Result<()> {
        let mut entry = RbacAuditEntry::new(
            RbacAction::PermissionDenied,
            denial.user_id,
            &denial.username,
            format!("Permission '{}' denied for user '{}'", denial.permission, denial.username),
        )
        .warning();
        entry.success = false;
        entry.resource_id = denial.resource_id.map(|id| id.to_string());
        entry.request_path = request_path.map(str::to_string);
        entry.details = json!({
            "permission": denial.permission,
            "resolved_permission": denial.resolved_permission,
            "scope": denial.scope,
        });
        self.record(&entry).await
    }

    /// Newest first, filtered by actor and/or action.
    pub async fn recent(&self, query: &RbacAuditQuery) -> Result<Vec<RbacAuditEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, level, action, message, actor_id, actor, resource_type, resource_id,
                    resource_name, request_path, details, success, timestamp
             FROM rbac_audit
             WHERE (?1 IS NULL OR actor_id = ?1) AND (?2 IS NULL OR action = ?2)
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
            .query_map(
                params![
                    query.actor_id,
                    query.action.map(RbacAction::as_str),
                    query.limit as i64,
                    query.offset as i64,
                ],
                row_to_entry,
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Role assignments that targeted `user_id`, newest first.
    pub async fn user_permission_history(&self, user_id: i64, limit: usize) -> Result<Vec<RbacAuditEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, level, action, message, actor_id, actor, resource_type, resource_id,
                    resource_name, request_path, details, success, timestamp
             FROM rbac_audit
             WHERE json_extract(details, '$.target_user_id') = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_entry)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<RbacAuditEntry> {
    let id_str: String = row.get(0)?;
    let action_str: String = row.get(2)?;
    let details_str: String = row.get(10)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?;
    let action = action_str
        .parse()
        .map_err(|e: anyhow::Error| rusqlite::Error::InvalidParameterName(e.to_string()))?;
    let details = serde_json::from_str(&details_str)
        .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?;

    Ok(RbacAuditEntry {
        id,
        level: row.get(1)?,
        action,
        message: row.get(3)?,
        actor_id: row.get(4)?,
        actor: row.get(5)?,
        resource_type: row.get(6)?,
        resource_id: row.get(7)?,
        resource_name: row.get(8)?,
        request_path: row.get(9)?,
        details,
        success: row.get(11)?,
        timestamp: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxpanel_core::Role;
    use proxpanel_rbac::Scope;

    fn map(entries: &[(&str, bool)]) -> PermissionMap {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn admin() -> Principal {
        Principal { id: 1, ..Principal::admin("root") }
    }

    #[test]
    fn diff_walks_new_keys_only() {
        let old = map(&[("vm:view", true), ("vm:stop", true), ("lxc:view", true)]);
        let new = map(&[("vm:view", true), ("vm:stop", false), ("vm:start", true)]);
        let diff = role_diff(&old, &new);
        assert_eq!(diff.added, vec!["vm:start"]);
        assert_eq!(diff.removed, vec!["vm:stop"]);
    }

    #[tokio::test]
    async fn role_update_records_diff_and_counts() {
        let log = RbacAuditLog::in_memory().unwrap();
        let old = map(&[("vm:view", true)]);
        let new = map(&[("vm:view", true), ("vm:start", true)]);
        let diff = log.log_role_updated(7, "ops", &old, &new, &admin()).await.unwrap();
        assert_eq!(diff.added, vec!["vm:start"]);

        let entries = log.recent(&RbacAuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.action, RbacAction::RoleUpdated);
        assert_eq!(e.resource_id.as_deref(), Some("7"));
        assert_eq!(e.message, "Role 'ops' updated by root: +1 -0 permissions");
        assert_eq!(e.details["old_permissions_count"], 1);
        assert_eq!(e.details["new_permissions_count"], 2);
    }

    #[tokio::test]
    async fn recent_filters_by_actor_and_action() {
        let log = RbacAuditLog::in_memory().unwrap();
        let root = admin();
        let bob = Principal { id: 2, ..Principal::with_role("bob", Role::new("user")) };

        log.log_role_created(1, "ops", &map(&[("vm:view", true)]), &root).await.unwrap();
        log.log_role_deleted(1, "ops", &root, 3).await.unwrap();
        log.log_permission_denied(
            &PermissionDenial {
                user_id: bob.id,
                username: bob.username.clone(),
                permission: "vms.delete".into(),
                resolved_permission: "vm:delete".into(),
                scope: Scope::Global,
                resource_id: Some(101),
            },
            Some("/api/vms/101"),
        )
        .await
        .unwrap();

        let all = log.recent(&RbacAuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, RbacAction::PermissionDenied);

        let by_root = log
            .recent(&RbacAuditQuery { actor_id: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_root.len(), 2);

        let denied = log
            .recent(&RbacAuditQuery { action: Some(RbacAction::PermissionDenied), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert!(!denied[0].success);
        assert_eq!(denied[0].level, "warning");
        assert_eq!(denied[0].details["resolved_permission"], "vm:delete");
        assert_eq!(denied[0].request_path.as_deref(), Some("/api/vms/101"));

        let page = log
            .recent(&RbacAuditQuery { limit: 1, offset: 1, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].action, RbacAction::RoleDeleted);
    }

    #[tokio::test]
    async fn assignment_history_per_user() {
        let log = RbacAuditLog::in_memory().unwrap();
        log.log_role_assigned(5, "carol", 2, "moderator", Some("user"), &admin()).await.unwrap();
        log.log_role_assigned(6, "dave", 3, "user", None, &admin()).await.unwrap();

        let history = log.user_permission_history(5, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].message,
            "Role 'moderator' assigned to user 'carol' (was: user) by root"
        );
        assert_eq!(history[0].details["old_role_name"], "user");
    }

    #[test]
    fn action_names_round_trip() {
        for action in [
            RbacAction::RoleCreated,
            RbacAction::RoleUpdated,
            RbacAction::RoleDeleted,
            RbacAction::RoleAssigned,
            RbacAction::PermissionDenied,
        ] {
            assert_eq!(action.as_str().parse::<RbacAction>().unwrap(), action);
        }
        assert!("role_exploded".parse::<RbacAction>().is_err());
    }
}
