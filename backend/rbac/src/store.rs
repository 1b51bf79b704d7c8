//! Role persistence.
//!
//! Roles live in a single `roles` table whose `permissions` column is a JSON
//! object of code -> bool. Rows are returned raw ([`RoleRecord`]) so callers
//! can decide what to do with a column that no longer parses.
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use proxpanel_core::{NewRole, PanelError, PermissionMap, RoleRecord};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;
use tracing::{debug, info};

const ROLES_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS roles (
         id           INTEGER PRIMARY KEY AUTOINCREMENT,
         name         TEXT NOT NULL UNIQUE,
         display_name TEXT NOT NULL DEFAULT '',
         description  TEXT NOT NULL DEFAULT '',
         permissions  TEXT NOT NULL DEFAULT '{}',
         is_system    INTEGER NOT NULL DEFAULT 0
     );";

const SELECT_ROLE: &str = "SELECT id, name, display_name, description, permissions, is_system FROM roles";

/// Abstract interface for role storage.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>>;

    async fn find_role(&self, id: i64) -> Result<Option<RoleRecord>>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>>;

    /// Insert a role and return its id.
    async fn insert_role(&self, role: NewRole) -> Result<i64>;

    /// Replace the permission map of an existing role.
    async fn update_permissions(&self, id: i64, permissions: &PermissionMap) -> Result<()>;

    /// Replace display name, description and permissions of an existing role.
    async fn update_role(
        &self,
        id: i64,
        display_name: &str,
        description: &str,
        permissions: &PermissionMap,
    ) -> Result<()>;

    /// Returns `false` when no row had that id.
    async fn delete_role(&self, id: i64) -> Result<bool>;
}

pub struct SqliteRoleStore {
    conn: Mutex<Connection>,
}

impl SqliteRoleStore {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite role database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL journal")?;
        conn.execute_batch(ROLES_SCHEMA)
            .context("Failed to initialize roles schema")?;

        info!(path = ?path.as_ref(), "Role store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(ROLES_SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Overwrite the permissions column with arbitrary text.
    #[cfg(test)]
    pub(crate) async fn set_raw_permissions(&self, id: i64, raw: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("UPDATE roles SET permissions = ?1 WHERE id = ?2", params![raw, id])?;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("{SELECT_ROLE} ORDER BY id"))?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read roles")?;
        Ok(rows)
    }

    async fn find_role(&self, id: i64) -> Result<Option<RoleRecord>> {
        let conn = self.conn.lock().await;
        let record = conn
            .query_row(&format!("{SELECT_ROLE} WHERE id = ?1"), params![id], row_to_record)
            .optional()?;
        Ok(record)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>> {
        let conn = self.conn.lock().await;
        let record = conn
            .query_row(&format!("{SELECT_ROLE} WHERE name = ?1"), params![name], row_to_record)
            .optional()?;
        Ok(record)
    }

    async fn insert_role(&self, role: NewRole) -> Result<i64> {
        let permissions = serde_json::to_string(&role.permissions)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO roles (name, display_name, description, permissions, is_system)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                role.name,
                role.display_name,
                role.description,
                permissions,
                role.is_system,
            ],
        )
        .with_context(|| format!("Failed to insert role '{}'", role.name))?;
        let id = conn.last_insert_rowid();
        debug!(role = %role.name, id, "Inserted role");
        Ok(id)
    }

    async fn update_permissions(&self, id: i64, permissions: &PermissionMap) -> Result<()> {
        let json = serde_json::to_string(permissions)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE roles SET permissions = ?1 WHERE id = ?2",
            params![json, id],
        )?;
        if changed == 0 {
            return Err(PanelError::RoleNotFound(id.to_string()).into());
        }
        debug!(id, "Updated role permissions");
        Ok(())
    }

    async fn update_role(
        &self,
        id: i64,
        display_name: &str,
        description: &str,
        permissions: &PermissionMap,
    ) -> Result<()> {
        let json = serde_json::to_string(permissions)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE roles SET display_name = ?1, description = ?2, permissions = ?3 WHERE id = ?4",
            params![display_name, description, json, id],
        )?;
        if changed == 0 {
            return Err(PanelError::RoleNotFound(id.to_string()).into());
        }
        Ok(())
    }

    async fn delete_role(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute("DELETE FROM roles WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RoleRecord> {
    Ok(RoleRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        permissions_json: row.get(4)?,
        is_system: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_role(name: &str, perms: &[(&str, bool)]) -> NewRole {
        NewRole {
            name: name.into(),
            display_name: name.to_uppercase(),
            description: String::new(),
            permissions: perms.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            is_system: false,
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let store = SqliteRoleStore::in_memory().unwrap();
        let id = store
            .insert_role(new_role("ops", &[("vms.view", true), ("vm:start", false)]))
            .await
            .unwrap();

        let by_id = store.find_role(id).await.unwrap().unwrap();
        let by_name = store.find_role_by_name("ops").await.unwrap().unwrap();
        assert_eq!(by_id, by_name);

        let role = by_id.to_role().unwrap();
        assert_eq!(role.display_name, "OPS");
        assert_eq!(role.permissions.get("vms.view"), Some(&true));
        assert_eq!(role.permissions.get("vm:start"), Some(&false));
        assert!(store.find_role_by_name("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let store = SqliteRoleStore::in_memory().unwrap();
        store.insert_role(new_role("ops", &[])).await.unwrap();
        assert!(store.insert_role(new_role("ops", &[])).await.is_err());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let store = SqliteRoleStore::in_memory().unwrap();
        let id = store.insert_role(new_role("ops", &[])).await.unwrap();

        let perms: PermissionMap = [("vm:view".to_string(), true)].into_iter().collect();
        store.update_permissions(id, &perms).await.unwrap();
        let record = store.find_role(id).await.unwrap().unwrap();
        assert_eq!(record.permissions_json, r#"{"vm:view":true}"#);

        store.update_role(id, "Operators", "Runs things", &PermissionMap::new()).await.unwrap();
        let record = store.find_role(id).await.unwrap().unwrap();
        assert_eq!(record.display_name, "Operators");
        assert!(record.parse_permissions().unwrap().is_empty());

        assert!(store.update_permissions(999, &perms).await.is_err());
        assert!(store.delete_role(id).await.unwrap());
        assert!(!store.delete_role(id).await.unwrap());
        assert!(store.list_roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_in_insertion_order() {
        let store = SqliteRoleStore::in_memory().unwrap();
        for name in ["admin", "user", "demo"] {
            store.insert_role(new_role(name, &[])).await.unwrap();
        }
        let names: Vec<_> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["admin", "user", "demo"]);
    }
}
