//! Permission check engine.
//!
//! Every decision recomputes the principal's effective set from its current
//! role map. Checks are pure in-memory set and string operations and never
//! perform I/O, so the engine can be shared freely across tasks and threads.

use std::collections::HashSet;
use std::sync::Arc;

use proxpanel_core::{PermissionMap, Principal};
use serde::Serialize;
use tracing::{debug, warn};

use crate::code::{Action, CODE_SEPARATOR, LEGACY_SEPARATOR, Resource, Scope, action_segment};
use crate::error::AuthzError;
use crate::registry::PermissionRegistry;

/// Qualifiers threaded through a check.
///
/// Accepted so call sites can already pass them, but no field is compared
/// against anything: instance/org/workspace ownership is not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckContext {
    pub scope: Scope,
    pub resource_id: Option<i64>,
    pub organization_id: Option<i64>,
    pub workspace_id: Option<i64>,
}

impl CheckContext {
    pub fn scoped(scope: Scope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, resource_id: i64) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_workspace(mut self, workspace_id: i64) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }
}

/// A failed `check_permission`, handed to the configured [`DenialSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDenial {
    pub user_id: i64,
    pub username: String,
    pub permission: String,
    pub resolved_permission: String,
    pub scope: Scope,
    pub resource_id: Option<i64>,
}

/// Receives denial records from the check path. Implementations must not
/// block: the call happens inline with authorization.
pub trait DenialSink: Send + Sync {
    fn permission_denied(&self, denial: PermissionDenial);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantSource {
    Admin,
    Role,
}

/// One row of the permission matrix shown in the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermission {
    pub code: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub granted: bool,
    pub source: Option<GrantSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionCategory {
    pub category: String,
    pub permissions: Vec<EffectivePermission>,
}

pub struct PermissionEngine {
    registry: Arc<PermissionRegistry>,
    denials: Option<Arc<dyn DenialSink>>,
}

impl PermissionEngine {
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self {
            registry,
            denials: None,
        }
    }

    pub fn with_denial_sink(mut self, sink: Arc<dyn DenialSink>) -> Self {
        self.denials = Some(sink);
        self
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Effective codes held by `user`.
    ///
    /// Admins get every registered canonical code regardless of role. For
    /// everyone else each enabled role key is resolved to its canonical code;
    /// when the stored key differs from the canonical one both are kept so
    /// lookups against not-yet-migrated data still hit.
    pub fn user_permissions(&self, user: &Principal) -> HashSet<String> {
        if user.is_admin {
            return self
                .registry
                .all()
                .iter()
                .map(|p| p.code().to_string())
                .collect();
        }

        let mut held = HashSet::new();
        let Some(role) = &user.role else {
            return held;
        };
        for (key, enabled) in &role.permissions {
            if !enabled {
                continue;
            }
            let resolved = self.registry.resolve(key);
            if resolved != key {
                held.insert(key.clone());
            }
            held.insert(resolved.to_string());
        }
        held
    }

    pub fn has_permission(&self, user: &Principal, permission: &str) -> bool {
        self.has_permission_with(user, permission, &CheckContext::default())
    }

    /// `ctx` is accepted but not evaluated; see [`CheckContext`].
    pub fn has_permission_with(&self, user: &Principal, permission: &str, _ctx: &CheckContext) -> bool {
        if user.is_admin {
            return true;
        }

        let held = self.user_permissions(user);
        let resolved = self.registry.resolve(permission);

        if held.contains(resolved) || held.contains(permission) {
            return true;
        }

        let structured = resolved.contains(CODE_SEPARATOR);
        let resource = if structured {
            resolved.split(CODE_SEPARATOR).next()
        } else {
            permission.split(LEGACY_SEPARATOR).next()
        }
        .unwrap_or_default();

        if held.contains(&format!("{resource}{CODE_SEPARATOR}{}", Action::All)) {
            return true;
        }

        if held.contains(&format!("{resource}{CODE_SEPARATOR}{}", Action::Manage)) {
            let implied = structured
                && action_segment(resolved)
                    .and_then(|a| a.parse::<Action>().ok())
                    .is_some_and(Action::implied_by_manage);
            if implied {
                return true;
            }
        }

        false
    }

    pub fn check_permission(&self, user: Option<&Principal>, permission: &str) -> Result<(), AuthzError> {
        self.check_permission_with(user, permission, &CheckContext::default())
    }

    /// Like [`has_permission_with`](Self::has_permission_with) but turns a
    /// denial into an error and reports it to the denial sink.
    pub fn check_permission_with(
        &self,
        user: Option<&Principal>,
        permission: &str,
        ctx: &CheckContext,
    ) -> Result<(), AuthzError> {
        let Some(user) = user else {
            return Err(AuthzError::Unauthorized);
        };
        if self.has_permission_with(user, permission, ctx) {
            return Ok(());
        }

        self.report_denial(user, permission, self.registry.resolve(permission).to_string(), ctx);
        Err(AuthzError::Forbidden {
            permission: permission.to_string(),
        })
    }

    /// Pass when `user` holds at least one of `permissions`.
    ///
    /// A failure is reported as a single denial whose permission fields list
    /// every requested code, comma separated.
    pub fn check_any_permission_with<S: AsRef<str>>(
        &self,
        user: Option<&Principal>,
        permissions: &[S],
        ctx: &CheckContext,
    ) -> Result<(), AuthzError> {
        let Some(user) = user else {
            return Err(AuthzError::Unauthorized);
        };
        if permissions
            .iter()
            .any(|p| self.has_permission_with(user, p.as_ref(), ctx))
        {
            return Ok(());
        }

        let codes: Vec<String> = permissions.iter().map(|p| p.as_ref().to_string()).collect();
        let resolved = codes
            .iter()
            .map(|p| self.registry.resolve(p))
            .collect::<Vec<_>>()
            .join(", ");
        self.report_denial(user, &codes.join(", "), resolved, ctx);
        Err(AuthzError::ForbiddenAny { permissions: codes })
    }

    fn report_denial(&self, user: &Principal, permission: &str, resolved_permission: String, ctx: &CheckContext) {
        warn!(
            user = %user.username,
            permission = %permission,
            scope = %ctx.scope,
            "Permission denied"
        );
        if let Some(sink) = &self.denials {
            sink.permission_denied(PermissionDenial {
                user_id: user.id,
                username: user.username.clone(),
                permission: permission.to_string(),
                resolved_permission,
                scope: ctx.scope,
                resource_id: ctx.resource_id,
            });
        }
    }

    pub fn has_any_permission<S: AsRef<str>>(&self, user: &Principal, permissions: &[S]) -> bool {
        permissions
            .iter()
            .any(|p| self.has_permission(user, p.as_ref()))
    }

    pub fn has_all_permissions<S: AsRef<str>>(&self, user: &Principal, permissions: &[S]) -> bool {
        permissions
            .iter()
            .all(|p| self.has_permission(user, p.as_ref()))
    }

    /// The subset of `permissions` that `user` holds, in input order.
    pub fn filter_permissions<S: AsRef<str>>(&self, user: &Principal, permissions: &[S]) -> Vec<String> {
        permissions
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| self.has_permission(user, p))
            .map(str::to_string)
            .collect()
    }

    /// One row per registered permission.
    ///
    /// `granted` reflects direct membership in the effective set only; codes
    /// reachable solely through a wildcard or manage implication show as not
    /// granted here even though `has_permission` allows them.
    pub fn effective_permissions(&self, user: &Principal) -> Vec<EffectivePermission> {
        let held = self.user_permissions(user);
        self.registry
            .all()
            .iter()
            .map(|p| {
                let granted = held.contains(p.code());
                let source = if user.is_admin {
                    Some(GrantSource::Admin)
                } else if granted {
                    Some(GrantSource::Role)
                } else {
                    None
                };
                EffectivePermission {
                    code: p.code().to_string(),
                    display_name: p.display_name.clone(),
                    description: p.description.clone(),
                    category: p.category.clone(),
                    granted,
                    source,
                }
            })
            .collect()
    }

    /// [`effective_permissions`](Self::effective_permissions) grouped by
    /// category, categories in registry order.
    pub fn permissions_by_category(&self, user: &Principal) -> Vec<PermissionCategory> {
        let mut groups: Vec<PermissionCategory> = Vec::new();
        for row in self.effective_permissions(user) {
            match groups.iter_mut().find(|g| g.category == row.category) {
                Some(group) => group.permissions.push(row),
                None => groups.push(PermissionCategory {
                    category: row.category.clone(),
                    permissions: vec![row],
                }),
            }
        }
        groups
    }

    /// Whether `assigner` may grant `permission` to a role.
    ///
    /// Requires `role:manage`, and non-admins must already hold `permission`
    /// themselves: nobody grants a capability they do not have.
    pub fn can_assign_permission(&self, assigner: &Principal, permission: &str) -> bool {
        let role_manage = format!("{}{CODE_SEPARATOR}{}", Resource::Role, Action::Manage);
        if !self.has_permission(assigner, &role_manage) {
            return false;
        }
        assigner.is_admin || self.has_permission(assigner, permission)
    }

    /// Split a requested role map into accepted entries and denied grants.
    ///
    /// Grants are gated by [`can_assign_permission`](Self::can_assign_permission).
    /// Revocations (`false`) are always accepted.
    pub fn validate_role_permissions(
        &self,
        assigner: &Principal,
        permissions: &PermissionMap,
    ) -> (PermissionMap, Vec<String>) {
        let mut valid = PermissionMap::new();
        let mut denied = Vec::new();
        for (code, enabled) in permissions {
            if !enabled {
                valid.insert(code.clone(), false);
            } else if self.can_assign_permission(assigner, code) {
                valid.insert(code.clone(), true);
            } else {
                denied.push(code.clone());
            }
        }
        if !denied.is_empty() {
            debug!(assigner = %assigner.username, denied = ?denied, "Role grant rejected");
        }
        (valid, denied)
    }
}
