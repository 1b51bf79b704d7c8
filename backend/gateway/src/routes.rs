//! Permission and role API handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use proxpanel_core::{NewRole, PermissionMap, RoleRecord};
use proxpanel_rbac::{
    CategoryMap, EffectivePermission, PermissionCategory, convert_permissions_to_new_format,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::RequireAuth;
use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub permissions: usize,
    pub uptime_seconds: u64,
}

/// `GET /api/health`
pub async fn health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".into(),
        permissions: state.engine.registry().len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct MyPermissions {
    pub username: String,
    pub is_admin: bool,
    pub role: Option<String>,
    pub permissions: Vec<EffectivePermission>,
}

/// `GET /api/me/permissions`
pub async fn my_permissions(
    State(state): State<GatewayState>,
    RequireAuth(user): RequireAuth,
) -> Json<MyPermissions> {
    let permissions = state.engine.effective_permissions(&user);
    Json(MyPermissions {
        role: user.role_name().map(str::to_string),
        username: user.username,
        is_admin: user.is_admin,
        permissions,
    })
}

/// `GET /api/me/permissions/by-category`
pub async fn my_permissions_by_category(
    State(state): State<GatewayState>,
    RequireAuth(user): RequireAuth,
) -> Json<Vec<PermissionCategory>> {
    Json(state.engine.permissions_by_category(&user))
}

/// `GET /api/permissions`: catalog keyed by legacy code where one exists.
pub async fn permission_categories_legacy(State(state): State<GatewayState>) -> Json<CategoryMap> {
    Json(proxpanel_rbac::permission_categories_legacy(state.engine.registry()))
}

/// `GET /api/permissions/v2`
pub async fn permission_categories(State(state): State<GatewayState>) -> Json<CategoryMap> {
    Json(proxpanel_rbac::permission_categories(state.engine.registry()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permissions: PermissionMap,
    pub is_system: bool,
}

impl From<RoleRecord> for RoleResponse {
    fn from(record: RoleRecord) -> Self {
        let permissions = record.parse_permissions().unwrap_or_else(|e| {
            warn!(role = %record.name, error = %e, "Serving role with unreadable permissions as empty");
            PermissionMap::new()
        });
        Self {
            id: record.id,
            name: record.name,
            display_name: record.display_name,
            description: record.description,
            permissions,
            is_system: record.is_system,
        }
    }
}

/// `GET /api/roles`
pub async fn list_roles(State(state): State<GatewayState>) -> Result<Json<Vec<RoleResponse>>, ApiError> {
    let roles = state.store.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

async fn find_role(state: &GatewayState, id: i64) -> Result<RoleRecord, ApiError> {
    state
        .store
        .find_role(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Role not found"))
}

/// `GET /api/roles/:id`
pub async fn get_role(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> Result<Json<RoleResponse>, ApiError> {
    Ok(Json(find_role(&state, id).await?.into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: PermissionMap,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionsRequest {
    pub permissions: PermissionMap,
}

/// Gate the requested grants on what `actor` may hand out, then normalize
/// the accepted map to structured codes.
fn accepted_permissions(
    state: &GatewayState,
    actor: &proxpanel_core::Principal,
    requested: &PermissionMap,
) -> Result<PermissionMap, ApiError> {
    let (valid, denied) = state.engine.validate_role_permissions(actor, requested);
    if !denied.is_empty() {
        warn!(user = %actor.username, denied = ?denied, "Rejected privilege escalation");
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "permission_escalation",
            format!("Cannot grant permissions you do not hold: {}", denied.join(", ")),
        ));
    }
    Ok(convert_permissions_to_new_format(state.engine.registry().legacy(), &valid))
}

/// `POST /api/roles`
pub async fn create_role(
    State(state): State<GatewayState>,
    RequireAuth(actor): RequireAuth,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    let name = body.name.trim().to_lowercase();
    if !(2..=50).contains(&name.chars().count()) {
        return Err(ApiError::bad_request("Role name must be 2-50 characters"));
    }
    if state.store.find_role_by_name(&name).await?.is_some() {
        return Err(ApiError::bad_request("Role name already exists"));
    }

    let permissions = accepted_permissions(&state, &actor, &body.permissions)?;
    let id = state
        .store
        .insert_role(NewRole {
            name: name.clone(),
            display_name: body.display_name,
            description: body.description,
            permissions: permissions.clone(),
            is_system: false,
        })
        .await?;

    if let Some(audit) = &state.audit {
        if let Err(e) = audit.log_role_created(id, &name, &permissions, &actor).await {
            warn!(error = %e, "Failed to audit role creation");
        }
    }
    info!(role = %name, id, user = %actor.username, "Role created");
    Ok((StatusCode::CREATED, Json(find_role(&state, id).await?.into())))
}

/// `DELETE /api/roles/:id`
pub async fn delete_role(
    State(state): State<GatewayState>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = find_role(&state, id).await?;
    if record.is_system {
        return Err(ApiError::bad_request("Cannot delete system role"));
    }
    let assigned = state.resolver.principals_with_role(&record.name).await;
    if assigned > 0 {
        return Err(ApiError::bad_request(format!(
            "Cannot delete role with {assigned} assigned users"
        )));
    }

    state.store.delete_role(id).await?;
    if let Some(audit) = &state.audit {
        if let Err(e) = audit.log_role_deleted(id, &record.name, &actor, 0).await {
            warn!(error = %e, "Failed to audit role deletion");
        }
    }
    Ok(Json(json!({ "message": "Role deleted" })))
}

/// `PUT /api/roles/:id/permissions`
pub async fn update_role_permissions(
    State(state): State<GatewayState>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePermissionsRequest>,
) -> Result<Json<RoleResponse>, ApiError> {
    let record = find_role(&state, id).await?;
    let permissions = accepted_permissions(&state, &actor, &body.permissions)?;
    let previous = record.parse_permissions().unwrap_or_default();

    state.store.update_permissions(id, &permissions).await?;
    if let Some(audit) = &state.audit {
        if let Err(e) = audit
            .log_role_updated(id, &record.name, &previous, &permissions, &actor)
            .await
        {
            warn!(error = %e, "Failed to audit role update");
        }
    }
    Ok(Json(find_role(&state, id).await?.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, header};
    use proxpanel_rbac::{
        PermissionEngine, PermissionRegistry, RoleStore, SqliteRoleStore, ensure_default_roles_new_format,
    };
    use proxpanel_security::{RbacAction, RbacAuditLog, RbacAuditQuery};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{StaticTokenResolver, TokenGrant};
    use crate::server::build_router;

    struct Harness {
        app: Router,
        store: Arc<SqliteRoleStore>,
        audit: Arc<RbacAuditLog>,
    }

    fn grant(id: i64, username: &str, role: Option<&str>, admin: bool) -> TokenGrant {
        TokenGrant {
            user_id: id,
            username: username.into(),
            role: role.map(str::to_string),
            admin,
        }
    }

    async fn harness() -> Harness {
        let store = Arc::new(SqliteRoleStore::in_memory().unwrap());
        ensure_default_roles_new_format(store.as_ref()).await.unwrap();
        store
            .insert_role(NewRole {
                name: "rolemgr".into(),
                display_name: "Role Manager".into(),
                description: String::new(),
                permissions: [("roles.manage", true), ("vm:view", true)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                is_system: false,
            })
            .await
            .unwrap();

        let resolver = StaticTokenResolver::new(store.clone())
            .with_token("t-admin", grant(1, "root", None, true))
            .with_token("t-demo", grant(2, "dana", Some("demo"), false))
            .with_token("t-mgr", grant(3, "mia", Some("rolemgr"), false))
            .with_token("t-norole", grant(4, "nick", None, false));

        let engine = Arc::new(PermissionEngine::new(Arc::new(PermissionRegistry::builtin().unwrap())));
        let audit = Arc::new(RbacAuditLog::in_memory().unwrap());
        let state = GatewayState::new(engine, store.clone(), Arc::new(resolver)).with_audit(audit.clone());
        Harness {
            app: build_router(state),
            store,
            audit,
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness().await;
        let (status, body) = send(&h.app, request("GET", "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["permissions"], 55);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_401() {
        let h = harness().await;
        let (status, body) = send(&h.app, request("GET", "/api/roles", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, _) = send(&h.app, request("GET", "/api/me/permissions", Some("bogus"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_view_guard() {
        let h = harness().await;
        let (status, body) = send(&h.app, request("GET", "/api/roles", Some("t-demo"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Permission denied: requires one of [\"role:view\"]");

        // role:manage implies role:view.
        let (status, body) = send(&h.app, request("GET", "/api/roles", Some("t-mgr"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (status, _) = send(&h.app, request("GET", "/api/roles/999", Some("t-admin"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn permission_catalog_in_both_styles() {
        let h = harness().await;
        let (status, legacy) = send(&h.app, request("GET", "/api/permissions", Some("t-admin"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(legacy["Virtual Machines"]["vms.view"], "View VMs");

        let (_, v2) = send(&h.app, request("GET", "/api/permissions/v2", Some("t-admin"), None)).await;
        assert_eq!(v2["Virtual Machines"]["vm:view"], "View VMs");
        assert!(v2["Virtual Machines"].get("vms.view").is_none());
    }

    #[tokio::test]
    async fn my_permissions_reflect_role() {
        let h = harness().await;
        let (status, body) = send(&h.app, request("GET", "/api/me/permissions", Some("t-demo"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "demo");
        let granted: Vec<_> = body["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|p| p["granted"] == true)
            .map(|p| p["code"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(granted.len(), 7);
        assert!(granted.contains(&"vm:view".to_string()));

        let (_, none) = send(&h.app, request("GET", "/api/me/permissions", Some("t-norole"), None)).await;
        assert!(none["permissions"].as_array().unwrap().iter().all(|p| p["granted"] == false));

        let (_, cats) =
            send(&h.app, request("GET", "/api/me/permissions/by-category", Some("t-admin"), None)).await;
        assert_eq!(cats[0]["category"], "Dashboard");
        assert_eq!(cats[0]["permissions"][0]["source"], "admin");
    }

    #[tokio::test]
    async fn update_permissions_blocks_escalation_but_allows_revocation() {
        let h = harness().await;
        let demo = h.store.find_role_by_name("demo").await.unwrap().unwrap();
        let uri = format!("/api/roles/{}/permissions", demo.id);

        let escalate = json!({ "permissions": { "vm:view": true, "vm:delete": true } });
        let (status, body) = send(&h.app, request("PUT", &uri, Some("t-mgr"), Some(escalate))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "permission_escalation");

        let revoke = json!({ "permissions": { "vms.view": true, "lxc:view": false, "setting:manage": false } });
        let (status, body) = send(&h.app, request("PUT", &uri, Some("t-mgr"), Some(revoke))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["permissions"],
            json!({ "vm:view": true, "lxc:view": false, "setting:manage": false })
        );

        let updates = h
            .audit
            .recent(&RbacAuditQuery { action: Some(RbacAction::RoleUpdated), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].actor, "mia");
        assert_eq!(updates[0].details["permissions_removed"], json!(["lxc:view"]));
    }

    #[tokio::test]
    async fn role_manage_required_for_updates() {
        let h = harness().await;
        let demo = h.store.find_role_by_name("demo").await.unwrap().unwrap();
        let uri = format!("/api/roles/{}/permissions", demo.id);
        let body = json!({ "permissions": { "vm:view": false } });
        let (status, _) = send(&h.app, request("PUT", &uri, Some("t-demo"), Some(body))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_and_delete_roles() {
        let h = harness().await;
        let body = json!({
            "name": "Auditors",
            "display_name": "Auditors",
            "permissions": { "logs.view": true, "vm:view": true }
        });
        let (status, created) = send(&h.app, request("POST", "/api/roles", Some("t-admin"), Some(body.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "auditors");
        assert_eq!(created["permissions"], json!({ "log:view": true, "vm:view": true }));

        let (status, _) = send(&h.app, request("POST", "/api/roles", Some("t-admin"), Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/roles/{}", created["id"]);
        let (status, _) = send(&h.app, request("DELETE", &uri, Some("t-demo"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&h.app, request("DELETE", &uri, Some("t-admin"), None)).await;
        assert_eq!(status, StatusCode::OK);

        let demo = h.store.find_role_by_name("demo").await.unwrap().unwrap();
        let (status, body) =
            send(&h.app, request("DELETE", &format!("/api/roles/{}", demo.id), Some("t-admin"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Cannot delete system role");

        let deleted = h
            .audit
            .recent(&RbacAuditQuery { action: Some(RbacAction::RoleDeleted), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
    }

    #[tokio::test]
    async fn role_name_length_counts_characters() {
        let h = harness().await;
        let create = |name: String| {
            request(
                "POST",
                "/api/roles",
                Some("t-admin"),
                Some(json!({ "name": name, "display_name": "Accents", "permissions": {} })),
            )
        };

        let (status, created) = send(&h.app, create("é".repeat(50))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "é".repeat(50));

        let (status, body) = send(&h.app, create("é".repeat(51))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Role name must be 2-50 characters");

        let (status, _) = send(&h.app, create("é".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
