//! Main HTTP Gateway Server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use proxpanel_rbac::{PermissionEngine, RoleStore};
use proxpanel_security::RbacAuditLog;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::auth::PrincipalResolver;
use crate::checker::PermissionChecker;
use crate::routes;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<PermissionEngine>,
    pub store: Arc<dyn RoleStore>,
    pub resolver: Arc<dyn PrincipalResolver>,
    pub audit: Option<Arc<RbacAuditLog>>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(
        engine: Arc<PermissionEngine>,
        store: Arc<dyn RoleStore>,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        Self {
            engine,
            store,
            resolver,
            audit: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<RbacAuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }
}

pub fn build_router(state: GatewayState) -> Router {
    let public = Router::new().route("/api/health", get(routes::health));

    let me = Router::new()
        .route("/api/me/permissions", get(routes::my_permissions))
        .route("/api/me/permissions/by-category", get(routes::my_permissions_by_category));

    let view = PermissionChecker::new(["role:view"]).with_resource_param("id").guard(
        Router::new()
            .route("/api/permissions", get(routes::permission_categories_legacy))
            .route("/api/permissions/v2", get(routes::permission_categories))
            .route("/api/roles", get(routes::list_roles))
            .route("/api/roles/:id", get(routes::get_role)),
        &state,
    );

    let manage = PermissionChecker::new(["role:manage"]).with_resource_param("id").guard(
        Router::new()
            .route("/api/roles", post(routes::create_role))
            .route("/api/roles/:id", delete(routes::delete_role))
            .route("/api/roles/:id/permissions", put(routes::update_role_permissions)),
        &state,
    );

    public
        .merge(me)
        .merge(view)
        .merge(manage)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server and serves until ctrl-c.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Gateway HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
