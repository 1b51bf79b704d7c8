//! `proxpanel serve`

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use proxpanel_config::{TokenConfig, defaults};
use proxpanel_gateway::{GatewayState, StaticTokenResolver, TokenGrant, start_server};
use proxpanel_rbac::{RoleStore, ensure_default_roles_new_format, migrate_all_roles_to_new_format};
use proxpanel_security::{RbacAuditLog, drain_denial_writer, spawn_denial_writer};
use tracing::{info, warn};

use crate::context::{PanelContext, database_path};

/// How long shutdown waits for queued permission denials to be written.
const DENIAL_DRAIN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(config_path: &Path, port: Option<u16>, bind: Option<String>) -> Result<()> {
    let ctx = PanelContext::open(config_path).await?;
    let rbac = ctx.config.rbac();

    if rbac.migrate_on_startup.unwrap_or(true) {
        let migrated = migrate_all_roles_to_new_format(ctx.store.as_ref(), ctx.registry.legacy()).await?;
        info!(migrated, "Startup role migration finished");
    }
    if rbac.ensure_default_roles.unwrap_or(true) {
        let report = ensure_default_roles_new_format(ctx.store.as_ref()).await?;
        info!(
            created = report.created,
            updated = report.updated,
            untouched = report.untouched,
            "Default roles checked"
        );
    }

    let store: Arc<dyn RoleStore> = ctx.store.clone();
    let resolver = token_resolver(store.clone(), ctx.config.tokens());
    if resolver.is_empty() {
        warn!("No API tokens configured; every authenticated route will answer 401");
    }

    let mut engine = ctx.engine();
    let mut audit = None;
    let mut writer = None;
    if rbac.audit.unwrap_or(true) {
        let db_path = database_path(&ctx.config);
        let log = Arc::new(
            RbacAuditLog::open(&db_path)
                .with_context(|| format!("Failed to open audit log: {}", db_path.display()))?,
        );
        let (sink, handle) = spawn_denial_writer(log.clone());
        engine = engine.with_denial_sink(Arc::new(sink));
        writer = Some(handle);
        audit = Some(log);
    }

    let mut state = GatewayState::new(Arc::new(engine), store, Arc::new(resolver));
    if let Some(log) = audit {
        state = state.with_audit(log);
    }

    let addr = listen_addr(&ctx.config.server(), port, bind)?;
    info!(%addr, permissions = ctx.registry.len(), "Starting ProxPanel RBAC API");
    // The router owns the last sink, so the writer ends once serving stops.
    let served = start_server(addr, state).await;
    if let Some(writer) = writer {
        if drain_denial_writer(writer, DENIAL_DRAIN_GRACE).await {
            info!("Pending permission denials written");
        }
    }
    served
}

fn token_resolver(store: Arc<dyn RoleStore>, tokens: &[TokenConfig]) -> StaticTokenResolver {
    tokens
        .iter()
        .enumerate()
        .fold(StaticTokenResolver::new(store), |resolver, (i, entry)| {
            resolver.with_token(
                &entry.token,
                TokenGrant {
                    user_id: entry.user_id.unwrap_or(i as i64 + 1),
                    username: entry.username.clone(),
                    role: entry.role.clone(),
                    admin: entry.admin,
                },
            )
        })
}

/// Command-line flags win over the config file.
fn listen_addr(server: &proxpanel_config::ServerConfig, port: Option<u16>, bind: Option<String>) -> Result<SocketAddr> {
    let bind = bind
        .or_else(|| server.bind.clone())
        .unwrap_or_else(|| defaults::DEFAULT_BIND.to_string());
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{bind}'"))?;
    let port = port.or(server.port).unwrap_or(defaults::DEFAULT_PORT);
    Ok(SocketAddr::new(ip, port))
}
