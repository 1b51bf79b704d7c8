//! Bridges the synchronous check path to the audit log.
//!
//! The engine hands denials to [`AuditDenialSink`] inline; a background task
//! started by [`spawn_denial_writer`] persists them.
use std::sync::Arc;
use std::time::Duration;

use proxpanel_rbac::{DenialSink, PermissionDenial};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audit::RbacAuditLog;

#[derive(Clone)]
pub struct AuditDenialSink {
    tx: mpsc::UnboundedSender<PermissionDenial>,
}

impl DenialSink for AuditDenialSink {
    fn permission_denied(&self, denial: PermissionDenial) {
        if self.tx.send(denial).is_err() {
            warn!("Denial writer stopped; permission denial not audited");
        }
    }
}

/// Start the writer task. It ends once every sink clone has been dropped.
pub fn spawn_denial_writer(log: Arc<RbacAuditLog>) -> (AuditDenialSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PermissionDenial>();
    let handle = tokio::spawn(async move {
        while let Some(denial) = rx.recv().await {
            if let Err(e) = log.log_permission_denied(&denial, None).await {
                warn!(user = %denial.username, error = %e, "Failed to audit permission denial");
            }
        }
        debug!("Denial writer finished");
    });
    (AuditDenialSink { tx }, handle)
}

/// Wait for the writer to flush what is queued. Every sink must already be
/// dropped, otherwise this waits out `grace`. Returns whether it finished.
pub async fn drain_denial_writer(writer: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, writer).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Denial writer task failed");
            false
        }
        Err(_) => {
            warn!(?grace, "Denial writer still running; queued denials may be lost");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{RbacAction, RbacAuditQuery};
    use proxpanel_core::{Principal, Role};
    use proxpanel_rbac::{PermissionEngine, PermissionRegistry};

    #[tokio::test]
    async fn engine_denials_reach_the_audit_log() {
        let log = Arc::new(RbacAuditLog::in_memory().unwrap());
        let (sink, writer) = spawn_denial_writer(log.clone());

        let engine = PermissionEngine::new(Arc::new(PermissionRegistry::builtin().unwrap()))
            .with_denial_sink(Arc::new(sink));
        let user = Principal {
            id: 9,
            ..Principal::with_role("eve", Role::new("demo").with_permissions(["vm:view"]))
        };

        assert!(engine.check_permission(Some(&user), "vm:view").is_ok());
        assert!(engine.check_permission(Some(&user), "vms.delete").is_err());

        drop(engine);
        writer.await.unwrap();

        let entries = log
            .recent(&RbacAuditQuery { action: Some(RbacAction::PermissionDenied), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id, 9);
        assert_eq!(entries[0].details["permission"], "vms.delete");
        assert_eq!(entries[0].details["resolved_permission"], "vm:delete");
    }

    #[tokio::test]
    async fn drain_flushes_every_queued_denial() {
        let log = Arc::new(RbacAuditLog::in_memory().unwrap());
        let (sink, writer) = spawn_denial_writer(log.clone());
        let engine = PermissionEngine::new(Arc::new(PermissionRegistry::builtin().unwrap()))
            .with_denial_sink(Arc::new(sink));
        let user = Principal::with_role("eve", Role::new("demo"));
        for code in ["vm:delete", "lxc:delete", "user:create", "setting:update", "backup:delete"] {
            assert!(engine.check_permission(Some(&user), code).is_err());
        }

        drop(engine);
        assert!(drain_denial_writer(writer, Duration::from_secs(5)).await);

        let entries = log
            .recent(&RbacAuditQuery { action: Some(RbacAction::PermissionDenied), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(entries.len(), 5);
    }

    #[tokio::test]
    async fn drain_gives_up_while_a_sink_is_alive() {
        let log = Arc::new(RbacAuditLog::in_memory().unwrap());
        let (sink, writer) = spawn_denial_writer(log);
        assert!(!drain_denial_writer(writer, Duration::from_millis(50)).await);
        drop(sink);
    }
}
