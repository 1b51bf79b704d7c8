//! Route-level permission guard.
use axum::{
    Router,
    extract::{RawPathParams, Request, State},
    middleware::{self, Next},
    response::Response,
};
use proxpanel_core::Principal;
use proxpanel_rbac::{CheckContext, Guard, Requirement, Scope};
use tracing::debug;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::server::GatewayState;

/// Permission requirement for a group of routes.
///
/// By default the principal needs any one of the codes; with
/// [`require_all`](Self::require_all) it needs every one of them.
///
/// Path parameters named with the `with_*_param` builders are read into the
/// [`CheckContext`]. They end up in denial records but do not change the
/// decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionChecker {
    codes: Vec<String>,
    require_all: bool,
    scope: Scope,
    resource_param: Option<String>,
    organization_param: Option<String>,
    workspace_param: Option<String>,
}

impl PermissionChecker {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            require_all: false,
            scope: Scope::Global,
            resource_param: None,
            organization_param: None,
            workspace_param: None,
        }
    }

    pub fn require_all(mut self) -> Self {
        self.require_all = true;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_resource_param(mut self, name: impl Into<String>) -> Self {
        self.resource_param = Some(name.into());
        self
    }

    pub fn with_organization_param(mut self, name: impl Into<String>) -> Self {
        self.organization_param = Some(name.into());
        self
    }

    pub fn with_workspace_param(mut self, name: impl Into<String>) -> Self {
        self.workspace_param = Some(name.into());
        self
    }

    fn as_guard(&self, context: CheckContext) -> Guard {
        let requirement = if self.require_all {
            Requirement::All(self.codes.clone())
        } else {
            Requirement::Any(self.codes.clone())
        };
        Guard::new(requirement).with_context(context)
    }

    /// Build the check context from matched path parameters. Values that are
    /// not integers are ignored.
    fn context(&self, params: Option<&RawPathParams>) -> CheckContext {
        let mut ctx = CheckContext::scoped(self.scope);
        let Some(params) = params else {
            return ctx;
        };
        let lookup = |name: &Option<String>| -> Option<i64> {
            let name = name.as_deref()?;
            let (_, value) = params.iter().find(|(key, _)| *key == name)?;
            match value.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    debug!(param = name, value, "Ignoring non-numeric path parameter");
                    None
                }
            }
        };
        if let Some(id) = lookup(&self.resource_param) {
            ctx = ctx.with_resource(id);
        }
        if let Some(id) = lookup(&self.organization_param) {
            ctx = ctx.with_organization(id);
        }
        if let Some(id) = lookup(&self.workspace_param) {
            ctx = ctx.with_workspace(id);
        }
        ctx
    }

    /// Authorize an already-resolved principal.
    pub fn check_with(
        &self,
        state: &GatewayState,
        principal: Option<&Principal>,
        context: CheckContext,
    ) -> Result<(), ApiError> {
        self.as_guard(context).authorize(&state.engine, principal)?;
        Ok(())
    }

    /// Put every route of `router` behind this checker.
    pub fn guard(self, router: Router<GatewayState>, state: &GatewayState) -> Router<GatewayState> {
        router.route_layer(middleware::from_fn_with_state((state.clone(), self), enforce))
    }
}

async fn enforce(
    State((state, checker)): State<(GatewayState, PermissionChecker)>,
    params: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match request.extensions().get::<Principal>() {
        Some(principal) => principal.clone(),
        None => authenticate(&state, request.headers()).await?,
    };
    let context = checker.context(params.as_ref());
    checker.check_with(&state, Some(&principal), context)?;
    debug!(user = %principal.username, codes = ?checker.codes, "Permission check passed");

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
