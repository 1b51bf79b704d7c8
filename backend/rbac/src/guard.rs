//! Call-site guards.
//!
//! A [`Guard`] wraps an operation so it only runs once the given principal is
//! authorized. The principal is always passed in explicitly; there is no
//! ambient "current user".

use std::future::Future;

use proxpanel_core::Principal;

use crate::engine::{CheckContext, PermissionEngine};
use crate::error::AuthzError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    One(String),
    Any(Vec<String>),
    All(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    requirement: Requirement,
    context: CheckContext,
}

pub fn requires_permission(code: impl Into<String>) -> Guard {
    Guard::new(Requirement::One(code.into()))
}

pub fn requires_any_permission<I, S>(codes: I) -> Guard
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Guard::new(Requirement::Any(codes.into_iter().map(Into::into).collect()))
}

pub fn requires_all_permissions<I, S>(codes: I) -> Guard
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Guard::new(Requirement::All(codes.into_iter().map(Into::into).collect()))
}

impl Guard {
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            context: CheckContext::default(),
        }
    }

    pub fn with_context(mut self, context: CheckContext) -> Self {
        self.context = context;
        self
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Authorize `principal`, handing it back on success.
    ///
    /// `One` and `All` go through `check_permission` (first failing code wins).
    /// `Any` fails with the full list. Every failure reaches the denial sink.
    pub fn authorize<'p>(
        &self,
        engine: &PermissionEngine,
        principal: Option<&'p Principal>,
    ) -> Result<&'p Principal, AuthzError> {
        let Some(user) = principal else {
            return Err(AuthzError::Unauthorized);
        };
        match &self.requirement {
            Requirement::One(code) => engine.check_permission_with(Some(user), code, &self.context)?,
            Requirement::All(codes) => {
                for code in codes {
                    engine.check_permission_with(Some(user), code, &self.context)?;
                }
            }
            Requirement::Any(codes) => engine.check_any_permission_with(Some(user), codes.as_slice(), &self.context)?,
        }
        Ok(user)
    }

    /// Run a synchronous operation behind the guard.
    pub fn call<'p, T>(
        &self,
        engine: &PermissionEngine,
        principal: Option<&'p Principal>,
        op: impl FnOnce(&'p Principal) -> T,
    ) -> Result<T, AuthzError> {
        let user = self.authorize(engine, principal)?;
        Ok(op(user))
    }

    /// Run an async operation behind the guard. The future is only created
    /// after authorization succeeded.
    pub async fn call_async<'p, T, F, Fut>(
        &self,
        engine: &PermissionEngine,
        principal: Option<&'p Principal>,
        op: F,
    ) -> Result<T, AuthzError>
    where
        F: FnOnce(&'p Principal) -> Fut,
        Fut: Future<Output = T>,
    {
        let user = self.authorize(engine, principal)?;
        Ok(op(user).await)
    }
}
