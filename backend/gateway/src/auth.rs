//! Gateway Authentication Module
//!
//! Resolves `Authorization: Bearer` tokens to principals. Roles are loaded
//! from the role store on every request so permission edits apply
//! immediately.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use proxpanel_core::{Principal, Role};
use proxpanel_rbac::RoleStore;
use proxpanel_security::{digests_match, hash_token};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Maps a bearer token to the principal it authenticates.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// `Ok(None)` when the token is unknown.
    async fn resolve(&self, token: &str) -> Result<Option<Principal>>;

    /// How many known principals currently hold `role_name`.
    async fn principals_with_role(&self, _role_name: &str) -> usize {
        0
    }
}

/// Who a configured token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub user_id: i64,
    pub username: String,
    pub role: Option<String>,
    pub admin: bool,
}

/// Resolver over a fixed set of tokens, typically from configuration.
///
/// Only the SHA-256 digest of each token is retained.
pub struct StaticTokenResolver {
    grants: HashMap<String, TokenGrant>,
    store: Arc<dyn RoleStore>,
}

impl StaticTokenResolver {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self {
            grants: HashMap::new(),
            store,
        }
    }

    pub fn with_token(mut self, token: &str, grant: TokenGrant) -> Self {
        self.grants.insert(hash_token(token), grant);
        self
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    async fn load_role(&self, grant: &TokenGrant) -> Result<Option<Role>> {
        let Some(name) = &grant.role else {
            return Ok(None);
        };
        let Some(record) = self.store.find_role_by_name(name).await? else {
            warn!(user = %grant.username, role = %name, "Token references unknown role");
            return Ok(None);
        };
        match record.to_role() {
            Ok(role) => Ok(Some(role)),
            Err(e) => {
                warn!(user = %grant.username, role = %name, error = %e, "Role permissions unreadable");
                Ok(Some(Role::new(record.name)))
            }
        }
    }
}

#[async_trait]
impl PrincipalResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Principal>> {
        let digest = hash_token(token);
        let Some(grant) = self
            .grants
            .iter()
            .find(|(known, _)| digests_match(known, &digest))
            .map(|(_, grant)| grant)
        else {
            return Ok(None);
        };

        let role = self.load_role(grant).await?;
        debug!(user = %grant.username, role = ?role.as_ref().map(|r| &r.name), "Resolved bearer token");
        Ok(Some(Principal {
            id: grant.user_id,
            username: grant.username.clone(),
            is_admin: grant.admin,
            role,
        }))
    }

    async fn principals_with_role(&self, role_name: &str) -> usize {
        self.grants
            .values()
            .filter(|g| g.role.as_deref() == Some(role_name))
            .count()
    }
}

/// Extract the token from an `Authorization: Bearer …` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header"))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Authorization header must use Bearer scheme"))?;
    if token.is_empty() {
        return Err(ApiError::unauthorized("Empty Bearer token"));
    }
    Ok(token)
}

/// Authenticate a request from its headers.
pub async fn authenticate(state: &GatewayState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let token = bearer_token(headers)?;
    match state.resolver.resolve(token).await? {
        Some(principal) => Ok(principal),
        None => {
            warn!("Invalid Bearer token");
            Err(ApiError::unauthorized("Invalid token"))
        }
    }
}

/// The authenticated principal of a request.
///
/// Reuses the principal a permission guard already stored in the request
/// extensions; otherwise authenticates from the `Authorization` header.
pub struct RequireAuth(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    GatewayState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(RequireAuth(principal.clone()));
        }
        let state = GatewayState::from_ref(state);
        let principal = authenticate(&state, &parts.headers).await?;
        parts.extensions.insert(principal.clone());
        Ok(RequireAuth(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proxpanel_core::NewRole;
    use proxpanel_rbac::SqliteRoleStore;

    async fn store_with_ops() -> Arc<dyn RoleStore> {
        let store = SqliteRoleStore::in_memory().unwrap();
        store
            .insert_role(NewRole {
                name: "ops".into(),
                display_name: "Ops".into(),
                description: String::new(),
                permissions: [("vm:view".to_string(), true)].into_iter().collect(),
                is_system: false,
            })
            .await
            .unwrap();
        Arc::new(store)
    }

    fn grant(username: &str, role: Option<&str>, admin: bool) -> TokenGrant {
        TokenGrant {
            user_id: 1,
            username: username.into(),
            role: role.map(str::to_string),
            admin,
        }
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }

    #[tokio::test]
    async fn resolves_role_from_store_each_time() {
        let store = store_with_ops().await;
        let resolver = StaticTokenResolver::new(store.clone()).with_token("t-ops", grant("olga", Some("ops"), false));

        let principal = resolver.resolve("t-ops").await.unwrap().unwrap();
        assert_eq!(principal.username, "olga");
        assert_eq!(principal.role_name(), Some("ops"));
        assert_eq!(principal.role.unwrap().permissions.len(), 1);

        let id = store.find_role_by_name("ops").await.unwrap().unwrap().id;
        store.update_permissions(id, &Default::default()).await.unwrap();
        let principal = resolver.resolve("t-ops").await.unwrap().unwrap();
        assert!(principal.role.unwrap().permissions.is_empty());
    }

    #[tokio::test]
    async fn unknown_tokens_and_roles() {
        let store = store_with_ops().await;
        let resolver = StaticTokenResolver::new(store)
            .with_token("t-ghost", grant("gus", Some("ghost"), false))
            .with_token("t-root", grant("root", None, true));

        assert!(resolver.resolve("nope").await.unwrap().is_none());

        let gus = resolver.resolve("t-ghost").await.unwrap().unwrap();
        assert!(gus.role.is_none());

        let root = resolver.resolve("t-root").await.unwrap().unwrap();
        assert!(root.is_admin);
        assert_eq!(resolver.principals_with_role("ghost").await, 1);
        assert_eq!(resolver.principals_with_role("ops").await, 0);
    }
}
