//! ProxPanel Gateway HTTP API Server
//!
//! Bearer authentication, route-level permission guards and the role
//! management API on top of `proxpanel-rbac`.

pub mod auth;
pub mod checker;
pub mod error;
pub mod routes;
pub mod server;

pub use auth::{PrincipalResolver, RequireAuth, StaticTokenResolver, TokenGrant};
pub use checker::PermissionChecker;
pub use error::{ApiError, ErrorBody};
pub use server::{GatewayState, build_router, start_server};
