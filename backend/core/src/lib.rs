pub mod error;
pub mod types;

pub use error::PanelError;
pub use types::{NewRole, PermissionMap, Principal, Role, RoleRecord};
