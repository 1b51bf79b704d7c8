pub mod catalog;
pub mod code;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod guard;
pub mod legacy;
pub mod migration;
pub mod permission;
pub mod registry;
pub mod store;

pub use code::{Action, PermissionCode, Resource, Scope};
pub use engine::{
    CheckContext, DenialSink, EffectivePermission, GrantSource, PermissionCategory, PermissionDenial,
    PermissionEngine,
};
pub use error::{AuthzError, CodeParseError, RbacError};
pub use guard::{Guard, Requirement, requires_all_permissions, requires_any_permission, requires_permission};
pub use legacy::LegacyMap;
pub use migration::{
    CategoryMap, DefaultRolesReport, convert_permissions_to_legacy_format, convert_permissions_to_new_format,
    ensure_default_roles_new_format, is_legacy_key, migrate_all_roles_to_new_format, migrate_role_permissions,
    permission_categories, permission_categories_legacy,
};
pub use permission::Permission;
pub use registry::PermissionRegistry;
pub use store::{RoleStore, SqliteRoleStore};
