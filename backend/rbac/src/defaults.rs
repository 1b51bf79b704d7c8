/// Baseline roles seeded on every install.
use proxpanel_core::{NewRole, PermissionMap};

#[derive(Debug, Clone, Copy)]
pub struct DefaultRole {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

impl DefaultRole {
    pub fn permission_map(&self) -> PermissionMap {
        self.permissions
            .iter()
            .map(|code| (code.to_string(), true))
            .collect()
    }

    pub fn to_new_role(&self) -> NewRole {
        NewRole {
            name: self.name.to_string(),
            display_name: self.display_name.to_string(),
            description: self.description.to_string(),
            permissions: self.permission_map(),
            is_system: true,
        }
    }
}

pub const DEFAULT_ROLES: &[DefaultRole] = &[
    DefaultRole {
        name: "admin",
        display_name: "Administrator",
        description: "Full access to all features",
        permissions: &[
            "dashboard:view",
            "server:view", "server:create", "server:update", "server:delete", "server:manage",
            "vm:view", "vm:create", "vm:update", "vm:delete", "vm:start", "vm:stop",
            "vm:restart", "vm:console", "vm:migrate", "vm:execute",
            "lxc:view", "lxc:create", "lxc:update", "lxc:delete", "lxc:start", "lxc:stop",
            "lxc:restart", "lxc:console", "lxc:migrate",
            "template:view", "template:create", "template:update", "template:delete", "template:manage",
            "storage:view", "storage:manage",
            "backup:view", "backup:create", "backup:delete", "backup:manage",
            "ipam:view", "ipam:manage",
            "user:view", "user:create", "user:update", "user:delete",
            "role:view", "role:create", "role:update", "role:delete", "role:manage",
            "log:view", "log:export", "log:delete",
            "setting:view", "setting:update", "setting:manage",
            "notification:view", "notification:manage",
        ],
    },
    DefaultRole {
        name: "moderator",
        display_name: "Moderator",
        description: "Can manage VMs and view logs",
        permissions: &[
            "dashboard:view",
            "server:view",
            "vm:view", "vm:create", "vm:start", "vm:stop", "vm:restart", "vm:console",
            "lxc:view", "lxc:create", "lxc:start", "lxc:stop", "lxc:restart", "lxc:console",
            "template:view",
            "storage:view",
            "backup:view", "backup:create",
            "ipam:view",
            "user:view",
            "log:view", "log:export",
            "setting:view",
            "notification:view", "notification:manage",
        ],
    },
    DefaultRole {
        name: "user",
        display_name: "User",
        description: "Standard user with limited access",
        permissions: &[
            "dashboard:view",
            "server:view",
            "vm:view", "vm:start", "vm:stop", "vm:restart", "vm:console",
            "lxc:view", "lxc:start", "lxc:stop", "lxc:restart", "lxc:console",
            "template:view",
            "storage:view",
            "ipam:view",
            "setting:view",
            "notification:view", "notification:manage",
        ],
    },
    DefaultRole {
        name: "demo",
        display_name: "Demo User",
        description: "Read-only access for demonstration",
        permissions: &[
            "dashboard:view",
            "server:view",
            "vm:view",
            "lxc:view",
            "template:view",
            "storage:view",
            "ipam:view",
        ],
    },
];
