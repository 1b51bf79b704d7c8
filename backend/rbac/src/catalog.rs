/// Built-in permission catalog and the legacy dotted-code table.
use crate::code::{Action as A, PermissionCode, Resource as R};
use crate::permission::Permission;

fn code(resource: R, action: A) -> PermissionCode {
    PermissionCode::new(resource, action)
}

fn perm(resource: R, action: A, display_name: &str, description: &str, category: &str) -> Permission {
    Permission::new(code(resource, action), display_name, description, category)
}

/// Every permission the panel knows about, in display order.
pub fn builtin_permissions() -> Vec<Permission> {
    vec![
        // Dashboard
        perm(R::Dashboard, A::View, "View Dashboard", "Access to dashboard and overview", "Dashboard"),
        // Proxmox servers
        perm(R::Server, A::View, "View Servers", "View Proxmox server list and status", "Proxmox Servers"),
        perm(R::Server, A::Create, "Add Server", "Add new Proxmox servers", "Proxmox Servers"),
        perm(R::Server, A::Update, "Edit Server", "Edit Proxmox server settings", "Proxmox Servers"),
        perm(R::Server, A::Delete, "Delete Server", "Remove Proxmox servers", "Proxmox Servers"),
        perm(R::Server, A::Manage, "Manage Servers",
            "Full server management including cluster operations", "Proxmox Servers")
            .requires([code(R::Server, A::View)]),
        // Virtual machines
        perm(R::Vm, A::View, "View VMs", "View virtual machines list and details", "Virtual Machines"),
        perm(R::Vm, A::Create, "Create VMs", "Create new virtual machines", "Virtual Machines")
            .requires([code(R::Vm, A::View), code(R::Template, A::View)]),
        perm(R::Vm, A::Update, "Update VMs", "Modify VM configuration", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Delete, "Delete VMs", "Delete virtual machines", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Start, "Start VMs", "Start virtual machines", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Stop, "Stop VMs", "Stop virtual machines", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Restart, "Restart VMs", "Restart virtual machines", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Console, "VM Console", "Access VM console (noVNC/xterm.js)", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Migrate, "Migrate VMs", "Migrate VMs between nodes", "Virtual Machines")
            .requires([code(R::Vm, A::View)]),
        perm(R::Vm, A::Execute, "Execute Commands",
            "Execute commands on VMs via QEMU agent", "Virtual Machines")
            .requires([code(R::Vm, A::Console)]),
        // Containers
        perm(R::Lxc, A::View, "View Containers", "View LXC containers list and details", "Containers"),
        perm(R::Lxc, A::Create, "Create Containers", "Create new LXC containers", "Containers")
            .requires([code(R::Lxc, A::View), code(R::Template, A::View)]),
        perm(R::Lxc, A::Update, "Update Containers", "Modify container configuration", "Containers")
            .requires([code(R::Lxc, A::View)]),
        perm(R::Lxc, A::Delete, "Delete Containers", "Delete LXC containers", "Containers")
            .requires([code(R::Lxc, A::View)]),
        perm(R::Lxc, A::Start, "Start Containers", "Start LXC containers", "Containers")
            .requires([code(R::Lxc, A::View)]),
        perm(R::Lxc, A::Stop, "Stop Containers", "Stop LXC containers", "Containers")
            .requires([code(R::Lxc, A::View)]),
        perm(R::Lxc, A::Restart, "Restart Containers", "Restart LXC containers", "Containers")
            .requires([code(R::Lxc, A::View)]),
        perm(R::Lxc, A::Console, "Container Console", "Access container console", "Containers")
            .requires([code(R::Lxc, A::View)]),
        perm(R::Lxc, A::Migrate, "Migrate Containers", "Migrate containers between nodes", "Containers")
            .requires([code(R::Lxc, A::View)]),
        // Templates
        perm(R::Template, A::View, "View Templates", "View OS templates", "Templates"),
        perm(R::Template, A::Create, "Create Templates", "Create new templates", "Templates")
            .requires([code(R::Template, A::View)]),
        perm(R::Template, A::Update, "Update Templates", "Edit template settings", "Templates")
            .requires([code(R::Template, A::View)]),
        perm(R::Template, A::Delete, "Delete Templates", "Delete templates", "Templates")
            .requires([code(R::Template, A::View)]),
        perm(R::Template, A::Manage, "Manage Templates",
            "Full template management including download", "Templates")
            .requires([code(R::Template, A::View)]),
        // Storage
        perm(R::Storage, A::View, "View Storage", "View storage pools and usage", "Storage"),
        perm(R::Storage, A::Manage, "Manage Storage", "Manage storage pools and volumes", "Storage")
            .requires([code(R::Storage, A::View)]),
        // Backups
        perm(R::Backup, A::View, "View Backups", "View backup list", "Backups"),
        perm(R::Backup, A::Create, "Create Backups", "Create new backups", "Backups")
            .requires([code(R::Backup, A::View)]),
        perm(R::Backup, A::Delete, "Delete Backups", "Delete backups", "Backups")
            .requires([code(R::Backup, A::View)]),
        perm(R::Backup, A::Manage, "Restore Backups", "Restore from backups", "Backups")
            .requires([code(R::Backup, A::View), code(R::Vm, A::Create)]),
        // IPAM
        perm(R::Ipam, A::View, "View IPAM", "View IP address management", "IPAM"),
        perm(R::Ipam, A::Manage, "Manage IPAM", "Manage networks and IP allocations", "IPAM")
            .requires([code(R::Ipam, A::View)]),
        // Users
        perm(R::User, A::View, "View Users", "View user list", "User Management"),
        perm(R::User, A::Create, "Create Users", "Create new users", "User Management")
            .requires([code(R::User, A::View)]),
        perm(R::User, A::Update, "Update Users", "Edit user profiles", "User Management")
            .requires([code(R::User, A::View)]),
        perm(R::User, A::Delete, "Delete Users", "Delete users", "User Management")
            .requires([code(R::User, A::View)]),
        // Roles
        perm(R::Role, A::View, "View Roles", "View roles and permissions", "Role Management"),
        perm(R::Role, A::Create, "Create Roles", "Create new roles", "Role Management")
            .requires([code(R::Role, A::View)]),
        perm(R::Role, A::Update, "Update Roles", "Edit role permissions", "Role Management")
            .requires([code(R::Role, A::View)]),
        perm(R::Role, A::Delete, "Delete Roles", "Delete roles", "Role Management")
            .requires([code(R::Role, A::View)]),
        perm(R::Role, A::Manage, "Manage Roles",
            "Full role management including assignment", "Role Management")
            .requires([code(R::Role, A::View), code(R::User, A::View)]),
        // Logs
        perm(R::Log, A::View, "View Logs", "View audit logs", "Logs"),
        perm(R::Log, A::Export, "Export Logs", "Export log data", "Logs")
            .requires([code(R::Log, A::View)]),
        perm(R::Log, A::Delete, "Delete Logs", "Delete log entries", "Logs")
            .requires([code(R::Log, A::View)]),
        // Settings
        perm(R::Setting, A::View, "View Settings", "View panel settings", "Settings"),
        perm(R::Setting, A::Update, "Update Settings", "Modify panel settings", "Settings")
            .requires([code(R::Setting, A::View)]),
        perm(R::Setting, A::Manage, "Manage Security Settings",
            "Manage security and advanced settings", "Settings")
            .requires([code(R::Setting, A::View)]),
        // Notifications
        perm(R::Notification, A::View, "View Notifications", "View notifications", "Notifications"),
        perm(R::Notification, A::Manage, "Manage Notifications",
            "Manage notification settings", "Notifications")
            .requires([code(R::Notification, A::View)]),
    ]
}

/// Old dotted code -> structured code. One-directional and authoritative.
pub const LEGACY_PERMISSION_MAP: &[(&str, &str)] = &[
    ("dashboard.view", "dashboard:view"),
    ("proxmox.view", "server:view"),
    ("proxmox.manage", "server:manage"),
    ("proxmox.servers.add", "server:create"),
    ("proxmox.servers.edit", "server:update"),
    ("proxmox.servers.delete", "server:delete"),
    ("proxmox.vm.manage", "vm:manage"),
    ("vms.view", "vm:view"),
    ("vms.create", "vm:create"),
    ("vms.start", "vm:start"),
    ("vms.stop", "vm:stop"),
    ("vms.restart", "vm:restart"),
    ("vms.delete", "vm:delete"),
    ("vms.console", "vm:console"),
    ("vms.migrate", "vm:migrate"),
    ("templates.view", "template:view"),
    ("templates.manage", "template:manage"),
    ("ipam.view", "ipam:view"),
    ("ipam.manage", "ipam:manage"),
    ("logs.view", "log:view"),
    ("logs.export", "log:export"),
    ("logs.delete", "log:delete"),
    ("settings.view", "setting:view"),
    ("settings.panel", "setting:update"),
    ("settings.security", "setting:manage"),
    ("users.view", "user:view"),
    ("users.create", "user:create"),
    ("users.edit", "user:update"),
    ("users.delete", "user:delete"),
    ("roles.view", "role:view"),
    ("roles.manage", "role:manage"),
    ("notifications.manage", "notification:manage"),
];
