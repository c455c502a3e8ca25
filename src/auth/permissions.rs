/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. Every read permission ends in
 * `:read`; anything else mutates state. A grant of `resource:*` covers every
 * action on that resource.
 */

/// Granted permission that satisfies every check
pub const ALL: &str = "*";

/// Permission string constants used by the route tables
pub mod consts {
    pub const ASSETS_READ: &str = "assets:read";
    pub const ASSETS_WRITE: &str = "assets:write";

    pub const EMPLOYEES_READ: &str = "employees:read";
    pub const EMPLOYEES_WRITE: &str = "employees:write";

    /// Sites, categories and departments
    pub const LOOKUPS_READ: &str = "lookups:read";
    pub const LOOKUPS_WRITE: &str = "lookups:write";

    pub const SESSIONS_READ: &str = "sessions:read";
    pub const SESSIONS_SCAN: &str = "sessions:scan";
    pub const SESSIONS_MANAGE: &str = "sessions:manage";

    pub const CHECKOUTS_READ: &str = "checkouts:read";
    pub const CHECKOUTS_WRITE: &str = "checkouts:write";

    pub const USERS_MANAGE: &str = "users:manage";

    pub const BACKUP_MANAGE: &str = "backup:manage";
}

/// Every read permission, the baseline granted to all roles.
pub const READ_PERMISSIONS: [&str; 5] = [
    consts::ASSETS_READ,
    consts::EMPLOYEES_READ,
    consts::LOOKUPS_READ,
    consts::SESSIONS_READ,
    consts::CHECKOUTS_READ,
];
