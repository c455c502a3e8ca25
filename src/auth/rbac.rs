/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps each [`UserRole`] to its permission set and answers permission checks,
 * including `resource:*` and `*` wildcards.
 */

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use super::permissions::{consts, ALL, READ_PERMISSIONS};
use crate::entities::UserRole;

lazy_static! {
    /// Permissions granted to each role
    pub static ref ROLES: HashMap<UserRole, Vec<&'static str>> = {
        let mut roles = HashMap::new();

        roles.insert(UserRole::Admin, vec![ALL]);

        // Auditor: reads everything and scans assets into sessions
        let mut so_user = READ_PERMISSIONS.to_vec();
        so_user.push(consts::SESSIONS_SCAN);
        roles.insert(UserRole::SoAssetUser, so_user);

        roles.insert(UserRole::Viewer, READ_PERMISSIONS.to_vec());

        roles
    };
}

/// Capability flags the UI uses to show or hide affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_scan: bool,
    pub can_admin: bool,
}

/// Check if a granted permission satisfies a required one
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == ALL || granted == required {
        return true;
    }

    if let Some(prefix) = granted.strip_suffix(":*") {
        return required
            .split_once(':')
            .map(|(resource, _)| resource == prefix)
            .unwrap_or(false);
    }

    false
}

pub fn role_allows(role: UserRole, required: &str) -> bool {
    ROLES
        .get(&role)
        .map(|granted| granted.iter().any(|p| check_permission(p, required)))
        .unwrap_or(false)
}

pub fn capabilities(role: UserRole) -> Capabilities {
    Capabilities {
        can_edit: role_allows(role, consts::ASSETS_WRITE),
        can_scan: role_allows(role, consts::SESSIONS_SCAN),
        can_admin: role_allows(role, consts::USERS_MANAGE),
    }
}
