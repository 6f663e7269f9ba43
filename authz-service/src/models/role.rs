//! Roles and role assignments - scoped bundles of permission codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The tenancy level a role (or assignment) is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope_type", content = "scope_id", rename_all = "lowercase")]
pub enum RoleScope {
    Global,
    Organization(Uuid),
    Project(Uuid),
}

impl RoleScope {
    /// True when a grant at this scope is relevant to the given organization.
    pub fn covers_organization(&self, org_id: Uuid) -> bool {
        matches!(self, RoleScope::Global) || matches!(self, RoleScope::Organization(id) if *id == org_id)
    }

    /// True when a grant at this scope is relevant to the given project
    /// (directly, or through the project's owning organization).
    pub fn covers_project(&self, project_id: Uuid, owning_org: Uuid) -> bool {
        match self {
            RoleScope::Global => true,
            RoleScope::Organization(id) => *id == owning_org,
            RoleScope::Project(id) => *id == project_id,
        }
    }
}

/// A named bundle of permission codes, scoped to global, one organization,
/// or one project. Soft-deleted roles stay referenced but grant nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub scope: RoleScope,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl Role {
    pub fn new(name: impl Into<String>, scope: RoleScope, permissions: Vec<String>) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            name: name.into(),
            scope,
            permissions,
            deleted: false,
        }
    }
}

/// Links a user to a role within one scope. A user holds at most one role
/// per (scope-type, scope-id) pair; reassigning replaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub scope: RoleScope,
    pub granted_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(user_id: Uuid, role_id: Uuid, scope: RoleScope) -> Self {
        Self {
            user_id,
            role_id,
            scope,
            granted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_scope_covers_any_org_and_project() {
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        assert!(RoleScope::Global.covers_organization(org));
        assert!(RoleScope::Global.covers_project(project, org));
    }

    #[test]
    fn org_scope_covers_only_its_org() {
        let org = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = RoleScope::Organization(org);
        assert!(scope.covers_organization(org));
        assert!(!scope.covers_organization(other));
    }

    #[test]
    fn org_scope_covers_projects_it_owns() {
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        let scope = RoleScope::Organization(org);
        assert!(scope.covers_project(project, org));
        assert!(!scope.covers_project(project, Uuid::new_v4()));
    }

    #[test]
    fn project_scope_covers_only_its_project() {
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        let scope = RoleScope::Project(project);
        assert!(scope.covers_project(project, org));
        assert!(!scope.covers_project(Uuid::new_v4(), org));
        assert!(!scope.covers_organization(org));
    }
}
