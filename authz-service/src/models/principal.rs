//! The authenticated actor for one request.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use super::permission::SUPER_ADMIN;
use super::role::RoleScope;

/// Permission codes granted by one role assignment, kept with its scope so
/// guards can tell project-scoped grants apart from organization-scoped ones.
#[derive(Debug, Clone, Serialize)]
pub struct ScopedGrant {
    pub role_id: Uuid,
    pub scope: RoleScope,
    pub permissions: HashSet<String>,
}

/// Resolved identity plus effective permissions for one request. Built by the
/// principal loader, attached to the request by the authentication gate, and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    /// Home organization, when the user belongs to one.
    pub org_id: Option<Uuid>,
    pub grants: Vec<ScopedGrant>,
    /// Union of all codes across every grant (the effective permission set).
    permissions: HashSet<String>,
}

impl Principal {
    pub fn resolve(user_id: Uuid, org_id: Option<Uuid>, grants: Vec<ScopedGrant>) -> Self {
        let permissions = grants
            .iter()
            .flat_map(|g| g.permissions.iter().cloned())
            .collect();
        Self {
            user_id,
            org_id,
            grants,
            permissions,
        }
    }

    /// Identity-only principal: requests proceed, every permission check
    /// fails closed.
    pub fn without_grants(user_id: Uuid, org_id: Option<Uuid>) -> Self {
        Self::resolve(user_id, org_id, Vec::new())
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(SUPER_ADMIN) || self.permissions.contains(code)
    }

    pub fn is_super_admin(&self) -> bool {
        self.permissions.contains(SUPER_ADMIN)
    }

    pub fn effective_permissions(&self) -> &HashSet<String> {
        &self.permissions
    }

    /// Does any grant relevant to `org_id` carry `code`?
    pub fn org_scope_has(&self, org_id: Uuid, code: &str) -> bool {
        self.grants
            .iter()
            .filter(|g| g.scope.covers_organization(org_id))
            .any(|g| g.permissions.contains(code) || g.permissions.contains(SUPER_ADMIN))
    }

    /// Does any grant relevant to `project_id` (owned by `owning_org`) carry `code`?
    pub fn project_scope_has(&self, project_id: Uuid, owning_org: Uuid, code: &str) -> bool {
        self.grants
            .iter()
            .filter(|g| g.scope.covers_project(project_id, owning_org))
            .any(|g| g.permissions.contains(code) || g.permissions.contains(SUPER_ADMIN))
    }

    /// Does the grant bound to this exact project carry `code`? Project roles
    /// can narrow, never widen, what organization roles grant, so write
    /// checks at project scope use this instead of the union.
    pub fn project_grant_has(&self, project_id: Uuid, code: &str) -> bool {
        self.grants
            .iter()
            .filter(|g| g.scope == RoleScope::Project(project_id))
            .any(|g| g.permissions.contains(code) || g.permissions.contains(SUPER_ADMIN))
    }
}
