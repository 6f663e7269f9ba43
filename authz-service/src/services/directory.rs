use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Role, RoleAssignment, RoleEvent, RoleScope, TenantIds, UserRecord};

/// Read-side seam to tenant administration. Role, permission and membership
/// data is owned by that subsystem; this core only reads it.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// All of a user's role assignments across every scope.
    async fn role_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>, anyhow::Error>;

    async fn role(&self, role_id: Uuid) -> Result<Option<Role>, anyhow::Error>;

    /// Membership fact: does the user belong to the organization?
    async fn is_organization_member(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<bool, anyhow::Error>;

    /// Membership fact: does the user belong to the project?
    async fn is_project_member(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, anyhow::Error>;

    /// The organization a project belongs to, when the project exists.
    async fn project_organization(&self, project_id: Uuid) -> Result<Option<Uuid>, anyhow::Error>;

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, anyhow::Error>;

    async fn user_home_org(&self, user_id: Uuid) -> Result<Option<Uuid>, anyhow::Error>;
}

/// Seam each resource service exposes so the tenant isolation guard can check
/// the correct scope without knowing entity-specific schemas.
#[async_trait]
pub trait ResourceTenancy: Send + Sync {
    async fn tenant_ids(&self, resource_id: Uuid) -> Result<Option<TenantIds>, anyhow::Error>;
}

/// In-process directory used by tests and single-node deployments. Carries
/// the mutation side tenant administration would normally own; every mutation
/// publishes a [`RoleEvent`] for cache invalidation.
pub struct InMemoryDirectory {
    users: DashMap<Uuid, UserRecord>,
    users_by_email: DashMap<String, Uuid>,
    roles: DashMap<Uuid, Role>,
    assignments: DashMap<Uuid, Vec<RoleAssignment>>,
    projects: DashMap<Uuid, Uuid>,
    events: broadcast::Sender<RoleEvent>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            users: DashMap::new(),
            users_by_email: DashMap::new(),
            roles: DashMap::new(),
            assignments: DashMap::new(),
            projects: DashMap::new(),
            events,
        }
    }

    /// Subscribe to role-change events (consumed by the permission cache).
    pub fn subscribe(&self) -> broadcast::Receiver<RoleEvent> {
        self.events.subscribe()
    }

    pub fn upsert_user(&self, user: UserRecord) {
        self.users_by_email
            .insert(user.email.clone(), user.user_id);
        self.users.insert(user.user_id, user);
    }

    pub fn define_role(&self, role: Role) -> Uuid {
        let role_id = role.role_id;
        self.roles.insert(role_id, role);
        role_id
    }

    pub fn register_project(&self, project_id: Uuid, org_id: Uuid) {
        self.projects.insert(project_id, org_id);
    }

    /// Assign a role to a user at the role's scope. A user holds at most one
    /// role per (scope-type, scope-id) pair: an existing assignment at the
    /// same scope is replaced, and its removal is published first.
    pub fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), anyhow::Error> {
        let scope = self
            .roles
            .get(&role_id)
            .map(|r| r.scope)
            .ok_or_else(|| anyhow::anyhow!("Unknown role: {}", role_id))?;

        let mut user_assignments = self.assignments.entry(user_id).or_default();
        if let Some(pos) = user_assignments.iter().position(|a| a.scope == scope) {
            let replaced = user_assignments.remove(pos);
            let _ = self.events.send(RoleEvent::RoleRemoved {
                user_id,
                role_id: replaced.role_id,
                scope: replaced.scope,
            });
        }

        user_assignments.push(RoleAssignment::new(user_id, role_id, scope));
        drop(user_assignments);

        tracing::info!(user_id = %user_id, role_id = %role_id, "Role assigned");
        let _ = self.events.send(RoleEvent::RoleAssigned {
            user_id,
            role_id,
            scope,
        });
        Ok(())
    }

    pub fn remove_role(&self, user_id: Uuid, role_id: Uuid) {
        let mut removed_scope = None;
        if let Some(mut user_assignments) = self.assignments.get_mut(&user_id) {
            if let Some(pos) = user_assignments.iter().position(|a| a.role_id == role_id) {
                removed_scope = Some(user_assignments.remove(pos).scope);
            }
        }

        if let Some(scope) = removed_scope {
            tracing::info!(user_id = %user_id, role_id = %role_id, "Role removed");
            let _ = self.events.send(RoleEvent::RoleRemoved {
                user_id,
                role_id,
                scope,
            });
        }
    }

    /// Soft-delete a role. Holders keep the assignment rows but the role
    /// grants nothing; their cache entries are invalidated.
    pub fn retire_role(&self, role_id: Uuid) {
        let scope = match self.roles.get_mut(&role_id) {
            Some(mut role) => {
                role.deleted = true;
                role.scope
            }
            None => return,
        };

        for entry in self.assignments.iter() {
            if entry.value().iter().any(|a| a.role_id == role_id) {
                let _ = self.events.send(RoleEvent::RoleRemoved {
                    user_id: *entry.key(),
                    role_id,
                    scope,
                });
            }
        }
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn role_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>, anyhow::Error> {
        Ok(self
            .assignments
            .get(&user_id)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn role(&self, role_id: Uuid) -> Result<Option<Role>, anyhow::Error> {
        Ok(self.roles.get(&role_id).map(|r| r.clone()))
    }

    async fn is_organization_member(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<bool, anyhow::Error> {
        if self
            .users
            .get(&user_id)
            .is_some_and(|u| u.org_id == Some(org_id))
        {
            return Ok(true);
        }

        Ok(self.assignments.get(&user_id).is_some_and(|assignments| {
            assignments
                .iter()
                .any(|a| a.scope == RoleScope::Organization(org_id))
        }))
    }

    async fn is_project_member(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, anyhow::Error> {
        Ok(self.assignments.get(&user_id).is_some_and(|assignments| {
            assignments
                .iter()
                .any(|a| a.scope == RoleScope::Project(project_id))
        }))
    }

    async fn project_organization(&self, project_id: Uuid) -> Result<Option<Uuid>, anyhow::Error> {
        Ok(self.projects.get(&project_id).map(|org| *org))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, anyhow::Error> {
        Ok(self
            .users_by_email
            .get(email)
            .and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn user_home_org(&self, user_id: Uuid) -> Result<Option<Uuid>, anyhow::Error> {
        Ok(self.users.get(&user_id).and_then(|u| u.org_id))
    }
}
