use std::sync::Arc;

use uuid::Uuid;

use crate::models::permission::{
    ORGANIZATION_READ, ORGANIZATION_WRITE, PROJECT_READ, PROJECT_WRITE,
};
use crate::models::Principal;
use crate::services::{ResourceTenancy, ServiceError, TenantDirectory};

/// Tenant isolation guard, consulted by every business operation before it
/// touches data. Each check is a function of the principal's resolved
/// permission set, membership facts, and the target's tenant ids — no other
/// queries. Permission-code possession without tenant membership is never
/// sufficient.
#[derive(Clone)]
pub struct TenantGuard {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantGuard {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    /// Membership fact, fail-closed: a directory lookup failure denies.
    async fn org_membership(&self, user_id: Uuid, org_id: Uuid) -> bool {
        match self.directory.is_organization_member(user_id, org_id).await {
            Ok(member) => member,
            Err(e) => {
                tracing::error!(user_id = %user_id, org_id = %org_id, error = %e,
                    "Organization membership lookup failed; denying");
                false
            }
        }
    }

    async fn project_membership(&self, user_id: Uuid, project_id: Uuid) -> bool {
        match self.directory.is_project_member(user_id, project_id).await {
            Ok(member) => member,
            Err(e) => {
                tracing::error!(user_id = %user_id, project_id = %project_id, error = %e,
                    "Project membership lookup failed; denying");
                false
            }
        }
    }

    pub async fn is_organization_member(&self, principal: &Principal, org_id: Uuid) -> bool {
        principal.is_super_admin() || self.org_membership(principal.user_id, org_id).await
    }

    pub async fn is_organization_admin(&self, principal: &Principal, org_id: Uuid) -> bool {
        if principal.is_super_admin() {
            return true;
        }
        self.org_membership(principal.user_id, org_id).await
            && principal.org_scope_has(org_id, ORGANIZATION_WRITE)
    }

    pub async fn is_project_member(&self, principal: &Principal, project_id: Uuid) -> bool {
        principal.is_super_admin() || self.project_membership(principal.user_id, project_id).await
    }

    pub async fn is_project_admin(&self, principal: &Principal, project_id: Uuid) -> bool {
        if principal.is_super_admin() {
            return true;
        }

        if self.project_membership(principal.user_id, project_id).await
            && principal.project_grant_has(project_id, PROJECT_WRITE)
        {
            return true;
        }

        // An admin of the owning organization administers its projects.
        match self.directory.project_organization(project_id).await {
            Ok(Some(org_id)) => self.is_organization_admin(principal, org_id).await,
            Ok(None) => false,
            Err(e) => {
                tracing::error!(project_id = %project_id, error = %e,
                    "Project organization lookup failed; denying");
                false
            }
        }
    }

    /// Pass when the principal holds `organization:read` in a scope relevant
    /// to the organization AND is a member of it (superadmins bypass
    /// membership).
    pub async fn ensure_organization_readable(
        &self,
        org_id: Uuid,
        principal: &Principal,
    ) -> Result<(), ServiceError> {
        if principal.is_super_admin() {
            return Ok(());
        }

        if self.org_membership(principal.user_id, org_id).await
            && principal.org_scope_has(org_id, ORGANIZATION_READ)
        {
            return Ok(());
        }

        tracing::warn!(user_id = %principal.user_id, org_id = %org_id,
            "Organization read denied");
        Err(ServiceError::Forbidden(
            "No access to this organization".to_string(),
        ))
    }

    pub async fn ensure_organization_writable(
        &self,
        org_id: Uuid,
        principal: &Principal,
    ) -> Result<(), ServiceError> {
        if principal.is_super_admin() {
            return Ok(());
        }

        if self.org_membership(principal.user_id, org_id).await
            && principal.org_scope_has(org_id, ORGANIZATION_WRITE)
        {
            return Ok(());
        }

        tracing::warn!(user_id = %principal.user_id, org_id = %org_id,
            "Organization write denied");
        Err(ServiceError::Forbidden(
            "No write access to this organization".to_string(),
        ))
    }

    /// Pass for project members holding `project:read` in a relevant scope,
    /// for admins of the owning organization, and for superadmins. A global
    /// permission code alone never suffices: membership is necessary.
    pub async fn ensure_project_readable(
        &self,
        project_id: Uuid,
        principal: &Principal,
    ) -> Result<(), ServiceError> {
        if principal.is_super_admin() {
            return Ok(());
        }

        let org_id = self.owning_organization(project_id).await?;

        let allowed = (self.project_membership(principal.user_id, project_id).await
            && principal.project_scope_has(project_id, org_id, PROJECT_READ))
            || self.is_organization_admin(principal, org_id).await;

        if allowed {
            return Ok(());
        }

        tracing::warn!(user_id = %principal.user_id, project_id = %project_id,
            "Project read denied");
        Err(ServiceError::Forbidden(
            "No access to this project".to_string(),
        ))
    }

    /// Project writes require the project-scoped grant itself to carry
    /// `project:write`: project roles narrow, never widen, what organization
    /// roles grant. Admins of the owning organization and superadmins bypass.
    pub async fn ensure_project_writable(
        &self,
        project_id: Uuid,
        principal: &Principal,
    ) -> Result<(), ServiceError> {
        if principal.is_super_admin() {
            return Ok(());
        }

        let org_id = self.owning_organization(project_id).await?;

        if self.is_organization_admin(principal, org_id).await {
            return Ok(());
        }

        if self.project_membership(principal.user_id, project_id).await
            && principal.project_grant_has(project_id, PROJECT_WRITE)
        {
            return Ok(());
        }

        tracing::warn!(user_id = %principal.user_id, project_id = %project_id,
            "Project write denied");
        Err(ServiceError::Forbidden(
            "No write access to this project".to_string(),
        ))
    }

    /// Resolve a resource's tenant ids through the entity's tenancy seam and
    /// delegate to the project guard when the resource lives in a project,
    /// else the organization guard. An unknown resource is NotFound; callers
    /// decide whether NotFound or Forbidden is the less leaky answer.
    pub async fn ensure_resource_readable(
        &self,
        resource_id: Uuid,
        principal: &Principal,
        tenancy: &dyn ResourceTenancy,
    ) -> Result<(), ServiceError> {
        let ids = tenancy
            .tenant_ids(resource_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::NotFound("Resource not found".to_string()))?;

        match ids.project_id {
            Some(project_id) => self.ensure_project_readable(project_id, principal).await,
            None => {
                self.ensure_organization_readable(ids.organization_id, principal)
                    .await
            }
        }
    }

    pub async fn ensure_resource_writable(
        &self,
        resource_id: Uuid,
        principal: &Principal,
        tenancy: &dyn ResourceTenancy,
    ) -> Result<(), ServiceError> {
        let ids = tenancy
            .tenant_ids(resource_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::NotFound("Resource not found".to_string()))?;

        match ids.project_id {
            Some(project_id) => self.ensure_project_writable(project_id, principal).await,
            None => {
                self.ensure_organization_writable(ids.organization_id, principal)
                    .await
            }
        }
    }

    async fn owning_organization(&self, project_id: Uuid) -> Result<Uuid, ServiceError> {
        self.directory
            .project_organization(project_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::NotFound("Project not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::SUPER_ADMIN;
    use crate::models::{Role, RoleScope, TenantIds, UserRecord};
    use crate::services::{InMemoryDirectory, PermissionCache, PrincipalLoader};
    use async_trait::async_trait;
    use dashmap::DashMap;

    struct Fixture {
        directory: Arc<InMemoryDirectory>,
        loader: PrincipalLoader,
        guard: TenantGuard,
    }

    impl Fixture {
        fn new() -> Self {
            let directory = Arc::new(InMemoryDirectory::new());
            let loader =
                PrincipalLoader::new(directory.clone(), PermissionCache::new());
            let guard = TenantGuard::new(directory.clone());
            Self {
                directory,
                loader,
                guard,
            }
        }

        fn user(&self, home_org: Option<Uuid>) -> Uuid {
            let user = UserRecord::new(
                format!("{}@example.com", Uuid::new_v4()),
                "hash".to_string(),
                home_org,
            );
            let id = user.user_id;
            self.directory.upsert_user(user);
            id
        }

        async fn principal(&self, user_id: Uuid) -> Arc<crate::models::Principal> {
            self.loader.load(user_id).await.unwrap()
        }
    }

    struct StaticTenancy(DashMap<Uuid, TenantIds>);

    #[async_trait]
    impl ResourceTenancy for StaticTenancy {
        async fn tenant_ids(
            &self,
            resource_id: Uuid,
        ) -> Result<Option<TenantIds>, anyhow::Error> {
            Ok(self.0.get(&resource_id).map(|ids| *ids))
        }
    }

    #[tokio::test]
    async fn no_assignments_means_every_check_fails() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        let user = fx.user(Some(org));
        let principal = fx.principal(user).await;

        assert!(fx
            .guard
            .ensure_organization_readable(org, &principal)
            .await
            .is_err());
        assert!(fx
            .guard
            .ensure_organization_writable(org, &principal)
            .await
            .is_err());
        assert!(fx
            .guard
            .ensure_project_readable(project, &principal)
            .await
            .is_err());
        assert!(fx
            .guard
            .ensure_project_writable(project, &principal)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn org_admin_of_one_org_cannot_read_another() {
        let fx = Fixture::new();
        let org1 = Uuid::new_v4();
        let org2 = Uuid::new_v4();

        let admin_role = fx.directory.define_role(Role::new(
            "org-admin",
            RoleScope::Organization(org1),
            vec![
                ORGANIZATION_READ.to_string(),
                ORGANIZATION_WRITE.to_string(),
            ],
        ));
        let user = fx.user(Some(org1));
        fx.directory.assign_role(user, admin_role).unwrap();

        let principal = fx.principal(user).await;

        assert!(fx
            .guard
            .ensure_organization_readable(org1, &principal)
            .await
            .is_ok());
        let denied = fx
            .guard
            .ensure_organization_readable(org2, &principal)
            .await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn global_permission_without_project_membership_is_not_enough() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        // Org member with a GLOBAL role carrying project:read, but no
        // project membership.
        let global_role = fx.directory.define_role(Role::new(
            "global-reader",
            RoleScope::Global,
            vec![PROJECT_READ.to_string()],
        ));
        let org_member_role = fx.directory.define_role(Role::new(
            "org-member",
            RoleScope::Organization(org),
            vec![ORGANIZATION_READ.to_string()],
        ));
        let user = fx.user(Some(org));
        fx.directory.assign_role(user, global_role).unwrap();
        fx.directory.assign_role(user, org_member_role).unwrap();

        let principal = fx.principal(user).await;
        assert!(principal.has_permission(PROJECT_READ));

        let denied = fx.guard.ensure_project_readable(project, &principal).await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn project_member_reads_but_writes_need_project_grant() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        // Project role carries read only; the org role carries project:write,
        // which must NOT widen the project-scoped grant.
        let project_viewer = fx.directory.define_role(Role::new(
            "project-viewer",
            RoleScope::Project(project),
            vec![PROJECT_READ.to_string()],
        ));
        let org_writer = fx.directory.define_role(Role::new(
            "org-writer",
            RoleScope::Organization(org),
            vec![PROJECT_WRITE.to_string()],
        ));
        let user = fx.user(Some(org));
        fx.directory.assign_role(user, project_viewer).unwrap();
        fx.directory.assign_role(user, org_writer).unwrap();

        let principal = fx.principal(user).await;

        assert!(fx
            .guard
            .ensure_project_readable(project, &principal)
            .await
            .is_ok());
        let denied = fx.guard.ensure_project_writable(project, &principal).await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn project_editor_can_write() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        let editor = fx.directory.define_role(Role::new(
            "project-editor",
            RoleScope::Project(project),
            vec![PROJECT_READ.to_string(), PROJECT_WRITE.to_string()],
        ));
        let user = fx.user(Some(org));
        fx.directory.assign_role(user, editor).unwrap();

        let principal = fx.principal(user).await;
        assert!(fx
            .guard
            .ensure_project_writable(project, &principal)
            .await
            .is_ok());
        assert!(fx.guard.is_project_admin(&principal, project).await);
    }

    #[tokio::test]
    async fn org_admin_administers_its_projects() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        let admin = fx.directory.define_role(Role::new(
            "org-admin",
            RoleScope::Organization(org),
            vec![
                ORGANIZATION_READ.to_string(),
                ORGANIZATION_WRITE.to_string(),
            ],
        ));
        let user = fx.user(Some(org));
        fx.directory.assign_role(user, admin).unwrap();

        let principal = fx.principal(user).await;
        assert!(fx
            .guard
            .ensure_project_readable(project, &principal)
            .await
            .is_ok());
        assert!(fx
            .guard
            .ensure_project_writable(project, &principal)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn superadmin_bypasses_membership() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        let root = fx.directory.define_role(Role::new(
            "superadmin",
            RoleScope::Global,
            vec![SUPER_ADMIN.to_string()],
        ));
        let user = fx.user(None);
        fx.directory.assign_role(user, root).unwrap();

        let principal = fx.principal(user).await;
        assert!(fx
            .guard
            .ensure_organization_writable(org, &principal)
            .await
            .is_ok());
        assert!(fx
            .guard
            .ensure_project_writable(project, &principal)
            .await
            .is_ok());
        assert!(fx.guard.is_organization_member(&principal, org).await);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let fx = Fixture::new();
        let user = fx.user(None);
        let principal = fx.principal(user).await;

        let missing = fx
            .guard
            .ensure_project_readable(Uuid::new_v4(), &principal)
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn resource_guard_routes_by_tenant_ids() {
        let fx = Fixture::new();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        fx.directory.register_project(project, org);

        let tenancy = StaticTenancy(DashMap::new());
        let org_doc = Uuid::new_v4();
        let project_task = Uuid::new_v4();
        tenancy.0.insert(org_doc, TenantIds::organization(org));
        tenancy
            .0
            .insert(project_task, TenantIds::project(org, project));

        let viewer = fx.directory.define_role(Role::new(
            "project-viewer",
            RoleScope::Project(project),
            vec![PROJECT_READ.to_string()],
        ));
        let user = fx.user(Some(org));
        fx.directory.assign_role(user, viewer).unwrap();
        let principal = fx.principal(user).await;

        // Project-scoped resource readable through project membership...
        assert!(fx
            .guard
            .ensure_resource_readable(project_task, &principal, &tenancy)
            .await
            .is_ok());
        // ...org-scoped resource denied without organization:read.
        assert!(fx
            .guard
            .ensure_resource_readable(org_doc, &principal, &tenancy)
            .await
            .is_err());
        // Unknown resource is NotFound.
        assert!(matches!(
            fx.guard
                .ensure_resource_readable(Uuid::new_v4(), &principal, &tenancy)
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
