use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Principal, ScopedGrant};
use crate::services::{PermissionCache, ServiceError, TenantDirectory};

/// Resolves a user into a [`Principal`] with cache-first semantics: the union
/// of permission codes across all of the user's role assignments, plus the
/// home organization.
#[derive(Clone)]
pub struct PrincipalLoader {
    directory: Arc<dyn TenantDirectory>,
    cache: PermissionCache,
}

impl PrincipalLoader {
    pub fn new(directory: Arc<dyn TenantDirectory>, cache: PermissionCache) -> Self {
        Self { directory, cache }
    }

    /// Cache hit returns the memoized principal; a miss recomputes and
    /// memoizes. Eviction happens through role-change events, so a hit is
    /// never staler than the last processed event. The generation snapshot is
    /// taken before the directory reads: when an eviction lands mid-resolve,
    /// the insert is refused and the next request recomputes, so a load that
    /// was in flight during a role change cannot pin the old permissions.
    pub async fn load(&self, user_id: Uuid) -> Result<Arc<Principal>, ServiceError> {
        if let Some(principal) = self.cache.get(user_id) {
            return Ok(principal);
        }

        let generation = self.cache.generation(user_id);
        let principal = Arc::new(self.resolve(user_id).await?);
        self.cache.insert_if_current(principal.clone(), generation);
        Ok(principal)
    }

    async fn resolve(&self, user_id: Uuid) -> Result<Principal, ServiceError> {
        let assignments = self
            .directory
            .role_assignments(user_id)
            .await
            .map_err(ServiceError::Internal)?;

        let mut grants = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let role = match self
                .directory
                .role(assignment.role_id)
                .await
                .map_err(ServiceError::Internal)?
            {
                Some(role) => role,
                None => {
                    tracing::warn!(
                        user_id = %user_id,
                        role_id = %assignment.role_id,
                        "Assignment references unknown role; skipping"
                    );
                    continue;
                }
            };

            // Soft-deleted roles stay referenced but grant nothing.
            if role.deleted {
                continue;
            }

            grants.push(ScopedGrant {
                role_id: role.role_id,
                scope: assignment.scope,
                permissions: role.permissions.into_iter().collect(),
            });
        }

        let org_id = self
            .directory
            .user_home_org(user_id)
            .await
            .map_err(ServiceError::Internal)?;

        tracing::debug!(
            user_id = %user_id,
            grant_count = grants.len(),
            "Principal resolved"
        );

        Ok(Principal::resolve(user_id, org_id, grants))
    }
}
