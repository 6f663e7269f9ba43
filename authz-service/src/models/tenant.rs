//! Tenant identifiers a resource belongs to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every business entity resolves to its owning organization and, when it
/// lives inside a project, that project. The tenant isolation guard checks
/// against these without knowing entity-specific schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantIds {
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
}

impl TenantIds {
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            project_id: None,
        }
    }

    pub fn project(organization_id: Uuid, project_id: Uuid) -> Self {
        Self {
            organization_id,
            project_id: Some(project_id),
        }
    }
}
