//! Role-change events published by tenant administration and consumed by
//! the permission cache for invalidation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleScope;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoleEvent {
    RoleAssigned {
        user_id: Uuid,
        role_id: Uuid,
        scope: RoleScope,
    },
    RoleRemoved {
        user_id: Uuid,
        role_id: Uuid,
        scope: RoleScope,
    },
}

impl RoleEvent {
    /// The user whose cached permissions must be forgotten.
    pub fn user_id(&self) -> Uuid {
        match self {
            RoleEvent::RoleAssigned { user_id, .. } | RoleEvent::RoleRemoved { user_id, .. } => {
                *user_id
            }
        }
    }
}
