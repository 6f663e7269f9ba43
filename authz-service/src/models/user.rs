//! Directory view of a user, as read from tenant administration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    /// Home organization.
    pub org_id: Option<Uuid>,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
}

impl UserRecord {
    pub fn new(email: impl Into<String>, password_hash: String, org_id: Option<Uuid>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            org_id,
            email: email.into(),
            password_hash,
            active: true,
        }
    }
}
