pub mod events;
pub mod permission;
pub mod principal;
pub mod role;
pub mod tenant;
pub mod user;

pub use events::RoleEvent;
pub use principal::{Principal, ScopedGrant};
pub use role::{Role, RoleAssignment, RoleScope};
pub use tenant::TenantIds;
pub use user::UserRecord;
