//! Stable permission codes, `module:action` form. Organizations may define
//! additional custom codes; codes are unique within an organization.

/// Grants every permission at every scope.
pub const SUPER_ADMIN: &str = "*";

pub const ORGANIZATION_READ: &str = "organization:read";
pub const ORGANIZATION_WRITE: &str = "organization:write";

pub const PROJECT_READ: &str = "project:read";
pub const PROJECT_WRITE: &str = "project:write";
