//! Services layer for the authorization core: token lifecycle, revocation,
//! permission resolution, and tenant isolation.

pub mod directory;
pub mod error;
pub mod guard;
mod jwt;
pub mod permission_cache;
mod principal;
pub mod revocation;
mod session;

pub use directory::{InMemoryDirectory, ResourceTenancy, TenantDirectory};
pub use error::ServiceError;
pub use guard::TenantGuard;
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims, TokenResponse};
pub use permission_cache::PermissionCache;
pub use principal::PrincipalLoader;
pub use revocation::{InMemoryRevocation, RedisRevocation, RevocationRegistry};
pub use session::SessionService;
