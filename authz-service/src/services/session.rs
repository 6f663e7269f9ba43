use std::sync::Arc;

use uuid::Uuid;

use crate::services::{
    AccessTokenClaims, JwtService, RevocationRegistry, ServiceError, TenantDirectory,
    TokenResponse,
};
use crate::utils::password::{verify_password, Password};

/// Session lifecycle: login, logout with immediate revocation, and single-use
/// refresh rotation.
#[derive(Clone)]
pub struct SessionService {
    directory: Arc<dyn TenantDirectory>,
    jwt: JwtService,
    revocation: Arc<dyn RevocationRegistry>,
}

impl SessionService {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        jwt: JwtService,
        revocation: Arc<dyn RevocationRegistry>,
    ) -> Self {
        Self {
            directory,
            jwt,
            revocation,
        }
    }

    /// Authenticate by email and password and issue a token pair. Every
    /// failure mode collapses into [`ServiceError::InvalidCredentials`] so
    /// the response does not reveal whether the account exists.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ServiceError> {
        let user = self
            .directory
            .user_by_email(email)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !user.active {
            tracing::warn!(user_id = %user.user_id, "Login attempt on inactive account");
            return Err(ServiceError::InvalidCredentials);
        }

        verify_password(&Password::new(password.to_string()), &user.password_hash)
            .map_err(|_| ServiceError::InvalidCredentials)?;

        let tokens = self
            .jwt
            .issue_token_pair(user.user_id, user.org_id)
            .map_err(ServiceError::Internal)?;

        tracing::info!(user_id = %user.user_id, "User logged in");
        Ok(tokens)
    }

    /// Revoke the presented access token and, when supplied, the refresh
    /// token. Revocation takes effect before this call returns: the registry
    /// write is synchronous, so a replay on the very next request is already
    /// rejected. An unparseable refresh token is logged and ignored rather
    /// than failing the logout.
    pub async fn logout(
        &self,
        access: &AccessTokenClaims,
        refresh_token: Option<&str>,
    ) -> Result<(), ServiceError> {
        let remaining = access.remaining_seconds();
        if remaining > 0 {
            self.revocation
                .revoke(&access.jti, remaining)
                .await
                .map_err(ServiceError::Internal)?;
        }

        if let Some(raw) = refresh_token {
            match self.jwt.validate_refresh_token(raw) {
                Ok(claims) => {
                    let remaining = claims.remaining_seconds();
                    if remaining > 0 {
                        self.revocation
                            .revoke(&claims.jti, remaining)
                            .await
                            .map_err(ServiceError::Internal)?;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Logout carried an invalid refresh token");
                }
            }
        }

        tracing::info!(sub = %access.sub, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new pair. The old token is consumed
    /// atomically: revoking its id is a write-once operation, so of two
    /// concurrent exchanges of the same token exactly one succeeds and the
    /// other sees the id already spent.
    pub async fn refresh(&self, raw: &str) -> Result<TokenResponse, ServiceError> {
        let claims = self
            .jwt
            .validate_refresh_token(raw)
            .map_err(|_| ServiceError::InvalidToken)?;

        let newly_revoked = self
            .revocation
            .revoke(&claims.jti, claims.remaining_seconds())
            .await
            .map_err(ServiceError::Internal)?;
        if !newly_revoked {
            tracing::warn!(sub = %claims.sub, jti = %claims.jti,
                "Refresh token replayed");
            return Err(ServiceError::TokenRevoked);
        }

        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidToken)?;
        let org_id = self
            .directory
            .user_home_org(user_id)
            .await
            .map_err(ServiceError::Internal)?;

        let tokens = self
            .jwt
            .issue_token_pair(user_id, org_id)
            .map_err(ServiceError::Internal)?;

        tracing::info!(user_id = %user_id, "Session refreshed");
        Ok(tokens)
    }
}
