use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use platform_core::error::AppError;

use crate::models::Principal;
use crate::services::AccessTokenClaims;
use crate::AppState;

/// Authentication gate, applied to every request. It authenticates when it
/// can and NEVER rejects: a missing header, a bad token, a revoked id, or a
/// registry outage all leave the request anonymous and let it proceed.
/// Endpoints that require identity reject later through the extractors, so
/// public routes work without tokens and protected routes stay fail-closed.
pub async fn auth_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    // Copy the token out before any await: the request body must not be
    // borrowed across suspension points or the middleware future loses Send.
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    if let Some(token) = bearer {
        if let Some(ctx) = authenticate(&state, &token).await {
            req.extensions_mut().insert(ctx.claims);
            req.extensions_mut().insert(ctx.principal);
        }
    }
    next.run(req).await
}

struct AuthedContext {
    claims: AccessTokenClaims,
    principal: Arc<Principal>,
}

async fn authenticate(state: &AppState, token: &str) -> Option<AuthedContext> {
    let claims = match state.jwt.validate_access_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting bearer token; proceeding anonymous");
            return None;
        }
    };

    // A registry failure means revocation cannot be ruled out, so the token
    // is treated as revoked.
    match state.revocation.is_revoked(&claims.jti).await {
        Ok(false) => {}
        Ok(true) => {
            tracing::debug!(jti = %claims.jti, "Revoked token presented; proceeding anonymous");
            return None;
        }
        Err(e) => {
            tracing::error!(error = %e, "Revocation check failed; proceeding anonymous");
            return None;
        }
    }

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(sub = %claims.sub, "Token subject is not a UUID");
            return None;
        }
    };

    let principal = match state.loader.load(user_id).await {
        Ok(principal) => principal,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e,
                "Principal resolution failed; proceeding anonymous");
            return None;
        }
    };

    Some(AuthedContext { claims, principal })
}

/// Extracts the resolved principal; rejects with 401 when the gate left the
/// request anonymous.
pub struct CurrentUser(pub Arc<Principal>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<Principal>>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}

/// Extracts the validated access-token claims (for endpoints that need the
/// token id, e.g. logout).
pub struct AuthClaims(pub AccessTokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessTokenClaims>()
            .cloned()
            .map(AuthClaims)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}
