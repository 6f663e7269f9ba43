use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use platform_core::error::AppError;

use crate::{
    dtos::auth::{LoginRequest, LogoutRequest, RefreshRequest},
    middleware::AuthClaims,
    utils::validation::ValidatedJson,
    AppState,
};

/// Login with email and password.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.sessions.login(&req.email, &req.password).await?;
    Ok((StatusCode::OK, Json(tokens)))
}

/// Logout: revoke the presented access token (and refresh token when
/// supplied). Requires authentication.
pub async fn logout(
    State(state): State<AppState>,
    claims: AuthClaims,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .logout(&claims.0, req.refresh_token.as_deref())
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Logged out successfully"
        })),
    ))
}

/// Exchange a refresh token for a new token pair. The old refresh token is
/// consumed whether or not the exchange succeeds.
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.sessions.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(tokens)))
}
