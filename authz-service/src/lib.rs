pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use platform_core::error::AppError;

use crate::config::AuthzConfig;
use crate::services::{
    JwtService, PermissionCache, PrincipalLoader, RevocationRegistry, SessionService,
    TenantDirectory, TenantGuard,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    pub jwt: JwtService,
    pub revocation: Arc<dyn RevocationRegistry>,
    pub directory: Arc<dyn TenantDirectory>,
    pub cache: PermissionCache,
    pub loader: PrincipalLoader,
    pub guard: TenantGuard,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(
        config: AuthzConfig,
        revocation: Arc<dyn RevocationRegistry>,
        directory: Arc<dyn TenantDirectory>,
        cache: PermissionCache,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt);
        let loader = PrincipalLoader::new(directory.clone(), cache.clone());
        let guard = TenantGuard::new(directory.clone());
        let sessions = SessionService::new(directory.clone(), jwt.clone(), revocation.clone());

        Self {
            config,
            jwt,
            revocation,
            directory,
            cache,
            loader,
            guard,
            sessions,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %origin, error = %e, "Invalid CORS origin; skipping");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(handlers::session::login))
        .route("/auth/logout", post(handlers::session::logout))
        .route("/auth/refresh", post(handlers::session::refresh))
        .route(
            "/orgs/:org_id/access",
            get(handlers::access::organization_access),
        )
        .route(
            "/projects/:project_id/access",
            get(handlers::access::project_access),
        )
        // The gate authenticates every request and never rejects; protected
        // handlers reject through their extractors.
        .layer(from_fn_with_state(state.clone(), middleware::auth_gate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.revocation.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation registry health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    })))
}
