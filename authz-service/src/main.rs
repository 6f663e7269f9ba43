use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;

use authz_service::{
    build_router,
    config::AuthzConfig,
    services::{InMemoryDirectory, PermissionCache, RedisRevocation},
    AppState,
};
use platform_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), platform_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthzConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authorization service"
    );

    let revocation = RedisRevocation::new(&config.redis).await?;
    tracing::info!("Revocation registry initialized");

    let directory = Arc::new(InMemoryDirectory::new());

    // Role-change events evict stale principals so the next request resolves
    // permissions fresh.
    let cache = PermissionCache::new();
    cache.spawn_invalidation_listener(directory.subscribe());

    let state = AppState::new(config.clone(), Arc::new(revocation), directory, cache);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
