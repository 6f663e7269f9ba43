//! Shared harness for authz-service integration tests. The whole stack runs
//! in-process: in-memory directory and revocation registry, real router, real
//! middleware, requests driven through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use authz_service::config::{
    AuthzConfig, Environment, JwtConfig, RedisConfig, SecurityConfig,
};
use authz_service::models::{Role, RoleScope, UserRecord};
use authz_service::services::{InMemoryDirectory, InMemoryRevocation, PermissionCache};
use authz_service::utils::password::{hash_password, Password};
use authz_service::{build_router, AppState};
use platform_core::config::Config as CommonConfig;

pub const TEST_PASSWORD: &str = "integration-test-password";

pub struct TestApp {
    pub router: Router,
    pub directory: Arc<InMemoryDirectory>,
    pub state: AppState,
}

pub fn spawn_app() -> TestApp {
    let config = AuthzConfig {
        common: CommonConfig { port: 0 },
        environment: Environment::Dev,
        service_name: "authz-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-integration-test-secret-integration-0123"
                .to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    };

    let directory = Arc::new(InMemoryDirectory::new());
    let cache = PermissionCache::new();
    cache.spawn_invalidation_listener(directory.subscribe());

    let state = AppState::new(
        config,
        Arc::new(InMemoryRevocation::new()),
        directory.clone(),
        cache,
    );
    let router = build_router(state.clone());

    TestApp {
        router,
        directory,
        state,
    }
}

impl TestApp {
    /// Seed a user with the shared test password and return their id.
    pub fn seed_user(&self, email: &str, home_org: Option<Uuid>) -> Uuid {
        let hash = hash_password(&Password::new(TEST_PASSWORD.to_string())).unwrap();
        let user = UserRecord::new(email, hash, home_org);
        let user_id = user.user_id;
        self.directory.upsert_user(user);
        user_id
    }

    pub fn grant(&self, user_id: Uuid, name: &str, scope: RoleScope, codes: &[&str]) -> Uuid {
        let role_id = self.directory.define_role(Role::new(
            name,
            scope,
            codes.iter().map(|c| c.to_string()).collect(),
        ));
        self.directory.assign_role(user_id, role_id).unwrap();
        role_id
    }

    /// Log in through the HTTP surface and return (access, refresh) tokens.
    pub async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .post_json(
                "/auth/login",
                serde_json::json!({ "email": email, "password": TEST_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed");

        let body = read_json(response).await;
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        bearer: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
