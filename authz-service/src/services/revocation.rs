use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::Mutex;

/// Records token identifiers that must be rejected before their natural
/// expiry. Entries are write-once-per-id and self-expire at the shadowed
/// token's expiry.
///
/// A revocation recorded before a request's validation step must be visible
/// to that step, so implementations need synchronous, strongly consistent
/// writes relative to reads.
#[async_trait]
pub trait RevocationRegistry: Send + Sync {
    /// Record `token_id` as revoked for `ttl_seconds`. Returns true iff the
    /// entry was newly recorded; false when the id was already revoked
    /// (re-revoking is a no-op). The single-writer guarantee is what makes
    /// refresh-token rotation atomic.
    async fn revoke(&self, token_id: &str, ttl_seconds: i64) -> Result<bool, anyhow::Error>;

    async fn is_revoked(&self, token_id: &str) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisRevocation {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisRevocation {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects automatically
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl RevocationRegistry for RedisRevocation {
    async fn revoke(&self, token_id: &str, ttl_seconds: i64) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("revoked:{}", token_id);

        // SET NX EX: the write succeeds for exactly one caller, and the entry
        // expires with the token it shadows.
        let set: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke token: {}", e))?;

        Ok(set.is_some())
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("revoked:{}", token_id);

        let exists: bool = redis::cmd("EXISTS")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check revocation: {}", e))?;

        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Process-local registry with the same write-once semantics. Used in tests
/// and single-node deployments.
pub struct InMemoryRevocation {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for InMemoryRevocation {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRevocation {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RevocationRegistry for InMemoryRevocation {
    async fn revoke(&self, token_id: &str, ttl_seconds: i64) -> Result<bool, anyhow::Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Revocation registry mutex poisoned: {}", e))?;

        // Redis expires entries for us; here the write path sweeps them.
        let now = Utc::now();
        entries.retain(|_, expiry| *expiry > now);

        if entries.contains_key(token_id) {
            return Ok(false);
        }

        entries.insert(
            token_id.to_string(),
            now + Duration::seconds(ttl_seconds.max(1)),
        );
        Ok(true)
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool, anyhow::Error> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Revocation registry mutex poisoned: {}", e))?;

        Ok(entries
            .get(token_id)
            .is_some_and(|expiry| *expiry > Utc::now()))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
