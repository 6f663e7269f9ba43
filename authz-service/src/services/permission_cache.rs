use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Principal, RoleEvent};

/// A snapshot of how many times a user's entry (and the cache as a whole) has
/// been invalidated. Taken before resolving a principal and checked at insert
/// time, so a resolution that raced an eviction cannot re-populate the cache
/// with pre-eviction data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeneration {
    epoch: u64,
    user: u64,
}

/// Memoizes resolved principals per user. Injectable (handed to the principal
/// loader by reference), read-mostly, and safe under concurrent read/write.
/// Invalidation evicts; the next request recomputes lazily.
#[derive(Clone)]
pub struct PermissionCache {
    entries: Arc<DashMap<Uuid, Arc<Principal>>>,
    generations: Arc<DashMap<Uuid, u64>>,
    epoch: Arc<AtomicU64>,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<Arc<Principal>> {
        self.entries.get(&user_id).map(|p| p.clone())
    }

    /// Snapshot the invalidation counters for a user. Take this BEFORE
    /// reading the directory; pass it to
    /// [`insert_if_current`](PermissionCache::insert_if_current) afterwards.
    pub fn generation(&self, user_id: Uuid) -> CacheGeneration {
        CacheGeneration {
            epoch: self.epoch.load(Ordering::Acquire),
            user: self.generations.get(&user_id).map(|g| *g).unwrap_or(0),
        }
    }

    /// Insert unless the user was invalidated since `generation` was taken.
    /// Returns whether the entry was stored. The generation entry lock orders
    /// this against a concurrent [`invalidate`](PermissionCache::invalidate),
    /// so a resolution that started before a role change can never overwrite
    /// the eviction that change caused.
    pub fn insert_if_current(
        &self,
        principal: Arc<Principal>,
        generation: CacheGeneration,
    ) -> bool {
        let user_id = principal.user_id;
        let user_generation = self.generations.entry(user_id).or_insert(0);
        if *user_generation != generation.user
            || self.epoch.load(Ordering::Acquire) != generation.epoch
        {
            tracing::debug!(user_id = %user_id, "Skipping stale principal insert");
            return false;
        }
        self.entries.insert(user_id, principal);
        drop(user_generation);

        // clear() may have run between the epoch check and the insert; undo
        // the insert rather than let a pre-clear principal survive.
        if self.epoch.load(Ordering::Acquire) != generation.epoch {
            self.entries.remove(&user_id);
            return false;
        }
        true
    }

    pub fn invalidate(&self, user_id: Uuid) {
        *self.generations.entry(user_id).or_insert(0) += 1;
        if self.entries.remove(&user_id).is_some() {
            tracing::debug!(user_id = %user_id, "Permission cache entry evicted");
        }
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume role-change events and evict the affected user's entry.
    /// Falling behind the channel clears the whole cache: forgetting too much
    /// only costs recomputation, forgetting too little would serve stale
    /// permissions.
    pub fn spawn_invalidation_listener(
        &self,
        mut events: broadcast::Receiver<RoleEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => cache.invalidate(event.user_id()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Invalidation events lost; clearing cache");
                        cache.clear();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
