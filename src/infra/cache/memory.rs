use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::application::repos::{BannerCache, CacheError};
use crate::domain::types::{Content, FeatureId, TagId};

use super::BannerCacheKey;

struct Entry {
    content: Content,
    expires_at: Instant,
}

/// In-process cache with per-entry expiry.
///
/// Expired entries are dropped on read of the same key, and a full sweep runs on
/// the first write after each TTL period so keys that are never read again do not
/// accumulate.
pub struct MemoryBannerCache {
    entries: DashMap<BannerCacheKey, Entry>,
    ttl: Duration,
    next_sweep: Mutex<Instant>,
}

impl MemoryBannerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            next_sweep: Mutex::new(Instant::now() + ttl),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn sweep_if_due(&self, now: Instant) {
        // Another writer holds the lock and is about to sweep.
        let Ok(mut next_sweep) = self.next_sweep.try_lock() else {
            return;
        };
        if now < *next_sweep {
            return;
        }
        *next_sweep = now + self.ttl;
        drop(next_sweep);
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl BannerCache for MemoryBannerCache {
    async fn get(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<Option<Content>, CacheError> {
        let key = BannerCacheKey::new(tag_id, feature_id);
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > now {
                return Ok(Some(entry.content.clone()));
            }
        }

        self.entries.remove_if(&key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        content: &Content,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        self.sweep_if_due(now);
        self.entries.insert(
            BannerCacheKey::new(tag_id, feature_id),
            Entry {
                content: content.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn content(value: serde_json::Value) -> Content {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_served_until_ttl_elapses() {
        let cache = MemoryBannerCache::new(Duration::from_secs(300));
        cache.set(1, 10, &content(json!({"x": 1}))).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(
            cache.get(1, 10).await.unwrap(),
            Some(content(json!({"x": 1})))
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(1, 10).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_replaces_content_and_resets_ttl() {
        let cache = MemoryBannerCache::new(Duration::from_secs(60));
        cache.set(1, 10, &content(json!({"v": 1}))).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        cache.set(1, 10, &content(json!({"v": 2}))).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(
            cache.get(1, 10).await.unwrap(),
            Some(content(json!({"v": 2})))
        );
    }

    #[tokio::test]
    async fn pairs_are_independent() {
        let cache = MemoryBannerCache::new(Duration::from_secs(60));
        cache.set(1, 10, &content(json!({"a": true}))).await.unwrap();

        assert_eq!(cache.get(10, 1).await.unwrap(), None);
        assert_eq!(cache.get(1, 11).await.unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let cache = MemoryBannerCache::new(Duration::from_secs(10));
        cache.set(1, 1, &Content::new()).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set(2, 2, &Content::new()).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(2, 2).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn writes_sweep_expired_keys_that_are_never_read() {
        let cache = MemoryBannerCache::new(Duration::from_secs(1));
        for tag_id in 0..1000 {
            cache.set(tag_id, 10, &Content::new()).await.unwrap();
        }
        assert_eq!(cache.len(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache.set(5000, 10, &Content::new()).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get(5000, 10).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn writes_within_a_ttl_period_do_not_sweep_live_entries() {
        let cache = MemoryBannerCache::new(Duration::from_secs(10));
        cache.set(1, 1, &Content::new()).await.unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        cache.set(2, 2, &Content::new()).await.unwrap();

        assert_eq!(cache.len(), 2);
    }
}
