use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::application::repos::{BannerCache, CacheError};
use crate::domain::types::{Content, FeatureId, TagId};

use super::BannerCacheKey;

/// Redis-backed cache storing each entry as a JSON string with `SET ... EX`.
#[derive(Clone)]
pub struct RedisBannerCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisBannerCache {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(CacheError::backend)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;
        Ok(Self::new(conn, ttl))
    }

    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(CacheError::backend)
    }

    fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl BannerCache for RedisBannerCache {
    async fn get(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<Option<Content>, CacheError> {
        let key = BannerCacheKey::new(tag_id, feature_id).to_string();
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn.get(&key).await.map_err(CacheError::backend)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        content: &Content,
    ) -> Result<(), CacheError> {
        let key = BannerCacheKey::new(tag_id, feature_id).to_string();
        let payload = serde_json::to_string(content)?;
        let mut conn = self.conn.clone();

        conn.set_ex::<_, _, ()>(&key, payload, self.ttl_seconds())
            .await
            .map_err(CacheError::backend)
    }
}
