//! In-memory port implementations shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use bannerd::application::banners::BannerService;
use bannerd::application::repos::{
    BannerCache, BannerFilter, BannerStore, CacheError, RepoError, ResolvedContent,
};
use bannerd::domain::entities::{Banner, NewBanner, normalize_tag_ids};
use bannerd::domain::types::{BannerId, Content, FeatureId, TagId, is_unset};
use bannerd::infra::cache::MemoryBannerCache;

pub const TTL: Duration = Duration::from_secs(300);

pub fn content(value: Value) -> Content {
    value.as_object().cloned().expect("content must be a JSON object")
}

#[derive(Default)]
struct StoreState {
    tags: BTreeSet<TagId>,
    features: BTreeSet<FeatureId>,
    banners: BTreeMap<BannerId, Banner>,
    next_id: BannerId,
    clock: i64,
}

impl StoreState {
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(self.clock)
    }
}

/// Store fake mirroring the Postgres semantics closely enough for engine tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    resolve_calls: AtomicUsize,
    concurrent_writer: Mutex<Option<BannerId>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn with_catalog(tags: &[TagId], features: &[FeatureId]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.try_lock().expect("fresh store is unlocked");
            state.tags.extend(tags.iter().copied());
            state.features.extend(features.iter().copied());
        }
        store
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub async fn banner(&self, id: BannerId) -> Option<Banner> {
        self.state.lock().await.banners.get(&id).cloned()
    }

    pub async fn banner_count(&self) -> usize {
        self.state.lock().await.banners.len()
    }

    /// The next `find_by_id(id)` is followed by a write from another client.
    pub async fn race_next_update(&self, id: BannerId) {
        *self.concurrent_writer.lock().await = Some(id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BannerStore for InMemoryStore {
    async fn find_by_id(&self, id: BannerId) -> Result<Banner, RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let banner = state.banners.get(&id).cloned().ok_or(RepoError::NotFound)?;

        if self.concurrent_writer.lock().await.take_if(|racing| *racing == id).is_some() {
            let now = state.tick();
            if let Some(stored) = state.banners.get_mut(&id) {
                stored.version += 1;
                stored.updated_at = now;
            }
        }

        Ok(banner)
    }

    async fn resolve_one(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        include_inactive: bool,
    ) -> Result<ResolvedContent, RepoError> {
        self.check_available()?;
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;

        state
            .banners
            .values()
            .filter(|b| b.feature_id == feature_id && b.tag_ids.contains(&tag_id))
            .filter(|b| b.is_active || include_inactive)
            .min_by_key(|b| (b.updated_at, b.id))
            .map(|b| ResolvedContent {
                content: b.content.clone(),
                is_active: b.is_active,
            })
            .ok_or(RepoError::NotFound)
    }

    async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, RepoError> {
        self.check_available()?;
        if filter.limit < 0 || filter.offset < 0 {
            return Err(RepoError::invalid_input("negative limit or offset"));
        }
        let state = self.state.lock().await;

        let matching = state
            .banners
            .values()
            .filter(|b| b.is_active || filter.include_inactive)
            .filter(|b| is_unset(filter.tag_id) || b.tag_ids.contains(&filter.tag_id))
            .filter(|b| is_unset(filter.feature_id) || b.feature_id == filter.feature_id)
            .skip(filter.offset as usize);

        let banners = if filter.limit == 0 {
            matching.cloned().collect()
        } else {
            matching.take(filter.limit as usize).cloned().collect()
        };
        Ok(banners)
    }

    async fn create(&self, banner: &NewBanner) -> Result<BannerId, RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        let now = state.tick();

        state.banners.insert(
            id,
            Banner {
                id,
                tag_ids: normalize_tag_ids(banner.tag_ids.clone()),
                feature_id: banner.feature_id,
                content: banner.content.clone(),
                is_active: banner.is_active,
                version: 1,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update(&self, banner: &Banner, expected_version: i64) -> Result<(), RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let now = state.tick();
        let stored = state.banners.get_mut(&banner.id).ok_or(RepoError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepoError::Conflict);
        }

        *stored = Banner {
            version: stored.version + 1,
            created_at: stored.created_at,
            updated_at: now,
            ..banner.clone()
        };
        Ok(())
    }

    async fn delete(&self, id: BannerId) -> Result<(), RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state
            .banners
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn tags_exist(&self, tag_ids: &[TagId]) -> Result<bool, RepoError> {
        self.check_available()?;
        if tag_ids.is_empty() {
            return Err(RepoError::invalid_input("tag set must not be empty"));
        }
        let state = self.state.lock().await;
        Ok(tag_ids.iter().all(|id| state.tags.contains(id)))
    }

    async fn feature_exists(&self, feature_id: FeatureId) -> Result<bool, RepoError> {
        self.check_available()?;
        Ok(self.state.lock().await.features.contains(&feature_id))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.check_available()
    }
}

/// Memory cache that counts traffic and can be told to fail.
pub struct SpyCache {
    inner: MemoryBannerCache,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
}

impl SpyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: MemoryBannerCache::new(ttl),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            fail_gets: AtomicBool::new(false),
            fail_sets: AtomicBool::new(false),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BannerCache for SpyCache {
    async fn get(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<Option<Content>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(CacheError::backend("connection reset"));
        }
        self.inner.get(tag_id, feature_id).await
    }

    async fn set(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        content: &Content,
    ) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::backend("connection reset"));
        }
        self.inner.set(tag_id, feature_id, content).await
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<SpyCache>,
    pub service: BannerService,
}

/// Engine over a store that knows tags 1..=5 and features 10, 20.
pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::with_catalog(&[1, 2, 3, 4, 5], &[10, 20]));
    let cache = Arc::new(SpyCache::new(TTL));
    let service = BannerService::new(store.clone(), cache.clone());
    Harness {
        store,
        cache,
        service,
    }
}

pub fn new_banner(tag_ids: &[TagId], feature_id: FeatureId, body: Value, active: bool) -> NewBanner {
    NewBanner {
        tag_ids: tag_ids.to_vec(),
        feature_id,
        content: content(body),
        is_active: active,
    }
}
