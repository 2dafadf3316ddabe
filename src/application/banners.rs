//! Banner resolution engine: cache-aside reads, integrity checks and partial updates.
//!
//! Writes never touch the cache. A cached entry may therefore keep serving content
//! that was deactivated, edited or deleted until its TTL elapses; the TTL is the
//! staleness bound of every non-`use_last_revision` read.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::repos::{
    BannerCache, BannerFilter, BannerStore, CacheError, RepoError, ResolvedContent,
};
use crate::domain::entities::{Banner, BannerPatch, NewBanner};
use crate::domain::types::{BannerId, Content, FeatureId, TagId};

pub const METRIC_CACHE_HIT: &str = "bannerd_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "bannerd_cache_miss_total";
pub const METRIC_CACHE_WRITE_FAILED: &str = "bannerd_cache_write_failed_total";

const TARGET: &str = "bannerd::banners";

/// Coarse classification consumed by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum BannerError {
    #[error("no banner for tag {tag_id} and feature {feature_id}")]
    NoMatch { tag_id: TagId, feature_id: FeatureId },
    #[error("banner {0} not found")]
    NotFound(BannerId),
    #[error("unknown tag ids in {0:?}")]
    UnknownTags(Vec<TagId>),
    #[error("feature {0} does not exist")]
    UnknownFeature(FeatureId),
    #[error("banner {id} was modified concurrently")]
    Conflict { id: BannerId },
    #[error("{operation}: {source}")]
    Repo {
        operation: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("{operation}: {source}")]
    Cache {
        operation: &'static str,
        #[source]
        source: CacheError,
    },
}

impl BannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BannerError::NoMatch { .. } | BannerError::NotFound(_) => ErrorKind::NotFound,
            BannerError::UnknownTags(_) | BannerError::UnknownFeature(_) => {
                ErrorKind::ValidationFailed
            }
            BannerError::Conflict { .. } => ErrorKind::Conflict,
            BannerError::Repo { source, .. } => match source {
                RepoError::NotFound => ErrorKind::NotFound,
                RepoError::InvalidInput { .. } | RepoError::Integrity { .. } => {
                    ErrorKind::ValidationFailed
                }
                RepoError::Conflict => ErrorKind::Conflict,
                RepoError::Persistence(_) | RepoError::Timeout => ErrorKind::Internal,
            },
            BannerError::Cache { .. } => ErrorKind::Internal,
        }
    }

    fn repo(operation: &'static str) -> impl FnOnce(RepoError) -> Self {
        move |source| Self::Repo { operation, source }
    }

    fn cache(operation: &'static str) -> impl FnOnce(CacheError) -> Self {
        move |source| Self::Cache { operation, source }
    }
}

/// How the engine treats cache failures on the read path.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePolicy {
    /// Fail the read when populating the cache fails. Off by default: the failure is
    /// logged and counted, and the content read from the store is still returned.
    pub strict_writes: bool,
}

#[derive(Clone)]
pub struct BannerService {
    store: Arc<dyn BannerStore>,
    cache: Arc<dyn BannerCache>,
    policy: CachePolicy,
}

impl BannerService {
    pub fn new(store: Arc<dyn BannerStore>, cache: Arc<dyn BannerCache>) -> Self {
        Self {
            store,
            cache,
            policy: CachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Content of the banner visible for `(tag_id, feature_id)`.
    ///
    /// `use_last_revision` skips the cache entirely. Otherwise a cache hit is returned
    /// as is; on a miss the store is read and active content is written back.
    #[instrument(skip(self), target = "bannerd::banners")]
    pub async fn resolve_one(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        use_last_revision: bool,
        is_privileged: bool,
    ) -> Result<Content, BannerError> {
        if use_last_revision {
            let resolved = self
                .resolve_from_store(tag_id, feature_id, is_privileged)
                .await?;
            return Ok(resolved.content);
        }

        let cached = self
            .cache
            .get(tag_id, feature_id)
            .await
            .map_err(BannerError::cache("resolve_one.cache_get"))?;

        if let Some(content) = cached {
            counter!(METRIC_CACHE_HIT).increment(1);
            debug!(target: TARGET, tag_id, feature_id, "cache hit");
            return Ok(content);
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        let resolved = self
            .resolve_from_store(tag_id, feature_id, is_privileged)
            .await?;

        if resolved.is_active {
            if let Err(err) = self.cache.set(tag_id, feature_id, &resolved.content).await {
                counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
                if self.policy.strict_writes {
                    return Err(BannerError::cache("resolve_one.cache_set")(err));
                }
                warn!(
                    target: TARGET,
                    tag_id,
                    feature_id,
                    error = %err,
                    "failed to populate banner cache"
                );
            }
        }

        Ok(resolved.content)
    }

    async fn resolve_from_store(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        include_inactive: bool,
    ) -> Result<ResolvedContent, BannerError> {
        self.store
            .resolve_one(tag_id, feature_id, include_inactive)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => BannerError::NoMatch { tag_id, feature_id },
                other => BannerError::repo("resolve_one.store")(other),
            })
    }

    /// Banners matching the filter. Zero-valued fields leave that dimension unfiltered.
    #[instrument(skip(self), target = "bannerd::banners")]
    pub async fn list(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        limit: i64,
        offset: i64,
        is_privileged: bool,
    ) -> Result<Vec<Banner>, BannerError> {
        let filter = BannerFilter {
            tag_id,
            feature_id,
            limit,
            offset,
            include_inactive: is_privileged,
        };

        self.store
            .list(&filter)
            .await
            .map_err(BannerError::repo("list"))
    }

    #[instrument(skip_all, target = "bannerd::banners", fields(feature_id = banner.feature_id))]
    pub async fn create(&self, banner: NewBanner) -> Result<BannerId, BannerError> {
        let banner = banner.normalized();

        self.ensure_tags_exist("create.tags_exist", &banner.tag_ids)
            .await?;
        self.ensure_feature_exists("create.feature_exists", banner.feature_id)
            .await?;

        let id = self
            .store
            .create(&banner)
            .await
            .map_err(BannerError::repo("create"))?;

        debug!(target: TARGET, banner_id = id, "banner created");
        Ok(id)
    }

    /// Merge `patch` onto the stored banner and persist the result.
    ///
    /// The write is conditional on the version read at the start of the call, so a
    /// concurrent update between the read and the write yields `Conflict` instead of
    /// silently discarding the other writer's changes.
    #[instrument(skip_all, target = "bannerd::banners", fields(banner_id = patch.id))]
    pub async fn update(&self, patch: BannerPatch) -> Result<(), BannerError> {
        let id = patch.id;
        let current = self.store.find_by_id(id).await.map_err(|err| match err {
            RepoError::NotFound => BannerError::NotFound(id),
            other => BannerError::repo("update.find_by_id")(other),
        })?;

        if let Some(expected) = patch.expected_version {
            if expected != current.version {
                return Err(BannerError::Conflict { id });
            }
        }

        if let Some(tags) = patch.replacement_tags() {
            self.ensure_tags_exist("update.tags_exist", tags).await?;
        }

        if let Some(feature_id) = patch.replacement_feature() {
            self.ensure_feature_exists("update.feature_exists", feature_id)
                .await?;
        }

        let merged = patch.merge_onto(&current);

        self.store
            .update(&merged, current.version)
            .await
            .map_err(|err| match err {
                RepoError::Conflict => BannerError::Conflict { id },
                RepoError::NotFound => BannerError::NotFound(id),
                other => BannerError::repo("update")(other),
            })?;

        debug!(target: TARGET, banner_id = id, "banner updated");
        Ok(())
    }

    #[instrument(skip(self), target = "bannerd::banners")]
    pub async fn delete(&self, id: BannerId) -> Result<(), BannerError> {
        self.store.delete(id).await.map_err(|err| match err {
            RepoError::NotFound => BannerError::NotFound(id),
            other => BannerError::repo("delete")(other),
        })?;

        debug!(target: TARGET, banner_id = id, "banner deleted");
        Ok(())
    }

    #[instrument(skip(self), target = "bannerd::banners")]
    pub async fn health(&self) -> Result<(), BannerError> {
        self.store.ping().await.map_err(BannerError::repo("health"))
    }

    async fn ensure_tags_exist(
        &self,
        operation: &'static str,
        tag_ids: &[TagId],
    ) -> Result<(), BannerError> {
        let exist = self
            .store
            .tags_exist(tag_ids)
            .await
            .map_err(BannerError::repo(operation))?;
        if !exist {
            return Err(BannerError::UnknownTags(tag_ids.to_vec()));
        }
        Ok(())
    }

    async fn ensure_feature_exists(
        &self,
        operation: &'static str,
        feature_id: FeatureId,
    ) -> Result<(), BannerError> {
        let exists = self
            .store
            .feature_exists(feature_id)
            .await
            .map_err(BannerError::repo(operation))?;
        if !exists {
            return Err(BannerError::UnknownFeature(feature_id));
        }
        Ok(())
    }
}
