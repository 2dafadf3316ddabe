//! Port traits describing the banner store and the banner cache.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{Banner, NewBanner};
use crate::domain::types::{BannerId, Content, FeatureId, TagId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("record was modified concurrently")]
    Conflict,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Filter for [`BannerStore::list`].
///
/// A zero `tag_id`/`feature_id` disables that filter; a zero `limit`/`offset` means
/// no limit and no offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BannerFilter {
    pub tag_id: TagId,
    pub feature_id: FeatureId,
    pub limit: i64,
    pub offset: i64,
    pub include_inactive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContent {
    pub content: Content,
    pub is_active: bool,
}

/// Durable system of record for banners and their tag associations.
#[async_trait]
pub trait BannerStore: Send + Sync {
    async fn find_by_id(&self, id: BannerId) -> Result<Banner, RepoError>;

    /// The match with the earliest `updated_at` for the pair, or `NotFound`.
    async fn resolve_one(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        include_inactive: bool,
    ) -> Result<ResolvedContent, RepoError>;

    async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, RepoError>;

    /// Insert the banner and its tag associations atomically.
    async fn create(&self, banner: &NewBanner) -> Result<BannerId, RepoError>;

    /// Replace the banner row and its tag associations atomically.
    ///
    /// Fails with `Conflict` unless the stored version equals `expected_version`.
    async fn update(&self, banner: &Banner, expected_version: i64) -> Result<(), RepoError>;

    async fn delete(&self, id: BannerId) -> Result<(), RepoError>;

    /// True only if every id exists. An empty set is `InvalidInput`.
    async fn tags_exist(&self, tag_ids: &[TagId]) -> Result<bool, RepoError>;

    async fn feature_exists(&self, feature_id: FeatureId) -> Result<bool, RepoError>;

    /// Liveness probe for the backing store.
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Expiring content cache keyed by `(tag_id, feature_id)`.
#[async_trait]
pub trait BannerCache: Send + Sync {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get(&self, tag_id: TagId, feature_id: FeatureId)
    -> Result<Option<Content>, CacheError>;

    /// Store content under the pair, replacing any existing entry and resetting its TTL.
    async fn set(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        content: &Content,
    ) -> Result<(), CacheError>;
}
