use std::fmt;

use crate::domain::types::{FeatureId, TagId};

const PREFIX: &str = "banner";

/// Cache key for the content resolved for one `(tag, feature)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BannerCacheKey {
    pub tag_id: TagId,
    pub feature_id: FeatureId,
}

impl BannerCacheKey {
    pub fn new(tag_id: TagId, feature_id: FeatureId) -> Self {
        Self { tag_id, feature_id }
    }
}

impl fmt::Display for BannerCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}:{}:{}", self.tag_id, self.feature_id)
    }
}
