//! Banner records and the partial-update merge rules.

use time::OffsetDateTime;

use crate::domain::types::{BannerId, Content, FeatureId, TagId, is_unset};

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub id: BannerId,
    pub tag_ids: Vec<TagId>,
    pub feature_id: FeatureId,
    pub content: Content,
    pub is_active: bool,
    /// Incremented by every successful update; guards read-modify-write cycles.
    pub version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Input for creating a banner. Every field is required.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBanner {
    pub tag_ids: Vec<TagId>,
    pub feature_id: FeatureId,
    pub content: Content,
    pub is_active: bool,
}

impl NewBanner {
    pub fn normalized(mut self) -> Self {
        self.tag_ids = normalize_tag_ids(self.tag_ids);
        self
    }
}

/// Partial update of an existing banner.
///
/// A field left as `None` keeps the persisted value. An empty `tag_ids` list and a
/// zero `feature_id` are treated the same as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BannerPatch {
    pub id: BannerId,
    pub tag_ids: Option<Vec<TagId>>,
    pub feature_id: Option<FeatureId>,
    pub content: Option<Content>,
    pub is_active: Option<bool>,
    /// When present, the update is rejected unless the stored version matches.
    pub expected_version: Option<i64>,
}

impl BannerPatch {
    pub fn new(id: BannerId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Tag set that replaces the current one, if the patch supplies any.
    pub fn replacement_tags(&self) -> Option<&[TagId]> {
        self.tag_ids
            .as_deref()
            .filter(|tags| !tags.is_empty())
    }

    /// Feature that replaces the current one, if the patch supplies a non-zero id.
    pub fn replacement_feature(&self) -> Option<FeatureId> {
        self.feature_id.filter(|id| !is_unset(*id))
    }

    /// Overlay the supplied fields onto `current`. Identity and timestamps are kept.
    pub fn merge_onto(self, current: &Banner) -> Banner {
        let tag_ids = match self.replacement_tags() {
            Some(tags) => normalize_tag_ids(tags.to_vec()),
            None => current.tag_ids.clone(),
        };
        let feature_id = self.replacement_feature().unwrap_or(current.feature_id);

        Banner {
            id: current.id,
            tag_ids,
            feature_id,
            content: self.content.unwrap_or_else(|| current.content.clone()),
            is_active: self.is_active.unwrap_or(current.is_active),
            version: current.version,
            created_at: current.created_at,
            updated_at: current.updated_at,
        }
    }
}

pub fn normalize_tag_ids(mut tag_ids: Vec<TagId>) -> Vec<TagId> {
    tag_ids.sort_unstable();
    tag_ids.dedup();
    tag_ids
}
