use serde::{Deserialize, Deserializer, Serialize, de};
use time::OffsetDateTime;

use crate::domain::entities::{Banner, BannerPatch, NewBanner};
use crate::domain::types::{BannerId, Content, FeatureId, TagId};

/// Page size applied when a list request omits `limit`.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub tag_id: TagId,
    pub feature_id: FeatureId,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub use_last_revision: bool,
}

/// Query flag accepting `1`/`0`, `t`/`f` and `true`/`false` in lower, upper or title case.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.as_str() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(de::Error::invalid_value(
            de::Unexpected::Str(other),
            &"a boolean flag",
        )),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BannerListQuery {
    pub tag_id: Option<TagId>,
    pub feature_id: Option<FeatureId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BannerResponse {
    pub banner_id: BannerId,
    pub tag_ids: Vec<TagId>,
    pub feature_id: FeatureId,
    pub content: Content,
    pub is_active: bool,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Banner> for BannerResponse {
    fn from(banner: Banner) -> Self {
        Self {
            banner_id: banner.id,
            tag_ids: banner.tag_ids,
            feature_id: banner.feature_id,
            content: banner.content,
            is_active: banner.is_active,
            version: banner.version,
            created_at: banner.created_at,
            updated_at: banner.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BannerCreateRequest {
    pub tag_ids: Vec<TagId>,
    pub feature_id: FeatureId,
    pub content: Content,
    pub is_active: bool,
}

impl From<BannerCreateRequest> for NewBanner {
    fn from(request: BannerCreateRequest) -> Self {
        Self {
            tag_ids: request.tag_ids,
            feature_id: request.feature_id,
            content: request.content,
            is_active: request.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BannerUpdateRequest {
    pub tag_ids: Option<Vec<TagId>>,
    pub feature_id: Option<FeatureId>,
    pub content: Option<Content>,
    pub is_active: Option<bool>,
    /// Reject the update unless the stored banner still has this version.
    pub version: Option<i64>,
}

impl BannerUpdateRequest {
    pub fn into_patch(self, id: BannerId) -> BannerPatch {
        BannerPatch {
            id,
            tag_ids: self.tag_ids,
            feature_id: self.feature_id,
            content: self.content,
            is_active: self.is_active,
            expected_version: self.version,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tag_ids.is_none()
            && self.feature_id.is_none()
            && self.content.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BannerCreatedResponse {
    pub banner_id: BannerId,
}
