use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, types::Json};
use time::OffsetDateTime;

use crate::application::repos::{BannerFilter, BannerStore, RepoError, ResolvedContent};
use crate::domain::entities::{Banner, NewBanner, normalize_tag_ids};
use crate::domain::types::{BannerId, Content, FeatureId, TagId, is_unset};

use super::{PostgresRepositories, map_sqlx_error};

const BANNER_COLUMNS: &str = "b.banner_id, \
    ARRAY(SELECT bt.tag_id FROM banner_tags bt WHERE bt.banner_id = b.banner_id ORDER BY bt.tag_id) AS tag_ids, \
    b.feature_id, b.content, b.active, b.version, b.created_at, b.updated_at";

#[derive(sqlx::FromRow)]
struct BannerRow {
    banner_id: i64,
    tag_ids: Vec<i64>,
    feature_id: i64,
    content: Json<Content>,
    active: bool,
    version: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BannerRow> for Banner {
    fn from(row: BannerRow) -> Self {
        Self {
            id: row.banner_id,
            tag_ids: row.tag_ids,
            feature_id: row.feature_id,
            content: row.content.0,
            is_active: row.active,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResolvedRow {
    content: Json<Content>,
    active: bool,
}

#[async_trait]
impl BannerStore for PostgresRepositories {
    async fn find_by_id(&self, id: BannerId) -> Result<Banner, RepoError> {
        let row = sqlx::query_as::<_, BannerRow>(&format!(
            "SELECT {BANNER_COLUMNS} FROM banners b WHERE b.banner_id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(Banner::from).ok_or(RepoError::NotFound)
    }

    async fn resolve_one(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        include_inactive: bool,
    ) -> Result<ResolvedContent, RepoError> {
        let row = sqlx::query_as::<_, ResolvedRow>(
            r#"
            SELECT b.content, b.active
            FROM banners b
            INNER JOIN banner_tags bt ON bt.banner_id = b.banner_id
            WHERE bt.tag_id = $1
              AND b.feature_id = $2
              AND (b.active OR $3)
            ORDER BY b.updated_at ASC, b.banner_id ASC
            LIMIT 1
            "#,
        )
        .bind(tag_id)
        .bind(feature_id)
        .bind(include_inactive)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| ResolvedContent {
            content: row.content.0,
            is_active: row.active,
        })
        .ok_or(RepoError::NotFound)
    }

    async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, RepoError> {
        if filter.limit < 0 || filter.offset < 0 {
            return Err(RepoError::invalid_input(
                "limit and offset must not be negative",
            ));
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {BANNER_COLUMNS} FROM banners b WHERE (b.active OR "
        ));
        qb.push_bind(filter.include_inactive);
        qb.push(")");

        if !is_unset(filter.tag_id) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM banner_tags bt WHERE bt.banner_id = b.banner_id AND bt.tag_id = ",
            );
            qb.push_bind(filter.tag_id);
            qb.push(")");
        }

        if !is_unset(filter.feature_id) {
            qb.push(" AND b.feature_id = ");
            qb.push_bind(filter.feature_id);
        }

        qb.push(" ORDER BY b.banner_id");

        if filter.limit != 0 {
            qb.push(" LIMIT ");
            qb.push_bind(filter.limit);
        }

        if filter.offset != 0 {
            qb.push(" OFFSET ");
            qb.push_bind(filter.offset);
        }

        let rows = qb
            .build_query_as::<BannerRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Banner::from).collect())
    }

    async fn create(&self, banner: &NewBanner) -> Result<BannerId, RepoError> {
        let now = OffsetDateTime::now_utc();
        let content = encode_content(&banner.content)?;
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO banners (feature_id, content, active, version, created_at, updated_at)
            VALUES ($1, CAST($2 AS JSON), $3, 1, $4, $4)
            RETURNING banner_id
            "#,
        )
        .bind(banner.feature_id)
        .bind(content)
        .bind(banner.is_active)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        insert_tags(&mut tx, id, &banner.tag_ids).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(id)
    }

    async fn update(&self, banner: &Banner, expected_version: i64) -> Result<(), RepoError> {
        let now = OffsetDateTime::now_utc();
        let content = encode_content(&banner.content)?;
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // The row update runs first so its row lock serializes writers of the same banner.
        let updated = sqlx::query(
            r#"
            UPDATE banners
            SET feature_id = $2,
                content = CAST($3 AS JSON),
                active = $4,
                version = version + 1,
                updated_at = $5
            WHERE banner_id = $1 AND version = $6
            "#,
        )
        .bind(banner.id)
        .bind(banner.feature_id)
        .bind(content)
        .bind(banner.is_active)
        .bind(now)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if updated == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM banners WHERE banner_id = $1)")
                    .bind(banner.id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            return Err(if exists {
                RepoError::Conflict
            } else {
                RepoError::NotFound
            });
        }

        sqlx::query("DELETE FROM banner_tags WHERE banner_id = $1")
            .bind(banner.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        insert_tags(&mut tx, banner.id, &banner.tag_ids).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete(&self, id: BannerId) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM banner_tags WHERE banner_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let deleted = sqlx::query("DELETE FROM banners WHERE banner_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if deleted == 0 {
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn tags_exist(&self, tag_ids: &[TagId]) -> Result<bool, RepoError> {
        if tag_ids.is_empty() {
            return Err(RepoError::invalid_input("tag set must not be empty"));
        }

        let unique = normalize_tag_ids(tag_ids.to_vec());
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT tag_id) FROM tags WHERE tag_id = ANY($1)")
                .bind(unique.as_slice())
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(usize::try_from(count).is_ok_and(|count| count == unique.len()))
    }

    async fn feature_exists(&self, feature_id: FeatureId) -> Result<bool, RepoError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM features WHERE feature_id = $1)")
            .bind(feature_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}

/// Bound as text and cast to `json` so the stored document keeps its key order.
fn encode_content(content: &Content) -> Result<String, RepoError> {
    serde_json::to_string(content).map_err(|err| RepoError::invalid_input(err.to_string()))
}

async fn insert_tags(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    banner_id: BannerId,
    tag_ids: &[TagId],
) -> Result<(), RepoError> {
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO banner_tags (banner_id, tag_id) VALUES ($1, $2)")
            .bind(banner_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
    }
    Ok(())
}
