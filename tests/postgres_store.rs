//! Store coverage against a real Postgres.
//!
//! Marked `#[ignore]`; run with `DATABASE_URL` pointing at a disposable server:
//! `cargo test --test postgres_store -- --ignored`.

use serde_json::{Value, json};
use sqlx::PgPool;

use bannerd::application::repos::{BannerFilter, BannerStore, RepoError};
use bannerd::domain::entities::{Banner, NewBanner};
use bannerd::domain::types::Content;
use bannerd::infra::db::PostgresRepositories;

fn content(value: Value) -> Content {
    value.as_object().cloned().expect("object literal")
}

async fn seeded(pool: PgPool) -> PostgresRepositories {
    sqlx::query("INSERT INTO tags (tag_id) SELECT generate_series(1, 5)")
        .execute(&pool)
        .await
        .expect("seed tags");
    sqlx::query("INSERT INTO features (feature_id) VALUES (10), (20)")
        .execute(&pool)
        .await
        .expect("seed features");
    PostgresRepositories::new(pool)
}

fn new_banner(tag_ids: &[i64], feature_id: i64, body: Value, active: bool) -> NewBanner {
    NewBanner {
        tag_ids: tag_ids.to_vec(),
        feature_id,
        content: content(body),
        is_active: active,
    }
}

async fn association_count(repos: &PostgresRepositories) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM banner_tags")
        .fetch_one(repos.pool())
        .await
        .expect("count associations")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn create_and_find_round_trip(pool: PgPool) {
    let repos = seeded(pool).await;
    let id = repos
        .create(&new_banner(&[1, 2], 10, json!({"b": 1, "a": [true, null]}), true))
        .await
        .expect("create");

    let banner = repos.find_by_id(id).await.expect("find");
    assert_eq!(banner.tag_ids, vec![1, 2]);
    assert_eq!(banner.feature_id, 10);
    assert_eq!(banner.version, 1);
    assert_eq!(
        banner.content.keys().collect::<Vec<_>>(),
        vec!["b", "a"],
        "key order survives json storage"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn failed_tag_insert_rolls_back_create(pool: PgPool) {
    let repos = seeded(pool).await;

    let err = repos
        .create(&new_banner(&[1, 404], 10, json!({}), true))
        .await
        .expect_err("unknown tag violates the foreign key");
    assert!(matches!(err, RepoError::InvalidInput { .. }));

    let banners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM banners")
        .fetch_one(repos.pool())
        .await
        .expect("count banners");
    assert_eq!(banners, 0);
    assert_eq!(association_count(&repos).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn update_is_versioned_and_replaces_tags(pool: PgPool) {
    let repos = seeded(pool).await;
    let id = repos
        .create(&new_banner(&[1, 2], 10, json!({"v": 1}), true))
        .await
        .expect("create");

    let mut banner = repos.find_by_id(id).await.expect("find");
    banner.tag_ids = vec![3];
    banner.content = content(json!({"v": 2}));
    repos.update(&banner, 1).await.expect("update");

    let updated = repos.find_by_id(id).await.expect("find");
    assert_eq!(updated.tag_ids, vec![3]);
    assert_eq!(updated.version, 2);
    assert!(updated.updated_at >= updated.created_at);

    let stale = repos.update(&banner, 1).await.expect_err("stale version");
    assert!(matches!(stale, RepoError::Conflict));

    banner.id = id + 1000;
    let missing = repos.update(&banner, 1).await.expect_err("missing row");
    assert!(matches!(missing, RepoError::NotFound));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn failed_update_keeps_previous_tags(pool: PgPool) {
    let repos = seeded(pool).await;
    let id = repos
        .create(&new_banner(&[1, 2], 10, json!({"v": 1}), true))
        .await
        .expect("create");

    let mut banner = repos.find_by_id(id).await.expect("find");
    banner.tag_ids = vec![3, 404];
    banner.content = content(json!({"v": 2}));
    repos
        .update(&banner, 1)
        .await
        .expect_err("unknown tag violates the foreign key");

    let unchanged = repos.find_by_id(id).await.expect("find");
    assert_eq!(unchanged.tag_ids, vec![1, 2]);
    assert_eq!(unchanged.content, content(json!({"v": 1})));
    assert_eq!(unchanged.version, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn resolve_and_list_respect_visibility(pool: PgPool) {
    let repos = seeded(pool).await;
    let first = repos
        .create(&new_banner(&[1], 10, json!({"n": 1}), false))
        .await
        .expect("create");
    let second = repos
        .create(&new_banner(&[1, 2], 10, json!({"n": 2}), true))
        .await
        .expect("create");
    repos
        .create(&new_banner(&[1], 20, json!({"n": 3}), true))
        .await
        .expect("create");

    let visible = repos.resolve_one(1, 10, false).await.expect("resolve");
    assert_eq!(visible.content, content(json!({"n": 2})));

    let any = repos.resolve_one(1, 10, true).await.expect("resolve");
    assert_eq!(any.content, content(json!({"n": 1})));
    assert!(!any.is_active);

    assert!(matches!(
        repos.resolve_one(3, 10, true).await,
        Err(RepoError::NotFound)
    ));

    let filter = BannerFilter {
        feature_id: 10,
        ..BannerFilter::default()
    };
    let listed = repos.list(&filter).await.expect("list");
    assert_eq!(
        listed.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![second]
    );

    let filter = BannerFilter {
        tag_id: 1,
        limit: 2,
        offset: 0,
        include_inactive: true,
        ..BannerFilter::default()
    };
    let listed = repos.list(&filter).await.expect("list");
    assert_eq!(
        listed.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![first, second]
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn list_pages_with_offset_alone_and_with_limit(pool: PgPool) {
    let repos = seeded(pool).await;
    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(
            repos
                .create(&new_banner(&[1], 10, json!({"n": n}), true))
                .await
                .expect("create"),
        );
    }

    let ids_of = |banners: Vec<Banner>| {
        banners.iter().map(|b| b.id).collect::<Vec<_>>()
    };

    let offset_only = BannerFilter {
        offset: 2,
        ..BannerFilter::default()
    };
    assert_eq!(
        ids_of(repos.list(&offset_only).await.expect("list")),
        ids[2..].to_vec()
    );

    let window = BannerFilter {
        limit: 2,
        offset: 1,
        ..BannerFilter::default()
    };
    assert_eq!(
        ids_of(repos.list(&window).await.expect("list")),
        ids[1..3].to_vec()
    );

    let past_end = BannerFilter {
        offset: 10,
        ..BannerFilter::default()
    };
    assert!(repos.list(&past_end).await.expect("list").is_empty());

    let negative = BannerFilter {
        offset: -1,
        ..BannerFilter::default()
    };
    assert!(matches!(
        repos.list(&negative).await,
        Err(RepoError::InvalidInput { .. })
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn delete_removes_associations(pool: PgPool) {
    let repos = seeded(pool).await;
    let id = repos
        .create(&new_banner(&[1, 2, 3], 10, json!({}), true))
        .await
        .expect("create");
    assert_eq!(association_count(&repos).await, 3);

    repos.delete(id).await.expect("delete");
    assert_eq!(association_count(&repos).await, 0);
    assert!(matches!(repos.delete(id).await, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn existence_checks(pool: PgPool) {
    let repos = seeded(pool).await;

    assert!(repos.tags_exist(&[1, 2, 2]).await.expect("tags"));
    assert!(!repos.tags_exist(&[1, 99]).await.expect("tags"));
    assert!(matches!(
        repos.tags_exist(&[]).await,
        Err(RepoError::InvalidInput { .. })
    ));
    assert!(repos.feature_exists(20).await.expect("feature"));
    assert!(!repos.feature_exists(30).await.expect("feature"));
    repos.ping().await.expect("ping");
}
