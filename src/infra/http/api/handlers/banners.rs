use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::domain::types::{BannerId, UNSET_ID};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Caller;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

use super::{json_to_api, path_to_api, query_to_api};

pub async fn resolve_banner(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(query_to_api)?;

    let content = state
        .banners
        .resolve_one(
            query.tag_id,
            query.feature_id,
            query.use_last_revision,
            caller.is_privileged(),
        )
        .await?;

    Ok(Json(content))
}

pub async fn list_banners(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<BannerListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(query_to_api)?;

    let banners = state
        .banners
        .list(
            query.tag_id.unwrap_or(UNSET_ID),
            query.feature_id.unwrap_or(UNSET_ID),
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            query.offset.unwrap_or(0),
            caller.is_privileged(),
        )
        .await?;

    let body: Vec<BannerResponse> = banners.into_iter().map(BannerResponse::from).collect();
    Ok(Json(body))
}

pub async fn create_banner(
    State(state): State<ApiState>,
    payload: Result<Json<BannerCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(json_to_api)?;

    let banner_id = state.banners.create(payload.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(BannerCreatedResponse { banner_id }),
    ))
}

pub async fn update_banner(
    State(state): State<ApiState>,
    id: Result<Path<BannerId>, PathRejection>,
    payload: Result<Json<BannerUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(path_to_api)?;
    let Json(payload) = payload.map_err(json_to_api)?;

    if payload.is_empty() {
        return Err(ApiError::bad_request(
            "request body has no fields to update",
            None,
        ));
    }

    state.banners.update(payload.into_patch(id)).await?;

    Ok(StatusCode::OK)
}

pub async fn delete_banner(
    State(state): State<ApiState>,
    id: Result<Path<BannerId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id.map_err(path_to_api)?;

    state.banners.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
