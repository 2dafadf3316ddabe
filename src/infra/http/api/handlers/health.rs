use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::ErrorReport;
use crate::infra::http::api::error::{ApiError, codes};
use crate::infra::http::api::state::ApiState;

pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    match state.banners.health().await {
        Ok(()) => Ok(StatusCode::OK),
        Err(err) => {
            let report = ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            );
            Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::UNAVAILABLE,
                "store is unavailable",
                None,
            )
            .with_report(report))
        }
    }
}
