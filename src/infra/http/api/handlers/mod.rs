//! API handlers.
//!
//! Request extraction failures are mapped to the shared JSON error body here so
//! every 4xx response carries the same shape.

mod banners;
mod health;

pub use banners::*;
pub use health::*;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};

use super::error::ApiError;

pub(super) fn query_to_api(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request("invalid query parameters", Some(rejection.body_text()))
}

pub(super) fn json_to_api(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("invalid request body", Some(rejection.body_text()))
}

pub(super) fn path_to_api(rejection: PathRejection) -> ApiError {
    ApiError::bad_request("invalid banner id", Some(rejection.body_text()))
}
