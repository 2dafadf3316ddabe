pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use middleware::Caller;
pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch},
};

use crate::infra::http::middleware::log_responses;

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route("/api/v1/user_banner", get(handlers::resolve_banner))
        .route(
            "/api/v1/banner",
            get(handlers::list_banners).post(handlers::create_banner),
        )
        .route(
            "/api/v1/banner/{id}",
            patch(handlers::update_banner).delete(handlers::delete_banner),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ))
        .layer(axum_middleware::from_fn(log_responses))
}
