pub mod api;
mod middleware;

pub use api::{ApiState, Caller, build_api_router};
pub use middleware::RequestContext;

use axum::{Router, middleware as axum_middleware, routing::get};

/// Full application router: the authenticated banner API plus the unauthenticated health probe.
pub fn build_router(state: ApiState) -> Router {
    let health = Router::new()
        .route("/health", get(api::handlers::health))
        .with_state(state.clone());

    build_api_router(state)
        .merge(health)
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
