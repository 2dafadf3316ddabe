use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::state::ApiState;

pub const TOKEN_HEADER: &str = "token";

/// Who is calling, as established by the `token` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Admin,
    User,
}

impl Caller {
    /// Privileged callers see inactive banners.
    pub fn is_privileged(self) -> bool {
        matches!(self, Caller::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Caller::Admin => "admin",
            Caller::User => "user",
        }
    }
}

pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    let caller = match token {
        Some(token) if token == state.auth.admin_token => Caller::Admin,
        Some(token) if token == state.auth.user_token => Caller::User,
        _ => return ApiError::unauthorized().into_response(),
    };

    if caller == Caller::User && request.method() != Method::GET {
        return ApiError::forbidden().into_response();
    }

    request.extensions_mut().insert(caller);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(caller);
    response
}
