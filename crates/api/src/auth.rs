use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::AppState;

/// Whether `candidate` is the configured dashboard token. An absent token never matches.
pub(crate) fn token_matches(state: &AppState, candidate: Option<&str>) -> bool {
    candidate.is_some_and(|t| !t.is_empty() && t == state.dashboard_token)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub(crate) fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}

/// Bearer-token guard for the `/api/*` routes.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if token_matches(&state, bearer_token(&headers)) {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "Rejected request without valid dashboard token");
        unauthorized()
    }
}
