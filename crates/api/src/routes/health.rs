use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint. No auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let session = state.engine.session().await;
    Json(json!({
        "status": "ok",
        "pairs": session.pairs().len(),
        "auto_trading": session.auto_trading(),
    }))
}
