//! Liveness endpoint. Touches storage so a wedged sled database surfaces as
//! a degraded status instead of a silently green check.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    build_id: String,
    conversations: Option<usize>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let conversations = match state.storage().conversation_count() {
        Ok(count) => Some(count),
        Err(err) => {
            warn!(%err, "storage check failed");
            None
        }
    };

    Json(HealthResponse {
        status: if conversations.is_some() { "ok" } else { "degraded" },
        service: "readclub-node",
        build_id: state.build_id().to_string(),
        conversations,
    })
}
