//! Unread badge counts, polled by clients to reconcile their UI.

use super::ApiError;
use crate::messaging::UnreadCounts;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use readclub_messaging::UserId;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/unread/:user_id", get(unread_counts))
}

async fn unread_counts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UnreadCounts>, ApiError> {
    let counts = state.unread().counts_for(UserId::new(user_id)).await?;
    Ok(Json(counts))
}
