//! Club endpoints: provisioning, message log, posting, read markers.

use super::ApiError;
use crate::presence::RoomId;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use readclub_messaging::events::ServerEvent;
use readclub_messaging::{Club, ClubId, Message, UserId};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clubs", post(create_club))
        .route(
            "/clubs/:club_id/messages",
            get(list_messages).post(post_message),
        )
        .route("/clubs/:club_id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateClubBody {
    club_id: ClubId,
    name: String,
    #[serde(default)]
    members: BTreeSet<UserId>,
    #[serde(default)]
    admins: BTreeSet<UserId>,
}

async fn create_club(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateClubBody>,
) -> Result<StatusCode, ApiError> {
    let club = Club::new(body.club_id, body.name, body.members, body.admins);
    let created = state.pipeline().create_club(club).await?;
    if created {
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::CONFLICT)
    }
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(club_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state.pipeline().club_messages(ClubId::new(club_id)).await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostMessageBody {
    sender_id: UserId,
    sender_name: String,
    content: String,
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(club_id): Path<String>,
    Json(body): Json<PostMessageBody>,
) -> Result<Json<Message>, ApiError> {
    let club_id = ClubId::new(club_id);
    let message = state
        .pipeline()
        .post_club_message(
            club_id.clone(),
            body.sender_id,
            body.sender_name,
            body.content,
        )
        .await?;

    // Broadcast to every connection in the club room, the author included;
    // clients render their own message from the echo.
    state
        .rooms()
        .broadcast(
            &RoomId::club(&club_id),
            ServerEvent::ClubMessage {
                club_id: club_id.clone(),
                message: message.clone(),
            },
        )
        .await;

    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadBody {
    user_id: UserId,
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(club_id): Path<String>,
    Json(body): Json<MarkReadBody>,
) -> Result<StatusCode, ApiError> {
    state
        .pipeline()
        .mark_club_read(ClubId::new(club_id), body.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
