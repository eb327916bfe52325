//! Direct-message endpoints: fetch-or-create, send, react, mark read.

use super::ApiError;
use crate::messaging::SendDirectMessage;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use readclub_messaging::events::ServerEvent;
use readclub_messaging::{
    Attachment, Conversation, ConversationId, Message, ReplySnapshot, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations", post(fetch_or_create))
        .route("/conversations/messages", post(send_message))
        .route(
            "/conversations/:conversation_id/messages/:message_id/reactions",
            post(toggle_reaction),
        )
        .route("/conversations/:conversation_id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchConversationBody {
    user_id: UserId,
    counterpart_id: UserId,
}

async fn fetch_or_create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FetchConversationBody>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .pipeline()
        .fetch_or_create(body.user_id, body.counterpart_id)
        .await?;
    Ok(Json(conversation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody {
    sender_id: UserId,
    recipient_id: UserId,
    sender_name: String,
    #[serde(default)]
    content: String,
    attachment: Option<Attachment>,
    reply_to: Option<ReplySnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    conversation_id: ConversationId,
    message: Message,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let recipient = body.recipient_id.clone();
    let (conversation_id, message) = state
        .pipeline()
        .send_direct(SendDirectMessage {
            sender: body.sender_id,
            recipient: body.recipient_id,
            sender_name: body.sender_name,
            content: body.content,
            attachment: body.attachment,
            reply_to: body.reply_to,
        })
        .await?;

    // Realtime delivery to the recipient's personal room. An offline
    // recipient is a silent drop; they reconcile through unread counts.
    state
        .rooms()
        .send_to_user(
            &recipient,
            ServerEvent::NewMessage {
                conversation_id,
                message: message.clone(),
            },
        )
        .await;

    Ok(Json(SendMessageResponse {
        conversation_id,
        message,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleReactionBody {
    user_id: UserId,
    emoji: String,
}

async fn toggle_reaction(
    State(state): State<Arc<AppState>>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ToggleReactionBody>,
) -> Result<Json<Message>, ApiError> {
    let message = state
        .pipeline()
        .toggle_reaction(
            ConversationId(conversation_id),
            message_id,
            body.user_id,
            body.emoji,
        )
        .await?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadBody {
    user_id: UserId,
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<MarkReadBody>,
) -> Result<StatusCode, ApiError> {
    state
        .pipeline()
        .mark_conversation_read(ConversationId(conversation_id), body.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
