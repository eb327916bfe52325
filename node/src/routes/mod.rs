pub mod clubs;
pub mod conversations;
pub mod health;
pub mod unread;
pub mod ws;

use crate::messaging::PipelineError;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(conversations::routes())
        .merge(clubs::routes())
        .merge(unread::routes())
        .merge(ws::routes())
        .with_state(state)
}

/// Pipeline errors mapped onto HTTP statuses. Storage failures are logged
/// here and surfaced as a generic server error; the client resubmits.
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PipelineError::ConversationNotFound(_)
            | PipelineError::ClubNotFound(_)
            | PipelineError::MessageNotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            PipelineError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            PipelineError::Storage(detail) => {
                error!(%detail, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::NodeStorage;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            build_id: "test-build".into(),
            storage_path: PathBuf::new(),
        };
        AppState::new(config, NodeStorage::temporary().unwrap())
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_build_and_storage_state() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "readclub-node");
        assert_eq!(json["build_id"], "test-build");
        assert_eq!(json["conversations"], 0);
    }

    #[tokio::test]
    async fn direct_message_flow_creates_conversation_and_unread() {
        let state = test_state();
        let app = router(Arc::clone(&state));

        let send = post(
            "/conversations/messages",
            json!({
                "senderId": "alice",
                "recipientId": "bob",
                "senderName": "Alice",
                "content": "did you finish chapter 4?"
            }),
        );
        let response = app.clone().oneshot(send).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let sent = body_json(response).await;
        assert_eq!(sent["message"]["sender"], "alice");
        let conversation_id = sent["conversationId"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(Request::get("/unread/bob").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let counts = body_json(response).await;
        assert_eq!(counts["direct"], 1);
        assert_eq!(counts["clubs"], 0);

        let response = app
            .clone()
            .oneshot(post(
                &format!("/conversations/{conversation_id}/read"),
                json!({ "userId": "bob" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(Request::get("/unread/bob").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let counts = body_json(response).await;
        assert_eq!(counts["direct"], 0);
    }

    #[tokio::test]
    async fn empty_direct_message_is_unprocessable() {
        let app = router(test_state());
        let response = app
            .oneshot(post(
                "/conversations/messages",
                json!({
                    "senderId": "alice",
                    "recipientId": "bob",
                    "senderName": "Alice",
                    "content": "  "
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn club_flow_posts_and_marks_read() {
        let app = router(test_state());

        let response = app
            .clone()
            .oneshot(post(
                "/clubs",
                json!({
                    "clubId": "mystery",
                    "name": "Mystery Readers",
                    "members": ["alice", "bob"],
                    "admins": ["alice"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Duplicate ids are rejected.
        let response = app
            .clone()
            .oneshot(post(
                "/clubs",
                json!({
                    "clubId": "mystery",
                    "name": "Mystery Readers",
                    "members": [],
                    "admins": []
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post(
                "/clubs/mystery/messages",
                json!({
                    "senderId": "alice",
                    "senderName": "Alice",
                    "content": "meeting moved to thursday"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::get("/clubs/mystery/messages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let messages = body_json(response).await;
        assert_eq!(messages.as_array().unwrap().len(), 1);

        let response = app
            .oneshot(post("/clubs/mystery/read", json!({ "userId": "bob" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_club_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(post(
                "/clubs/ghost/messages",
                json!({
                    "senderId": "alice",
                    "senderName": "Alice",
                    "content": "hello?"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
