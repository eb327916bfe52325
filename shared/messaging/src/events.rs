//! Wire events for the realtime channel. JSON-encoded, tagged by `event`.

use crate::{ClubId, ConversationId, Message, UserId};
use serde::{Deserialize, Serialize};

/// Typing indicator payload, relayed verbatim. `to` is the target room: a
/// club id when `is_club` is set, the counterpart's user id otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub to: String,
    pub from_username: String,
    pub conversation_id: String,
    pub is_club: bool,
}

/// Read hint relayed to the counterpart's personal room so their UI can show
/// "seen". Carries no durable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    pub to: UserId,
    pub from_id: UserId,
    pub conversation_id: ConversationId,
}

/// Events a client sends over its connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Registers presence and joins the user's personal room. Must be the
    /// first event on a fresh connection.
    #[serde(rename_all = "camelCase")]
    Join { user_id: UserId },

    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },

    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },

    Typing(TypingPayload),

    StopTyping(TypingPayload),

    MarkRead(MarkReadPayload),
}

/// Events the server pushes to connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full online snapshot, sent to every connection on each presence
    /// change. A snapshot, not a diff.
    OnlineUsers { users: Vec<UserId> },

    Typing(TypingPayload),

    StopTyping(TypingPayload),

    MessageRead(MarkReadPayload),

    /// A direct message delivered to the recipient's personal room.
    #[serde(rename_all = "camelCase")]
    NewMessage {
        conversation_id: ConversationId,
        message: Message,
    },

    /// A club message broadcast to the club room.
    #[serde(rename_all = "camelCase")]
    ClubMessage { club_id: ClubId, message: Message },

    /// Sent to a connection that was superseded by a newer one for the same
    /// user, just before its channel closes.
    Evicted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_camel_case_tags() {
        let event = ClientEvent::Typing(TypingPayload {
            to: "club-42".into(),
            from_username: "Alice".into(),
            conversation_id: "club-42".into(),
            is_club: true,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "typing");
        assert_eq!(json["fromUsername"], "Alice");
        assert_eq!(json["isClub"], true);
    }

    #[test]
    fn join_round_trips() {
        let json = r#"{"event":"join","userId":"user-1"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::Join { user_id } if user_id == UserId::new("user-1")));
    }

    #[test]
    fn online_users_snapshot_serializes_as_array() {
        let event = ServerEvent::OnlineUsers {
            users: vec![UserId::new("a"), UserId::new("b")],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "onlineUsers");
        assert_eq!(json["users"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn mark_read_round_trips() {
        let payload = MarkReadPayload {
            to: UserId::new("bob"),
            from_id: UserId::new("alice"),
            conversation_id: ConversationId::new(),
        };
        let encoded = serde_json::to_string(&ClientEvent::MarkRead(payload.clone())).unwrap();
        let decoded: ClientEvent = serde_json::from_str(&encoded).unwrap();
        assert!(matches!(decoded, ClientEvent::MarkRead(p) if p == payload));
    }
}
