//! Routing for ephemeral events: typing indicators and read hints. Nothing
//! here is persisted or retried; a relay with no live recipients is dropped.

use super::{ConnectionRegistry, RoomId, RoomMembership};
use readclub_messaging::events::{MarkReadPayload, ServerEvent, TypingPayload};
use tracing::debug;
use uuid::Uuid;

/// Stateless fan-out of ephemeral events to their scoped audience.
#[derive(Clone)]
pub struct EventRouter {
    registry: ConnectionRegistry,
    rooms: RoomMembership,
}

impl EventRouter {
    pub fn new(registry: ConnectionRegistry, rooms: RoomMembership) -> Self {
        Self { registry, rooms }
    }

    /// Push the full online snapshot to every live connection.
    pub async fn broadcast_presence(&self) {
        let users = self.registry.snapshot().await;
        for handle in self.registry.handles().await {
            handle.send(ServerEvent::OnlineUsers {
                users: users.clone(),
            });
        }
    }

    /// Relay a typing indicator to the target room, excluding the sender's
    /// own connection.
    pub async fn typing(&self, sender_conn: Uuid, payload: TypingPayload) {
        let room = Self::target_room(&payload);
        let delivered = self
            .rooms
            .broadcast_except(&room, sender_conn, ServerEvent::Typing(payload))
            .await;
        debug!(%room, delivered, "relayed typing event");
    }

    /// Relay a stop-typing indicator, same scoping as `typing`.
    pub async fn stop_typing(&self, sender_conn: Uuid, payload: TypingPayload) {
        let room = Self::target_room(&payload);
        let delivered = self
            .rooms
            .broadcast_except(&room, sender_conn, ServerEvent::StopTyping(payload))
            .await;
        debug!(%room, delivered, "relayed stop-typing event");
    }

    /// Relay a read hint to the counterpart's personal room. UI signal only;
    /// read markers are mutated through the pipeline, not here.
    pub async fn mark_read(&self, payload: MarkReadPayload) {
        let counterpart = payload.to.clone();
        self.rooms
            .send_to_user(&counterpart, ServerEvent::MessageRead(payload))
            .await;
    }

    fn target_room(payload: &TypingPayload) -> RoomId {
        if payload.is_club {
            RoomId::club_str(&payload.to)
        } else {
            RoomId::personal_str(&payload.to)
        }
    }
}
