//! Room membership: logical broadcast scopes that connections join and
//! leave. A room is either a user's personal inbox or a club room. No
//! authorization happens at this layer; callers validate membership against
//! storage before joining a connection to a club room.

use super::ConnectionHandle;
use readclub_messaging::{events::ServerEvent, ClubId, UserId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Identifier for a broadcast scope. Prefixed so user and club identifier
/// spaces can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    pub fn personal(user_id: &UserId) -> Self {
        Self(format!("user:{user_id}"))
    }

    /// Personal room addressed by a raw user id string off the wire.
    pub fn personal_str(user_id: &str) -> Self {
        Self(format!("user:{user_id}"))
    }

    pub fn club(club_id: &ClubId) -> Self {
        Self(format!("club:{club_id}"))
    }

    /// Club room addressed by a raw club id string off the wire.
    pub fn club_str(club_id: &str) -> Self {
        Self(format!("club:{club_id}"))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room membership tables. Independent of registry state: a connection may
/// sit in many rooms, and membership survives being superseded only until
/// the eviction path calls `leave_all`.
#[derive(Clone, Default)]
pub struct RoomMembership {
    rooms: Arc<RwLock<HashMap<RoomId, HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, room: RoomId, handle: &ConnectionHandle) {
        self.rooms
            .write()
            .await
            .entry(room)
            .or_default()
            .insert(handle.conn_id, handle.sender().clone());
    }

    /// Joins the user's personal room, letting other components address the
    /// user directly regardless of which physical connection they hold.
    pub async fn join_personal(&self, user_id: &UserId, handle: &ConnectionHandle) {
        self.join(RoomId::personal(user_id), handle).await;
    }

    pub async fn leave(&self, room: &RoomId, conn_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Drop the connection from every room. Used on disconnect and on
    /// eviction of a superseded connection.
    pub async fn leave_all(&self, conn_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Deliver an event to every connection in the room. An empty or absent
    /// room is a silent drop. Returns the number of connections reached.
    pub async fn broadcast(&self, room: &RoomId, event: ServerEvent) -> usize {
        self.fan_out(room, None, event).await
    }

    /// Deliver to every connection in the room except `exclude` (the
    /// sender's own connection, for typing-style relays).
    pub async fn broadcast_except(
        &self,
        room: &RoomId,
        exclude: Uuid,
        event: ServerEvent,
    ) -> usize {
        self.fan_out(room, Some(exclude), event).await
    }

    /// Deliver to a user's personal room.
    pub async fn send_to_user(&self, user_id: &UserId, event: ServerEvent) -> usize {
        self.broadcast(&RoomId::personal(user_id), event).await
    }

    async fn fan_out(&self, room: &RoomId, exclude: Option<Uuid>, event: ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for (conn_id, sender) in members {
            if Some(*conn_id) == exclude {
                continue;
            }
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    #[cfg(test)]
    pub async fn member_count(&self, room: &RoomId) -> usize {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|members| members.len())
            .unwrap_or(0)
    }
}
