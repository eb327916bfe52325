//! Connection registry: the volatile user → connection mapping that defines
//! "online". At most one live entry per user; a newer connection for the
//! same user supersedes the old one, and the caller is expected to evict it.

use readclub_messaging::{events::ServerEvent, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Handle to one live realtime connection. Events pushed through `sender`
/// are drained into the socket by the connection's forwarder task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            sender,
        }
    }

    /// Push an event to the connection. A closed channel means the
    /// connection is gone; that is a legitimate state, not an error.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn sender(&self) -> &mpsc::UnboundedSender<ServerEvent> {
        &self.sender
    }
}

/// Concurrency-safe online-user table. The raw map is never exposed; all
/// access goes through register/unregister/snapshot.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    online: Arc<RwLock<HashMap<UserId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the mapping for `user_id`. Returns the superseded
    /// handle when the user already had a live connection; the caller must
    /// evict it (notify, drop its room memberships).
    pub async fn register(
        &self,
        user_id: UserId,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.online.write().await.insert(user_id, handle)
    }

    /// Remove the entry owning `conn_id`, found by reverse scan. Returns the
    /// user that went offline, or `None` when the handle was already
    /// superseded by a newer connection (a no-op by design).
    pub async fn unregister(&self, conn_id: Uuid) -> Option<UserId> {
        let mut online = self.online.write().await;
        let user = online
            .iter()
            .find(|(_, handle)| handle.conn_id == conn_id)
            .map(|(user, _)| user.clone());
        if let Some(user) = &user {
            online.remove(user);
        }
        user
    }

    /// Full online-user snapshot, sorted for stable output.
    pub async fn snapshot(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.online.read().await.keys().cloned().collect();
        users.sort();
        users
    }

    /// The registered connection for a user, if any.
    pub async fn connection(&self, user_id: &UserId) -> Option<ConnectionHandle> {
        self.online.read().await.get(user_id).cloned()
    }

    /// Every live connection handle, for snapshot fan-out.
    pub async fn handles(&self) -> Vec<ConnectionHandle> {
        self.online.read().await.values().cloned().collect()
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.online.read().await.contains_key(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn snapshot_tracks_registrations_and_unregistrations() {
        let registry = ConnectionRegistry::new();

        let (alice_conn, _rx_a) = handle();
        let (bob_conn, _rx_b) = handle();
        let (carol_conn, _rx_c) = handle();

        registry.register(UserId::new("alice"), alice_conn).await;
        registry.register(UserId::new("bob"), bob_conn.clone()).await;
        registry.register(UserId::new("carol"), carol_conn).await;

        registry.unregister(bob_conn.conn_id).await;

        assert_eq!(
            registry.snapshot().await,
            vec![UserId::new("alice"), UserId::new("carol")]
        );
    }

    #[tokio::test]
    async fn register_overwrites_and_returns_superseded_handle() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = handle();
        let (second, _rx2) = handle();

        assert!(registry
            .register(UserId::new("alice"), first.clone())
            .await
            .is_none());

        let superseded = registry
            .register(UserId::new("alice"), second.clone())
            .await
            .unwrap();
        assert_eq!(superseded.conn_id, first.conn_id);

        // One entry per user, owned by the newest connection.
        assert_eq!(registry.snapshot().await, vec![UserId::new("alice")]);
        let current = registry.connection(&UserId::new("alice")).await.unwrap();
        assert_eq!(current.conn_id, second.conn_id);
    }

    #[tokio::test]
    async fn unregistering_a_superseded_handle_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = handle();
        let (second, _rx2) = handle();

        registry.register(UserId::new("alice"), first.clone()).await;
        registry.register(UserId::new("alice"), second).await;

        // The old handle no longer owns the entry.
        assert!(registry.unregister(first.conn_id).await.is_none());
        assert!(registry.is_online(&UserId::new("alice")).await);
    }
}
