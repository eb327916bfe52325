//! The realtime channel. One WebSocket per client; a reader loop dispatches
//! inbound events and a forwarder task drains this connection's outbound
//! channel into the socket.

use crate::presence::{ConnectionHandle, RoomId};
use crate::state::AppState;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use readclub_messaging::events::{ClientEvent, ServerEvent};
use readclub_messaging::UserId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection_loop(state, socket))
}

async fn connection_loop(state: Arc<AppState>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let handle = ConnectionHandle::new(tx);
    let conn_id = handle.conn_id;

    let mut forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let evicted = matches!(event, ServerEvent::Evicted);
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
            // A superseded connection is told once, then closed.
            if evicted {
                break;
            }
        }
    });

    let mut joined = false;
    loop {
        tokio::select! {
            _ = &mut forwarder => break,
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => dispatch(&state, &handle, &mut joined, event).await,
                        Err(err) => debug!(%err, "skipping malformed frame"),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%err, "websocket receive error");
                    break;
                }
            },
        }
    }

    // Unregister is a no-op when this connection was already superseded; the
    // snapshot is only re-broadcast when this connection owned the entry.
    let went_offline = state.registry().unregister(conn_id).await;
    state.rooms().leave_all(conn_id).await;
    if let Some(user_id) = went_offline {
        debug!(%user_id, "connection unregistered");
        state.events().broadcast_presence().await;
    }
    forwarder.abort();
}

/// Route one inbound event. A connection announces itself with `Join` before
/// anything else; events arriving earlier are dropped.
async fn dispatch(
    state: &Arc<AppState>,
    handle: &ConnectionHandle,
    joined: &mut bool,
    event: ClientEvent,
) {
    if !*joined && !matches!(event, ClientEvent::Join { .. }) {
        debug!("dropping event from a connection that never joined");
        return;
    }

    match event {
        ClientEvent::Join { user_id } => {
            *joined = true;
            join(state, handle, user_id).await;
        }
        ClientEvent::JoinRoom { room_id } => {
            // Club membership was already authorized against storage by the
            // caller issuing the join; this layer only tracks scope.
            state.rooms().join(RoomId::club_str(&room_id), handle).await;
        }
        ClientEvent::LeaveRoom { room_id } => {
            state
                .rooms()
                .leave(&RoomId::club_str(&room_id), handle.conn_id)
                .await;
        }
        ClientEvent::Typing(payload) => state.events().typing(handle.conn_id, payload).await,
        ClientEvent::StopTyping(payload) => {
            state.events().stop_typing(handle.conn_id, payload).await;
        }
        ClientEvent::MarkRead(payload) => state.events().mark_read(payload).await,
    }
}

/// Register presence and join the personal room. A previous connection for
/// the same user is explicitly evicted rather than silently orphaned.
async fn join(state: &Arc<AppState>, handle: &ConnectionHandle, user_id: UserId) {
    if let Some(superseded) = state
        .registry()
        .register(user_id.clone(), handle.clone())
        .await
    {
        if superseded.conn_id != handle.conn_id {
            superseded.send(ServerEvent::Evicted);
            state.rooms().leave_all(superseded.conn_id).await;
        }
    }

    state.rooms().join_personal(&user_id, handle).await;
    debug!(%user_id, "registered presence");
    state.events().broadcast_presence().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::NodeStorage;
    use std::path::PathBuf;

    fn test_state() -> Arc<AppState> {
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            build_id: "test-build".into(),
            storage_path: PathBuf::new(),
        };
        AppState::new(config, NodeStorage::temporary().unwrap())
    }

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn join_registers_and_broadcasts_the_snapshot() {
        let state = test_state();
        let (conn, mut rx) = handle();

        join(&state, &conn, UserId::new("alice")).await;

        assert!(state.registry().is_online(&UserId::new("alice")).await);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::OnlineUsers { users } if users == vec![UserId::new("alice")]
        ));
    }

    #[tokio::test]
    async fn a_second_join_evicts_the_previous_connection() {
        let state = test_state();
        let (first, mut first_rx) = handle();
        let (second, _second_rx) = handle();

        join(&state, &first, UserId::new("alice")).await;
        // Drain the snapshot from the first join.
        let _ = first_rx.try_recv();

        let mut joined = true;
        dispatch(
            &state,
            &first,
            &mut joined,
            ClientEvent::JoinRoom {
                room_id: "club-1".into(),
            },
        )
        .await;

        join(&state, &second, UserId::new("alice")).await;

        // Old connection is told it was superseded and loses its rooms.
        assert!(matches!(first_rx.try_recv().unwrap(), ServerEvent::Evicted));
        let delivered = state
            .rooms()
            .broadcast(&RoomId::club_str("club-1"), ServerEvent::Evicted)
            .await;
        assert_eq!(delivered, 0);

        // The registry now maps the user to the newer connection.
        let current = state
            .registry()
            .connection(&UserId::new("alice"))
            .await
            .unwrap();
        assert_eq!(current.conn_id, second.conn_id);
    }

    #[tokio::test]
    async fn events_before_join_are_dropped() {
        let state = test_state();
        let (conn, _rx) = handle();
        let mut joined = false;

        dispatch(
            &state,
            &conn,
            &mut joined,
            ClientEvent::JoinRoom {
                room_id: "club-1".into(),
            },
        )
        .await;

        // The room gained no member and the connection stays unjoined.
        let delivered = state
            .rooms()
            .broadcast(&RoomId::club_str("club-1"), ServerEvent::Evicted)
            .await;
        assert_eq!(delivered, 0);
        assert!(!joined);

        dispatch(
            &state,
            &conn,
            &mut joined,
            ClientEvent::Join {
                user_id: UserId::new("alice"),
            },
        )
        .await;
        assert!(joined);
        assert!(state.registry().is_online(&UserId::new("alice")).await);
    }

    #[tokio::test]
    async fn typing_dispatch_excludes_the_sender() {
        let state = test_state();
        let (alice_conn, mut alice_rx) = handle();
        let (bob_conn, mut bob_rx) = handle();

        join(&state, &alice_conn, UserId::new("alice")).await;
        join(&state, &bob_conn, UserId::new("bob")).await;
        for rx in [&mut alice_rx, &mut bob_rx] {
            while rx.try_recv().is_ok() {}
        }

        let (mut alice_joined, mut bob_joined) = (true, true);
        dispatch(
            &state,
            &alice_conn,
            &mut alice_joined,
            ClientEvent::JoinRoom {
                room_id: "club-1".into(),
            },
        )
        .await;
        dispatch(
            &state,
            &bob_conn,
            &mut bob_joined,
            ClientEvent::JoinRoom {
                room_id: "club-1".into(),
            },
        )
        .await;

        dispatch(
            &state,
            &alice_conn,
            &mut alice_joined,
            ClientEvent::Typing(readclub_messaging::events::TypingPayload {
                to: "club-1".into(),
                from_username: "Alice".into(),
                conversation_id: "club-1".into(),
                is_club: true,
            }),
        )
        .await;

        assert!(matches!(
            bob_rx.try_recv().unwrap(),
            ServerEvent::Typing(p) if p.from_username == "Alice"
        ));
        assert!(alice_rx.try_recv().is_err());
    }
}
