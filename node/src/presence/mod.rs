//! Presence layer: who is online, which rooms each connection is in, and
//! how ephemeral events are scoped. All state here is process-local and
//! volatile; it is rebuilt from scratch on restart.

mod registry;
mod rooms;
mod router;

pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use rooms::{RoomId, RoomMembership};
pub use router::EventRouter;
