use crate::config::AppConfig;
use crate::messaging::{MessagePipeline, UnreadAggregator};
use crate::presence::{ConnectionRegistry, EventRouter, RoomMembership};
use crate::storage::NodeStorage;
use std::sync::Arc;

/// Shared service state: configuration plus the presence tables, pipeline,
/// and storage handles. Everything inside is cheaply cloneable.
pub struct AppState {
    config: AppConfig,
    storage: NodeStorage,
    registry: ConnectionRegistry,
    rooms: RoomMembership,
    events: EventRouter,
    pipeline: MessagePipeline,
    unread: UnreadAggregator,
}

impl AppState {
    pub fn new(config: AppConfig, storage: NodeStorage) -> Arc<Self> {
        let registry = ConnectionRegistry::new();
        let rooms = RoomMembership::new();
        let events = EventRouter::new(registry.clone(), rooms.clone());
        let pipeline = MessagePipeline::new(storage.clone());
        let unread = UnreadAggregator::new(storage.clone());
        Arc::new(Self {
            config,
            storage,
            registry,
            rooms,
            events,
            pipeline,
            unread,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_id(&self) -> &str {
        &self.config.build_id
    }

    pub fn storage(&self) -> &NodeStorage {
        &self.storage
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomMembership {
        &self.rooms
    }

    pub fn events(&self) -> &EventRouter {
        &self.events
    }

    pub fn pipeline(&self) -> &MessagePipeline {
        &self.pipeline
    }

    pub fn unread(&self) -> &UnreadAggregator {
        &self.unread
    }
}
