//! Message pipeline and unread aggregation for direct and club messaging.

mod pipeline;
mod unread;

pub use pipeline::{MessagePipeline, SendDirectMessage};
pub use unread::{UnreadAggregator, UnreadCounts, UNREAD_DISPLAY_CAP};

use readclub_messaging::{ClubId, ConversationId, MessagingError};
use uuid::Uuid;

/// Errors surfaced by the messaging pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),
    #[error("club {0} not found")]
    ClubNotFound(ClubId),
    #[error("message {0} not found")]
    MessageNotFound(Uuid),
    #[error(transparent)]
    Validation(#[from] MessagingError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
