//! Message pipeline: validates and appends direct and club messages, and
//! applies reaction and read-marker mutations. Storage work runs on the
//! blocking pool so connection handling never stalls behind disk I/O.

use super::{PipelineError, Result};
use crate::storage::{NodeStorage, UpdateOutcome};
use readclub_messaging::{
    Attachment, Club, ClubId, Conversation, ConversationId, Message, MessagingError,
    ReplySnapshot, UserId,
};
use tracing::debug;
use uuid::Uuid;

/// Request to append a direct message. Display metadata (`sender_name`)
/// comes from the authentication collaborator and is denormalized into the
/// stored message.
#[derive(Debug, Clone)]
pub struct SendDirectMessage {
    pub sender: UserId,
    pub recipient: UserId,
    pub sender_name: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<ReplySnapshot>,
}

#[derive(Clone)]
pub struct MessagePipeline {
    storage: NodeStorage,
}

impl MessagePipeline {
    pub fn new(storage: NodeStorage) -> Self {
        Self { storage }
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(NodeStorage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || job(storage))
            .await
            .map_err(|e| PipelineError::Storage(format!("storage task join error: {e}")))?
    }

    /// Fetch the conversation between two users, creating it lazily.
    pub async fn fetch_or_create(&self, user: UserId, counterpart: UserId) -> Result<Conversation> {
        ensure_distinct(&user, &counterpart)?;
        self.run_blocking(move |storage| {
            Ok(storage.get_or_create_conversation(&user, &counterpart)?)
        })
        .await
    }

    /// Validate and append a direct message, creating the conversation on
    /// first contact. Returns the persisted message; delivering it to the
    /// recipient's personal room is the caller's job.
    pub async fn send_direct(
        &self,
        request: SendDirectMessage,
    ) -> Result<(ConversationId, Message)> {
        ensure_distinct(&request.sender, &request.recipient)?;
        let message = Message::new(
            request.sender.clone(),
            request.sender_name.clone(),
            request.content.clone(),
            request.attachment.clone(),
            request.reply_to.clone(),
        )?;

        let appended = message.clone();
        let (conversation_id, message) = self
            .run_blocking(move |storage| {
                let conversation =
                    storage.get_or_create_conversation(&request.sender, &request.recipient)?;
                let id = conversation.conversation_id;
                match storage.update_conversation(&id, |c| {
                    c.append(appended.clone());
                    true
                })? {
                    UpdateOutcome::Missing => Err(PipelineError::ConversationNotFound(id)),
                    UpdateOutcome::Unchanged(_) | UpdateOutcome::Updated(_) => Ok((id, appended)),
                }
            })
            .await?;

        debug!(%conversation_id, sender = %message.sender, "appended direct message");
        Ok((conversation_id, message))
    }

    /// Append a message to an existing club's log. The club document must
    /// already exist.
    pub async fn post_club_message(
        &self,
        club_id: ClubId,
        sender: UserId,
        sender_name: String,
        content: String,
    ) -> Result<Message> {
        let message = Message::new(sender, sender_name, content, None, None)?;
        let appended = message.clone();
        let posted_to = club_id.clone();

        self.run_blocking(move |storage| {
            match storage.update_club(&club_id, |club| {
                club.append(appended.clone());
                true
            })? {
                UpdateOutcome::Missing => Err(PipelineError::ClubNotFound(club_id.clone())),
                UpdateOutcome::Unchanged(_) | UpdateOutcome::Updated(_) => Ok(()),
            }
        })
        .await?;

        debug!(club_id = %posted_to, sender = %message.sender, "appended club message");
        Ok(message)
    }

    pub async fn club_messages(&self, club_id: ClubId) -> Result<Vec<Message>> {
        self.run_blocking(move |storage| {
            storage
                .club(&club_id)?
                .map(|club| club.messages)
                .ok_or(PipelineError::ClubNotFound(club_id))
        })
        .await
    }

    /// Toggle the (user, emoji) reaction on a message, as one atomic
    /// read-modify-write of the owning conversation document. Returns the
    /// message with its updated reaction set.
    pub async fn toggle_reaction(
        &self,
        conversation_id: ConversationId,
        message_id: Uuid,
        user: UserId,
        emoji: String,
    ) -> Result<Message> {
        self.run_blocking(move |storage| {
            let outcome = storage.update_conversation(&conversation_id, |conversation| {
                match conversation.message_mut(message_id) {
                    Some(message) => {
                        message.toggle_reaction(&user, &emoji);
                        true
                    }
                    None => false,
                }
            })?;

            match outcome {
                UpdateOutcome::Missing => {
                    Err(PipelineError::ConversationNotFound(conversation_id))
                }
                UpdateOutcome::Unchanged(_) => Err(PipelineError::MessageNotFound(message_id)),
                UpdateOutcome::Updated(conversation) => conversation
                    .message(message_id)
                    .cloned()
                    .ok_or(PipelineError::MessageNotFound(message_id)),
            }
        })
        .await
    }

    /// Set the user's last-read marker on a conversation. Idempotent.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<()> {
        self.run_blocking(move |storage| {
            match storage.update_conversation(&conversation_id, |conversation| {
                conversation.mark_read(&user);
                true
            })? {
                UpdateOutcome::Missing => {
                    Err(PipelineError::ConversationNotFound(conversation_id))
                }
                _ => Ok(()),
            }
        })
        .await
    }

    /// Set the member's last-read marker on a club. Idempotent.
    pub async fn mark_club_read(&self, club_id: ClubId, user: UserId) -> Result<()> {
        self.run_blocking(move |storage| {
            match storage.update_club(&club_id, |club| {
                club.mark_read(&user);
                true
            })? {
                UpdateOutcome::Missing => Err(PipelineError::ClubNotFound(club_id.clone())),
                _ => Ok(()),
            }
        })
        .await
    }

    /// Provision a club document. Seam for the club-management collaborator.
    pub async fn create_club(&self, club: Club) -> Result<bool> {
        self.run_blocking(move |storage| Ok(storage.create_club(&club)?))
            .await
    }
}

fn ensure_distinct(a: &UserId, b: &UserId) -> Result<()> {
    if a == b {
        return Err(MessagingError::InvalidId(format!(
            "conversation requires two distinct users, got {a} twice"
        ))
        .into());
    }
    Ok(())
}
