//! Durable message shape shared by direct conversations and club rooms.

use crate::{now_ms, MessagingError, Result, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of binary content referenced by an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Voice,
}

/// Reference to out-of-band binary content. The attachment store accepts the
/// upload and hands back a URL; messages only carry that reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub kind: AttachmentKind,
}

/// A single (emoji, user) reaction. At most one per combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub user: UserId,
}

/// Immutable snapshot of the message being replied to, captured at write
/// time. Deliberately never resolved against the live message afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySnapshot {
    pub message_id: Uuid,
    pub content: String,
    pub author_name: String,
}

/// A message inside a conversation or a club room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: Uuid,

    /// Identity of the author.
    pub sender: UserId,

    /// Denormalized display name of the author at send time.
    pub sender_name: String,

    /// Text body. May be empty only when an attachment is present.
    pub content: String,

    pub attachment: Option<Attachment>,

    pub reactions: Vec<Reaction>,

    pub reply_to: Option<ReplySnapshot>,

    /// Creation timestamp in ms. Immutable once set.
    pub created_ms: i64,
}

impl Message {
    /// Build a new message, stamping `created_ms` with the current time.
    ///
    /// Rejects a message whose content is blank unless it carries an
    /// attachment reference.
    pub fn new(
        sender: UserId,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        attachment: Option<Attachment>,
        reply_to: Option<ReplySnapshot>,
    ) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() && attachment.is_none() {
            return Err(MessagingError::EmptyMessage);
        }

        Ok(Self {
            message_id: Uuid::new_v4(),
            sender,
            sender_name: sender_name.into(),
            content,
            attachment,
            reactions: Vec::new(),
            reply_to,
            created_ms: now_ms(),
        })
    }

    /// Toggle the (user, emoji) reaction: add it when absent, remove it when
    /// present. Applying the same toggle twice is an involution.
    pub fn toggle_reaction(&mut self, user: &UserId, emoji: &str) {
        if let Some(pos) = self
            .reactions
            .iter()
            .position(|r| &r.user == user && r.emoji == emoji)
        {
            self.reactions.remove(pos);
        } else {
            self.reactions.push(Reaction {
                emoji: emoji.to_owned(),
                user: user.clone(),
            });
        }
    }

    pub fn has_reaction(&self, user: &UserId, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| &r.user == user && r.emoji == emoji)
    }
}
