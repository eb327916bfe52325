//! Direct-message conversation document: exactly two participants, an
//! append-only message log, and per-participant read markers.

use crate::{now_ms, ConversationId, Message, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Canonical storage key for an unordered participant pair. Both orderings
/// of (a, b) map to the same key, which is what makes the pair unique at the
/// storage layer.
pub fn pair_key(a: &UserId, b: &UserId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

/// Durable direct-message thread between exactly two users.
///
/// Messages are append-only and kept in insertion order; insertion order is
/// chronological order, ties broken by insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: ConversationId,

    /// The two participants, stored in canonical (sorted) order.
    pub participants: [UserId; 2],

    pub messages: Vec<Message>,

    /// Last-read marker per participant, ms since epoch. Absent means the
    /// participant has never read the conversation.
    pub last_read: HashMap<UserId, i64>,

    /// Timestamp of the most recent append.
    pub updated_ms: i64,
}

impl Conversation {
    pub fn new(a: UserId, b: UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            conversation_id: ConversationId::new(),
            participants: [lo, hi],
            messages: Vec::new(),
            last_read: HashMap::new(),
            updated_ms: now_ms(),
        }
    }

    pub fn pair_key(&self) -> String {
        pair_key(&self.participants[0], &self.participants[1])
    }

    pub fn involves(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    /// The other participant, or `None` when `user` is not part of this
    /// conversation.
    pub fn counterpart(&self, user: &UserId) -> Option<&UserId> {
        match &self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }

    /// Append a message and bump `updated_ms`.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_ms = now_ms();
    }

    pub fn message(&self, message_id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.message_id == message_id)
    }

    pub fn message_mut(&mut self, message_id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.message_id == message_id)
    }

    /// Set the user's last-read marker to now. Idempotent.
    pub fn mark_read(&mut self, user: &UserId) {
        self.last_read.insert(user.clone(), now_ms());
    }

    fn last_read_ms(&self, user: &UserId) -> i64 {
        self.last_read.get(user).copied().unwrap_or(0)
    }

    /// Messages from the other participant newer than the user's last-read
    /// marker. A user who never read the conversation sees every message
    /// from the counterpart as unread.
    pub fn unread_for(&self, user: &UserId) -> usize {
        let since = self.last_read_ms(user);
        self.messages
            .iter()
            .filter(|m| &m.sender != user && m.created_ms > since)
            .count()
    }
}
