//! On-demand unread counts. Both surfaces compare message timestamps
//! against the user's explicit last-read marker; counts are capped for
//! badge display and never cached.

use super::{PipelineError, Result};
use crate::storage::NodeStorage;
use readclub_messaging::UserId;
use serde::Serialize;

/// Badge display cap applied to each surface.
pub const UNREAD_DISPLAY_CAP: usize = 99;

/// Unread counts per message surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnreadCounts {
    pub direct: usize,
    pub clubs: usize,
}

#[derive(Clone)]
pub struct UnreadAggregator {
    storage: NodeStorage,
}

impl UnreadAggregator {
    pub fn new(storage: NodeStorage) -> Self {
        Self { storage }
    }

    /// Compute both unread counts for a user. A user with no conversations
    /// or clubs gets zeros, not an error.
    pub async fn counts_for(&self, user: UserId) -> Result<UnreadCounts> {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || {
            let direct = Self::direct_unread(&storage, &user)?;
            let clubs = Self::club_unread(&storage, &user)?;
            Ok(UnreadCounts { direct, clubs })
        })
        .await
        .map_err(|e| PipelineError::Storage(format!("storage task join error: {e}")))?
    }

    /// Messages from counterparts newer than the user's last-read marker,
    /// summed across all of the user's conversations.
    fn direct_unread(storage: &NodeStorage, user: &UserId) -> Result<usize> {
        let total = storage
            .conversations_for(user)?
            .iter()
            .map(|conversation| conversation.unread_for(user))
            .sum::<usize>();
        Ok(total.min(UNREAD_DISPLAY_CAP))
    }

    /// Messages from other members newer than `member_stats[user]`, summed
    /// across all clubs the user belongs to.
    fn club_unread(storage: &NodeStorage, user: &UserId) -> Result<usize> {
        let total = storage
            .clubs_for(user)?
            .iter()
            .map(|club| club.unread_for(user))
            .sum::<usize>();
        Ok(total.min(UNREAD_DISPLAY_CAP))
    }
}
