//! Club document: group chat log plus membership and per-member read state.

use crate::{now_ms, ClubId, Message, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Durable club record. The message log shares the [`Message`] shape with
/// direct conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub club_id: ClubId,

    pub name: String,

    pub members: BTreeSet<UserId>,

    /// Always a subset of `members`.
    pub admins: BTreeSet<UserId>,

    pub messages: Vec<Message>,

    /// Per-member last-read timestamp, ms since epoch. Absent means the
    /// member has never read the room.
    pub member_stats: HashMap<UserId, i64>,
}

impl Club {
    /// Build a club. Admins that are not members are dropped, keeping the
    /// `admins ⊆ members` invariant from construction onwards.
    pub fn new(
        club_id: ClubId,
        name: impl Into<String>,
        members: BTreeSet<UserId>,
        admins: BTreeSet<UserId>,
    ) -> Self {
        let admins = admins.intersection(&members).cloned().collect();
        Self {
            club_id,
            name: name.into(),
            members,
            admins,
            messages: Vec::new(),
            member_stats: HashMap::new(),
        }
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    pub fn add_member(&mut self, user: UserId) {
        self.members.insert(user);
    }

    /// Removing a member also drops admin status and read state.
    pub fn remove_member(&mut self, user: &UserId) {
        self.members.remove(user);
        self.admins.remove(user);
        self.member_stats.remove(user);
    }

    /// Promote a user to admin, inserting them as a member first when needed.
    pub fn add_admin(&mut self, user: UserId) {
        self.members.insert(user.clone());
        self.admins.insert(user);
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Set the member's last-read marker to now. Idempotent; always safe to
    /// call, including for users without an existing `member_stats` entry.
    pub fn mark_read(&mut self, user: &UserId) {
        self.member_stats.insert(user.clone(), now_ms());
    }

    pub fn last_read_ms(&self, user: &UserId) -> i64 {
        self.member_stats.get(user).copied().unwrap_or(0)
    }

    /// Messages authored by someone else and newer than the member's
    /// last-read marker. Without a `member_stats` entry every message from
    /// others counts.
    pub fn unread_for(&self, user: &UserId) -> usize {
        let since = self.last_read_ms(user);
        self.messages
            .iter()
            .filter(|m| &m.sender != user && m.created_ms > since)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(ids: &[&str]) -> BTreeSet<UserId> {
        ids.iter().map(|id| UserId::new(*id)).collect()
    }

    fn message(sender: &str, content: &str) -> Message {
        Message::new(UserId::new(sender), sender.to_uppercase(), content, None, None).unwrap()
    }

    #[test]
    fn admins_outside_membership_are_dropped() {
        let club = Club::new(
            ClubId::new("mystery-readers"),
            "Mystery Readers",
            users(&["alice", "bob"]),
            users(&["alice", "mallory"]),
        );
        assert_eq!(club.admins, users(&["alice"]));
    }

    #[test]
    fn promoting_a_non_member_adds_them_as_member() {
        let mut club = Club::new(
            ClubId::new("c"),
            "Club",
            users(&["alice"]),
            BTreeSet::new(),
        );
        club.add_admin(UserId::new("bob"));
        assert!(club.is_member(&UserId::new("bob")));
        assert!(club.admins.contains(&UserId::new("bob")));
    }

    #[test]
    fn removing_a_member_clears_admin_and_read_state() {
        let mut club = Club::new(
            ClubId::new("c"),
            "Club",
            users(&["alice", "bob"]),
            users(&["bob"]),
        );
        club.mark_read(&UserId::new("bob"));

        club.remove_member(&UserId::new("bob"));
        assert!(!club.is_member(&UserId::new("bob")));
        assert!(club.admins.is_empty());
        assert!(club.member_stats.is_empty());
    }

    #[test]
    fn unread_counts_everything_for_a_member_who_never_read() {
        let mut club = Club::new(
            ClubId::new("c"),
            "Club",
            users(&["alice", "bob", "carol"]),
            BTreeSet::new(),
        );
        club.append(message("alice", "one"));
        club.append(message("bob", "two"));
        club.append(message("carol", "three"));

        // carol has no member_stats entry; only others' messages count.
        assert_eq!(club.unread_for(&UserId::new("carol")), 2);
    }

    #[test]
    fn unread_is_zero_immediately_after_mark_read() {
        let mut club = Club::new(
            ClubId::new("c"),
            "Club",
            users(&["alice", "bob"]),
            BTreeSet::new(),
        );
        club.append(message("alice", "one"));
        club.append(message("alice", "two"));

        let bob = UserId::new("bob");
        assert_eq!(club.unread_for(&bob), 2);

        club.mark_read(&bob);
        assert_eq!(club.unread_for(&bob), 0);
    }
}
