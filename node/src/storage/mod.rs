//! Durable conversation and club documents backed by sled.
//!
//! Conversations are keyed by the canonical participant pair key, which
//! enforces pair uniqueness at the storage layer: two racing first-sends
//! target the same key and the compare-and-swap insert lets exactly one
//! create the document. A secondary tree maps conversation ids back to pair
//! keys for id-addressed lookups.

use anyhow::{Context, Result};
use readclub_messaging::conversation::pair_key;
use readclub_messaging::{Club, ClubId, Conversation, ConversationId, UserId};
use std::path::Path;

/// Result of an atomic read-modify-write against a single document.
#[derive(Debug)]
pub enum UpdateOutcome<T> {
    /// No document under that key.
    Missing,
    /// The mutator declined to persist; the stored document is untouched.
    Unchanged(T),
    /// The mutation was applied and persisted.
    Updated(T),
}

#[derive(Clone)]
pub struct NodeStorage {
    db: sled::Db,
}

impl NodeStorage {
    const CONVERSATIONS: &'static str = "conversations";
    const CONVERSATION_INDEX: &'static str = "conversation_index";
    const CLUBS: &'static str = "clubs";

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create storage directory {:?}", path))?;
        let db = sled::open(path)
            .with_context(|| format!("failed to open sled database at {:?}", path))?;
        Ok(Self { db })
    }

    /// In-memory database for tests.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .context("failed to open temporary sled database")?;
        Ok(Self { db })
    }

    fn conversations(&self) -> sled::Result<sled::Tree> {
        self.db.open_tree(Self::CONVERSATIONS)
    }

    fn conversation_index(&self) -> sled::Result<sled::Tree> {
        self.db.open_tree(Self::CONVERSATION_INDEX)
    }

    fn clubs(&self) -> sled::Result<sled::Tree> {
        self.db.open_tree(Self::CLUBS)
    }

    /// Fetch the conversation for an unordered user pair, creating an empty
    /// one when absent. Under concurrent calls for the same pair exactly one
    /// document is created; losers of the CAS race re-read the winner.
    pub fn get_or_create_conversation(&self, a: &UserId, b: &UserId) -> Result<Conversation> {
        let tree = self.conversations()?;
        let key = pair_key(a, b);

        loop {
            if let Some(raw) = tree.get(key.as_bytes())? {
                return bincode::deserialize(&raw).context("corrupt conversation record");
            }

            let fresh = Conversation::new(a.clone(), b.clone());
            let encoded = bincode::serialize(&fresh)?;
            let index = self.conversation_index()?;

            // The id lookup must resolve as soon as the document is visible
            // to a racing caller, so the index entry goes in first.
            index.insert(fresh.conversation_id.0.as_bytes(), key.as_bytes())?;
            match tree.compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(encoded))? {
                Ok(()) => {
                    tree.flush()?;
                    return Ok(fresh);
                }
                // Lost the race; drop the unused index entry and read the
                // winner on the next pass.
                Err(_) => {
                    index.remove(fresh.conversation_id.0.as_bytes())?;
                    continue;
                }
            }
        }
    }

    pub fn conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let Some(key) = self.conversation_index()?.get(id.0.as_bytes())? else {
            return Ok(None);
        };
        let Some(raw) = self.conversations()?.get(&key)? else {
            return Ok(None);
        };
        Ok(Some(
            bincode::deserialize(&raw).context("corrupt conversation record")?,
        ))
    }

    /// Atomic read-modify-write of one conversation document. The mutator
    /// runs against a fresh copy on every CAS retry and returns whether its
    /// change should be persisted.
    pub fn update_conversation<F>(
        &self,
        id: &ConversationId,
        apply: F,
    ) -> Result<UpdateOutcome<Conversation>>
    where
        F: Fn(&mut Conversation) -> bool,
    {
        let Some(key) = self.conversation_index()?.get(id.0.as_bytes())? else {
            return Ok(UpdateOutcome::Missing);
        };
        let tree = self.conversations()?;

        loop {
            let Some(raw) = tree.get(&key)? else {
                return Ok(UpdateOutcome::Missing);
            };
            let mut document: Conversation =
                bincode::deserialize(&raw).context("corrupt conversation record")?;

            if !apply(&mut document) {
                return Ok(UpdateOutcome::Unchanged(document));
            }

            let encoded = bincode::serialize(&document)?;
            match tree.compare_and_swap(&key, Some(&raw), Some(encoded))? {
                Ok(()) => {
                    tree.flush()?;
                    return Ok(UpdateOutcome::Updated(document));
                }
                Err(_) => continue,
            }
        }
    }

    /// Every conversation the user participates in.
    pub fn conversations_for(&self, user: &UserId) -> Result<Vec<Conversation>> {
        let tree = self.conversations()?;
        let mut found = Vec::new();
        for entry in tree.iter() {
            let (_, raw) = entry?;
            let conversation: Conversation =
                bincode::deserialize(&raw).context("corrupt conversation record")?;
            if conversation.involves(user) {
                found.push(conversation);
            }
        }
        Ok(found)
    }

    /// Insert a club document. Returns false when the id is already taken.
    pub fn create_club(&self, club: &Club) -> Result<bool> {
        let tree = self.clubs()?;
        let encoded = bincode::serialize(club)?;
        let created = tree
            .compare_and_swap(
                club.club_id.as_str().as_bytes(),
                None as Option<&[u8]>,
                Some(encoded),
            )?
            .is_ok();
        if created {
            tree.flush()?;
        }
        Ok(created)
    }

    pub fn club(&self, id: &ClubId) -> Result<Option<Club>> {
        let Some(raw) = self.clubs()?.get(id.as_str().as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(
            bincode::deserialize(&raw).context("corrupt club record")?,
        ))
    }

    /// Atomic read-modify-write of one club document, same contract as
    /// [`Self::update_conversation`].
    pub fn update_club<F>(&self, id: &ClubId, apply: F) -> Result<UpdateOutcome<Club>>
    where
        F: Fn(&mut Club) -> bool,
    {
        let tree = self.clubs()?;
        let key = id.as_str().as_bytes();

        loop {
            let Some(raw) = tree.get(key)? else {
                return Ok(UpdateOutcome::Missing);
            };
            let mut document: Club = bincode::deserialize(&raw).context("corrupt club record")?;

            if !apply(&mut document) {
                return Ok(UpdateOutcome::Unchanged(document));
            }

            let encoded = bincode::serialize(&document)?;
            match tree.compare_and_swap(key, Some(&raw), Some(encoded))? {
                Ok(()) => {
                    tree.flush()?;
                    return Ok(UpdateOutcome::Updated(document));
                }
                Err(_) => continue,
            }
        }
    }

    /// Every club the user is a member of.
    pub fn clubs_for(&self, user: &UserId) -> Result<Vec<Club>> {
        let tree = self.clubs()?;
        let mut found = Vec::new();
        for entry in tree.iter() {
            let (_, raw) = entry?;
            let club: Club = bincode::deserialize(&raw).context("corrupt club record")?;
            if club.is_member(user) {
                found.push(club);
            }
        }
        Ok(found)
    }

    pub fn conversation_count(&self) -> Result<usize> {
        Ok(self.conversations()?.len())
    }
}
