use std::cmp::Ordering;
use std::collections::HashSet;

use thiserror::Error;

use crate::model::Message;

/// Server page size for history and older-message requests.
pub const PAGE_SIZE: usize = 25;

/// Errors that can occur while applying timeline operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelineMergeError {
    /// An operation referenced a message that is not in the cache.
    #[error("timeline message '{0}' was not found")]
    MissingMessage(String),
}

/// Counts reported by [`TimelineCache::merge_newer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl MergeSummary {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }
}

/// Sorted, duplicate-free window over the message history.
#[derive(Debug, Clone)]
pub struct TimelineCache {
    items: Vec<Message>,
    has_more_older: bool,
}

impl Default for TimelineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineCache {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            has_more_older: true,
        }
    }

    /// Messages in display order (oldest first).
    pub fn messages(&self) -> &[Message] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more_older(&self) -> bool {
        self.has_more_older
    }

    /// Identifier of the oldest held message; the reference for older pages.
    pub fn cursor(&self) -> Option<&str> {
        self.items.first().map(|message| message.uuid.as_str())
    }

    pub fn get(&self, uuid: &str) -> Option<&Message> {
        self.items.iter().find(|message| message.uuid == uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.position(uuid).is_some()
    }

    /// The newest `count` messages, oldest first.
    pub fn tail(&self, count: usize) -> &[Message] {
        let start = self.items.len().saturating_sub(count);
        &self.items[start..]
    }

    /// Replace everything with the newest page of `messages`.
    pub fn initialize(&mut self, messages: Vec<Message>) {
        let mut sorted = sorted_unique(messages);
        let total = sorted.len();
        if total > PAGE_SIZE {
            sorted.drain(..total - PAGE_SIZE);
        }
        self.items = sorted;
        self.has_more_older = total > PAGE_SIZE;
        self.debug_check();
    }

    /// Rehydrate from a persisted slice without truncation.
    pub fn restore(&mut self, messages: Vec<Message>, has_more_older: bool) {
        self.items = sorted_unique(messages);
        self.has_more_older = has_more_older;
        self.debug_check();
    }

    /// Prepend a page of older messages. Returns how many were added.
    ///
    /// A page shorter than [`PAGE_SIZE`], or one holding nothing new, marks
    /// the start of history.
    pub fn merge_older(&mut self, batch: Vec<Message>) -> usize {
        if batch.is_empty() {
            self.has_more_older = false;
            return 0;
        }
        let full_page = batch.len() >= PAGE_SIZE;

        let known: HashSet<&str> = self.items.iter().map(|m| m.uuid.as_str()).collect();
        let fresh: Vec<Message> = sorted_unique(batch)
            .into_iter()
            .filter(|message| !known.contains(message.uuid.as_str()))
            .collect();
        let added = fresh.len();

        let fits_before = match (fresh.last(), self.items.first()) {
            (Some(last), Some(first)) => last.timeline_cmp(first) == Ordering::Less,
            _ => true,
        };
        if fits_before {
            self.items.splice(0..0, fresh);
        } else {
            for message in fresh {
                self.insert_sorted(message);
            }
        }

        self.has_more_older = full_page && added > 0;
        self.debug_check();
        added
    }

    /// Merge messages created or edited since the last poll.
    ///
    /// Known identifiers are overwritten in place; new ones are inserted at
    /// their sorted position, which is the tail for fresh messages. New
    /// messages older than the cursor are skipped while older history is
    /// still unloaded, since pagination will deliver them.
    pub fn merge_newer(&mut self, batch: Vec<Message>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for message in sorted_unique(batch) {
            if let Some(index) = self.position(&message.uuid) {
                self.overwrite_at(index, message);
                summary.updated += 1;
                continue;
            }
            let before_window = self
                .items
                .first()
                .is_some_and(|first| message.timeline_cmp(first) == Ordering::Less);
            if before_window && self.has_more_older {
                summary.skipped += 1;
                continue;
            }
            self.insert_sorted(message);
            summary.inserted += 1;
        }
        self.debug_check();
        summary
    }

    /// Append a client-originated message.
    ///
    /// An identifier that is already present (a poll raced ahead of the
    /// post response) is overwritten instead of duplicated.
    pub fn apply_local(&mut self, message: Message) {
        if let Some(index) = self.position(&message.uuid) {
            self.overwrite_at(index, message);
        } else if self
            .items
            .last()
            .is_none_or(|last| last.timeline_cmp(&message) != Ordering::Greater)
        {
            self.items.push(message);
        } else {
            tracing::debug!(uuid = %message.uuid, "local message sorts before the tail");
            self.insert_sorted(message);
        }
        self.debug_check();
    }

    /// Swap `old_uuid` for `message` at the same position.
    pub fn replace(&mut self, old_uuid: &str, message: Message) -> Result<(), TimelineMergeError> {
        let index = self
            .position(old_uuid)
            .ok_or_else(|| TimelineMergeError::MissingMessage(old_uuid.to_string()))?;

        if message.uuid != old_uuid {
            if let Some(duplicate) = self.position(&message.uuid) {
                self.items.remove(duplicate);
                let index = if duplicate < index { index - 1 } else { index };
                self.overwrite_at(index, message);
                self.debug_check();
                return Ok(());
            }
        }
        self.overwrite_at(index, message);
        self.debug_check();
        Ok(())
    }

    /// Apply `mutate` to the message with `uuid`. Returns false if absent.
    pub fn update_in_place<F>(&mut self, uuid: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let Some(index) = self.position(uuid) else {
            return false;
        };
        let mut message = self.items[index].clone();
        mutate(&mut message);
        message.uuid = uuid.to_string();
        self.overwrite_at(index, message);
        self.debug_check();
        true
    }

    /// Sorted by `(sent_at, uuid)` with no repeated identifiers.
    pub fn is_consistent(&self) -> bool {
        let sorted = self
            .items
            .windows(2)
            .all(|pair| pair[0].timeline_cmp(&pair[1]) == Ordering::Less);
        let unique: HashSet<&str> = self.items.iter().map(|m| m.uuid.as_str()).collect();
        sorted && unique.len() == self.items.len()
    }

    fn position(&self, uuid: &str) -> Option<usize> {
        self.items.iter().position(|message| message.uuid == uuid)
    }

    fn insert_sorted(&mut self, message: Message) {
        let index = self
            .items
            .partition_point(|existing| existing.timeline_cmp(&message) == Ordering::Less);
        self.items.insert(index, message);
    }

    /// Replace the entry at `index`, moving it only if its sort key changed.
    fn overwrite_at(&mut self, index: usize, message: Message) {
        let in_order = index
            .checked_sub(1)
            .and_then(|prev| self.items.get(prev))
            .is_none_or(|prev| prev.timeline_cmp(&message) == Ordering::Less)
            && self
                .items
                .get(index + 1)
                .is_none_or(|next| message.timeline_cmp(next) == Ordering::Less);
        if in_order {
            self.items[index] = message;
        } else {
            self.items.remove(index);
            self.insert_sorted(message);
        }
    }

    fn debug_check(&self) {
        debug_assert!(self.is_consistent(), "timeline lost ordering or uniqueness");
    }
}

/// Sort by timeline order and keep the most recently updated copy of each id.
fn sorted_unique(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let mut seen = HashSet::new();
    messages.retain(|message| seen.insert(message.uuid.clone()));
    messages.sort_by(Message::timeline_cmp);
    messages
}
