use std::collections::HashMap;

use crate::model::Participant;

pub const UNKNOWN_NAME: &str = "Unknown";
pub const SELF_NAME: &str = "You";
pub const MENTION_LIMIT: usize = 5;

/// Participant id to profile mapping. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct ParticipantDirectory {
    entries: HashMap<String, Participant>,
}

impl ParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, uuid: &str) -> Option<&Participant> {
        self.entries.get(uuid)
    }

    /// Known profile, or an "Unknown" placeholder stamped with `now_ms`.
    pub fn resolve(&self, uuid: &str, now_ms: i64) -> Participant {
        self.entries
            .get(uuid)
            .cloned()
            .unwrap_or_else(|| Participant::placeholder(uuid, UNKNOWN_NAME, now_ms))
    }

    /// Like [`resolve`](Self::resolve) but falls back to a "You" placeholder.
    pub fn resolve_self(&self, uuid: &str, now_ms: i64) -> Participant {
        self.entries
            .get(uuid)
            .cloned()
            .unwrap_or_else(|| Participant::placeholder(uuid, SELF_NAME, now_ms))
    }

    /// Stores the "You" placeholder for `uuid` unless a profile already exists.
    pub fn ensure_self(&mut self, uuid: &str, now_ms: i64) -> &Participant {
        self.entries
            .entry(uuid.to_string())
            .or_insert_with(|| Participant::placeholder(uuid, SELF_NAME, now_ms))
    }

    /// Last write wins; incoming profiles replace stored ones unconditionally.
    pub fn merge(&mut self, participants: impl IntoIterator<Item = Participant>) -> usize {
        let mut merged = 0;
        for participant in participants {
            self.entries.insert(participant.uuid.clone(), participant);
            merged += 1;
        }
        merged
    }

    /// All profiles ordered by name, then id.
    pub fn participants(&self) -> Vec<&Participant> {
        let mut list: Vec<&Participant> = self.entries.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
        list
    }

    /// Case-insensitive substring match on display names.
    pub fn mention_candidates(&self, query: &str, limit: usize) -> Vec<&Participant> {
        let query = query.to_lowercase();
        self.participants()
            .into_iter()
            .filter(|participant| participant.name.to_lowercase().contains(&query))
            .take(limit)
            .collect()
    }
}

/// Text typed after the last `@`, if any.
pub fn mention_query(text: &str) -> Option<&str> {
    let at = text.rfind('@')?;
    let query = &text[at + 1..];
    if query.is_empty() { None } else { Some(query) }
}

/// Replaces the trailing `@query` fragment with `@name `.
pub fn complete_mention(text: &str, name: &str) -> String {
    match text.rfind('@') {
        Some(at) => format!("{}{name} ", &text[..=at]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(uuid: &str, name: &str) -> Participant {
        Participant {
            uuid: uuid.into(),
            name: name.into(),
            avatar_url: None,
            bio: None,
            email: None,
            job_title: Some("Engineer".into()),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn resolves_unknown_ids_to_placeholder() {
        let directory = ParticipantDirectory::new();
        let resolved = directory.resolve("ghost", 42);
        assert_eq!(resolved.name, UNKNOWN_NAME);
        assert_eq!(resolved.created_at, 42);
        assert_eq!(resolved.updated_at, 42);
        assert_eq!(resolved.avatar_url.as_deref(), Some(crate::model::DEFAULT_AVATAR_URL));
        assert!(directory.is_empty());
    }

    #[test]
    fn resolve_self_prefers_known_profile() {
        let mut directory = ParticipantDirectory::new();
        assert_eq!(directory.resolve_self("me", 1).name, SELF_NAME);
        directory.merge([participant("me", "Ada")]);
        assert_eq!(directory.resolve_self("me", 1).name, "Ada");
    }

    #[test]
    fn merge_overwrites_without_comparing_timestamps() {
        let mut directory = ParticipantDirectory::new();
        let mut newer = participant("p1", "New");
        newer.updated_at = 100;
        directory.merge([newer]);

        let mut older = participant("p1", "Old");
        older.updated_at = 1;
        directory.merge([older, participant("p2", "Bea")]);

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("p1").map(|p| p.name.as_str()), Some("Old"));
    }

    #[test]
    fn ensure_self_keeps_existing_profile() {
        let mut directory = ParticipantDirectory::new();
        directory.merge([participant("me", "Ada")]);
        assert_eq!(directory.ensure_self("me", 5).name, "Ada");
        assert_eq!(directory.ensure_self("other", 5).name, SELF_NAME);
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn mention_candidates_filter_and_limit() {
        let mut directory = ParticipantDirectory::new();
        directory.merge([
            participant("1", "Alice"),
            participant("2", "Malik"),
            participant("3", "Bob"),
            participant("4", "alina"),
        ]);
        let names: Vec<&str> = directory
            .mention_candidates("AL", MENTION_LIMIT)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice", "Malik", "alina"]);
        assert_eq!(directory.mention_candidates("a", 1).len(), 1);
    }

    #[test]
    fn mention_query_and_completion() {
        assert_eq!(mention_query("hey @al"), Some("al"));
        assert_eq!(mention_query("hey @"), None);
        assert_eq!(mention_query("no mention"), None);
        assert_eq!(complete_mention("hey @al", "Alice"), "hey @Alice ");
        assert_eq!(complete_mention("plain", "Alice"), "plain");
    }
}
