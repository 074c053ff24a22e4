//! Chat entities as they appear on the wire and in the local cache.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Avatar used for synthesized participants.
pub const DEFAULT_AVATAR_URL: &str = "https://i.pravatar.cc/150";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_uuid: String,
    pub api_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Participant {
    /// Placeholder profile for an identifier the directory has not seen.
    pub fn placeholder(uuid: &str, name: &str, now_ms: i64) -> Self {
        Self {
            uuid: uuid.to_string(),
            name: name.to_string(),
            avatar_url: Some(DEFAULT_AVATAR_URL.to_string()),
            bio: None,
            email: None,
            job_title: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub uuid: String,
    pub participant_uuid: String,
    pub value: String,
}

/// Delivery state of a message created on this device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocalStatus {
    /// The post call has not resolved yet.
    Pending,
    /// The post call failed; the record stays local forever.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub uuid: String,
    pub author_uuid: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub sent_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_status: Option<LocalStatus>,
}

impl Message {
    /// Local text message authored at `now_ms` with the given identifier.
    pub fn local(uuid: String, author_uuid: &str, text: &str, now_ms: i64) -> Self {
        Self {
            uuid,
            author_uuid: author_uuid.to_string(),
            text: text.to_string(),
            attachments: Vec::new(),
            sent_at: now_ms,
            updated_at: now_ms,
            reactions: Vec::new(),
            reply_to_message_uuid: None,
            local_status: None,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at != self.sent_at
    }

    pub fn is_placeholder(&self) -> bool {
        self.local_status == Some(LocalStatus::Failed)
    }

    /// Timeline ordering: `sent_at` ascending, identifier as tie-break.
    pub fn timeline_cmp(&self, other: &Message) -> Ordering {
        self.sent_at
            .cmp(&other.sent_at)
            .then_with(|| self.uuid.cmp(&other.uuid))
    }

    pub fn reaction_by(&self, participant_uuid: &str, value: &str) -> Option<&Reaction> {
        self.reactions
            .iter()
            .find(|reaction| {
                reaction.participant_uuid == participant_uuid && reaction.value == value
            })
    }

    /// Reactions grouped by emoji in first-appearance order.
    pub fn reaction_groups(&self) -> Vec<ReactionGroup> {
        let mut groups: Vec<ReactionGroup> = Vec::new();
        for reaction in &self.reactions {
            match groups.iter_mut().find(|group| group.value == reaction.value) {
                Some(group) => group.participant_uuids.push(reaction.participant_uuid.clone()),
                None => groups.push(ReactionGroup {
                    value: reaction.value.clone(),
                    participant_uuids: vec![reaction.participant_uuid.clone()],
                }),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionGroup {
    pub value: String,
    pub participant_uuids: Vec<String>,
}

impl ReactionGroup {
    pub fn count(&self) -> usize {
        self.participant_uuids.len()
    }
}
