//! Send, reply, edit and react.
//!
//! Sends are the only mutation that reaches the server. Edits and reactions
//! stay local; failed sends leave a permanent placeholder in the timeline.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::api::RemoteApi;
use crate::identity::SENTINEL_USER_ID;
use crate::model::{LocalStatus, Message, Reaction};
use crate::session::ChatSession;
use crate::store::StoreEvent;

/// Messages stay editable for this long after being sent.
pub const EDIT_WINDOW_MS: i64 = 5 * 60 * 1000;

const TEMP_PREFIX: &str = "temp-";

/// Why a message may not be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRejection {
    NotAuthor,
    HasAttachments,
    AlreadyEdited,
    WindowElapsed,
}

impl fmt::Display for EditRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EditRejection::NotAuthor => "message was sent by someone else",
            EditRejection::HasAttachments => "messages with attachments cannot be edited",
            EditRejection::AlreadyEdited => "message was already edited",
            EditRejection::WindowElapsed => "edit window has closed",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("message '{0}' is not in the timeline")]
    NotFound(String),
    #[error("cannot edit message: {0}")]
    EditRejected(EditRejection),
    #[error("local user is not known yet")]
    NoLocalUser,
}

/// How a send resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The server accepted the message; carries its identifier.
    Confirmed(String),
    /// The post failed; carries the local placeholder identifier.
    Placeholder(String),
}

impl SendOutcome {
    pub fn uuid(&self) -> &str {
        match self {
            SendOutcome::Confirmed(uuid) | SendOutcome::Placeholder(uuid) => uuid,
        }
    }
}

/// Whether `current_user` may still edit `message` at `now_ms`.
pub fn edit_eligibility(
    message: &Message,
    current_user: Option<&str>,
    now_ms: i64,
) -> Result<(), EditRejection> {
    if current_user != Some(message.author_uuid.as_str()) {
        return Err(EditRejection::NotAuthor);
    }
    if !message.attachments.is_empty() {
        return Err(EditRejection::HasAttachments);
    }
    if message.is_edited() {
        return Err(EditRejection::AlreadyEdited);
    }
    if now_ms - message.sent_at >= EDIT_WINDOW_MS {
        return Err(EditRejection::WindowElapsed);
    }
    Ok(())
}

impl<A: RemoteApi> ChatSession<A> {
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        self.post(text, None).await
    }

    /// Send `text` as a reply and clear the composer's reply selection.
    pub async fn send_reply(&self, text: &str, reply_to_uuid: &str) -> SendOutcome {
        let outcome = self.post(text, Some(reply_to_uuid.to_string())).await;
        let cleared = self.write(|store| store.replying_to.take().is_some());
        if cleared {
            self.emit(StoreEvent::ReplyTargetChanged(None));
        }
        outcome
    }

    pub fn set_replying_to(&self, uuid: Option<String>) {
        self.write(|store| store.replying_to = uuid.clone());
        self.emit(StoreEvent::ReplyTargetChanged(uuid));
    }

    async fn post(&self, text: &str, reply_to: Option<String>) -> SendOutcome {
        let now = self.now_ms();
        let temp_uuid = format!("{TEMP_PREFIX}{}", Uuid::new_v4());
        let author = self.read(|store| store.current_user_uuid.clone());
        let mut pending = Message::local(
            temp_uuid.clone(),
            author.as_deref().unwrap_or(SENTINEL_USER_ID),
            text,
            now,
        );
        pending.reply_to_message_uuid = reply_to.clone();
        pending.local_status = Some(LocalStatus::Pending);
        let mut failed = pending.clone();
        self.write(|store| store.timeline.apply_local(pending));
        self.emit(StoreEvent::TimelineChanged {
            uuids: vec![temp_uuid.clone()],
        });

        let outcome = match self.api.post_message(text).await {
            Ok(mut confirmed) => {
                let uuid = confirmed.uuid.clone();
                let adopted = self.write(|store| {
                    let adopted = match store.current_user_uuid.clone() {
                        Some(current) => {
                            confirmed.author_uuid = current;
                            None
                        }
                        None => {
                            store.current_user_uuid = Some(confirmed.author_uuid.clone());
                            Some(confirmed.author_uuid.clone())
                        }
                    };
                    if reply_to.is_some() {
                        confirmed.reply_to_message_uuid = reply_to;
                    }
                    confirmed.local_status = None;
                    if store.timeline.replace(&temp_uuid, confirmed.clone()).is_err() {
                        store.timeline.apply_local(confirmed);
                    }
                    adopted
                });
                if let Some(user) = adopted {
                    tracing::info!(user = %user, "adopted local user from confirmed send");
                    self.emit(StoreEvent::CurrentUserChanged(Some(user)));
                }
                self.emit(StoreEvent::TimelineChanged {
                    uuids: vec![temp_uuid, uuid.clone()],
                });
                SendOutcome::Confirmed(uuid)
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    placeholder = %temp_uuid,
                    "send failed, keeping local placeholder"
                );
                self.write(|store| {
                    let marked = store.timeline.update_in_place(&temp_uuid, |message| {
                        message.local_status = Some(LocalStatus::Failed);
                    });
                    if !marked {
                        failed.local_status = Some(LocalStatus::Failed);
                        store.timeline.apply_local(failed);
                    }
                });
                self.emit(StoreEvent::TimelineChanged {
                    uuids: vec![temp_uuid.clone()],
                });
                SendOutcome::Placeholder(temp_uuid)
            }
        };
        self.persist();
        outcome
    }

    /// Replace the text of an own, recent, never-edited message. Local only.
    pub fn edit_message(&self, uuid: &str, text: &str) -> Result<(), MutationError> {
        let now = self.now_ms();
        self.write(|store| -> Result<(), MutationError> {
            let message = store
                .timeline
                .get(uuid)
                .ok_or_else(|| MutationError::NotFound(uuid.to_string()))?;
            edit_eligibility(message, store.current_user_uuid.as_deref(), now)
                .map_err(MutationError::EditRejected)?;
            store.timeline.update_in_place(uuid, |message| {
                message.text = text.to_string();
                message.updated_at = now.max(message.sent_at + 1);
            });
            Ok(())
        })?;
        self.emit(StoreEvent::TimelineChanged {
            uuids: vec![uuid.to_string()],
        });
        self.persist();
        Ok(())
    }

    /// Toggle the local user's `emoji` reaction on `uuid`. Local only.
    ///
    /// Returns true when a reaction was added, false when one was removed.
    pub fn toggle_reaction(&self, uuid: &str, emoji: &str) -> Result<bool, MutationError> {
        let now = self.now_ms();
        let (added, directory_grew) = self.write(|store| -> Result<(bool, bool), MutationError> {
            let user = store
                .current_user_uuid
                .clone()
                .ok_or(MutationError::NoLocalUser)?;
            if !store.timeline.contains(uuid) {
                return Err(MutationError::NotFound(uuid.to_string()));
            }
            let known = store.directory.get(&user).is_some();
            store.directory.ensure_self(&user, now);

            let mut added = false;
            store.timeline.update_in_place(uuid, |message| {
                let existing = message.reaction_by(&user, emoji).map(|r| r.uuid.clone());
                match existing {
                    Some(reaction_uuid) => message.reactions.retain(|r| r.uuid != reaction_uuid),
                    None => {
                        message.reactions.push(Reaction {
                            uuid: Uuid::new_v4().to_string(),
                            participant_uuid: user.clone(),
                            value: emoji.to_string(),
                        });
                        added = true;
                    }
                }
            });
            Ok((added, !known))
        })?;

        if directory_grew {
            self.emit(StoreEvent::ParticipantsChanged);
        }
        self.emit(StoreEvent::TimelineChanged {
            uuids: vec![uuid.to_string()],
        });
        self.persist();
        Ok(added)
    }
}
