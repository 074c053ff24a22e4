#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_sync::{
    ApiError, ChatSession, FixedIdentity, ManualClock, Message, Participant, RemoteApi, SessionInfo,
    Snapshot, SnapshotStore, StateError,
};

pub const NOW: i64 = 1_769_500_000_000;
pub const MINUTE: i64 = 60_000;

/// In-memory chat server. Update endpoints return everything whose
/// `updated_at` is newer than the requested watermark.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub history: Vec<Message>,
    pub participants: Vec<Participant>,
    pub fail_load: bool,
    pub fail_older: bool,
    pub fail_message_updates: bool,
    pub fail_participant_updates: bool,
    pub fail_post: bool,
    pub older_delay: Option<Duration>,
    pub post_delay: Option<Duration>,
    pub post_author: String,
    pub post_sent_at: i64,
    pub posted: Vec<String>,
    pub older_calls: Vec<String>,
    pub update_calls: Vec<i64>,
}

impl FakeApi {
    pub fn new(history: Vec<Message>, participants: Vec<Participant>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                history,
                participants,
                post_author: "server-author".into(),
                post_sent_at: NOW,
                ..FakeState::default()
            }),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().expect("fake api lock"))
    }

    fn unavailable() -> ApiError {
        ApiError::Status(503)
    }
}

impl RemoteApi for FakeApi {
    async fn get_info(&self) -> Result<SessionInfo, ApiError> {
        if self.with_state(|s| s.fail_load) {
            return Err(Self::unavailable());
        }
        Ok(SessionInfo {
            session_uuid: "session-1".into(),
            api_version: 2,
        })
    }

    async fn get_all_messages(&self) -> Result<Vec<Message>, ApiError> {
        Ok(self.with_state(|s| s.history.clone()))
    }

    async fn get_latest_messages(&self) -> Result<Vec<Message>, ApiError> {
        Ok(self.with_state(|s| {
            let mut sorted = s.history.clone();
            sorted.sort_by(Message::timeline_cmp);
            let start = sorted.len().saturating_sub(chat_sync::PAGE_SIZE);
            sorted.split_off(start)
        }))
    }

    async fn get_older_messages(&self, ref_message_uuid: &str) -> Result<Vec<Message>, ApiError> {
        let delay = self.with_state(|s| {
            s.older_calls.push(ref_message_uuid.to_string());
            s.older_delay
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with_state(|s| {
            if s.fail_older {
                return Err(Self::unavailable());
            }
            let mut sorted = s.history.clone();
            sorted.sort_by(Message::timeline_cmp);
            let end = sorted
                .iter()
                .position(|m| m.uuid == ref_message_uuid)
                .unwrap_or(0);
            let start = end.saturating_sub(chat_sync::PAGE_SIZE);
            let mut page = sorted[start..end].to_vec();
            page.reverse();
            Ok(page)
        })
    }

    async fn get_message_updates(&self, since_ms: i64) -> Result<Vec<Message>, ApiError> {
        self.with_state(|s| {
            s.update_calls.push(since_ms);
            if s.fail_message_updates {
                return Err(Self::unavailable());
            }
            Ok(s.history
                .iter()
                .filter(|m| m.updated_at > since_ms)
                .cloned()
                .collect())
        })
    }

    async fn post_message(&self, text: &str) -> Result<Message, ApiError> {
        if let Some(delay) = self.with_state(|s| s.post_delay) {
            tokio::time::sleep(delay).await;
        }
        self.with_state(|s| {
            s.posted.push(text.to_string());
            if s.fail_post {
                return Err(ApiError::Status(500));
            }
            let message = Message::local(
                format!("srv-{}", s.posted.len()),
                &s.post_author,
                text,
                s.post_sent_at,
            );
            s.history.push(message.clone());
            Ok(message)
        })
    }

    async fn get_all_participants(&self) -> Result<Vec<Participant>, ApiError> {
        if self.with_state(|s| s.fail_load) {
            return Err(Self::unavailable());
        }
        Ok(self.with_state(|s| s.participants.clone()))
    }

    async fn get_participant_updates(&self, since_ms: i64) -> Result<Vec<Participant>, ApiError> {
        self.with_state(|s| {
            if s.fail_participant_updates {
                return Err(Self::unavailable());
            }
            Ok(s.participants
                .iter()
                .filter(|p| p.updated_at > since_ms)
                .cloned()
                .collect())
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    pub saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn current(&self) -> Option<Snapshot> {
        self.snapshot.lock().expect("store lock").clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StateError> {
        Ok(self.current())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        *self.snapshot.lock().expect("store lock") = Some(snapshot.clone());
        *self.saves.lock().expect("store lock") += 1;
        Ok(())
    }
}

pub fn msg(uuid: &str, author: &str, sent_at: i64) -> Message {
    Message::local(uuid.to_string(), author, &format!("text of {uuid}"), sent_at)
}

/// `count` messages from `author`, one minute apart, ending `MINUTE` before `NOW`.
pub fn history(count: usize, author: &str) -> Vec<Message> {
    (0..count)
        .map(|i| {
            let sent_at = NOW - (count - i) as i64 * MINUTE;
            msg(&format!("m{i:03}"), author, sent_at)
        })
        .collect()
}

pub fn participant(uuid: &str, name: &str, updated_at: i64) -> Participant {
    Participant {
        uuid: uuid.into(),
        name: name.into(),
        avatar_url: None,
        bio: None,
        email: None,
        job_title: None,
        created_at: updated_at,
        updated_at,
    }
}

pub fn session(api: FakeApi, clock: &Arc<ManualClock>) -> ChatSession<FakeApi> {
    ChatSession::new(api).with_clock(clock.clone())
}

pub fn session_as(api: FakeApi, clock: &Arc<ManualClock>, user: &str) -> ChatSession<FakeApi> {
    session(api, clock).with_identity(Arc::new(FixedIdentity(user.to_string())))
}

pub fn ids(session: &ChatSession<FakeApi>) -> Vec<String> {
    session.read(|store| {
        store
            .timeline
            .messages()
            .iter()
            .map(|m| m.uuid.clone())
            .collect()
    })
}
