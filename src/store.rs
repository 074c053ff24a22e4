use serde::{Deserialize, Serialize};

use crate::directory::ParticipantDirectory;
use crate::model::LocalStatus;
use crate::state::{SNAPSHOT_MESSAGE_LIMIT, Snapshot};
use crate::timeline::TimelineCache;

/// Progress of the initial load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// Load failed; carries the user-facing message.
    Failed(String),
}

impl LoadStatus {
    /// Whether a load has run to completion, successfully or not.
    pub fn hydrated(&self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::Failed(_))
    }
}

/// Change notifications delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    LoadStatusChanged(LoadStatus),
    /// Messages were inserted, replaced or edited.
    TimelineChanged { uuids: Vec<String> },
    /// Older history was prepended.
    HistoryPrepended { added: usize, has_more_older: bool },
    ParticipantsChanged,
    CurrentUserChanged(Option<String>),
    ReplyTargetChanged(Option<String>),
}

/// All client-side chat state. Written only by the sync engine and the
/// mutation manager.
#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    pub session_uuid: Option<String>,
    pub timeline: TimelineCache,
    pub directory: ParticipantDirectory,
    pub current_user_uuid: Option<String>,
    /// Watermark for update polling, epoch ms. Zero until a window exists.
    pub last_update: i64,
    pub load_status: LoadStatus,
    pub replying_to: Option<String>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending sends in the snapshot never resolved and come back as failed.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self::new();
        let has_more_older = !snapshot.messages.is_empty();
        let messages = snapshot
            .messages
            .into_iter()
            .map(|mut message| {
                if message.local_status == Some(LocalStatus::Pending) {
                    message.local_status = Some(LocalStatus::Failed);
                }
                message
            })
            .collect();
        store.timeline.restore(messages, has_more_older);
        store.directory.merge(snapshot.participants);
        store.session_uuid = snapshot.session_uuid;
        store.current_user_uuid = snapshot.current_user_uuid;
        store.last_update = snapshot.last_update;
        store
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            session_uuid: self.session_uuid.clone(),
            messages: self.timeline.tail(SNAPSHOT_MESSAGE_LIMIT).to_vec(),
            participants: self.directory.participants().into_iter().cloned().collect(),
            current_user_uuid: self.current_user_uuid.clone(),
            last_update: self.last_update,
            api_base_url: None,
        }
    }

    pub fn is_own(&self, author_uuid: &str) -> bool {
        self.current_user_uuid.as_deref() == Some(author_uuid)
    }
}
