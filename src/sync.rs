//! Initial load, backward pagination and update polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{ApiError, RemoteApi};
use crate::session::ChatSession;
use crate::store::{LoadStatus, StoreEvent};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load chat data. Please check your connection.";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("initial load failed: {0}")]
    Hydration(#[source] ApiError),
}

/// Result of one fetch-older trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Another fetch was in flight, history is exhausted, or nothing is cached.
    Skipped,
    Merged { added: usize, has_more_older: bool },
    Failed,
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No load or snapshot has established a watermark yet.
    Skipped,
    Merged {
        inserted: usize,
        updated: usize,
        participants: usize,
    },
    /// At least one request failed; the watermark was held back.
    Failed,
}

/// Resets the fetch-older flag when the fetch ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: RemoteApi> ChatSession<A> {
    /// Fetch session info, full history and the participant directory.
    pub async fn load(&self) -> Result<(), SyncError> {
        let started_at = self.now_ms();
        self.write(|store| store.load_status = LoadStatus::Loading);
        self.emit(StoreEvent::LoadStatusChanged(LoadStatus::Loading));

        let fetched = async {
            let info = self.api.get_info().await?;
            let (messages, participants) = tokio::try_join!(
                self.api.get_all_messages(),
                self.api.get_all_participants()
            )?;
            Ok::<_, ApiError>((info, messages, participants))
        }
        .await;

        let (info, messages, participants) = match fetched {
            Ok(fetched) => fetched,
            Err(error) => {
                tracing::warn!(%error, "initial load failed");
                let status = LoadStatus::Failed(LOAD_FAILED_MESSAGE.to_string());
                self.write(|store| store.load_status = status.clone());
                self.emit(StoreEvent::LoadStatusChanged(status));
                return Err(SyncError::Hydration(error));
            }
        };

        let total = messages.len();
        let resolved_user = self.identity.resolve(&messages, self.now_ms());
        let (current_user, uuids) = self.write(|store| {
            store.session_uuid = Some(info.session_uuid.clone());
            store.directory.merge(participants);
            store.timeline.initialize(messages);
            if store.current_user_uuid.is_none() {
                store.current_user_uuid = resolved_user;
            }
            store.last_update = started_at;
            store.load_status = LoadStatus::Loaded;
            let uuids = store
                .timeline
                .messages()
                .iter()
                .map(|message| message.uuid.clone())
                .collect::<Vec<_>>();
            (store.current_user_uuid.clone(), uuids)
        });
        tracing::info!(
            session = %info.session_uuid,
            api_version = info.api_version,
            total,
            held = uuids.len(),
            "chat loaded"
        );

        self.emit(StoreEvent::ParticipantsChanged);
        self.emit(StoreEvent::TimelineChanged { uuids });
        self.emit(StoreEvent::CurrentUserChanged(current_user));
        self.emit(StoreEvent::LoadStatusChanged(LoadStatus::Loaded));
        self.persist();
        Ok(())
    }

    /// Load one page before the cursor. Failures are logged and swallowed.
    pub async fn fetch_older(&self) -> PageOutcome {
        let Some(_guard) = InFlight::acquire(&self.fetching_older) else {
            tracing::debug!("fetch older already in flight");
            return PageOutcome::Skipped;
        };
        let cursor = self.read(|store| {
            if store.timeline.has_more_older() {
                store.timeline.cursor().map(str::to_string)
            } else {
                None
            }
        });
        let Some(cursor) = cursor else {
            return PageOutcome::Skipped;
        };

        let batch = match self.api.get_older_messages(&cursor).await {
            Ok(batch) => batch,
            Err(error) => {
                tracing::warn!(%error, cursor = %cursor, "failed to fetch older messages");
                return PageOutcome::Failed;
            }
        };

        let (added, has_more_older) = self.write(|store| {
            let added = store.timeline.merge_older(batch);
            (added, store.timeline.has_more_older())
        });
        tracing::debug!(added, has_more_older, "merged older page");
        self.emit(StoreEvent::HistoryPrepended {
            added,
            has_more_older,
        });
        self.persist();
        PageOutcome::Merged {
            added,
            has_more_older,
        }
    }

    /// Pull messages and participants changed since the watermark.
    pub async fn poll_updates(&self) -> PollOutcome {
        let since = self.read(|store| store.last_update);
        if since <= 0 {
            return PollOutcome::Skipped;
        }
        let started_at = self.now_ms();

        let (messages, participants) = tokio::join!(
            self.api.get_message_updates(since),
            self.api.get_participant_updates(since)
        );

        let mut failed = false;
        let mut changed = Vec::new();
        let mut inserted = 0;
        let mut updated = 0;
        match messages {
            Ok(batch) => {
                changed = batch.iter().map(|message| message.uuid.clone()).collect();
                let summary = self.write(|store| store.timeline.merge_newer(batch));
                inserted = summary.inserted;
                updated = summary.updated;
            }
            Err(error) => {
                tracing::warn!(%error, since, "failed to poll message updates");
                failed = true;
            }
        }

        let mut participant_count = 0;
        match participants {
            Ok(batch) => {
                participant_count = self.write(|store| store.directory.merge(batch));
            }
            Err(error) => {
                tracing::warn!(%error, since, "failed to poll participant updates");
                failed = true;
            }
        }

        if !failed {
            self.write(|store| {
                if store.last_update < started_at {
                    store.last_update = started_at;
                }
            });
        }

        if inserted > 0 || updated > 0 {
            self.emit(StoreEvent::TimelineChanged { uuids: changed });
        }
        if participant_count > 0 {
            self.emit(StoreEvent::ParticipantsChanged);
        }
        self.persist();

        if failed {
            PollOutcome::Failed
        } else {
            PollOutcome::Merged {
                inserted,
                updated,
                participants: participant_count,
            }
        }
    }

    /// Poll every `interval` until the returned handle is stopped or dropped.
    pub fn spawn_poller(&self, interval: Duration) -> PollerHandle {
        let session = self.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let outcome = session.poll_updates().await;
                        tracing::trace!(?outcome, "poll tick");
                    }
                }
            }
            tracing::debug!("poller stopped");
        });
        PollerHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Owner of a running poll task.
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling and wait for an in-flight tick to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
