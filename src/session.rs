use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::api::RemoteApi;
use crate::clock::{Clock, SystemClock};
use crate::identity::{IdentityResolver, RecentActivityIdentity};
use crate::state::SnapshotStore;
use crate::store::{ChatStore, StoreEvent};

const EVENT_BUFFER: usize = 256;

/// Broadcast stream of store changes for observers.
pub type EventStream = broadcast::Receiver<StoreEvent>;

/// Handle shared by the sync engine, the mutation manager and observers.
///
/// Cloning is cheap; every clone sees the same store. The store lock is
/// never held across an await, so each merge is atomic.
pub struct ChatSession<A> {
    pub(crate) api: Arc<A>,
    store: Arc<Mutex<ChatStore>>,
    pub(crate) fetching_older: Arc<AtomicBool>,
    events: broadcast::Sender<StoreEvent>,
    pub(crate) identity: Arc<dyn IdentityResolver>,
    pub(crate) clock: Arc<dyn Clock>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl<A> Clone for ChatSession<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            fetching_older: Arc::clone(&self.fetching_older),
            events: self.events.clone(),
            identity: Arc::clone(&self.identity),
            clock: Arc::clone(&self.clock),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<A: RemoteApi> ChatSession<A> {
    pub fn new(api: A) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            api: Arc::new(api),
            store: Arc::new(Mutex::new(ChatStore::new())),
            fetching_older: Arc::new(AtomicBool::new(false)),
            events,
            identity: Arc::new(RecentActivityIdentity),
            clock: Arc::new(SystemClock),
            snapshots: None,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a snapshot store and restore its contents, if any.
    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        match snapshots.load() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    messages = snapshot.messages.len(),
                    participants = snapshot.participants.len(),
                    "restored snapshot"
                );
                *self.lock() = ChatStore::from_snapshot(snapshot);
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "failed to load snapshot"),
        }
        self.snapshots = Some(snapshots);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Read the store without holding the lock beyond `f`.
    pub fn read<R>(&self, f: impl FnOnce(&ChatStore) -> R) -> R {
        f(&self.lock())
    }

    /// Override the local user, for example from configuration.
    pub fn set_current_user(&self, uuid: Option<String>) {
        let changed = self.write(|store| {
            let changed = store.current_user_uuid != uuid;
            store.current_user_uuid = uuid.clone();
            changed
        });
        if changed {
            self.emit(StoreEvent::CurrentUserChanged(uuid));
            self.persist();
        }
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut ChatStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub(crate) fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    /// Save the current state if a snapshot store is attached.
    pub fn persist(&self) {
        let Some(snapshots) = self.snapshots.as_ref() else {
            return;
        };
        let snapshot = self.read(ChatStore::to_snapshot);
        if let Err(error) = snapshots.save(&snapshot) {
            tracing::warn!(%error, "failed to save snapshot");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChatStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
