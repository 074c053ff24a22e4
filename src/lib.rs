//! Local synchronization cache for a polled chat feed.
//!
//! A [`ChatSession`] owns the message timeline and the participant
//! directory. The sync engine fills them from the remote API (initial load,
//! backward pagination, update polling) and the mutation manager applies
//! sends, replies, edits and reactions on top.

pub mod api;
pub mod clock;
pub mod config;
pub mod dates;
pub mod directory;
pub mod identity;
pub mod logging;
pub mod model;
pub mod mutation;
pub mod output;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;
pub mod timeline;

pub use api::{ApiError, HttpApi, RemoteApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::ParticipantDirectory;
pub use identity::{FixedIdentity, IdentityResolver, RecentActivityIdentity, SENTINEL_USER_ID};
pub use model::{
    Attachment, AttachmentKind, LocalStatus, Message, Participant, Reaction, SessionInfo,
};
pub use mutation::{EDIT_WINDOW_MS, EditRejection, MutationError, SendOutcome, edit_eligibility};
pub use session::{ChatSession, EventStream};
pub use state::{LocalDb, Snapshot, SnapshotStore, StateError};
pub use store::{ChatStore, LoadStatus, StoreEvent};
pub use sync::{PageOutcome, PollOutcome, PollerHandle, SyncError};
pub use timeline::{MergeSummary, PAGE_SIZE, TimelineCache, TimelineMergeError};
