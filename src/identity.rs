//! Local-user identity selection.
//!
//! The remote API has no authentication, so the client has to decide which
//! participant it is. [`RecentActivityIdentity`] reproduces the placeholder
//! heuristic; [`FixedIdentity`] is used when the id is configured.

use crate::model::Message;

/// Identifier assumed for the local user when nothing better is known.
pub const SENTINEL_USER_ID: &str = "user-1";

const RECENT_WINDOW_MS: i64 = 60 * 60 * 1000;

pub trait IdentityResolver: Send + Sync {
    /// Pick the local user from freshly loaded history.
    fn resolve(&self, history: &[Message], now_ms: i64) -> Option<String>;
}

/// Claims the sentinel id when anything was sent within the last hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecentActivityIdentity;

impl IdentityResolver for RecentActivityIdentity {
    fn resolve(&self, history: &[Message], now_ms: i64) -> Option<String> {
        history
            .iter()
            .any(|message| now_ms - message.sent_at < RECENT_WINDOW_MS)
            .then(|| SENTINEL_USER_ID.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct FixedIdentity(pub String);

impl IdentityResolver for FixedIdentity {
    fn resolve(&self, _history: &[Message], _now_ms: i64) -> Option<String> {
        Some(self.0.clone())
    }
}
