use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Message, Participant};

/// Messages kept in a snapshot, newest last.
pub const SNAPSHOT_MESSAGE_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable slice of the chat store.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub session_uuid: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub current_user_uuid: Option<String>,
    #[serde(default)]
    pub last_update: i64,
    pub api_base_url: Option<String>,
}

pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot>, StateError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), StateError>;
}

/// JSON file store scoped to one API base URL.
#[derive(Clone)]
pub struct LocalDb {
    path: PathBuf,
    api_base_url: String,
}

impl LocalDb {
    pub fn new(path: PathBuf, api_base_url: String) -> Self {
        Self { path, api_base_url }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for LocalDb {
    fn load(&self) -> Result<Option<Snapshot>, StateError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StateError::Io(err)),
        };
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        if let Some(api_base_url) = snapshot.api_base_url.as_deref() {
            if api_base_url != self.api_base_url {
                tracing::info!(
                    stored = api_base_url,
                    current = %self.api_base_url,
                    "ignoring snapshot written for another server"
                );
                return Ok(None);
            }
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let mut snapshot = snapshot.clone();
        snapshot.api_base_url = Some(self.api_base_url.clone());
        let payload = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, payload)?;
        set_file_permissions(&self.path, 0o600)?;
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> Result<(), io::Error> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(path)?;
    set_dir_permissions(path, 0o700)?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    let perm = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perm)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    let perm = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perm)
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}
