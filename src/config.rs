use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::DEFAULT_POLL_INTERVAL;

const DEFAULT_API_BASE_URL: &str = "https://dummy-chat-server.tribechat.com/api";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub state_path: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Explicit local user; overrides the recent-activity heuristic.
    pub user_id: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        let debug = cfg!(debug_assertions);
        let api_base_url = env::var("CHATSYNC_API_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let data_dir = env::var("CHATSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir(debug));
        let state_path = env::var("CHATSYNC_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("state.json"));

        let poll_interval =
            millis_from_env("CHATSYNC_POLL_INTERVAL_MS").unwrap_or(DEFAULT_POLL_INTERVAL);
        let request_timeout =
            millis_from_env("CHATSYNC_REQUEST_TIMEOUT_MS").unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let user_id = env::var("CHATSYNC_USER_ID")
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Self {
            api_base_url,
            data_dir,
            state_path,
            poll_interval,
            request_timeout,
            user_id,
        }
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    parse_millis(&env::var(key).ok()?)
}

fn parse_millis(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
    }
}

fn default_data_dir(debug: bool) -> PathBuf {
    let base = env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let dir_name = if debug { "chatsync-dev" } else { "chatsync" };
    base.join(".local").join("share").join(dir_name)
}
