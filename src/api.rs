use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::model::{Message, Participant, SessionInfo};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected status: {0}")]
    Status(u16),
}

/// Endpoints of the chat server consumed by the sync engine.
pub trait RemoteApi: Send + Sync + 'static {
    fn get_info(&self) -> impl Future<Output = Result<SessionInfo, ApiError>> + Send;

    fn get_all_messages(&self) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    /// Most recent page. Not used by the sync engine.
    fn get_latest_messages(&self) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    /// Up to one page of messages sent before `ref_message_uuid`.
    fn get_older_messages(
        &self,
        ref_message_uuid: &str,
    ) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    /// Messages created or edited after `since_ms`.
    fn get_message_updates(
        &self,
        since_ms: i64,
    ) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    fn post_message(&self, text: &str) -> impl Future<Output = Result<Message, ApiError>> + Send;

    fn get_all_participants(
        &self,
    ) -> impl Future<Output = Result<Vec<Participant>, ApiError>> + Send;

    fn get_participant_updates(
        &self,
        since_ms: i64,
    ) -> impl Future<Output = Result<Vec<Participant>, ApiError>> + Send;
}

#[derive(Clone)]
pub struct HttpApi {
    base_url: String,
    http: Client,
}

impl HttpApi {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

impl RemoteApi for HttpApi {
    async fn get_info(&self) -> Result<SessionInfo, ApiError> {
        self.get(&["info"]).await
    }

    async fn get_all_messages(&self) -> Result<Vec<Message>, ApiError> {
        self.get(&["messages", "all"]).await
    }

    async fn get_latest_messages(&self) -> Result<Vec<Message>, ApiError> {
        self.get(&["messages", "latest"]).await
    }

    async fn get_older_messages(&self, ref_message_uuid: &str) -> Result<Vec<Message>, ApiError> {
        self.get(&["messages", "older", ref_message_uuid]).await
    }

    async fn get_message_updates(&self, since_ms: i64) -> Result<Vec<Message>, ApiError> {
        self.get(&["messages", "updates", &since_ms.to_string()]).await
    }

    async fn post_message(&self, text: &str) -> Result<Message, ApiError> {
        let url = self.endpoint(&["messages", "new"])?;
        tracing::debug!(%url, "POST");
        let response = self.http.post(url).json(&json!({ "text": text })).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    async fn get_all_participants(&self) -> Result<Vec<Participant>, ApiError> {
        self.get(&["participants", "all"]).await
    }

    async fn get_participant_updates(&self, since_ms: i64) -> Result<Vec<Participant>, ApiError> {
        self.get(&["participants", "updates", &since_ms.to_string()])
            .await
    }
}
