use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::messages::{HistoryPage, OutgoingMessage};
use crate::models::RoomId;

/// REST side of a chat room: paginated history and message submission.
#[async_trait]
pub trait HistoryGateway: Send + Sync + 'static {
    /// Fetches one page, newest messages first. `cursor` selects an older
    /// page; `None` asks for the newest one.
    async fn fetch_page(&self, room: RoomId, cursor: Option<&str>) -> SyncResult<HistoryPage>;

    /// Posts a message. The stored message comes back over the live channel,
    /// not in the response.
    async fn send_message(&self, room: RoomId, content: &str) -> SyncResult<()>;
}

pub struct RestGateway {
    http: Client,
    config: ClientConfig,
}

impl RestGateway {
    pub fn new(config: &ClientConfig) -> SyncResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(RestGateway {
            http,
            config: config.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Status { status, body })
    }
}

#[async_trait]
impl HistoryGateway for RestGateway {
    async fn fetch_page(&self, room: RoomId, cursor: Option<&str>) -> SyncResult<HistoryPage> {
        let url = self.config.messages_url(room);
        debug!("GET {} cursor={:?}", url, cursor);

        let mut request = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .query(&[("limit", self.config.page_limit)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = Self::check(request.send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_message(&self, room: RoomId, content: &str) -> SyncResult<()> {
        let url = self.config.messages_url(room);
        debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&OutgoingMessage { content })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
