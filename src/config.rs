use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::models::RoomId;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_PAGE_LIMIT: u32 = 35;
pub const DEFAULT_TYPING_QUIET_PERIOD: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub ws_url: String,
    pub token: String,
    pub page_limit: u32,
    /// Silence after the last keystroke before `stop_typing` is sent.
    pub typing_quiet_period: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        ws_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            ws_url: ws_url.into(),
            token: token.into(),
            page_limit: DEFAULT_PAGE_LIMIT,
            typing_quiet_period: DEFAULT_TYPING_QUIET_PERIOD,
        }
    }

    /// Reads `CHAT_BASE_URL`, `CHAT_WS_URL` and `CHAT_TOKEN`. Only the token is required.
    pub fn from_env() -> SyncResult<Self> {
        let token = env::var("CHAT_TOKEN").map_err(|_| SyncError::MissingConfig("CHAT_TOKEN"))?;
        let base_url = env::var("CHAT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let ws_url = env::var("CHAT_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());

        Ok(ClientConfig::new(base_url, ws_url, token))
    }

    pub fn messages_url(&self, room: RoomId) -> String {
        format!("{}/chatrooms/{}/messages/", self.base_url.trim_end_matches('/'), room)
    }

    pub fn live_url(&self, room: RoomId) -> SyncResult<String> {
        let mut url = Url::parse(&format!(
            "{}/chat/{}/",
            self.ws_url.trim_end_matches('/'),
            room
        ))?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url.into())
    }
}
