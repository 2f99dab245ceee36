use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid credential: {0}")]
    InvalidToken(String),
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("room client has shut down")]
    ClientClosed,
}

impl From<tungstenite::Error> for SyncError {
    fn from(err: tungstenite::Error) -> Self {
        SyncError::WebSocket(Box::new(err))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
