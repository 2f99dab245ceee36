use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Frames pushed by the server on a room's live channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "new_message")]
    NewMessage {
        message: Message,
    },
    #[serde(rename = "typing")]
    Typing {
        username: String,
    },
    #[serde(rename = "stop_typing")]
    StopTyping {
        username: String,
    },
    #[serde(other)]
    Unknown,
}

/// Frames the client writes to the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "typing")]
    Typing {
        username: String,
    },
    #[serde(rename = "stop_typing")]
    StopTyping {
        username: String,
    },
}

/// One page of the REST message history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryPage {
    pub results: Vec<Message>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct OutgoingMessage<'a> {
    pub content: &'a str,
}
