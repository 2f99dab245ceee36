use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = i64;
pub type RoomId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room: RoomId,
    pub sender: User,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub read_statuses: Vec<User>,
}
