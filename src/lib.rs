pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod messages;
pub mod models;
pub mod pagination;
pub mod room;
pub mod scroll;
pub mod timeline;
pub mod typing;

pub use channel::ChannelState;
pub use client::{ClientEvent, NoticeLevel, RoomClient, RoomHandle};
pub use config::ClientConfig;
pub use error::{SyncError, SyncResult};
pub use gateway::{HistoryGateway, RestGateway};
pub use identity::Identity;
pub use models::{Message, MessageId, RoomId, User};
pub use room::RoomSession;
pub use scroll::{ScrollAnchor, ViewportGeometry, ViewportRequest};
pub use timeline::Timeline;
