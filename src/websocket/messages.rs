//! WebSocket wire messages

use serde::{Deserialize, Serialize};

use crate::core_types::AccountId;
use crate::notification::Notification;

/// Server → client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Connected { user_id: AccountId },
    Notification(Notification),
    Pong,
    Error { message: String },
}

/// Client → server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}
