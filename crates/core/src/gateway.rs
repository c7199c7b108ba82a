//! Seams between the conversation runtime and a chat transport.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::render::Reply;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundKind {
    /// Slash command without the leading `/`, e.g. `start`.
    Command(String),
    /// Button press. `data` is the raw callback payload.
    Button { data: String, callback_id: String },
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    /// Message the event refers to; for button presses, the message holding the keyboard.
    pub message_id: Option<i64>,
    pub kind: InboundKind,
    pub correlation_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Send,
    Edit { message_id: i64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    pub chat_id: ChatId,
    pub delivery: Delivery,
    pub reply: Reply,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected by chat platform: {0}")]
    Rejected(String),
    #[error("event sink is closed")]
    Closed,
}

#[async_trait]
pub trait Outbox: Send + Sync {
    async fn deliver(&self, outgoing: Outgoing) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn accept(&self, event: InboundEvent) -> Result<(), GatewayError>;
}
