//! Telegram gateway for the inventory bot.
//!
//! - **Bot API** (`api`) - wire types, the `BotApi` seam and its reqwest client
//! - **Updates** (`updates`) - updates to transport-neutral inbound events
//! - **Keyboards** (`keyboard`) - replies to inline keyboards
//! - **Polling** (`polling`) - long-polling loop with offset tracking and reconnect backoff
//! - **Outbox** (`outbox`) - sends or edits replies
//!
//! ```text
//! getUpdates → PollingRunner → EventSink (session router) → conversation engine
//!                                                               ↓
//!                       sendMessage / editMessageText ← TelegramOutbox
//! ```

pub mod api;
pub mod keyboard;
pub mod outbox;
pub mod polling;
pub mod updates;

pub use api::{ApiError, BotApi, HttpBotApi};
pub use outbox::TelegramOutbox;
pub use polling::{PollingExit, PollingRunner, ReconnectPolicy};
