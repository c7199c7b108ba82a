//! Conversation runtime for the inventory bot.
//!
//! - `engine`: applies the pure flow state machine to a session and performs the effects
//!   it asks for (listing stores and racks, executing commands, rendering replies).
//! - `session`: per-chat conversation memory.
//! - `router`: one task per chat, serialising that chat's events and expiring pending
//!   operations after inactivity.

pub mod engine;
pub mod router;
pub mod session;

pub use engine::ConversationEngine;
pub use router::{SessionRouter, IDLE_SESSION_RETENTION};
pub use session::Session;
