use std::sync::Arc;

use async_trait::async_trait;
use rackbot_core::{Delivery, GatewayError, Outbox, Outgoing};
use tracing::{debug, warn};

use crate::api::{ApiError, BotApi};
use crate::keyboard::{inline_keyboard, message_text};

/// Delivers replies through the Bot API. An edit that Telegram refuses (message too old,
/// deleted, or not ours) falls back to a fresh message.
pub struct TelegramOutbox {
    api: Arc<dyn BotApi>,
}

impl TelegramOutbox {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self { api }
    }
}

fn gateway_error(error: ApiError) -> GatewayError {
    match error {
        ApiError::Rejected { code, description } => {
            GatewayError::Rejected(format!("{code}: {description}"))
        }
        other => GatewayError::Transport(other.to_string()),
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn deliver(&self, outgoing: Outgoing) -> Result<(), GatewayError> {
        let keyboard = inline_keyboard(&outgoing.reply)
            .map_err(|error| GatewayError::Rejected(error.to_string()))?;
        let text = message_text(&outgoing.reply);
        let chat_id = outgoing.chat_id.0;

        if let Delivery::Edit { message_id } = outgoing.delivery {
            match self.api.edit_message(chat_id, message_id, &text, keyboard.as_ref()).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_not_modified() => return Ok(()),
                Err(error @ ApiError::Rejected { .. }) => {
                    warn!(
                        event_name = "telegram.outbox.edit_rejected",
                        chat_id,
                        message_id,
                        error = %error,
                        "edit refused, sending a new message instead"
                    );
                }
                Err(error) => return Err(gateway_error(error)),
            }
        }

        let message_id = self
            .api
            .send_message(chat_id, &text, keyboard.as_ref())
            .await
            .map_err(gateway_error)?;
        debug!(event_name = "telegram.outbox.sent", chat_id, message_id, "reply sent");
        Ok(())
    }
}
