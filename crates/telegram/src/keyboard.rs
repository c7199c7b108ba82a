//! Rendering transport-neutral replies as Bot API inline keyboards.

use rackbot_core::flows::{ButtonTarget, CallbackError};
use rackbot_core::Reply;

use crate::api::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};

/// Bot API limit on message text, counted here in chars.
pub const MAX_MESSAGE_CHARS: usize = 4096;
const TRUNCATION_MARK: &str = "\n…";

/// `None` when the reply carries no buttons.
pub fn inline_keyboard(reply: &Reply) -> Result<Option<InlineKeyboardMarkup>, CallbackError> {
    if reply.keyboard.is_empty() {
        return Ok(None);
    }
    let mut rows = Vec::with_capacity(reply.keyboard.len());
    for row in &reply.keyboard {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            let rendered = match &button.target {
                ButtonTarget::Callback(data) => InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: Some(data.encode()?),
                    web_app: None,
                },
                ButtonTarget::WebApp(url) => InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: None,
                    web_app: Some(WebAppInfo { url: url.clone() }),
                },
            };
            buttons.push(rendered);
        }
        rows.push(buttons);
    }
    Ok(Some(InlineKeyboardMarkup { inline_keyboard: rows }))
}

/// Cuts long reports so the message is still accepted.
pub fn message_text(reply: &Reply) -> String {
    if reply.text.chars().count() <= MAX_MESSAGE_CHARS {
        return reply.text.clone();
    }
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_MARK.chars().count();
    let mut text: String = reply.text.chars().take(keep).collect();
    text.push_str(TRUNCATION_MARK);
    text
}

#[cfg(test)]
mod tests {
    use rackbot_core::flows::render::{main_menu, MenuOptions, Reply, ReplyBuilder};
    use rackbot_core::flows::{CallbackAction, CallbackData};
    use rackbot_core::{OperationKind, StoreCode};

    use super::{inline_keyboard, message_text, MAX_MESSAGE_CHARS};

    #[test]
    fn plain_reply_has_no_keyboard() {
        let reply = Reply { text: "done".to_string(), keyboard: Vec::new() };
        assert_eq!(inline_keyboard(&reply).expect("renders"), None);
    }

    #[test]
    fn callback_buttons_carry_encoded_payloads() {
        let store = StoreCode::parse("AB12").expect("valid store");
        let data = CallbackData::new(CallbackAction::PickStore(OperationKind::DeleteStore))
            .with_store(store);
        let reply = ReplyBuilder::new("Pick")
            .row(|row| {
                row.callback("AB12", data.clone());
            })
            .build();

        let markup = inline_keyboard(&reply).expect("renders").expect("has keyboard");
        let button = &markup.inline_keyboard[0][0];
        assert_eq!(button.text, "AB12");
        let payload = button.callback_data.as_deref().expect("callback payload");
        assert_eq!(CallbackData::decode(payload).expect("decodes"), data);
        assert!(button.web_app.is_none());
    }

    #[test]
    fn web_app_button_serialises_without_callback_data() {
        let options = MenuOptions { web_app_url: Some("https://app.example/racks".to_string()) };
        let markup =
            inline_keyboard(&main_menu(&options, None)).expect("renders").expect("has keyboard");
        let json = serde_json::to_value(&markup).expect("serialises");
        let web_app = json["inline_keyboard"]
            .as_array()
            .expect("rows")
            .iter()
            .flat_map(|row| row.as_array().expect("buttons").iter())
            .find(|button| button.get("web_app").is_some())
            .expect("web app button present");
        assert_eq!(web_app["web_app"]["url"], "https://app.example/racks");
        assert!(web_app.get("callback_data").is_none());
    }

    #[test]
    fn long_text_is_truncated_to_the_limit() {
        let reply = Reply { text: "x".repeat(MAX_MESSAGE_CHARS + 50), keyboard: Vec::new() };
        let text = message_text(&reply);
        assert_eq!(text.chars().count(), MAX_MESSAGE_CHARS);
        assert!(text.ends_with('…'));
    }
}
