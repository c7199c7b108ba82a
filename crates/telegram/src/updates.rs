//! Turning Bot API updates into transport-neutral inbound events.

use rackbot_core::{ChatId, InboundEvent, InboundKind};
use uuid::Uuid;

use crate::api::{Message, Update};

/// `None` for updates the bot does not act on (media, inline queries, buttons without a
/// message to answer in).
pub fn parse_update(update: &Update) -> Option<InboundEvent> {
    if let Some(query) = &update.callback_query {
        let message = query.message.as_ref()?;
        let data = query.data.clone()?;
        return Some(event(
            message.chat.id,
            Some(message.message_id),
            InboundKind::Button { data, callback_id: query.id.clone() },
        ));
    }

    let message = update.message.as_ref()?;
    let text = message.text.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(event(message.chat.id, Some(message.message_id), text_kind(text)))
}

/// The callback query id to acknowledge, if the update is a button press.
pub fn callback_id(update: &Update) -> Option<&str> {
    update.callback_query.as_ref().map(|query| query.id.as_str())
}

fn text_kind(text: &str) -> InboundKind {
    match command_name(text) {
        Some(name) => InboundKind::Command(name),
        None => InboundKind::Text(text.to_string()),
    }
}

/// `/Start@rack_bot payload` yields `start`.
fn command_name(text: &str) -> Option<String> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        return None;
    }
    Some(name.to_ascii_lowercase())
}

fn event(chat_id: i64, message_id: Option<i64>, kind: InboundKind) -> InboundEvent {
    InboundEvent {
        chat_id: ChatId(chat_id),
        message_id,
        kind,
        correlation_id: Uuid::new_v4().to_string(),
    }
}

pub(crate) fn chat_of(update: &Update) -> Option<i64> {
    let message: Option<&Message> = update
        .callback_query
        .as_ref()
        .and_then(|query| query.message.as_ref())
        .or(update.message.as_ref());
    message.map(|message| message.chat.id)
}

#[cfg(test)]
mod tests {
    use rackbot_core::{ChatId, InboundKind};

    use super::{callback_id, parse_update};
    use crate::api::Update;

    fn update(raw: &str) -> Update {
        serde_json::from_str(raw).expect("update parses")
    }

    #[test]
    fn text_message_becomes_text_event() {
        let event = parse_update(&update(
            r#"{"update_id":1,"message":{"message_id":10,"chat":{"id":42},"text":"  AB12 "}}"#,
        ))
        .expect("event");
        assert_eq!(event.chat_id, ChatId(42));
        assert_eq!(event.message_id, Some(10));
        assert_eq!(event.kind, InboundKind::Text("AB12".to_string()));
        assert!(!event.correlation_id.is_empty());
    }

    #[test]
    fn commands_are_normalised() {
        let start = parse_update(&update(
            r#"{"update_id":2,"message":{"message_id":11,"chat":{"id":42},"text":"/Start@rack_bot hello"}}"#,
        ))
        .expect("event");
        assert_eq!(start.kind, InboundKind::Command("start".to_string()));

        let other = parse_update(&update(
            r#"{"update_id":3,"message":{"message_id":12,"chat":{"id":42},"text":"/help"}}"#,
        ))
        .expect("event");
        assert_eq!(other.kind, InboundKind::Command("help".to_string()));
    }

    #[test]
    fn callback_query_becomes_button_event() {
        let raw = update(
            r#"{"update_id":4,"callback_query":{"id":"cb-1","data":"v1|x||","message":{"message_id":77,"chat":{"id":42}}}}"#,
        );
        assert_eq!(callback_id(&raw), Some("cb-1"));
        let event = parse_update(&raw).expect("event");
        assert_eq!(event.message_id, Some(77));
        assert_eq!(
            event.kind,
            InboundKind::Button { data: "v1|x||".to_string(), callback_id: "cb-1".to_string() }
        );
    }

    #[test]
    fn ignores_updates_without_actionable_content() {
        let photo = update(r#"{"update_id":5,"message":{"message_id":13,"chat":{"id":42}}}"#);
        assert!(parse_update(&photo).is_none());

        let inline = update(r#"{"update_id":6,"callback_query":{"id":"cb-2","data":"v1|x||"}}"#);
        assert!(parse_update(&inline).is_none());
        assert_eq!(callback_id(&inline), Some("cb-2"));

        let bare_slash = update(
            r#"{"update_id":7,"message":{"message_id":14,"chat":{"id":42},"text":"/"}}"#,
        );
        assert_eq!(
            parse_update(&bare_slash).expect("event").kind,
            InboundKind::Text("/".to_string())
        );
    }
}
