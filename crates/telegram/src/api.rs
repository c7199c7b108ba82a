//! Bot API wire types and the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use rackbot_core::config::TelegramConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Extra client-side headroom over the long-poll timeout.
const POLL_GRACE_SECS: u64 = 10;
const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("bot api unreachable: {0}")]
    Transport(String),
    #[error("bot api rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("bot api rejected request ({code}): {description}")]
    Rejected { code: u16, description: String },
    #[error("bot api response could not be decoded: {0}")]
    Decode(String),
}

impl ApiError {
    /// Token revoked or wrong; polling again cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Rejected { code: 401 | 404, .. })
    }

    /// Editing a message to identical content.
    pub fn is_not_modified(&self) -> bool {
        matches!(
            self,
            Self::Rejected { code: 400, description } if description.contains("message is not modified")
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebAppInfo {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError>;

    /// Returns the id of the sent message.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64, ApiError>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), ApiError>;

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ApiError>;
}

pub struct HttpBotApi {
    client: reqwest::Client,
    api_base_url: String,
    token: SecretString,
}

impl HttpBotApi {
    pub fn new(client: reqwest::Client, api_base_url: impl Into<String>, token: SecretString) -> Self {
        Self { client, api_base_url: api_base_url.into(), token }
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + POLL_GRACE_SECS))
            .build()
            .map_err(|error| ApiError::Transport(error.without_url().to_string()))?;
        Ok(Self::new(client, config.api_base_url.clone(), config.bot_token.clone()))
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base_url.trim_end_matches('/'),
            self.token.expose_secret()
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, ApiError> {
        debug!(event_name = "telegram.api.call", method, "calling bot api");
        // The token is part of the path, so errors are stripped of their url.
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.without_url().to_string()))?;
        let status = response.status();
        let payload: ApiResponse<T> = response.json().await.map_err(|error| {
            if status.is_server_error() {
                ApiError::Transport(format!("http {status}"))
            } else {
                ApiError::Decode(error.without_url().to_string())
            }
        })?;
        let result = into_result(status.as_u16(), payload);
        if let Err(error) = &result {
            warn!(event_name = "telegram.api.error", method, error = %error, "bot api call failed");
        }
        result
    }
}

fn into_result<T>(status: u16, payload: ApiResponse<T>) -> Result<T, ApiError> {
    if payload.ok {
        return payload.result.ok_or_else(|| ApiError::Decode("missing result".to_string()));
    }
    let code = payload.error_code.unwrap_or(status);
    let description = payload.description.unwrap_or_else(|| "no description".to_string());
    match code {
        429 => Err(ApiError::RateLimited {
            retry_after_secs: payload
                .parameters
                .and_then(|parameters| parameters.retry_after)
                .unwrap_or(1),
        }),
        500..=599 => Err(ApiError::Transport(format!("{code}: {description}"))),
        _ => Err(ApiError::Rejected { code, description }),
    }
}

fn message_body(
    chat_id: i64,
    text: &str,
    keyboard: Option<&InlineKeyboardMarkup>,
) -> serde_json::Map<String, Value> {
    let mut body = serde_json::Map::new();
    body.insert("chat_id".to_string(), json!(chat_id));
    body.insert("text".to_string(), json!(text));
    if let Some(keyboard) = keyboard {
        body.insert("reply_markup".to_string(), json!(keyboard));
    }
    body
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError> {
        let mut body = json!({ "timeout": timeout_secs, "allowed_updates": ALLOWED_UPDATES });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", body).await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64, ApiError> {
        let body = message_body(chat_id, text, keyboard);
        let message: Message = self.call("sendMessage", Value::Object(body)).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), ApiError> {
        let mut body = message_body(chat_id, text, keyboard);
        body.insert("message_id".to_string(), json!(message_id));
        // Returns the edited message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", Value::Object(body)).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ApiError> {
        let _: bool =
            self.call("answerCallbackQuery", json!({ "callback_query_id": callback_id })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{into_result, ApiError, ApiResponse, HttpBotApi, Update};

    fn response<T: serde::de::DeserializeOwned>(raw: &str) -> ApiResponse<T> {
        serde_json::from_str(raw).expect("response parses")
    }

    #[test]
    fn method_url_embeds_token_once() {
        let api = HttpBotApi::new(
            reqwest::Client::new(),
            "https://api.telegram.org/",
            SecretString::from("123:abc".to_string()),
        );
        assert_eq!(api.method_url("getUpdates"), "https://api.telegram.org/bot123:abc/getUpdates");
    }

    #[test]
    fn successful_response_yields_result() {
        let updates: Vec<Update> = into_result(
            200,
            response(
                r#"{"ok":true,"result":[{"update_id":7,"message":{"message_id":3,"chat":{"id":42,"type":"private"},"text":"hi"}}]}"#,
            ),
        )
        .expect("ok response");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 7);
        assert_eq!(updates[0].message.as_ref().and_then(|m| m.text.as_deref()), Some("hi"));
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let error = into_result::<bool>(
            429,
            response(r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":5}}"#),
        )
        .expect_err("rate limited");
        assert_eq!(error, ApiError::RateLimited { retry_after_secs: 5 });
    }

    #[test]
    fn classifies_rejections() {
        let unauthorized = into_result::<bool>(
            401,
            response(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#),
        )
        .expect_err("unauthorized");
        assert!(unauthorized.is_fatal());

        let unchanged = into_result::<bool>(
            400,
            response(
                r#"{"ok":false,"error_code":400,"description":"Bad Request: message is not modified"}"#,
            ),
        )
        .expect_err("not modified");
        assert!(unchanged.is_not_modified());
        assert!(!unchanged.is_fatal());

        let server = into_result::<bool>(
            502,
            response(r#"{"ok":false,"error_code":502,"description":"Bad Gateway"}"#),
        )
        .expect_err("server error");
        assert!(matches!(server, ApiError::Transport(_)));
    }
}
