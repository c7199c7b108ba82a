use std::env;
use std::fs;
use std::path::Path;

use rackbot_core::config::{resolve_config_path, AppConfig, LoadOptions, LEGACY_ENV_FALLBACKS};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG_INVALID};

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl Field {
    fn new(key: &'static str, env_keys: &'static [&'static str], value: impl Into<String>) -> Self {
        Self { key, env_keys, value: value.into() }
    }
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG_INVALID,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::success(lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let telegram = &config.telegram;
    let sheets = &config.sheets;
    vec![
        Field::new(
            "telegram.bot_token",
            &["RACKBOT_TELEGRAM_BOT_TOKEN"],
            redact_bot_token(telegram.bot_token.expose_secret()),
        ),
        Field::new(
            "telegram.api_base_url",
            &["RACKBOT_TELEGRAM_API_BASE_URL"],
            telegram.api_base_url.as_str(),
        ),
        Field::new(
            "telegram.poll_timeout_secs",
            &["RACKBOT_TELEGRAM_POLL_TIMEOUT_SECS"],
            telegram.poll_timeout_secs.to_string(),
        ),
        Field::new(
            "telegram.web_app_url",
            &["RACKBOT_TELEGRAM_WEB_APP_URL"],
            telegram.web_app_url.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "sheets.spreadsheet_id",
            &["RACKBOT_SHEETS_SPREADSHEET_ID"],
            sheets.spreadsheet_id.as_str(),
        ),
        Field::new(
            "sheets.client_id",
            &["RACKBOT_SHEETS_CLIENT_ID"],
            sheets.client_id.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "sheets.client_secret",
            &["RACKBOT_SHEETS_CLIENT_SECRET"],
            redact_optional(sheets.client_secret.as_ref()),
        ),
        Field::new(
            "sheets.refresh_token",
            &["RACKBOT_SHEETS_REFRESH_TOKEN"],
            redact_optional(sheets.refresh_token.as_ref()),
        ),
        Field::new(
            "sheets.access_token",
            &["RACKBOT_SHEETS_ACCESS_TOKEN"],
            redact_optional(sheets.access_token.as_ref()),
        ),
        Field::new(
            "sheets.api_base_url",
            &["RACKBOT_SHEETS_API_BASE_URL"],
            sheets.api_base_url.as_str(),
        ),
        Field::new("sheets.token_url", &["RACKBOT_SHEETS_TOKEN_URL"], sheets.token_url.as_str()),
        Field::new(
            "sheets.products_table",
            &["RACKBOT_SHEETS_PRODUCTS_TABLE"],
            sheets.products_table.as_str(),
        ),
        Field::new(
            "sheets.request_timeout_secs",
            &["RACKBOT_SHEETS_REQUEST_TIMEOUT_SECS"],
            sheets.request_timeout_secs.to_string(),
        ),
        Field::new(
            "retry.max_retries",
            &["RACKBOT_RETRY_MAX_RETRIES"],
            config.retry.max_retries.to_string(),
        ),
        Field::new(
            "retry.base_delay_ms",
            &["RACKBOT_RETRY_BASE_DELAY_MS"],
            config.retry.base_delay_ms.to_string(),
        ),
        Field::new(
            "retry.max_delay_ms",
            &["RACKBOT_RETRY_MAX_DELAY_MS"],
            config.retry.max_delay_ms.to_string(),
        ),
        Field::new(
            "conversation.inactivity_timeout_secs",
            &["RACKBOT_CONVERSATION_INACTIVITY_TIMEOUT_SECS"],
            config.conversation.inactivity_timeout_secs.to_string(),
        ),
        Field::new(
            "server.bind_address",
            &["RACKBOT_SERVER_BIND_ADDRESS"],
            config.server.bind_address.as_str(),
        ),
        Field::new(
            "server.health_check_port",
            &["RACKBOT_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        Field::new(
            "server.graceful_shutdown_secs",
            &["RACKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new(
            "logging.level",
            &["RACKBOT_LOGGING_LEVEL", "RACKBOT_LOG_LEVEL"],
            config.logging.level.as_str(),
        ),
        Field::new(
            "logging.format",
            &["RACKBOT_LOGGING_FORMAT", "RACKBOT_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
        return format!("env ({env_key})");
    }
    if let Some(legacy) = env_keys.first().and_then(|primary| legacy_env_key(primary)) {
        if env_is_set(legacy) {
            return format!("env ({legacy}, legacy)");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn legacy_env_key(primary: &str) -> Option<&'static str> {
    LEGACY_ENV_FALLBACKS
        .iter()
        .find(|(key, _)| *key == primary)
        .map(|(_, legacy)| *legacy)
}

fn env_is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|value| !value.trim().is_empty())
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id, hides the secret half.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

fn redact_optional(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>",
        _ => "<unset>",
    }
}
