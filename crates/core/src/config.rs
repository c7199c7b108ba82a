use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::store::is_store_code;

pub const DEFAULT_CONFIG_FILE: &str = "rackbot.toml";
pub const NESTED_CONFIG_FILE: &str = "config/rackbot.toml";

/// Environment names used by earlier deployments of the bot. They are read only when the
/// matching `RACKBOT_*` variable is unset.
pub const LEGACY_ENV_FALLBACKS: &[(&str, &str)] = &[
    ("RACKBOT_TELEGRAM_BOT_TOKEN", "TELEGRAM_TOKEN"),
    ("RACKBOT_SHEETS_SPREADSHEET_ID", "SPREADSHEET_ID"),
    ("RACKBOT_TELEGRAM_WEB_APP_URL", "WEB_APP_URL"),
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub sheets: SheetsConfig,
    pub retry: RetryConfig,
    pub conversation: ConversationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub web_app_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub api_base_url: String,
    pub token_url: String,
    pub products_table: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub inactivity_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// How the Sheets client authenticates, derived from [`SheetsConfig`].
#[derive(Clone, Debug)]
pub enum SheetsCredentials {
    AccessToken(SecretString),
    RefreshToken { client_id: String, client_secret: SecretString, refresh_token: SecretString },
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheets_access_token: Option<String>,
    pub products_table: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
                web_app_url: None,
            },
            sheets: SheetsConfig {
                spreadsheet_id: String::new(),
                client_id: None,
                client_secret: None,
                refresh_token: None,
                access_token: None,
                api_base_url: "https://sheets.googleapis.com".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                products_table: "produk".to_string(),
                request_timeout_secs: 30,
            },
            retry: RetryConfig { max_retries: 3, base_delay_ms: 200, max_delay_ms: 3_000 },
            conversation: ConversationConfig { inactivity_timeout_secs: 300 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(web_app_url) = telegram.web_app_url {
                self.telegram.web_app_url = Some(web_app_url);
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = spreadsheet_id;
            }
            if let Some(client_id) = sheets.client_id {
                self.sheets.client_id = Some(client_id);
            }
            if let Some(client_secret) = sheets.client_secret {
                self.sheets.client_secret = Some(secret_value(client_secret));
            }
            if let Some(refresh_token) = sheets.refresh_token {
                self.sheets.refresh_token = Some(secret_value(refresh_token));
            }
            if let Some(access_token) = sheets.access_token {
                self.sheets.access_token = Some(secret_value(access_token));
            }
            if let Some(api_base_url) = sheets.api_base_url {
                self.sheets.api_base_url = api_base_url;
            }
            if let Some(token_url) = sheets.token_url {
                self.sheets.token_url = token_url;
            }
            if let Some(products_table) = sheets.products_table {
                self.sheets.products_table = products_table;
            }
            if let Some(request_timeout_secs) = sheets.request_timeout_secs {
                self.sheets.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(retry) = patch.retry {
            if let Some(max_retries) = retry.max_retries {
                self.retry.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = retry.base_delay_ms {
                self.retry.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = retry.max_delay_ms {
                self.retry.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(inactivity_timeout_secs) = conversation.inactivity_timeout_secs {
                self.conversation.inactivity_timeout_secs = inactivity_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_with_fallback("RACKBOT_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("RACKBOT_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("RACKBOT_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("RACKBOT_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env_with_fallback("RACKBOT_TELEGRAM_WEB_APP_URL") {
            self.telegram.web_app_url = Some(value);
        }

        if let Some(value) = read_env_with_fallback("RACKBOT_SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = value;
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_CLIENT_ID") {
            self.sheets.client_id = Some(value);
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_CLIENT_SECRET") {
            self.sheets.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_REFRESH_TOKEN") {
            self.sheets.refresh_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_ACCESS_TOKEN") {
            self.sheets.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_API_BASE_URL") {
            self.sheets.api_base_url = value;
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_TOKEN_URL") {
            self.sheets.token_url = value;
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_PRODUCTS_TABLE") {
            self.sheets.products_table = value;
        }
        if let Some(value) = read_env("RACKBOT_SHEETS_REQUEST_TIMEOUT_SECS") {
            self.sheets.request_timeout_secs =
                parse_u64("RACKBOT_SHEETS_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RACKBOT_RETRY_MAX_RETRIES") {
            self.retry.max_retries = parse_u32("RACKBOT_RETRY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("RACKBOT_RETRY_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_u64("RACKBOT_RETRY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("RACKBOT_RETRY_MAX_DELAY_MS") {
            self.retry.max_delay_ms = parse_u64("RACKBOT_RETRY_MAX_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("RACKBOT_CONVERSATION_INACTIVITY_TIMEOUT_SECS") {
            self.conversation.inactivity_timeout_secs =
                parse_u64("RACKBOT_CONVERSATION_INACTIVITY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RACKBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RACKBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("RACKBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("RACKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("RACKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("RACKBOT_LOGGING_LEVEL").or_else(|| read_env("RACKBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RACKBOT_LOGGING_FORMAT").or_else(|| read_env("RACKBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(spreadsheet_id) = overrides.spreadsheet_id {
            self.sheets.spreadsheet_id = spreadsheet_id;
        }
        if let Some(access_token) = overrides.sheets_access_token {
            self.sheets.access_token = Some(secret_value(access_token));
        }
        if let Some(products_table) = overrides.products_table {
            self.sheets.products_table = products_table;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_sheets(&self.sheets)?;
        validate_retry(&self.retry)?;
        validate_conversation(&self.conversation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl SheetsConfig {
    /// A static access token wins over the refresh-token grant when both are configured.
    pub fn credentials(&self) -> Result<SheetsCredentials, ConfigError> {
        if let Some(token) = self.access_token.as_ref() {
            if !token.expose_secret().trim().is_empty() {
                return Ok(SheetsCredentials::AccessToken(token.clone()));
            }
        }

        match (&self.client_id, &self.client_secret, &self.refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token))
                if !client_id.trim().is_empty() =>
            {
                Ok(SheetsCredentials::RefreshToken {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                })
            }
            _ => Err(ConfigError::Validation(
                "sheets credentials are required: set sheets.access_token, or sheets.client_id + sheets.client_secret + sheets.refresh_token"
                    .to_string(),
            )),
        }
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let token = telegram.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather (also read from TELEGRAM_TOKEN)"
                .to_string(),
        ));
    }
    let well_formed = token.split_once(':').is_some_and(|(bot_id, secret)| {
        !bot_id.is_empty() && bot_id.bytes().all(|byte| byte.is_ascii_digit()) && !secret.is_empty()
    });
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    validate_http_url("telegram.api_base_url", &telegram.api_base_url)?;

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=50".to_string(),
        ));
    }

    if let Some(url) = &telegram.web_app_url {
        if !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "telegram.web_app_url must start with https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    let spreadsheet_id = sheets.spreadsheet_id.trim();
    if spreadsheet_id.is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id is required (also read from SPREADSHEET_ID)".to_string(),
        ));
    }
    if spreadsheet_id.contains('/') {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id must be the bare id, not the spreadsheet URL".to_string(),
        ));
    }

    sheets.credentials()?;
    validate_http_url("sheets.api_base_url", &sheets.api_base_url)?;
    validate_http_url("sheets.token_url", &sheets.token_url)?;

    let products_table = sheets.products_table.trim();
    if products_table.is_empty() {
        return Err(ConfigError::Validation("sheets.products_table must not be empty".to_string()));
    }
    if is_store_code(&products_table.to_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "sheets.products_table must not look like a 4-character store code".to_string(),
        ));
    }

    if sheets.request_timeout_secs == 0 || sheets.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sheets.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry(retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.max_retries > 10 {
        return Err(ConfigError::Validation("retry.max_retries must be at most 10".to_string()));
    }
    if retry.base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "retry.base_delay_ms must be greater than zero".to_string(),
        ));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        return Err(ConfigError::Validation(
            "retry.max_delay_ms must not be smaller than retry.base_delay_ms".to_string(),
        ));
    }
    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if !(10..=86_400).contains(&conversation.inactivity_timeout_secs) {
        return Err(ConfigError::Validation(
            "conversation.inactivity_timeout_secs must be in range 10..=86400".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_with_fallback(key: &str) -> Option<String> {
    read_env(key).or_else(|| {
        LEGACY_ENV_FALLBACKS
            .iter()
            .find(|(primary, _)| *primary == key)
            .and_then(|(_, legacy)| read_env(legacy))
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    sheets: Option<SheetsPatch>,
    retry: Option<RetryPatch>,
    conversation: Option<ConversationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    web_app_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    access_token: Option<String>,
    api_base_url: Option<String>,
    token_url: Option<String>,
    products_table: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    inactivity_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, SheetsCredentials};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const BASE_VARS: &[&str] = &[
        "RACKBOT_TELEGRAM_BOT_TOKEN",
        "RACKBOT_SHEETS_SPREADSHEET_ID",
        "RACKBOT_SHEETS_ACCESS_TOKEN",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_base_vars() {
        env::set_var("RACKBOT_TELEGRAM_BOT_TOKEN", "123456:env-token");
        env::set_var("RACKBOT_SHEETS_SPREADSHEET_ID", "sheet-from-env");
        env::set_var("RACKBOT_SHEETS_ACCESS_TOKEN", "ya29.env");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_RACKBOT_BOT_TOKEN", "42:from-env");
        env::set_var("TEST_RACKBOT_REFRESH", "refresh-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("rackbot.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_RACKBOT_BOT_TOKEN}"

[sheets]
spreadsheet_id = "abc123"
client_id = "client.apps.googleusercontent.com"
client_secret = "shh"
refresh_token = "${TEST_RACKBOT_REFRESH}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "42:from-env",
                "bot token should be interpolated from environment",
            )?;
            let credentials =
                config.sheets.credentials().map_err(|err| format!("credentials: {err}"))?;
            ensure(
                matches!(
                    credentials,
                    SheetsCredentials::RefreshToken { ref refresh_token, .. }
                        if refresh_token.expose_secret() == "refresh-from-env"
                ),
                "refresh token should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_RACKBOT_BOT_TOKEN", "TEST_RACKBOT_REFRESH"]);
        result
    }

    #[test]
    fn legacy_env_names_are_used_as_fallbacks() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TELEGRAM_TOKEN", "777:legacy");
        env::set_var("SPREADSHEET_ID", "legacy-sheet");
        env::set_var("RACKBOT_SHEETS_SPREADSHEET_ID", "primary-sheet");
        env::set_var("RACKBOT_SHEETS_ACCESS_TOKEN", "ya29.env");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "777:legacy",
                "TELEGRAM_TOKEN should fill the bot token",
            )?;
            ensure(
                config.sheets.spreadsheet_id == "primary-sheet",
                "RACKBOT_ variable should win over the legacy name",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "TELEGRAM_TOKEN",
            "SPREADSHEET_ID",
            "RACKBOT_SHEETS_SPREADSHEET_ID",
            "RACKBOT_SHEETS_ACCESS_TOKEN",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_base_vars();
        env::set_var("RACKBOT_CONVERSATION_INACTIVITY_TIMEOUT_SECS", "120");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("rackbot.toml");
            fs::write(
                &path,
                r#"
[sheets]
spreadsheet_id = "sheet-from-file"
products_table = "katalog"

[conversation]
inactivity_timeout_secs = 60

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    spreadsheet_id: Some("sheet-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sheets.spreadsheet_id == "sheet-from-override",
                "override spreadsheet id should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.conversation.inactivity_timeout_secs == 120,
                "env timeout should win over file",
            )?;
            ensure(config.sheets.products_table == "katalog", "file value should win over default")?;
            ensure(config.retry.max_retries == 3, "defaults should fill untouched fields")?;
            Ok(())
        })();

        clear_vars(BASE_VARS);
        clear_vars(&["RACKBOT_CONVERSATION_INACTIVITY_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_base_vars();
        env::set_var("RACKBOT_TELEGRAM_BOT_TOKEN", "not-a-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(BASE_VARS);
        result
    }

    #[test]
    fn products_table_must_not_collide_with_store_codes() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_base_vars();

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    products_table: Some("prod".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            });
            ensure(
                matches!(error, Err(ConfigError::Validation(ref message)) if message.contains("products_table")),
                "a store-like products table name should be rejected",
            )
        })();

        clear_vars(BASE_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RACKBOT_TELEGRAM_BOT_TOKEN", "123456:bot-secret-value");
        env::set_var("RACKBOT_SHEETS_SPREADSHEET_ID", "sheet");
        env::set_var("RACKBOT_SHEETS_ACCESS_TOKEN", "ya29.access-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("bot-secret-value"), "debug output should not contain bot token")?;
            ensure(
                !debug.contains("access-secret-value"),
                "debug output should not contain access token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(BASE_VARS);
        result
    }
}
