use std::sync::Arc;
use std::time::Duration;

use rackbot_agent::{ConversationEngine, SessionRouter};
use rackbot_core::config::{AppConfig, ConfigError};
use rackbot_core::flows::MenuOptions;
use rackbot_sheets::{
    BackendError, GoogleSheetsBackend, RetryPolicy, SheetInventory, TableBackend,
};
use rackbot_telegram::{
    ApiError, BotApi, HttpBotApi, PollingRunner, ReconnectPolicy, TelegramOutbox,
};
use thiserror::Error;
use tracing::info;

pub type Router<B> = SessionRouter<SheetInventory<B>, TelegramOutbox>;

pub struct Application<B = GoogleSheetsBackend> {
    pub config: AppConfig,
    pub backend: Arc<B>,
    pub router: Arc<Router<B>>,
    pub poller: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("sheets backend setup failed: {0}")]
    Sheets(#[source] BackendError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[source] ApiError),
}

/// Builds the production transports from an already loaded config.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    let backend =
        GoogleSheetsBackend::from_config(&config.sheets).map_err(BootstrapError::Sheets)?;
    info!(
        event_name = "system.bootstrap.sheets_ready",
        spreadsheet_id = backend.spreadsheet_id(),
        "sheets backend configured"
    );
    let api = HttpBotApi::from_config(&config.telegram).map_err(BootstrapError::Telegram)?;
    Ok(assemble(config, Arc::new(backend), Arc::new(api)))
}

/// Wires repository, engine, session router and poller around the given transports.
pub fn assemble<B>(config: AppConfig, backend: Arc<B>, api: Arc<dyn BotApi>) -> Application<B>
where
    B: TableBackend + 'static,
{
    let inventory = Arc::new(
        SheetInventory::new(Arc::clone(&backend), RetryPolicy::from(&config.retry))
            .with_products_table(config.sheets.products_table.clone()),
    );
    let menu = MenuOptions { web_app_url: config.telegram.web_app_url.clone() };
    let engine = Arc::new(ConversationEngine::new(inventory, menu));
    let outbox = Arc::new(TelegramOutbox::new(Arc::clone(&api)));
    let router = Arc::new(SessionRouter::new(
        engine,
        outbox,
        Duration::from_secs(config.conversation.inactivity_timeout_secs),
    ));
    let poller = PollingRunner::new(
        api,
        router.clone(),
        ReconnectPolicy::from(&config.retry),
        config.telegram.poll_timeout_secs,
    );
    info!(
        event_name = "system.bootstrap.wired",
        inactivity_timeout_secs = config.conversation.inactivity_timeout_secs,
        products_table = %config.sheets.products_table,
        "conversation runtime wired"
    );

    Application { config, backend, router, poller }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use rackbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use rackbot_core::flows::{CallbackAction, CallbackData};
    use rackbot_core::OperationKind;
    use rackbot_sheets::{InMemoryTableBackend, TableBackend};
    use rackbot_telegram::api::{InlineKeyboardMarkup, Update};
    use rackbot_telegram::{ApiError, BotApi, PollingExit};
    use tokio::sync::watch;

    use super::{assemble, bootstrap_with_config, BootstrapError};

    /// Overrides that pass validation; nothing is fetched until the first call.
    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            telegram_bot_token: Some("123456:test-token".to_string()),
            spreadsheet_id: Some("sheet-test".to_string()),
            sheets_access_token: Some("ya29.test".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[derive(Default)]
    struct ScriptedBotApi {
        polls: Mutex<VecDeque<Vec<Update>>>,
        sent: Mutex<Vec<String>>,
        edited: Mutex<Vec<i64>>,
    }

    impl ScriptedBotApi {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    #[async_trait]
    impl BotApi for ScriptedBotApi {
        async fn get_updates(
            &self,
            _offset: Option<i64>,
            _timeout_secs: u64,
        ) -> Result<Vec<Update>, ApiError> {
            let next = self.polls.lock().expect("polls lock").pop_front();
            match next {
                Some(updates) => Ok(updates),
                None => std::future::pending().await,
            }
        }

        async fn send_message(
            &self,
            _chat_id: i64,
            text: &str,
            _keyboard: Option<&InlineKeyboardMarkup>,
        ) -> Result<i64, ApiError> {
            let mut sent = self.sent.lock().expect("sent lock");
            sent.push(text.to_string());
            Ok(100 + sent.len() as i64)
        }

        async fn edit_message(
            &self,
            _chat_id: i64,
            message_id: i64,
            _text: &str,
            _keyboard: Option<&InlineKeyboardMarkup>,
        ) -> Result<(), ApiError> {
            self.edited.lock().expect("edited lock").push(message_id);
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn update(raw: String) -> Update {
        serde_json::from_str(&raw).expect("update parses")
    }

    fn load(overrides: ConfigOverrides) -> Result<AppConfig, BootstrapError> {
        Ok(AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() })?)
    }

    #[test]
    fn bootstrap_fails_fast_on_malformed_bot_token() {
        let result = load(ConfigOverrides {
            telegram_bot_token: Some("not-a-token".to_string()),
            ..valid_overrides()
        })
        .and_then(bootstrap_with_config);

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[test]
    fn bootstrap_builds_clients_without_network() {
        let app = load(valid_overrides())
            .and_then(bootstrap_with_config)
            .expect("bootstrap should succeed with valid overrides");
        assert_eq!(app.backend.spreadsheet_id(), "sheet-test");
        assert_eq!(app.config.sheets.products_table, "produk");
    }

    #[tokio::test]
    async fn update_to_spreadsheet_round_trip() {
        let config = AppConfig::default();
        let add_store = CallbackData::new(CallbackAction::Start(OperationKind::AddStore))
            .encode()
            .expect("payload fits");
        let api = Arc::new(ScriptedBotApi::default());
        {
            let mut polls = api.polls.lock().expect("polls lock");
            polls.push_back(vec![update(
                r#"{"update_id":1,"message":{"message_id":1,"chat":{"id":42},"text":"/start"}}"#
                    .to_string(),
            )]);
            polls.push_back(vec![update(format!(
                r#"{{"update_id":2,"callback_query":{{"id":"cb-1","data":"{add_store}","message":{{"message_id":101,"chat":{{"id":42}}}}}}}}"#
            ))]);
            polls.push_back(vec![update(
                r#"{"update_id":3,"message":{"message_id":3,"chat":{"id":42},"text":"ab12"}}"#
                    .to_string(),
            )]);
        }
        let backend = Arc::new(InMemoryTableBackend::new());
        let app = assemble(config, backend.clone(), api.clone());

        let (shutdown_tx, shutdown) = watch::channel(false);
        let poller = tokio::spawn(async move { app.poller.run(shutdown).await });

        for _ in 0..200 {
            if api.sent().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown_tx.send(true).expect("poller listening");
        let exit = poller.await.expect("poller task completes");

        assert_eq!(exit, PollingExit::Shutdown);
        let sent = api.sent();
        assert_eq!(sent.len(), 2, "menu and creation report expected, got {sent:?}");
        assert!(sent[0].contains("Choose an action:"));
        assert!(sent[1].contains("Store AB12 created."));
        assert_eq!(*api.edited.lock().expect("edited lock"), vec![101]);
        let tables = backend.list_tables().await.expect("list tables");
        assert!(tables.iter().any(|table| table == "AB12"));
        assert!(tables.iter().any(|table| table == "produk"));
    }
}
