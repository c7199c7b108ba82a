use std::sync::Arc;
use std::time::Duration;

use rackbot_core::config::RetryConfig;
use rackbot_core::EventSink;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, BotApi, Update};
use crate::updates::{callback_id, chat_of, parse_update};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl From<&RetryConfig> for ReconnectPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Honors a server-requested pause when it is longer than our own backoff.
    fn delay_for(&self, attempt: u32, error: &ApiError) -> Duration {
        let backoff = self.backoff(attempt);
        match error {
            ApiError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollingExit {
    Shutdown,
    RetriesExhausted,
    Unauthorized,
}

pub struct PollingRunner {
    api: Arc<dyn BotApi>,
    sink: Arc<dyn EventSink>,
    reconnect_policy: ReconnectPolicy,
    poll_timeout_secs: u64,
}

impl PollingRunner {
    pub fn new(
        api: Arc<dyn BotApi>,
        sink: Arc<dyn EventSink>,
        reconnect_policy: ReconnectPolicy,
        poll_timeout_secs: u64,
    ) -> Self {
        Self { api, sink, reconnect_policy, poll_timeout_secs }
    }

    /// Polls until `shutdown` flips to `true`, the token is rejected, or consecutive
    /// failures exceed the reconnect policy. Never panics on transport errors.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> PollingExit {
        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;
        info!(
            event_name = "telegram.polling.started",
            poll_timeout_secs = self.poll_timeout_secs,
            "long polling started"
        );

        loop {
            if *shutdown.borrow() {
                return self.stopped(PollingExit::Shutdown);
            }
            let polled = tokio::select! {
                _ = shutdown.changed() => return self.stopped(PollingExit::Shutdown),
                polled = self.api.get_updates(offset, self.poll_timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    failures = 0;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.dispatch(&update).await;
                    }
                }
                Err(error) if error.is_fatal() => {
                    error!(
                        event_name = "telegram.polling.unauthorized",
                        error = %error,
                        "bot token rejected; polling stopped"
                    );
                    return self.stopped(PollingExit::Unauthorized);
                }
                Err(error) => {
                    warn!(
                        event_name = "telegram.polling.failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "getUpdates failed"
                    );
                    if failures >= self.reconnect_policy.max_retries {
                        error!(
                            event_name = "telegram.polling.exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "polling retries exhausted; continuing process without crash"
                        );
                        return self.stopped(PollingExit::RetriesExhausted);
                    }
                    let delay = self.reconnect_policy.delay_for(failures, &error);
                    failures += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = shutdown.changed() => return self.stopped(PollingExit::Shutdown),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, update: &Update) {
        let chat_id = chat_of(update).unwrap_or_default();
        if let Some(callback_id) = callback_id(update) {
            if let Err(error) = self.api.answer_callback(callback_id).await {
                warn!(
                    event_name = "telegram.callback.ack_failed",
                    update_id = update.update_id,
                    chat_id,
                    error = %error,
                    "failed to acknowledge button press"
                );
            }
        }

        let Some(event) = parse_update(update) else {
            debug!(
                event_name = "telegram.update.ignored",
                update_id = update.update_id,
                chat_id,
                "update carries nothing to act on"
            );
            return;
        };

        info!(
            event_name = "telegram.update.received",
            update_id = update.update_id,
            chat_id,
            correlation_id = %event.correlation_id,
            "received telegram update"
        );
        let correlation_id = event.correlation_id.clone();
        if let Err(error) = self.sink.accept(event).await {
            warn!(
                event_name = "telegram.update.dispatch_failed",
                update_id = update.update_id,
                correlation_id = %correlation_id,
                error = %error,
                "event dispatch failed; continuing polling loop"
            );
        }
    }

    fn stopped(&self, exit: PollingExit) -> PollingExit {
        info!(event_name = "telegram.polling.stopped", exit = ?exit, "long polling stopped");
        exit
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ReconnectPolicy;
    use crate::api::ApiError;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(1_000));
    }

    #[test]
    fn rate_limit_pause_wins_over_short_backoff() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        let limited = ApiError::RateLimited { retry_after_secs: 3 };
        assert_eq!(policy.delay_for(0, &limited), Duration::from_secs(3));
        let transport = ApiError::Transport("reset".to_string());
        assert_eq!(policy.delay_for(1, &transport), Duration::from_millis(200));
    }
}
