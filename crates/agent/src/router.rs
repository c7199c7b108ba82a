//! Per-chat task routing.
//!
//! Every chat gets one task fed through a bounded channel, so events of one chat are
//! handled strictly in arrival order while different chats run in parallel. A task only
//! arms the inactivity timer while an operation is pending.
//!
//! A task with nothing pending retires after [`IDLE_SESSION_RETENTION`]. It unregisters
//! itself under the registry lock and only when its queue is empty; the next event for that
//! chat starts a fresh task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rackbot_core::flows::CallbackData;
use rackbot_core::{
    ChatId, Delivery, EventSink, FlowInput, GatewayError, InboundEvent, InboundKind,
    InventoryService, Outbox, Outgoing, Reply,
};
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

use crate::engine::ConversationEngine;
use crate::session::Session;

const SESSION_QUEUE_DEPTH: usize = 32;
/// How long a chat task with nothing pending is kept before it retires.
pub const IDLE_SESSION_RETENTION: Duration = Duration::from_secs(60 * 60);

type Registry = Arc<Mutex<HashMap<ChatId, mpsc::Sender<InboundEvent>>>>;

pub struct SessionRouter<S: ?Sized, O: ?Sized> {
    engine: Arc<ConversationEngine<S>>,
    outbox: Arc<O>,
    inactivity: Duration,
    retention: Duration,
    sessions: Registry,
}

impl<S, O> SessionRouter<S, O>
where
    S: InventoryService + ?Sized + 'static,
    O: Outbox + ?Sized + 'static,
{
    pub fn new(engine: Arc<ConversationEngine<S>>, outbox: Arc<O>, inactivity: Duration) -> Self {
        Self {
            engine,
            outbox,
            inactivity,
            retention: IDLE_SESSION_RETENTION,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_idle_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn spawn_session(&self, chat_id: ChatId) -> mpsc::Sender<InboundEvent> {
        let (sender, receiver) = mpsc::channel(SESSION_QUEUE_DEPTH);
        let task = SessionTask {
            session: Session::new(chat_id),
            engine: Arc::clone(&self.engine),
            outbox: Arc::clone(&self.outbox),
            inactivity: self.inactivity,
            retention: self.retention,
            registry: Arc::clone(&self.sessions),
        };
        tokio::spawn(task.run(receiver));
        debug!(event_name = "agent.session.spawned", chat_id = %chat_id, "session task started");
        sender
    }
}

#[async_trait]
impl<S, O> EventSink for SessionRouter<S, O>
where
    S: InventoryService + ?Sized + 'static,
    O: Outbox + ?Sized + 'static,
{
    async fn accept(&self, event: InboundEvent) -> Result<(), GatewayError> {
        let chat_id = event.chat_id;
        let mut event = event;
        // Enqueueing under the registry lock keeps a retiring task from missing an event.
        for _ in 0..2 {
            let sender = {
                let mut sessions = self.sessions.lock().await;
                let sender = match sessions.get(&chat_id) {
                    Some(sender) if !sender.is_closed() => sender.clone(),
                    _ => {
                        let sender = self.spawn_session(chat_id);
                        sessions.insert(chat_id, sender.clone());
                        sender
                    }
                };
                match sender.try_send(event) {
                    Ok(()) => return Ok(()),
                    Err(TrySendError::Full(returned)) => {
                        event = returned;
                        sender
                    }
                    Err(TrySendError::Closed(returned)) => {
                        sessions.remove(&chat_id);
                        event = returned;
                        continue;
                    }
                }
            };
            // A full queue means the task is busy, so it is not retiring.
            match sender.send(event).await {
                Ok(()) => return Ok(()),
                Err(SendError(returned)) => event = returned,
            }
        }
        Err(GatewayError::Closed)
    }
}

struct SessionTask<S: ?Sized, O: ?Sized> {
    session: Session,
    engine: Arc<ConversationEngine<S>>,
    outbox: Arc<O>,
    inactivity: Duration,
    retention: Duration,
    registry: Registry,
}

impl<S, O> SessionTask<S, O>
where
    S: InventoryService + ?Sized + 'static,
    O: Outbox + ?Sized + 'static,
{
    async fn run(mut self, mut events: mpsc::Receiver<InboundEvent>) {
        loop {
            let next = if self.session.has_pending() {
                match timeout(self.inactivity, events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.expire().await;
                        continue;
                    }
                }
            } else {
                match timeout(self.retention, events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        if self.retire(&mut events).await {
                            break;
                        }
                        continue;
                    }
                }
            };

            let Some(event) = next else {
                break;
            };
            let span = tracing::info_span!(
                "session_event",
                chat_id = %event.chat_id,
                correlation_id = %event.correlation_id
            );
            self.on_event(event).instrument(span).await;
        }
        debug!(
            event_name = "agent.session.closed",
            chat_id = %self.session.chat_id,
            "session task stopped"
        );
    }

    /// Unregisters the task if nothing is queued. Events that were already admitted are
    /// handled before the task stops.
    async fn retire(&mut self, events: &mut mpsc::Receiver<InboundEvent>) -> bool {
        let registry = Arc::clone(&self.registry);
        let mut sessions = registry.lock().await;
        if !events.is_empty() {
            return false;
        }
        events.close();
        while let Some(event) = events.recv().await {
            self.on_event(event).await;
        }
        sessions.remove(&self.session.chat_id);
        info!(
            event_name = "agent.session.retired",
            chat_id = %self.session.chat_id,
            idle_secs = self.session.idle_for(Utc::now()).num_seconds(),
            "idle session released"
        );
        true
    }

    async fn expire(&mut self) {
        info!(
            event_name = "agent.session.expired",
            chat_id = %self.session.chat_id,
            idle_secs = self.inactivity.as_secs(),
            "pending operation discarded after inactivity"
        );
        if let Some(reply) = self.engine.handle(&mut self.session, FlowInput::Timeout).await {
            self.deliver(Delivery::Send, reply).await;
        }
    }

    async fn on_event(&mut self, event: InboundEvent) {
        self.session.touch();
        let (input, delivery) = match event.kind {
            InboundKind::Command(_) => (FlowInput::ShowMenu, Delivery::Send),
            InboundKind::Text(text) => (FlowInput::Text(text), Delivery::Send),
            InboundKind::Button { data, .. } => {
                let delivery = event
                    .message_id
                    .map_or(Delivery::Send, |message_id| Delivery::Edit { message_id });
                match CallbackData::decode(&data) {
                    Ok(callback) => (FlowInput::Callback(callback), delivery),
                    Err(error) => {
                        warn!(
                            event_name = "agent.callback.invalid",
                            error = %error,
                            "undecodable button payload"
                        );
                        let reply = self.engine.invalid_button();
                        self.deliver(delivery, reply).await;
                        return;
                    }
                }
            }
        };

        if let Some(reply) = self.engine.handle(&mut self.session, input).await {
            self.deliver(delivery, reply).await;
        }
    }

    async fn deliver(&self, delivery: Delivery, reply: Reply) {
        let outgoing = Outgoing { chat_id: self.session.chat_id, delivery, reply };
        if let Err(error) = self.outbox.deliver(outgoing).await {
            warn!(
                event_name = "agent.outbox.failed",
                chat_id = %self.session.chat_id,
                error = %error,
                "reply could not be delivered"
            );
        }
    }
}
