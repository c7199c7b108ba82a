use chrono::{DateTime, Duration, Utc};
use rackbot_core::{ChatId, FlowState};

/// Conversation memory of one chat. Lives only inside that chat's router task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub chat_id: ChatId,
    pub state: FlowState,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(chat_id: ChatId) -> Self {
        Self { chat_id, state: FlowState::Idle, last_activity: Utc::now() }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn has_pending(&self) -> bool {
        self.state.has_pending()
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_activity)
    }

    pub fn reset(&mut self) {
        self.state = FlowState::Idle;
    }
}
