use std::collections::HashMap;

use affectmode_algo::{FrustrationLevel, Mode, SwitchReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    PersistenceFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    #[serde(rename = "SESSION_STARTED")]
    SessionStarted {
        learner_id: String,
        initial_mode: Mode,
        seeded_from_history: bool,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "QUESTION_SCORED")]
    QuestionScored {
        learner_id: String,
        question_id: String,
        mode: Mode,
        frustration_score: f64,
        running_frustration: f64,
        level: FrustrationLevel,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "MODE_CHANGED")]
    ModeChanged {
        learner_id: String,
        old_mode: Mode,
        new_mode: Mode,
        reason: SwitchReason,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "SESSION_ENDED")]
    SessionEnded {
        learner_id: String,
        questions_answered: u32,
        final_mode: Mode,
        running_frustration: f64,
        reason: EndReason,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "SESSION_STARTED",
            SessionEvent::QuestionScored { .. } => "QUESTION_SCORED",
            SessionEvent::ModeChanged { .. } => "MODE_CHANGED",
            SessionEvent::SessionEnded { .. } => "SESSION_ENDED",
        }
    }

    pub fn learner_id(&self) -> &str {
        match self {
            SessionEvent::SessionStarted { learner_id, .. }
            | SessionEvent::QuestionScored { learner_id, .. }
            | SessionEvent::ModeChanged { learner_id, .. }
            | SessionEvent::SessionEnded { learner_id, .. } => learner_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event: SessionEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: SessionEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

type SubscriberId = String;

struct Subscriber {
    learner_id: Option<String>,
    event_types: Option<Vec<String>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(ref learner_id) = self.learner_id {
            if envelope.event.learner_id() != learner_id {
                return false;
            }
        }

        if let Some(ref event_types) = self.event_types {
            let event_type = envelope.event.event_type();
            if !event_types.iter().any(|t| t == event_type) {
                return false;
            }
        }

        true
    }
}

/// Fan-out of session lifecycle events to any number of observers.
///
/// Publishing never blocks on slow receivers; a lagging receiver loses the
/// oldest envelopes once its channel is full.
pub struct EventBus {
    global_sender: broadcast::Sender<EventEnvelope>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    event_count: RwLock<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global_sender,
            subscribers: RwLock::new(HashMap::new()),
            event_count: RwLock::new(0),
        }
    }

    pub async fn publish(&self, event: SessionEvent) {
        let envelope = EventEnvelope::new(event);
        let event_type = envelope.event.event_type();

        {
            let mut count = self.event_count.write().await;
            *count += 1;
        }

        let subscribers = self.subscribers.read().await;
        let mut sent_count = 0usize;

        for subscriber in subscribers.values() {
            if subscriber.matches(&envelope) && subscriber.sender.send(envelope.clone()).is_ok() {
                sent_count += 1;
            }
        }

        if self.global_sender.send(envelope.clone()).is_err() {
            debug!("No global subscribers for event");
        }

        debug!(
            event_type = event_type,
            learner_id = envelope.event.learner_id(),
            sent_to = sent_count,
            "Event published"
        );
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_sender.subscribe()
    }

    pub async fn subscribe_filtered(
        &self,
        learner_id: Option<String>,
        event_types: Option<Vec<String>>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let subscriber_id = uuid::Uuid::new_v4().to_string();

        let subscriber = Subscriber {
            learner_id,
            event_types,
            sender,
        };

        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(subscriber_id.clone(), subscriber);
        }

        debug!(subscriber_id = %subscriber_id, "New filtered subscription created");

        (subscriber_id, receiver)
    }

    pub async fn unsubscribe(&self, subscriber_id: &str) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(subscriber_id).is_some() {
            debug!(subscriber_id = %subscriber_id, "Subscription removed");
        }
    }

    pub async fn event_count(&self) -> u64 {
        *self.event_count.read().await
    }

    pub async fn stats(&self) -> EventBusStats {
        let filtered = self.subscribers.read().await.len();
        let global = self.global_sender.receiver_count();
        EventBusStats {
            total_events: self.event_count().await,
            subscriber_count: filtered + global,
            global_subscribers: global,
            filtered_subscribers: filtered,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventBusStats {
    pub total_events: u64,
    pub subscriber_count: usize,
    pub global_subscribers: usize,
    pub filtered_subscribers: usize,
}
