//! Online session engine.
//!
//! Wires the affect source, the frustration loop, the recorder and the
//! event bus together for live sessions.

mod store;

use std::collections::HashMap;
use std::sync::Arc;

use affectmode_algo::{
    AffectObservation, FrustrationBreakdown, FrustrationLevel, FrustrationLoop, Mode, ModeSwitch,
    PreferredModeRecord, QuestionEvent, QuestionInput, SelectorDecision, SessionState,
    ValidationError,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::affect::{AffectSource, SourceKind};
use crate::config::{AffectSettings, Config};
use crate::core::event_bus::{EndReason, EventBus, SessionEvent};
use crate::error::EngineError;
use crate::recorder::{append_with_retry, RetryPolicy, SessionRecorder};

pub use store::{SessionHandle, SessionStore};

/// One answered question as reported by the presentation layer
#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub learner_id: String,
    pub question_id: String,
    pub correct: bool,
    pub skipped: bool,
    pub response_latency_ms: i64,
    /// Pre-collected affect; `None` samples the engine's affect source
    pub affect_window: Option<Vec<AffectObservation>>,
}

#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub event: QuestionEvent,
    pub breakdown: FrustrationBreakdown,
    pub level: FrustrationLevel,
    pub running_frustration: f64,
    pub decision: SelectorDecision,
    /// Attempts the recorder needed to acknowledge the event
    pub persist_attempts: u32,
}

impl QuestionOutcome {
    /// Mode for the next question
    pub fn next_mode(&self) -> Mode {
        self.decision.mode()
    }
}

pub struct SessionEngine {
    frustration_loop: FrustrationLoop,
    affect: Box<dyn AffectSource>,
    recorder: Arc<dyn SessionRecorder>,
    bus: Arc<EventBus>,
    history: Arc<HashMap<String, PreferredModeRecord>>,
    store: SessionStore,
    retry: RetryPolicy,
    affect_settings: AffectSettings,
}

impl SessionEngine {
    /// `history` is the preferred-mode snapshot loaded at startup; it is
    /// never modified while sessions run.
    pub fn new(
        config: &Config,
        affect: Box<dyn AffectSource>,
        recorder: Arc<dyn SessionRecorder>,
        bus: Arc<EventBus>,
        history: HashMap<String, PreferredModeRecord>,
    ) -> Self {
        Self {
            frustration_loop: FrustrationLoop::new(config.scoring.clone(), config.selector.clone()),
            affect,
            recorder,
            bus,
            history: Arc::new(history),
            store: SessionStore::new(),
            retry: config.retry.clone(),
            affect_settings: config.affect.clone(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn affect_kind(&self) -> SourceKind {
        self.affect.kind()
    }

    pub fn active_sessions(&self) -> Vec<String> {
        self.store.learner_ids()
    }

    pub async fn session(&self, learner_id: &str) -> Option<SessionState> {
        let handle = self.store.get(learner_id.trim())?;
        let state = handle.lock().await;
        Some(state.clone())
    }

    pub async fn start_session(&self, learner_id: &str) -> Result<SessionState, EngineError> {
        let learner_id = learner_id.trim();
        if learner_id.is_empty() {
            return Err(ValidationError::EmptyLearnerId.into());
        }

        let now = Utc::now();
        let record = self.history.get(learner_id);
        let state = SessionState::seeded(learner_id, record, now.timestamp_millis());
        self.store.create(state.clone())?;

        let seeded = record.and_then(|r| r.preferred_mode).is_some();
        info!(
            learner_id = %learner_id,
            mode = %state.current_mode,
            seeded_from_history = seeded,
            "Session started"
        );
        self.bus
            .publish(SessionEvent::SessionStarted {
                learner_id: learner_id.to_string(),
                initial_mode: state.current_mode,
                seeded_from_history: seeded,
                timestamp: now,
            })
            .await;
        Ok(state)
    }

    /// Poll the affect source `window_size` times. Polls that time out or
    /// fail count as `unknown` with confidence 0.
    pub async fn sample_affect_window(&self) -> Vec<AffectObservation> {
        let timeout = self.affect_settings.observe_timeout;
        let mut window = Vec::with_capacity(self.affect_settings.window_size);
        for _ in 0..self.affect_settings.window_size {
            let observation = match self.affect.observe(timeout).await {
                Ok(observation) => observation,
                Err(err) => {
                    debug!(error = %err, "Affect poll failed, treating as unavailable");
                    affectmode_algo::Observation::Unavailable
                }
            };
            window.push(observation.resolve(Utc::now().timestamp_millis()));
        }
        window
    }

    pub async fn answer_question(&self, answer: AnswerInput) -> Result<QuestionOutcome, EngineError> {
        let learner_id = answer.learner_id.trim();
        let handle = self
            .store
            .get(learner_id)
            .ok_or_else(|| EngineError::UnknownSession(learner_id.to_string()))?;
        let mut state = handle.lock().await;

        let affect_window = match answer.affect_window {
            Some(window) => window,
            None => self.sample_affect_window().await,
        };

        let now = Utc::now();
        let input = QuestionInput {
            question_id: answer.question_id,
            learner_id: state.learner_id.clone(),
            mode: state.current_mode,
            correct: answer.correct,
            skipped: answer.skipped,
            response_latency_ms: answer.response_latency_ms,
            affect_window,
        };
        let record = self.history.get(&state.learner_id);
        let outcome = self
            .frustration_loop
            .step(&state, input, record, now.timestamp_millis())?;

        let persist_attempts =
            match append_with_retry(self.recorder.as_ref(), &outcome.event, &self.retry).await {
                Ok(attempts) => attempts,
                Err(err) => {
                    error!(
                        learner_id = %state.learner_id,
                        question_id = %outcome.event.question_id,
                        error = %err,
                        "Recorder exhausted retries, ending session"
                    );
                    self.store.remove(&state.learner_id);
                    self.publish_ended(&state, EndReason::PersistenceFailure, now)
                        .await;
                    return Err(err);
                }
            };

        *state = outcome.next_state;
        let level = outcome.breakdown.level;

        debug!(
            learner_id = %state.learner_id,
            question_id = %outcome.event.question_id,
            score = outcome.breakdown.score,
            running = state.running_frustration,
            level = level.as_str(),
            "Question scored"
        );
        self.bus
            .publish(SessionEvent::QuestionScored {
                learner_id: state.learner_id.clone(),
                question_id: outcome.event.question_id.clone(),
                mode: outcome.event.mode,
                frustration_score: outcome.breakdown.score,
                running_frustration: state.running_frustration,
                level,
                timestamp: now,
            })
            .await;

        if let Some(switch) = outcome.decision.switch() {
            self.publish_switch(&state.learner_id, switch, now).await;
        }

        Ok(QuestionOutcome {
            event: outcome.event,
            breakdown: outcome.breakdown,
            level,
            running_frustration: state.running_frustration,
            decision: outcome.decision,
            persist_attempts,
        })
    }

    /// Set the mode explicitly. Returns `None` when already in `mode`.
    pub async fn override_mode(
        &self,
        learner_id: &str,
        mode: Mode,
    ) -> Result<Option<ModeSwitch>, EngineError> {
        let learner_id = learner_id.trim();
        let handle = self
            .store
            .get(learner_id)
            .ok_or_else(|| EngineError::UnknownSession(learner_id.to_string()))?;
        let mut state = handle.lock().await;

        let now = Utc::now();
        let switch = self
            .frustration_loop
            .selector()
            .force_mode(&mut state, mode, now.timestamp_millis());
        if let Some(ref switch) = switch {
            self.publish_switch(learner_id, switch, now).await;
        }
        Ok(switch)
    }

    pub async fn end_session(&self, learner_id: &str) -> Result<SessionState, EngineError> {
        let learner_id = learner_id.trim();
        let handle = self
            .store
            .remove(learner_id)
            .ok_or_else(|| EngineError::UnknownSession(learner_id.to_string()))?;
        let state = handle.lock().await.clone();

        info!(
            learner_id = %learner_id,
            questions = state.questions_answered,
            final_mode = %state.current_mode,
            running = state.running_frustration,
            "Session ended"
        );
        self.publish_ended(&state, EndReason::Completed, Utc::now())
            .await;
        Ok(state)
    }

    async fn publish_switch(&self, learner_id: &str, switch: &ModeSwitch, at: DateTime<Utc>) {
        info!(
            learner_id = %learner_id,
            from = %switch.from,
            to = %switch.to,
            reason = switch.reason.as_str(),
            "Mode changed"
        );
        self.bus
            .publish(SessionEvent::ModeChanged {
                learner_id: learner_id.to_string(),
                old_mode: switch.from,
                new_mode: switch.to,
                reason: switch.reason,
                timestamp: at,
            })
            .await;
    }

    async fn publish_ended(&self, state: &SessionState, reason: EndReason, at: DateTime<Utc>) {
        self.bus
            .publish(SessionEvent::SessionEnded {
                learner_id: state.learner_id.clone(),
                questions_answered: state.questions_answered,
                final_mode: state.current_mode,
                running_frustration: state.running_frustration,
                reason,
                timestamp: at,
            })
            .await;
    }
}
