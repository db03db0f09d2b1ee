//! Per-question frustration loop.
//!
//! `FrustrationLoop::step` is the single code path that scores a question,
//! advances the running frustration and runs the mode selector. The online
//! session engine and the batch log replay both go through it.

use serde::{Deserialize, Serialize};

use crate::aggregator::PreferredModeRecord;
use crate::config::{ScoringParams, SelectorParams};
use crate::sanitize::ValidationError;
use crate::scorer::{score_question, update_running, FrustrationBreakdown};
use crate::selector::{ModeSelector, SelectorDecision, SessionState};
use crate::types::{QuestionEvent, QuestionInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub event: QuestionEvent,
    pub breakdown: FrustrationBreakdown,
    pub decision: SelectorDecision,
    /// State after this question; the caller decides when to commit it
    pub next_state: SessionState,
}

pub struct FrustrationLoop {
    scoring: ScoringParams,
    selector: ModeSelector,
}

impl FrustrationLoop {
    pub fn new(scoring: ScoringParams, selector: SelectorParams) -> Self {
        Self {
            scoring,
            selector: ModeSelector::new(selector),
        }
    }

    pub fn scoring(&self) -> &ScoringParams {
        &self.scoring
    }

    pub fn selector(&self) -> &ModeSelector {
        &self.selector
    }

    pub fn step(
        &self,
        state: &SessionState,
        input: QuestionInput,
        history: Option<&PreferredModeRecord>,
        now_ms: i64,
    ) -> Result<StepOutcome, ValidationError> {
        if input.learner_id != state.learner_id {
            return Err(ValidationError::LearnerMismatch {
                expected: state.learner_id.clone(),
                got: input.learner_id,
            });
        }

        let breakdown = score_question(&input, &self.scoring)?;
        let running = update_running(
            state.running_frustration,
            breakdown.score,
            self.scoring.ema_alpha,
        );

        let mut next_state = state.clone();
        let decision = self.selector.observe(&mut next_state, running, history, now_ms);

        Ok(StepOutcome {
            event: QuestionEvent::from_input(input, breakdown.score, now_ms),
            breakdown,
            decision,
            next_state,
        })
    }
}

impl Default for FrustrationLoop {
    fn default() -> Self {
        Self::new(ScoringParams::default(), SelectorParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mode;

    fn question(id: &str, correct: bool, latency: i64) -> QuestionInput {
        QuestionInput {
            question_id: id.to_string(),
            learner_id: "L1".to_string(),
            mode: Mode::Visual,
            correct,
            skipped: false,
            response_latency_ms: latency,
            affect_window: Vec::new(),
        }
    }

    #[test]
    fn test_five_slow_wrong_answers_without_sensor() {
        let lp = FrustrationLoop::default();
        let mut state = SessionState::new("L1", Mode::Visual, 0);
        let mut running = Vec::new();

        for i in 0..5 {
            let outcome = lp
                .step(&state, question(&format!("q{}", i), false, 25000), None, i as i64)
                .unwrap();
            assert!((outcome.event.frustration_score - 0.463).abs() < 1e-3);
            assert!(outcome.decision.switch().is_none());
            running.push(outcome.next_state.running_frustration);
            state = outcome.next_state;
        }

        assert!((running[0] - 0.139).abs() < 1e-3);
        assert!((running[1] - 0.236).abs() < 1e-3);
        assert_eq!(state.current_mode, Mode::Visual);
    }

    #[test]
    fn test_step_does_not_mutate_input_state() {
        let lp = FrustrationLoop::default();
        let state = SessionState::new("L1", Mode::Visual, 0);
        let outcome = lp.step(&state, question("q1", false, 40000), None, 1).unwrap();
        assert_eq!(state.questions_answered, 0);
        assert_eq!(outcome.next_state.questions_answered, 1);
    }

    #[test]
    fn test_learner_mismatch_rejected() {
        let lp = FrustrationLoop::default();
        let state = SessionState::new("L2", Mode::Visual, 0);
        let err = lp.step(&state, question("q1", true, 0), None, 1).unwrap_err();
        assert!(matches!(err, ValidationError::LearnerMismatch { .. }));
    }
}
