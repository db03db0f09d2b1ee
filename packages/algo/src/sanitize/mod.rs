//! Input Validation
//!
//! Structural checks applied before any scoring happens.
//!
//! Structurally invalid input (negative latency, unknown mode, missing ids,
//! non-finite numbers) is rejected. Value ranges inside otherwise valid
//! fields, such as a classifier confidence slightly above 1, are clamped by
//! the scorer instead.

use thiserror::Error;

use crate::types::{AffectObservation, QuestionInput};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown mode: {0:?}")]
    UnknownMode(String),
    #[error("learner id is empty")]
    EmptyLearnerId,
    #[error("question id is empty")]
    EmptyQuestionId,
    #[error("negative response latency for question {question_id}: {latency_ms}ms")]
    NegativeLatency { question_id: String, latency_ms: i64 },
    #[error("non-finite affect confidence at index {index} of question {question_id}")]
    NonFiniteConfidence { question_id: String, index: usize },
    #[error("frustration score {0} is not a number in [0, 1]")]
    ScoreOutOfRange(f64),
    #[error("question belongs to learner {got}, session is for {expected}")]
    LearnerMismatch { expected: String, got: String },
}

pub fn validate_observation(
    question_id: &str,
    index: usize,
    obs: &AffectObservation,
) -> Result<(), ValidationError> {
    if !obs.confidence.is_finite() {
        return Err(ValidationError::NonFiniteConfidence {
            question_id: question_id.to_string(),
            index,
        });
    }
    Ok(())
}

pub fn validate_question(input: &QuestionInput) -> Result<(), ValidationError> {
    if input.learner_id.trim().is_empty() {
        return Err(ValidationError::EmptyLearnerId);
    }
    if input.question_id.trim().is_empty() {
        return Err(ValidationError::EmptyQuestionId);
    }
    if input.response_latency_ms < 0 {
        return Err(ValidationError::NegativeLatency {
            question_id: input.question_id.clone(),
            latency_ms: input.response_latency_ms,
        });
    }
    for (index, obs) in input.affect_window.iter().enumerate() {
        validate_observation(&input.question_id, index, obs)?;
    }
    Ok(())
}

/// A stored frustration score must be a finite value in [0, 1]
pub fn validate_score(score: f64) -> Result<f64, ValidationError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(ValidationError::ScoreOutOfRange(score))
    }
}
