//! Frustration Scorer
//!
//! Maps the evidence of one answered question to a bounded frustration score.
//!
//! Components (each clamped to [0, 1] before weighting):
//! - affect: mean confidence-weighted negative-affect indicator over the window
//! - incorrect: 1 if the answer was wrong or skipped
//! - latency: response time between the expected baseline and the saturation point
//!
//! score = w_affect * affect + w_incorrect * incorrect + w_latency * latency
//!
//! The session keeps an exponential moving average of the scores:
//! running = alpha * score + (1 - alpha) * running_prev

use serde::{Deserialize, Serialize};

use crate::config::ScoringParams;
use crate::sanitize::{validate_question, ValidationError};
use crate::types::{AffectObservation, QuestionInput};

pub use crate::types::FrustrationLevel;

/// Per-component view of a scored question
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrustrationBreakdown {
    pub affect_term: f64,
    pub incorrect_term: f64,
    pub latency_term: f64,
    pub score: f64,
    pub level: FrustrationLevel,
}

/// Empty windows score 0: a missing sensor is never a penalty.
pub fn affect_term(window: &[AffectObservation]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }

    let negative: f64 = window
        .iter()
        .filter(|obs| obs.label.is_negative())
        .map(|obs| obs.confidence.clamp(0.0, 1.0))
        .sum();

    (negative / window.len() as f64).clamp(0.0, 1.0)
}

pub fn incorrect_term(correct: bool, skipped: bool) -> f64 {
    if skipped || !correct {
        1.0
    } else {
        0.0
    }
}

pub fn latency_term(response_latency_ms: i64, params: &ScoringParams) -> f64 {
    let span = params.max_ms - params.baseline_ms;
    if span <= 0.0 {
        return 0.0;
    }
    ((response_latency_ms as f64 - params.baseline_ms) / span).clamp(0.0, 1.0)
}

pub fn score_question(
    input: &QuestionInput,
    params: &ScoringParams,
) -> Result<FrustrationBreakdown, ValidationError> {
    validate_question(input)?;

    let affect = affect_term(&input.affect_window);
    let incorrect = incorrect_term(input.correct, input.skipped);
    let latency = latency_term(input.response_latency_ms, params);

    let w = &params.weights;
    let score = (w.affect * affect + w.incorrect * incorrect + w.latency * latency).clamp(0.0, 1.0);

    Ok(FrustrationBreakdown {
        affect_term: affect,
        incorrect_term: incorrect,
        latency_term: latency,
        score,
        level: FrustrationLevel::from_score(score),
    })
}

pub fn update_running(previous: f64, score: f64, alpha: f64) -> f64 {
    (alpha * score + (1.0 - alpha) * previous).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionLabel, Mode};

    const EPSILON: f64 = 1e-9;

    fn input(correct: bool, latency: i64, window: Vec<AffectObservation>) -> QuestionInput {
        QuestionInput {
            question_id: "q1".to_string(),
            learner_id: "L1".to_string(),
            mode: Mode::Visual,
            correct,
            skipped: false,
            response_latency_ms: latency,
            affect_window: window,
        }
    }

    fn obs(label: EmotionLabel, confidence: f64) -> AffectObservation {
        AffectObservation::new(0, label, confidence)
    }

    // ==================== Component Tests ====================

    #[test]
    fn test_empty_window_is_exactly_zero() {
        assert_eq!(affect_term(&[]), 0.0);
    }

    #[test]
    fn test_affect_term_counts_only_negative_labels() {
        let window = vec![
            obs(EmotionLabel::Angry, 0.8),
            obs(EmotionLabel::Happy, 0.9),
            obs(EmotionLabel::Confused, 0.4),
            obs(EmotionLabel::Unknown, 1.0),
        ];
        assert!((affect_term(&window) - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_affect_term_clamps_confidence() {
        let window = vec![obs(EmotionLabel::Sad, 1.7)];
        assert!((affect_term(&window) - 1.0).abs() < EPSILON);
        let window = vec![obs(EmotionLabel::Sad, -0.5)];
        assert_eq!(affect_term(&window), 0.0);
    }

    #[test]
    fn test_incorrect_term() {
        assert_eq!(incorrect_term(true, false), 0.0);
        assert_eq!(incorrect_term(false, false), 1.0);
        assert_eq!(incorrect_term(true, true), 1.0);
    }

    #[test]
    fn test_latency_term_range() {
        let params = ScoringParams::default();
        assert_eq!(latency_term(0, &params), 0.0);
        assert_eq!(latency_term(3000, &params), 0.0);
        assert!((latency_term(16500, &params) - 0.5).abs() < EPSILON);
        assert_eq!(latency_term(30000, &params), 1.0);
        assert_eq!(latency_term(120000, &params), 1.0);
    }

    // ==================== Score Tests ====================

    #[test]
    fn test_incorrect_slow_no_sensor_scenario() {
        let params = ScoringParams::default();
        let result = score_question(&input(false, 25000, Vec::new()), &params).unwrap();
        let expected = 0.3 + 0.2 * (22000.0 / 27000.0);
        assert!((result.score - expected).abs() < EPSILON);
        assert!((result.score - 0.463).abs() < 1e-3);
        assert_eq!(result.level, FrustrationLevel::Moderate);
    }

    #[test]
    fn test_all_terms_saturated() {
        let params = ScoringParams::default();
        let window = vec![obs(EmotionLabel::Frustrated, 1.0); 3];
        let result = score_question(&input(false, 60000, window), &params).unwrap();
        assert!((result.score - 1.0).abs() < EPSILON);
        assert_eq!(result.level, FrustrationLevel::High);
    }

    #[test]
    fn test_calm_fast_correct_is_zero() {
        let params = ScoringParams::default();
        let window = vec![obs(EmotionLabel::Happy, 0.9)];
        let result = score_question(&input(true, 1000, window), &params).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.level, FrustrationLevel::Low);
    }

    #[test]
    fn test_negative_latency_is_rejected_not_clamped() {
        let params = ScoringParams::default();
        assert!(score_question(&input(true, -5, Vec::new()), &params).is_err());
    }

    // ==================== Running Average Tests ====================

    #[test]
    fn test_running_average_sequence() {
        let alpha = 0.3;
        let r1 = update_running(0.0, 0.9, alpha);
        let r2 = update_running(r1, 0.9, alpha);
        let r3 = update_running(r2, 0.9, alpha);
        assert!((r1 - 0.27).abs() < EPSILON);
        assert!((r2 - 0.459).abs() < EPSILON);
        assert!((r3 - 0.5913).abs() < EPSILON);
    }

    #[test]
    fn test_running_average_bounded() {
        assert_eq!(update_running(1.0, 1.0, 0.3), 1.0);
        assert_eq!(update_running(0.0, 0.0, 0.3), 0.0);
    }
}
