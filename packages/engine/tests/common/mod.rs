#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use affectmode_algo::{
    AffectObservation, AggregateStatus, EmotionLabel, Mode, PreferredModeRecord,
};
use affectmode_engine::affect::SimulatedAffectSource;
use affectmode_engine::core::event_bus::EventBus;
use affectmode_engine::recorder::SessionRecorder;
use affectmode_engine::session::{AnswerInput, SessionEngine};
use affectmode_engine::Config;

pub const FIXED_TIMESTAMP: i64 = 1_700_000_000_000;

pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.retry.backoff = Duration::from_millis(1);
    config
}

pub fn engine(
    recorder: Arc<dyn SessionRecorder>,
    history: HashMap<String, PreferredModeRecord>,
) -> (SessionEngine, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let engine = SessionEngine::new(
        &fast_config(),
        Box::new(SimulatedAffectSource::seeded(42)),
        recorder,
        Arc::clone(&bus),
        history,
    );
    (engine, bus)
}

/// Answer that scores exactly 1.0
pub fn worst_answer(learner: &str, question: &str) -> AnswerInput {
    AnswerInput {
        learner_id: learner.to_string(),
        question_id: question.to_string(),
        correct: false,
        skipped: false,
        response_latency_ms: 30_000,
        affect_window: Some(vec![AffectObservation::new(
            FIXED_TIMESTAMP,
            EmotionLabel::Frustrated,
            1.0,
        )]),
    }
}

/// Answer that scores exactly 0.0
pub fn calm_answer(learner: &str, question: &str) -> AnswerInput {
    AnswerInput {
        learner_id: learner.to_string(),
        question_id: question.to_string(),
        correct: true,
        skipped: false,
        response_latency_ms: 2_000,
        affect_window: Some(Vec::new()),
    }
}

pub fn history_record(learner: &str, stats: &[(Mode, f64, usize)]) -> PreferredModeRecord {
    let mut means = BTreeMap::new();
    let mut counts = BTreeMap::new();
    for (mode, mean, count) in stats {
        means.insert(*mode, *mean);
        counts.insert(*mode, *count);
    }
    let preferred = stats
        .iter()
        .filter(|(_, _, count)| *count >= 5)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(mode, _, _)| *mode);
    PreferredModeRecord {
        learner_id: learner.to_string(),
        preferred_mode: preferred,
        status: if preferred.is_some() {
            AggregateStatus::Ok
        } else {
            AggregateStatus::InsufficientData
        },
        mean_frustration_per_mode: means,
        median_frustration_per_mode: BTreeMap::new(),
        sample_count_per_mode: counts,
    }
}
