//! Batch replay of recorded learner logs through the online frustration loop.

use std::collections::{BTreeMap, HashMap};

use affectmode_algo::{
    FrustrationLevel, FrustrationLoop, FrustrationReportRow, Mode, ModeSwitch,
    PreferredModeRecord, SessionState,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::report::{row_from_event, LearnerLogEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayedQuestion {
    pub learner_id: String,
    pub question_id: String,
    pub mode: Mode,
    pub frustration_score: f64,
    pub running_frustration: f64,
    pub level: FrustrationLevel,
    /// Mode the selector would present next
    pub recommended_mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySwitch {
    pub learner_id: String,
    /// Question after which the switch fired
    pub question_id: String,
    pub switch: ModeSwitch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayRejection {
    pub learner_id: String,
    pub question_id: String,
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayOutcome {
    pub rows: Vec<FrustrationReportRow>,
    pub questions: Vec<ReplayedQuestion>,
    pub switches: Vec<ReplaySwitch>,
    pub rejected: Vec<ReplayRejection>,
    pub final_states: BTreeMap<String, SessionState>,
}

/// Replay `entries` learner by learner, in learner-id order and file order
/// within a learner.
///
/// Each learner gets a fresh session seeded from `history`. Rows keep the
/// mode recorded in the log; the selector's own choices are reported as
/// switches and recommendations without being fed back into the scoring.
/// Entries without a timestamp reuse the previous one.
pub fn replay_log(
    entries: &[LearnerLogEntry],
    frustration_loop: &FrustrationLoop,
    history: &HashMap<String, PreferredModeRecord>,
) -> ReplayOutcome {
    let mut by_learner: BTreeMap<&str, Vec<&LearnerLogEntry>> = BTreeMap::new();
    for entry in entries {
        by_learner
            .entry(entry.input.learner_id.as_str())
            .or_default()
            .push(entry);
    }

    let mut outcome = ReplayOutcome::default();
    for (learner_id, learner_entries) in by_learner {
        let record = history.get(learner_id);
        let mut last_ms = learner_entries
            .iter()
            .find_map(|e| e.timestamp_ms)
            .unwrap_or(0);
        let mut state = SessionState::seeded(learner_id, record, last_ms);

        for entry in learner_entries {
            let now_ms = entry.timestamp_ms.unwrap_or(last_ms);
            last_ms = now_ms;

            let question_id = entry.input.question_id.clone();
            let step = match frustration_loop.step(&state, entry.input.clone(), record, now_ms) {
                Ok(step) => step,
                Err(err) => {
                    warn!(learner_id, question_id = %question_id, error = %err, "Replay rejected question");
                    outcome.rejected.push(ReplayRejection {
                        learner_id: learner_id.to_string(),
                        question_id,
                        line: entry.line,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            state = step.next_state;
            outcome.rows.push(row_from_event(&step.event));
            outcome.questions.push(ReplayedQuestion {
                learner_id: learner_id.to_string(),
                question_id: question_id.clone(),
                mode: step.event.mode,
                frustration_score: step.breakdown.score,
                running_frustration: state.running_frustration,
                level: step.breakdown.level,
                recommended_mode: step.decision.mode(),
            });
            if let Some(switch) = step.decision.switch() {
                debug!(learner_id, from = %switch.from, to = %switch.to, "Replay switch");
                outcome.switches.push(ReplaySwitch {
                    learner_id: learner_id.to_string(),
                    question_id,
                    switch: *switch,
                });
            }
        }

        outcome.final_states.insert(learner_id.to_string(), state);
    }
    outcome
}
