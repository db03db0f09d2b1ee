//! Mode Selector
//!
//! Per-session state machine over the three presentation modes. There is no
//! idle state: a session always sits in exactly one mode.
//!
//! After each question:
//! - the high-frustration streak grows while the running frustration is at
//!   or above `high_threshold` and resets otherwise
//! - a switch fires once the streak reaches `switch_streak` and the cooldown
//!   since the previous switch has elapsed
//!
//! The switch target is the learner's best historical alternative when the
//! preferred-mode record has enough samples for one, else the next mode in
//! the fixed cycle.

use serde::{Deserialize, Serialize};

use crate::aggregator::{preferred_from_record, PreferredModeRecord};
use crate::config::{Cooldown, RankBy, SelectorParams};
use crate::types::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    FrustrationThreshold,
    Manual,
}

impl SwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchReason::FrustrationThreshold => "frustration_threshold",
            SwitchReason::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeSwitch {
    pub from: Mode,
    pub to: Mode,
    pub reason: SwitchReason,
    pub at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectorDecision {
    /// Stay in `mode`; `cooling_down` is set when the streak qualified but the
    /// cooldown blocked the switch.
    Keep { mode: Mode, cooling_down: bool },
    Switch(ModeSwitch),
}

impl SelectorDecision {
    pub fn mode(&self) -> Mode {
        match self {
            SelectorDecision::Keep { mode, .. } => *mode,
            SelectorDecision::Switch(switch) => switch.to,
        }
    }

    pub fn switch(&self) -> Option<&ModeSwitch> {
        match self {
            SelectorDecision::Switch(switch) => Some(switch),
            SelectorDecision::Keep { .. } => None,
        }
    }
}

/// Live state of one learner's session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub learner_id: String,
    pub current_mode: Mode,
    /// Exponential moving average of the question scores, [0, 1]
    pub running_frustration: f64,
    pub consecutive_high_frustration_count: u32,
    /// `None` until the first switch; the cooldown is then considered elapsed
    pub last_switch_timestamp_ms: Option<i64>,
    pub questions_since_switch: u32,
    pub questions_answered: u32,
    pub started_at_ms: i64,
}

impl SessionState {
    pub fn new(learner_id: impl Into<String>, mode: Mode, now_ms: i64) -> Self {
        Self {
            learner_id: learner_id.into(),
            current_mode: mode,
            running_frustration: 0.0,
            consecutive_high_frustration_count: 0,
            last_switch_timestamp_ms: None,
            questions_since_switch: 0,
            questions_answered: 0,
            started_at_ms: now_ms,
        }
    }

    /// Start in the learner's preferred mode, or visual when none is known.
    pub fn seeded(
        learner_id: impl Into<String>,
        history: Option<&PreferredModeRecord>,
        now_ms: i64,
    ) -> Self {
        let mode = history
            .and_then(|record| record.preferred_mode)
            .unwrap_or(Mode::Visual);
        Self::new(learner_id, mode, now_ms)
    }
}

pub struct ModeSelector {
    params: SelectorParams,
}

impl ModeSelector {
    pub fn new(params: SelectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SelectorParams {
        &self.params
    }

    fn cooldown_elapsed(&self, state: &SessionState, now_ms: i64) -> bool {
        let Some(last) = state.last_switch_timestamp_ms else {
            return true;
        };
        match self.params.cooldown {
            Cooldown::Questions(n) => state.questions_since_switch >= n,
            Cooldown::DurationMs(ms) => {
                now_ms.saturating_sub(last) >= i64::try_from(ms).unwrap_or(i64::MAX)
            }
        }
    }

    pub fn target_mode(&self, current: Mode, history: Option<&PreferredModeRecord>) -> Mode {
        history
            .and_then(|record| {
                preferred_from_record(
                    record,
                    self.params.min_samples,
                    self.params.tie_epsilon,
                    RankBy::Mean,
                    Some(current),
                )
            })
            .unwrap_or_else(|| current.next())
    }

    /// Feed the updated running frustration after one question.
    pub fn observe(
        &self,
        state: &mut SessionState,
        running_frustration: f64,
        history: Option<&PreferredModeRecord>,
        now_ms: i64,
    ) -> SelectorDecision {
        state.running_frustration = running_frustration.clamp(0.0, 1.0);
        state.questions_answered += 1;
        state.questions_since_switch = state.questions_since_switch.saturating_add(1);

        if state.running_frustration >= self.params.high_threshold {
            state.consecutive_high_frustration_count += 1;
        } else {
            state.consecutive_high_frustration_count = 0;
        }

        if state.consecutive_high_frustration_count < self.params.switch_streak {
            return SelectorDecision::Keep {
                mode: state.current_mode,
                cooling_down: false,
            };
        }

        if !self.cooldown_elapsed(state, now_ms) {
            return SelectorDecision::Keep {
                mode: state.current_mode,
                cooling_down: true,
            };
        }

        let target = self.target_mode(state.current_mode, history);
        SelectorDecision::Switch(self.apply_switch(
            state,
            target,
            SwitchReason::FrustrationThreshold,
            now_ms,
        ))
    }

    /// Explicit mode change requested from outside the frustration loop.
    pub fn force_mode(&self, state: &mut SessionState, mode: Mode, now_ms: i64) -> Option<ModeSwitch> {
        if state.current_mode == mode {
            return None;
        }
        Some(self.apply_switch(state, mode, SwitchReason::Manual, now_ms))
    }

    fn apply_switch(
        &self,
        state: &mut SessionState,
        target: Mode,
        reason: SwitchReason,
        now_ms: i64,
    ) -> ModeSwitch {
        let from = state.current_mode;
        state.current_mode = target;
        state.consecutive_high_frustration_count = 0;
        state.last_switch_timestamp_ms = Some(now_ms);
        state.questions_since_switch = 0;
        ModeSwitch {
            from,
            to: target,
            reason,
            at_ms: now_ms,
        }
    }
}

impl Default for ModeSelector {
    fn default() -> Self {
        Self::new(SelectorParams::default())
    }
}
